//! Heads-up display: connection status, leaderboard, health bars, race timer,
//! race-phase banner and the join prompt, all drawn through [`Canvas`].

use crate::network::ConnectionState;
use crate::race_ui::{RaceUiProjector, TimerDisplay, TimerLevel};
use crate::rendering::{Canvas, Rgba};

const TEXT: Rgba = Rgba::rgb(255, 255, 255);
const MUTED: Rgba = Rgba::rgb(0xbd, 0xc3, 0xc7);
const LOCAL_ROW: Rgba = Rgba::rgb(0xf1, 0xc4, 0x0f);
const WARNING: Rgba = Rgba::rgb(0xf3, 0x9c, 0x12);
const CRITICAL: Rgba = Rgba::rgb(0xe7, 0x4c, 0x3c);
const JOINED: Rgba = Rgba::rgb(0x2e, 0xcc, 0x71);
const PANEL: Rgba = Rgba::rgb(0, 0, 0).with_alpha(160);
const BAR_EMPTY: Rgba = Rgba::rgb(0x55, 0x55, 0x55);
const BAR_HEALTHY: Rgba = Rgba::rgb(0x2e, 0xcc, 0x71);
const BAR_LOW: Rgba = Rgba::rgb(0xe7, 0x4c, 0x3c);

const FONT: f32 = 18.0;
const LINE: f32 = 20.0;
const MARGIN: f32 = 10.0;
const BAR_WIDTH: f32 = 100.0;
const BAR_HEIGHT: f32 = 8.0;
const LEADERBOARD_WIDTH: f32 = 230.0;

/// Largest id the prompt will hold, in characters.
const MAX_PROMPT_LEN: usize = 2;

/// Text field for the player id shown while not joined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinPrompt {
    text: String,
    error: Option<String>,
}

impl JoinPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a digit. Anything else, or a full field, is ignored.
    pub fn push(&mut self, c: char) -> bool {
        if !c.is_ascii_digit() || self.text.len() >= MAX_PROMPT_LEN {
            return false;
        }
        self.text.push(c);
        true
    }

    pub fn backspace(&mut self) {
        self.text.pop();
    }

    /// Takes the typed text, leaving the field empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// What the status line reports about the connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusLine<'a> {
    pub state: ConnectionState,
    pub reconnecting: bool,
    pub error: Option<&'a str>,
}

impl StatusLine<'_> {
    pub fn text(&self) -> String {
        let mut text = self.state.label().to_string();
        if self.reconnecting {
            text.push_str(" (reconnecting)");
        }
        if let Some(error) = self.error {
            text.push_str(": ");
            text.push_str(error);
        }
        text
    }

    fn color(&self) -> Rgba {
        match self.state {
            ConnectionState::Joined => JOINED,
            ConnectionState::Disconnected => CRITICAL,
            _ => WARNING,
        }
    }
}

pub fn timer_color(level: TimerLevel) -> Rgba {
    match level {
        TimerLevel::Normal => TEXT,
        TimerLevel::Warning => WARNING,
        TimerLevel::Critical => CRITICAL,
    }
}

pub fn paint_status<C: Canvas>(canvas: &mut C, status: &StatusLine<'_>) {
    let (_, height) = canvas.size();
    canvas.fill_text(&status.text(), MARGIN, height - MARGIN, FONT, status.color());
}

/// Draws every race view model the projector currently holds.
pub fn paint_race_ui<C: Canvas>(canvas: &mut C, ui: &RaceUiProjector) {
    let (width, height) = canvas.size();

    if let Some(timer) = ui.timer() {
        let color = match timer {
            TimerDisplay::Remaining { level, .. } => timer_color(*level),
            _ => TEXT,
        };
        canvas.fill_text(&timer.text(), width / 2.0 - 30.0, MARGIN + FONT, FONT + 6.0, color);
    }

    paint_leaderboard(canvas, ui, width);

    if ui.features().health {
        paint_health(canvas, ui);
    }

    if let Some(banner) = ui.banner() {
        let (w, h) = (360.0, 3.0 * LINE + 2.0 * MARGIN + 10.0);
        let (x, y) = ((width - w) / 2.0, (height - h) / 2.0);
        canvas.fill_rect(x, y, w, h, PANEL);

        let mut line_y = y + MARGIN + FONT + 4.0;
        canvas.fill_text("Race finished!", x + MARGIN, line_y, FONT + 6.0, LOCAL_ROW);
        line_y += LINE + 4.0;
        let winner = match &banner.winner_name {
            Some(name) => format!("Winner: {} ({})", name, banner.winner_time),
            None => "No winner".to_string(),
        };
        canvas.fill_text(&winner, x + MARGIN, line_y, FONT, TEXT);
        line_y += LINE;
        canvas.fill_text(
            &format!("Next race in {}s", banner.restart_in),
            x + MARGIN,
            line_y,
            FONT,
            MUTED,
        );
    }
}

fn paint_leaderboard<C: Canvas>(canvas: &mut C, ui: &RaceUiProjector, width: f32) {
    let rows = ui.leaderboard();
    let x = width - LEADERBOARD_WIDTH - MARGIN;
    let h = (rows.len() as f32 + 1.0) * LINE + MARGIN;
    canvas.fill_rect(x, MARGIN, LEADERBOARD_WIDTH, h, PANEL);

    let mut y = MARGIN + LINE;
    canvas.fill_text(
        &format!("Players: {}", ui.player_count()),
        x + MARGIN,
        y,
        FONT,
        MUTED,
    );

    for row in rows {
        y += LINE;
        let color = if row.is_local { LOCAL_ROW } else { TEXT };
        let line = format!("{}. {}  {}", row.rank, row.name, row.best_time);
        canvas.fill_text(&line, x + MARGIN, y, FONT, color);
    }
}

fn paint_health<C: Canvas>(canvas: &mut C, ui: &RaceUiProjector) {
    let mut y = MARGIN;
    for indicator in ui.health_indicators() {
        canvas.fill_text(&indicator.name, MARGIN, y + FONT - 4.0, FONT - 4.0, TEXT);
        let bar_x = MARGIN + 110.0;
        let bar_y = y + 4.0;
        canvas.fill_rect(bar_x, bar_y, BAR_WIDTH, BAR_HEIGHT, BAR_EMPTY);
        let fill = if indicator.fill < 0.3 { BAR_LOW } else { BAR_HEALTHY };
        canvas.fill_rect(bar_x, bar_y, BAR_WIDTH * indicator.fill, BAR_HEIGHT, fill);
        y += LINE - 4.0;
    }
}

pub fn paint_prompt<C: Canvas>(canvas: &mut C, prompt: &JoinPrompt) {
    let (width, height) = canvas.size();
    let (w, h) = (320.0, 80.0);
    let (x, y) = ((width - w) / 2.0, (height - h) / 2.0);
    canvas.fill_rect(x, y, w, h, PANEL);
    canvas.fill_text(
        &format!("Player id (1-99): {}_", prompt.text()),
        x + MARGIN,
        y + MARGIN + FONT,
        FONT,
        TEXT,
    );
    let hint = prompt.error().unwrap_or("Press Enter to join");
    let color = if prompt.error().is_some() { CRITICAL } else { MUTED };
    canvas.fill_text(hint, x + MARGIN, y + MARGIN + FONT + LINE + 10.0, FONT - 2.0, color);
}
