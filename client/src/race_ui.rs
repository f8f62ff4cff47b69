//! View models derived from the latest race snapshot: leaderboard, health
//! indicators, the race-phase banner and the timer readout.

use crate::config::FeatureFlags;
use shared::{
    countdown_seconds, format_clock, format_lap_time, PlayerId, PlayerState, RaceSnapshot,
    TIMER_CRITICAL_SECS, TIMER_WARNING_SECS,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub best_time: String,
    pub is_local: bool,
}

/// Ascending best lap; players without a lap sort last. Ties keep ascending
/// id order.
pub fn leaderboard(snapshot: &RaceSnapshot, local: Option<&PlayerId>) -> Vec<LeaderboardRow> {
    let mut players: Vec<&PlayerState> = snapshot.players.values().collect();
    players.sort_by(|a, b| match (a.recorded_time(), b.recorded_time()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    players
        .into_iter()
        .enumerate()
        .map(|(i, player)| LeaderboardRow {
            rank: i + 1,
            id: player.id.clone(),
            name: player.display_name(),
            color: player.color.clone(),
            best_time: format_lap_time(player.recorded_time()),
            is_local: local == Some(&player.id),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthIndicator {
    pub id: PlayerId,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub fill: f32,
    /// How many refreshes have updated this entry since it was created. The
    /// session refreshes once per rendered frame, so a snapshot shown for
    /// several frames counts once per frame.
    pub updates: u64,
}

impl HealthIndicator {
    fn new(id: PlayerId) -> Self {
        Self {
            id,
            name: String::new(),
            hp: 0,
            max_hp: 0,
            fill: 0.0,
            updates: 0,
        }
    }

    fn update(&mut self, player: &PlayerState) {
        self.name = player.display_name();
        self.hp = player.clamped_hp();
        self.max_hp = player.max_hp;
        self.fill = player.health_fraction();
        self.updates += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceBanner {
    pub winner_name: Option<String>,
    pub winner_time: String,
    pub restart_in: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerLevel {
    Normal,
    Warning,
    Critical,
}

impl TimerLevel {
    pub fn for_remaining(seconds: f64) -> Self {
        if seconds < TIMER_CRITICAL_SECS {
            TimerLevel::Critical
        } else if seconds < TIMER_WARNING_SECS {
            TimerLevel::Warning
        } else {
            TimerLevel::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimerDisplay {
    /// Race clock when the race-phase UI is off.
    Elapsed(String),
    Remaining { text: String, level: TimerLevel },
    Restart { seconds: u64 },
}

impl TimerDisplay {
    pub fn text(&self) -> String {
        match self {
            TimerDisplay::Elapsed(text) => text.clone(),
            TimerDisplay::Remaining { text, .. } => text.clone(),
            TimerDisplay::Restart { seconds } => format!("Next race in {}s", seconds),
        }
    }
}

/// Remembered name and lap of a player seen in an earlier snapshot, so a
/// winner who already left can still be announced.
#[derive(Debug, Clone, PartialEq)]
struct RosterEntry {
    name: String,
    best_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceUiProjector {
    features: FeatureFlags,
    local: Option<PlayerId>,
    leaderboard: Vec<LeaderboardRow>,
    health: BTreeMap<PlayerId, HealthIndicator>,
    indicators_created: u64,
    banner: Option<RaceBanner>,
    timer: Option<TimerDisplay>,
    player_count: usize,
    roster: HashMap<PlayerId, RosterEntry>,
}

impl RaceUiProjector {
    pub fn new(features: FeatureFlags) -> Self {
        Self {
            features,
            local: None,
            leaderboard: Vec::new(),
            health: BTreeMap::new(),
            indicators_created: 0,
            banner: None,
            timer: None,
            player_count: 0,
            roster: HashMap::new(),
        }
    }

    pub fn set_local_player(&mut self, id: Option<PlayerId>) {
        self.local = id;
    }

    pub fn refresh(&mut self, snapshot: &RaceSnapshot) {
        for (id, player) in &snapshot.players {
            self.roster.insert(
                id.clone(),
                RosterEntry {
                    name: player.display_name(),
                    best_time: player.recorded_time(),
                },
            );
        }

        self.player_count = snapshot.players.len();
        self.leaderboard = leaderboard(snapshot, self.local.as_ref());

        if self.features.health {
            self.refresh_health(snapshot);
        }

        if self.features.race_ui {
            self.banner = snapshot.is_finished().then(|| self.banner_for(snapshot));
            self.timer = Some(if snapshot.is_finished() {
                TimerDisplay::Restart {
                    seconds: countdown_seconds(snapshot.restart_timer),
                }
            } else {
                TimerDisplay::Remaining {
                    text: format_clock(snapshot.remaining_time),
                    level: TimerLevel::for_remaining(snapshot.remaining_time),
                }
            });
        } else {
            self.banner = None;
            self.timer = Some(TimerDisplay::Elapsed(format_clock(snapshot.game_time)));
        }
    }

    fn refresh_health(&mut self, snapshot: &RaceSnapshot) {
        self.health.retain(|id, _| snapshot.players.contains_key(id));
        for (id, player) in &snapshot.players {
            if !self.health.contains_key(id) {
                self.indicators_created += 1;
            }
            self.health
                .entry(id.clone())
                .or_insert_with(|| HealthIndicator::new(id.clone()))
                .update(player);
        }
    }

    fn banner_for(&self, snapshot: &RaceSnapshot) -> RaceBanner {
        let winner = snapshot.winner_id.as_ref().and_then(|id| {
            snapshot
                .player(id)
                .map(|p| RosterEntry {
                    name: p.display_name(),
                    best_time: p.recorded_time(),
                })
                .or_else(|| self.roster.get(id).cloned())
        });

        RaceBanner {
            winner_name: winner.as_ref().map(|w| w.name.clone()),
            winner_time: format_lap_time(winner.and_then(|w| w.best_time)),
            restart_in: countdown_seconds(snapshot.restart_timer),
        }
    }

    pub fn leaderboard(&self) -> &[LeaderboardRow] {
        &self.leaderboard
    }

    pub fn health_indicators(&self) -> impl Iterator<Item = &HealthIndicator> {
        self.health.values()
    }

    pub fn health_indicator(&self, id: &PlayerId) -> Option<&HealthIndicator> {
        self.health.get(id)
    }

    /// Total indicators ever created; stays flat while the roster is stable.
    pub fn indicators_created(&self) -> u64 {
        self.indicators_created
    }

    pub fn banner(&self) -> Option<&RaceBanner> {
        self.banner.as_ref()
    }

    pub fn timer(&self) -> Option<&TimerDisplay> {
        self.timer.as_ref()
    }

    pub fn player_count(&self) -> usize {
        self.player_count
    }

    pub fn features(&self) -> FeatureFlags {
        self.features
    }
}
