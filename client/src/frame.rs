use log::{debug, info};
use std::time::{Duration, Instant};

/// Gap between ticks above which we log a stall. Stalled frames are never
/// replayed; the next tick just draws the latest snapshot.
const STALL_THRESHOLD: Duration = Duration::from_millis(250);

/// Gates the per-frame render and UI refresh.
///
/// Stays idle until the session has joined, then lets every display-refresh
/// tick through. There is no fixed timestep and no backlog.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    running: bool,
    frames: u64,
    last_tick: Option<Instant>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the loop. Returns true only on the first call.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        info!("Frame loop started");
        self.running = true;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns whether this tick should render.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }

        if let Some(last) = self.last_tick {
            let gap = now.saturating_duration_since(last);
            if gap > STALL_THRESHOLD {
                debug!("Frame stalled for {:?}, rendering latest state", gap);
            }
        }

        self.last_tick = Some(now);
        self.frames += 1;
        true
    }

    /// Frames rendered since start.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
