use log::debug;
use shared::{PlayerId, PlayerState, RaceSnapshot};

/// Holds the most recent authoritative race state.
///
/// Each `game-state` message replaces the snapshot wholesale; nothing from the
/// previous one survives.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    latest: Option<RaceSnapshot>,
    received: u64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, snapshot: RaceSnapshot) {
        self.received += 1;
        debug!(
            "Snapshot {}: {} players, status {:?}",
            self.received,
            snapshot.players.len(),
            snapshot.game_status
        );
        self.latest = Some(snapshot);
    }

    pub fn latest(&self) -> Option<&RaceSnapshot> {
        self.latest.as_ref()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.latest.as_ref().and_then(|snapshot| snapshot.player(id))
    }

    /// Number of snapshots applied so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}
