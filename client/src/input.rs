//! Client input sampling with edge detection and intent derivation

use crate::error::ClientError;
use crate::network::ConnectionState;
use shared::{InputIntent, PlayerState, TYRE_TYPES};
use std::collections::HashMap;

/// The four controls that make up a movement intent, by lowercase key name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
}

impl KeyBindings {
    pub fn validate(&self) -> Result<(), ClientError> {
        let keys = [&self.up, &self.down, &self.left, &self.right];
        for (i, key) in keys.iter().enumerate() {
            if key.is_empty() {
                return Err(ClientError::Config("empty key binding".to_string()));
            }
            if keys[..i].iter().any(|other| other.eq_ignore_ascii_case(key)) {
                return Err(ClientError::Config(format!("key {:?} bound twice", key)));
            }
        }
        Ok(())
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            up: "w".to_string(),
            down: "s".to_string(),
            left: "a".to_string(),
            right: "d".to_string(),
        }
    }
}

/// Non-movement requests a key press can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Customization {
    ChangeCar,
    ChangeTyres(&'static str),
}

impl Customization {
    pub fn for_key(key: &str) -> Option<Self> {
        match key {
            "c" => Some(Customization::ChangeCar),
            "1" => Some(Customization::ChangeTyres(TYRE_TYPES[0])),
            "2" => Some(Customization::ChangeTyres(TYRE_TYPES[1])),
            "3" => Some(Customization::ChangeTyres(TYRE_TYPES[2])),
            _ => None,
        }
    }
}

/// Why an intent was not sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppressed {
    NotJoined,
    Defeated,
}

/// Decides whether the local player may emit intent right now.
///
/// `local` is the local player's entry in the latest snapshot, if any. With
/// health tracking on, a player at zero hp stays silent until a later snapshot
/// reports hp above zero.
pub fn dispatch_gate(
    state: ConnectionState,
    local: Option<&PlayerState>,
    health_tracking: bool,
) -> Result<(), Suppressed> {
    if state != ConnectionState::Joined {
        return Err(Suppressed::NotJoined);
    }
    if health_tracking && local.is_some_and(PlayerState::is_defeated) {
        return Err(Suppressed::Defeated);
    }
    Ok(())
}

/// Tracks raw key state and turns it into movement intent
pub struct InputSampler {
    bindings: KeyBindings,
    keys: HashMap<String, bool>,
}

impl InputSampler {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            keys: HashMap::new(),
        }
    }

    /// Records a key transition.
    ///
    /// Returns the recomputed intent only when the key actually changed state;
    /// auto-repeat presses of a held key are not edges.
    pub fn key_event(&mut self, key: &str, pressed: bool) -> Option<InputIntent> {
        let key = key.to_lowercase();
        let previous = self.keys.insert(key, pressed).unwrap_or(false);
        if previous == pressed {
            return None;
        }
        Some(self.intent())
    }

    pub fn intent(&self) -> InputIntent {
        InputIntent {
            up: self.is_pressed(&self.bindings.up),
            down: self.is_pressed(&self.bindings.down),
            left: self.is_pressed(&self.bindings.left),
            right: self.is_pressed(&self.bindings.right),
        }
    }

    pub fn is_pressed(&self, key: &str) -> bool {
        self.keys
            .get(&key.to_lowercase())
            .copied()
            .unwrap_or(false)
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }
}

impl Default for InputSampler {
    fn default() -> Self {
        Self::new(KeyBindings::default())
    }
}
