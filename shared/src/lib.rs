use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub const CANVAS_WIDTH: f32 = 800.0;
pub const CANVAS_HEIGHT: f32 = 600.0;
pub const CAR_SPRITE_WIDTH: f32 = 40.0;
pub const CAR_SPRITE_HEIGHT: f32 = 20.0;

pub const DEFAULT_CAR_TYPE: &str = "ferrari";
pub const KNOWN_CAR_TYPES: [&str; 4] = ["zauber", "mercedes", "ferrari", "red_bull"];
pub const TYRE_TYPES: [&str; 3] = ["soft", "medium", "hard"];
pub const DEFAULT_PLAYER_COLOR: &str = "#e74c3c";
pub const DEFAULT_MAX_HP: i32 = 100;

pub const MIN_PLAYER_ID: i64 = 1;
pub const MAX_PLAYER_ID: i64 = 99;

pub const DEFAULT_ENDPOINT_PATH: &str = "/ws";
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 3;

pub const TIMER_WARNING_SECS: f64 = 30.0;
pub const TIMER_CRITICAL_SECS: f64 = 10.0;

/// Leaderboard text for a player without a recorded lap.
pub const NO_TIME: &str = "--:--.---";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized message type: {0:?}")]
    UnknownMessage(String),

    #[error("invalid player id {0:?}: must be an integer between 1 and 99")]
    InvalidPlayerId(String),
}

/// Player identity as the server keys it.
///
/// The server may send ids as JSON strings or integers; both decode to the same
/// textual form. Integer ids order numerically, which gives the renderer and the
/// leaderboard a stable order that matches what players expect ("2" before "10").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn numeric(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl From<i64> for PlayerId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for PlayerId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for PlayerId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for PlayerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

struct PlayerIdVisitor;

impl<'de> Visitor<'de> for PlayerIdVisitor {
    type Value = PlayerId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a player id string or integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PlayerId, E> {
        Ok(PlayerId::new(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<PlayerId, E> {
        Ok(PlayerId(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PlayerId, E> {
        Ok(PlayerId::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PlayerId, E> {
        Ok(PlayerId(v.to_string()))
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PlayerIdVisitor)
    }
}

/// Checks a user-supplied id before any connection attempt is made.
pub fn validate_player_id(raw: &str) -> Result<PlayerId, ProtocolError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if (MIN_PLAYER_ID..=MAX_PLAYER_ID).contains(&id) => Ok(PlayerId::from(id)),
        _ => Err(ProtocolError::InvalidPlayerId(raw.to_string())),
    }
}

fn default_car_type() -> String {
    DEFAULT_CAR_TYPE.to_string()
}

fn default_color() -> String {
    DEFAULT_PLAYER_COLOR.to_string()
}

fn default_max_hp() -> i32 {
    DEFAULT_MAX_HP
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(default)]
    pub id: PlayerId,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Heading in degrees.
    #[serde(default, rename = "angle", alias = "orientation")]
    pub orientation: f32,
    #[serde(default = "default_car_type", rename = "car", alias = "carType")]
    pub car_type: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_max_hp")]
    pub hp: i32,
    #[serde(default = "default_max_hp", alias = "max-hp")]
    pub max_hp: i32,
    #[serde(default, alias = "best-time")]
    pub best_time: Option<f64>,
    #[serde(default)]
    pub name: String,
}

impl PlayerState {
    pub fn new(id: impl Into<PlayerId>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            orientation: 0.0,
            car_type: default_car_type(),
            color: default_color(),
            hp: DEFAULT_MAX_HP,
            max_hp: DEFAULT_MAX_HP,
            best_time: None,
            name: String::new(),
        }
    }

    pub fn clamped_hp(&self) -> i32 {
        self.hp.clamp(0, self.max_hp.max(0))
    }

    /// Health bar fill in `[0, 1]`.
    pub fn health_fraction(&self) -> f32 {
        if self.max_hp <= 0 {
            return 0.0;
        }
        (self.clamped_hp() as f32 / self.max_hp as f32).clamp(0.0, 1.0)
    }

    pub fn is_defeated(&self) -> bool {
        self.clamped_hp() == 0
    }

    /// Best lap, with zero and non-finite values treated as "no time".
    pub fn recorded_time(&self) -> Option<f64> {
        self.best_time.filter(|t| t.is_finite() && *t > 0.0)
    }

    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Player {}", self.id)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Playing,
    Finished,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WirePlayers {
    Map(BTreeMap<PlayerId, Option<PlayerState>>),
    List(Vec<Option<PlayerState>>),
}

fn deserialize_players<'de, D>(deserializer: D) -> Result<BTreeMap<PlayerId, PlayerState>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Vec<(Option<PlayerId>, Option<PlayerState>)> =
        match Option::<WirePlayers>::deserialize(deserializer)? {
            Some(WirePlayers::Map(map)) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
            Some(WirePlayers::List(list)) => list.into_iter().map(|v| (None, v)).collect(),
            None => Vec::new(),
        };

    let mut players = BTreeMap::new();
    for (key, player) in entries {
        // Null placeholders never reach the map.
        let Some(mut player) = player else { continue };
        if let Some(key) = key {
            if player.id.is_empty() {
                player.id = key.clone();
            }
            players.insert(key, player);
        } else if !player.id.is_empty() {
            players.insert(player.id.clone(), player);
        }
    }
    Ok(players)
}

/// One complete, authoritative race state as broadcast by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceSnapshot {
    #[serde(default, deserialize_with = "deserialize_players")]
    pub players: BTreeMap<PlayerId, PlayerState>,
    #[serde(default, alias = "game-time")]
    pub game_time: f64,
    #[serde(default, alias = "remaining-time")]
    pub remaining_time: f64,
    #[serde(default, alias = "game-status")]
    pub game_status: GameStatus,
    #[serde(default, alias = "winner-id")]
    pub winner_id: Option<PlayerId>,
    #[serde(default, alias = "restart-timer")]
    pub restart_timer: f64,
}

impl RaceSnapshot {
    pub fn player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub fn is_finished(&self) -> bool {
        self.game_status == GameStatus::Finished
    }

    pub fn winner(&self) -> Option<&PlayerState> {
        self.winner_id.as_ref().and_then(|id| self.players.get(id))
    }
}

/// Directional controls the local player currently holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Messages the client sends upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    PlayerId {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    PlayerInput {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        input: InputIntent,
    },
    ChangeCar {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    ChangeTyres {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "tyresType")]
        tyres_type: String,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages the server pushes downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    GameState {
        state: RaceSnapshot,
    },
    JoinSuccess {
        #[serde(default)]
        message: String,
    },
    JoinError {
        #[serde(default)]
        error: String,
    },
}

impl ServerMessage {
    const KINDS: [&'static str; 3] = ["game-state", "join-success", "join-error"];

    /// Parses one inbound text frame.
    ///
    /// Invalid JSON and well-formed JSON with an unknown `type` are both errors,
    /// so callers can drop them through a single path.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default();
        if !Self::KINDS.contains(&kind) {
            return Err(ProtocolError::UnknownMessage(kind.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `MM:SS.mmm`, or [`NO_TIME`] when no lap is recorded.
pub fn format_lap_time(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() && s > 0.0 => {
            let total_ms = (s * 1000.0).round() as u64;
            format!(
                "{:02}:{:02}.{:03}",
                total_ms / 60_000,
                (total_ms / 1000) % 60,
                total_ms % 1000
            )
        }
        _ => NO_TIME.to_string(),
    }
}

/// `MM:SS`, truncating fractional seconds.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Whole seconds left on a countdown, rounded up.
pub fn countdown_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.ceil() as u64
    } else {
        0
    }
}
