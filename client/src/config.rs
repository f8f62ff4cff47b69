//! Collaborator-supplied configuration for a client session.

use crate::error::ClientError;
use crate::input::KeyBindings;
use shared::{CANVAS_HEIGHT, CANVAS_WIDTH, DEFAULT_ENDPOINT_PATH};
use std::path::PathBuf;
use std::time::Duration;

/// Switches between the client variants: sprite art, health bars, race-phase
/// UI and car/tyre customization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub sprites: bool,
    pub health: bool,
    pub race_ui: bool,
    pub customization: bool,
}

impl FeatureFlags {
    pub fn all() -> Self {
        Self {
            sprites: true,
            health: true,
            race_ui: true,
            customization: true,
        }
    }

    pub fn minimal() -> Self {
        Self {
            sprites: false,
            health: false,
            race_ui: false,
            customization: false,
        }
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            customization: false,
            ..Self::all()
        }
    }
}

/// What happens after the transport closes underneath a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// The user has to submit an id again.
    #[default]
    Disabled,
    /// One new attempt after the given delay, per close.
    After(Duration),
}

impl ReconnectPolicy {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            ReconnectPolicy::Disabled => None,
            ReconnectPolicy::After(delay) => Some(*delay),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub path: String,
    pub secure: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: DEFAULT_ENDPOINT_PATH.to_string(),
            secure: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}{}", scheme, self.host, self.path)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub features: FeatureFlags,
    pub reconnect: ReconnectPolicy,
    pub key_bindings: KeyBindings,
    pub asset_dir: PathBuf,
    pub canvas_width: f32,
    pub canvas_height: f32,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            features: FeatureFlags::default(),
            reconnect: ReconnectPolicy::Disabled,
            key_bindings: KeyBindings::default(),
            asset_dir: PathBuf::from("assets"),
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.endpoint.host.trim().is_empty() {
            return Err(ClientError::Config("server host is empty".to_string()));
        }
        if self.canvas_width <= 0.0 || self.canvas_height <= 0.0 {
            return Err(ClientError::Config(format!(
                "canvas size {}x{} is not positive",
                self.canvas_width, self.canvas_height
            )));
        }
        if self.reconnect.delay() == Some(Duration::ZERO) {
            return Err(ClientError::Config(
                "reconnect delay must be greater than zero".to_string(),
            ));
        }
        self.key_bindings.validate()
    }
}
