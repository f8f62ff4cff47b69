use shared::ProtocolError;

/// Everything that can go wrong inside the client core.
///
/// None of these are fatal: callers log them and fall back to a visible
/// degraded state.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not joined to a race")]
    NotJoined,

    #[error("asset {path} failed to load: {reason}")]
    Asset { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}
