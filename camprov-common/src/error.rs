use thiserror::Error;

/// Errors surfaced by the core provisioning subsystems.
///
/// Input-validation variants (`BadRange` .. `NoMatch`) are never retried;
/// they are surfaced to the caller as-is. `Transport`/`Auth`/`DeviceState`/
/// `Protocol` classify a single VAPIX call outcome and drive the retry
/// decision in `camprov-vapix::client`.
#[derive(Error, Debug)]
pub enum CamError {
    #[error("invalid address range: {0}")]
    BadRange(String),

    #[error("invalid subnet mask: {0}")]
    BadMask(String),

    #[error("duplicate entry in assignment plan: {0}")]
    Duplicate(String),

    #[error("assignment plan exhausted")]
    PlanExhausted,

    #[error("no plan entry for hardware address {0}")]
    NoMatch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("device reported a recognized non-error state: {0}")]
    DeviceState(String),

    #[error("malformed response: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CamError>;
