// src/engine_lib/error.rs

use thiserror::Error;

/// Failure reported by a host platform call (session request, space or
/// hit-test source acquisition, detector load, session end).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    pub fn new<T: ToString>(msg: T) -> Self {
        PlatformError(msg.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
    #[error("required hit-test capability is not available: {0}")]
    CapabilityUnsupported(String),

    #[error("immersive session request failed: {0}")]
    SessionRequestFailed(String),

    #[error("resource acquisition failed: {0}")]
    ResourceAcquisitionFailed(String),

    #[error("session teardown failed: {0}")]
    Teardown(String),

    #[error("a session start is already in progress")]
    AlreadyStarting,

    #[error("a session is already active")]
    AlreadyActive,

    #[error("session start was cancelled")]
    Cancelled,

    #[error("portal runtime has been disposed")]
    Disposed,

    #[error("a tracker has already been selected for this mount")]
    TrackerAlreadySelected,
}

impl PortalError {
    /// Errors after which the start affordance should be offered again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PortalError::Disposed)
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
