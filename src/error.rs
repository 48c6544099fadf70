use thiserror::Error;

/// Failure of a single platform call.
///
/// Resolution and composition treat every variant as "not found at this
/// stage"; only `DeliveryRejected` is ever surfaced to a user.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("delivery rejected: {0}")]
    DeliveryRejected(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl PlatformError {
    pub fn transient(what: impl std::fmt::Display) -> Self {
        Self::Transient(what.to_string())
    }

    /// Map an HTTP status code to the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            401 | 403 => Self::PermissionDenied(message),
            _ => Self::Transient(message),
        }
    }
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;
