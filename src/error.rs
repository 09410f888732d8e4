//! Error types for the Kafka roller

use thiserror::Error;

/// Result type alias using the roller's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Mechanical failures encountered while acting on a pod or its broker
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Admin API error (transport or broker-side)
    #[error("Admin client error: {0}")]
    Admin(String),

    /// A pod did not become ready within the allowed time
    #[error("Timed out waiting for pod {0} to become ready")]
    ReadinessTimeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration parse error
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an admin client error
    pub fn admin(msg: impl Into<String>) -> Self {
        Error::Admin(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error is the timeout kind, as opposed to a hard failure.
    /// Readiness polling reports timeouts this way so callers can tell them
    /// apart from API errors.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ReadinessTimeout(_))
    }
}
