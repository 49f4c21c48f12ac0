use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum AclError {
    #[error("poisoned lock error: {0}")]
    PoisonedLock(String),

    #[error("fact store error: {0}")]
    Store(String),

    #[error("remote lookup error: {0}")]
    Remote(String),

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl AclError {
    pub(crate) fn timeout(operation: &str, budget: std::time::Duration) -> Self {
        AclError::Timeout {
            operation: operation.to_string(),
            millis: budget.as_millis() as u64,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for AclError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        AclError::PoisonedLock(err.to_string())
    }
}

impl From<config::ConfigError> for AclError {
    fn from(err: config::ConfigError) -> Self {
        AclError::Config(err.to_string())
    }
}
