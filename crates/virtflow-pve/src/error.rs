//! Proxmox VE provider error types

use thiserror::Error;
use virtflow_reconcile::ProviderError;

#[derive(Error, Debug)]
pub enum PveError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Unexpected response shape: {0}")]
    Envelope(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid task identifier: {0}")]
    InvalidUpid(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PveError>;

impl From<reqwest::Error> for PveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PveError::Envelope(err.to_string())
        } else {
            PveError::Transport(err.to_string())
        }
    }
}

/// Boundary mapping onto the engine taxonomy: 404 means the target is
/// absent, transport failures are transient, everything else is a
/// rejection the orchestrator has to look at.
impl From<PveError> for ProviderError {
    fn from(err: PveError) -> Self {
        match err {
            PveError::Api { status: 404, message } => ProviderError::NotFound(message),
            PveError::Api { status, message } => {
                ProviderError::Rejected(format!("{status}: {message}"))
            }
            PveError::Transport(message) => ProviderError::Transient(message),
            other => ProviderError::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_classification() {
        let absent: ProviderError = PveError::Api {
            status: 404,
            message: "vm 100 does not exist".to_string(),
        }
        .into();
        assert!(matches!(absent, ProviderError::NotFound(_)));

        let rejected: ProviderError = PveError::Api {
            status: 400,
            message: "parameter verification failed".to_string(),
        }
        .into();
        assert!(matches!(
            rejected,
            ProviderError::Rejected(message) if message.starts_with("400:")
        ));

        let transient: ProviderError =
            PveError::Transport("connection refused".to_string()).into();
        assert!(matches!(transient, ProviderError::Transient(_)));

        let envelope: ProviderError =
            PveError::Envelope("expected a string".to_string()).into();
        assert!(matches!(envelope, ProviderError::Rejected(_)));
    }
}
