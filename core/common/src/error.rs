//! Common error types for Stevedore.

use thiserror::Error;

use crate::types::CredentialRole;

/// Top-level error type for artifact driver resolution and transfers.
#[derive(Debug, Error)]
pub enum Error {
    /// The location descriptor names no backend, more than one backend,
    /// or a backend kind with no driver.
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// A secret reference in the descriptor could not be resolved.
    ///
    /// Carries the reference, never the value.
    #[error("Failed to resolve {role} from secret '{name}' key '{key}': {source}")]
    SecretResolution {
        role: CredentialRole,
        name: String,
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// The secret store has no such entry or key.
    #[error("Secret '{name}' has no key '{key}'")]
    SecretNotFound { name: String, key: String },

    /// The secret store could not be reached or answered with a failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A tuning override is malformed, not merely out of range. Out-of-range
    /// overrides are clamped and never reach this variant.
    #[error("Invalid tuning override for {knob}: {value}")]
    InvalidTuningOverride { knob: &'static str, value: i64 },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_resolution_message_names_reference() {
        let err = Error::SecretResolution {
            role: CredentialRole::SecretKey,
            name: "my-creds".to_string(),
            key: "secret-key".to_string(),
            source: Box::new(Error::SecretNotFound {
                name: "my-creds".to_string(),
                key: "secret-key".to_string(),
            }),
        };

        let message = err.to_string();
        assert!(message.contains("secret key"));
        assert!(message.contains("my-creds"));
        assert!(message.contains("secret-key"));
    }

    #[test]
    fn test_secret_resolution_exposes_source() {
        use std::error::Error as _;

        let err = Error::SecretResolution {
            role: CredentialRole::AccessKey,
            name: "creds".to_string(),
            key: "ak".to_string(),
            source: Box::new(Error::Transport("connection refused".to_string())),
        };

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "Transport error: connection refused");
    }
}
