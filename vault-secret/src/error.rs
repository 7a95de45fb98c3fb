//! Vault error types using thiserror 2.0.
//!
//! Each stage of a reconciliation has its own error enum; [`VaultSecretError`]
//! aggregates them into the single terminal error a caller sees.

use crate::schema::TypeMismatch;
use rust_common::{HttpSetupError, RetryError, Retryable};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request or response exceeded the configured timeout
    Timeout,
    /// The server could not be reached
    Unavailable,
    /// The server answered with 5xx or 429
    Server,
    /// The server rejected the request with a 4xx
    Client,
    /// The response body could not be interpreted
    Decode,
    /// Every retry attempt failed
    RetriesExhausted,
}

/// Errors raised by the HTTP layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Request timed out
    #[error("Vault request timed out: {0}")]
    Timeout(String),

    /// Vault server unreachable
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Transient server-side failure (5xx or 429)
    #[error("Vault server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response
        message: String,
    },

    /// Request rejected by Vault; never retried
    #[error("Vault error ({status}): {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// First error message from the body, or the status line
        message: String,
        /// Every entry of the body's `errors` array
        errors: Vec<String>,
    },

    /// Response body did not have the expected shape
    #[error("Invalid Vault response: {0}")]
    Decode(String),

    /// Retry budget spent on transient failures
    #[error("Vault request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last: Box<TransportError>,
    },
}

impl TransportError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Timeout(_) => TransportErrorKind::Timeout,
            Self::Unavailable(_) => TransportErrorKind::Unavailable,
            Self::Server { .. } => TransportErrorKind::Server,
            Self::Client { .. } => TransportErrorKind::Client,
            Self::Decode(_) => TransportErrorKind::Decode,
            Self::RetriesExhausted { .. } => TransportErrorKind::RetriesExhausted,
        }
    }

    /// HTTP status code of the response that caused this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Whether this is Vault's own "no secret at this path" answer.
    ///
    /// Vault answers a read of a missing secret with 404 and an empty `errors`
    /// array. A 404 that carries messages (unknown mount, no handler for route)
    /// is a real failure and is not treated as absence.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Client { status: 404, errors, .. } if errors.is_empty())
    }

    /// Whether the server may have applied a mutating request despite this error.
    #[must_use]
    pub fn leaves_state_unconfirmed(&self) -> bool {
        matches!(
            self.kind(),
            TransportErrorKind::Timeout
                | TransportErrorKind::Unavailable
                | TransportErrorKind::Server
                | TransportErrorKind::RetriesExhausted
        )
    }
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Unavailable(_) | Self::Server { .. }
        )
    }
}

impl From<RetryError<Self>> for TransportError {
    fn from(err: RetryError<Self>) -> Self {
        match err {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { attempts, last } => Self::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

/// Authentication failures. All are fatal.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Login rejected the credentials (HTTP 400)
    #[error("Authentication failed: invalid credentials")]
    InvalidCredentials,

    /// Login refused for lack of permission (HTTP 403)
    #[error("Authentication failed: insufficient permissions")]
    InsufficientPermissions,

    /// Local credential file could not be used
    #[error("Authentication failed: credential unreadable at {}: {reason}", path.display())]
    CredentialUnreadable {
        /// Path of the credential file
        path: PathBuf,
        /// Why the file could not be used
        reason: String,
    },

    /// Any other login failure
    #[error("Authentication failed: {0}")]
    Unexpected(String),
}

/// Schema violations, collected across every field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// Schema fields absent from the payload
    pub missing_fields: Vec<String>,
    /// Fields present with the wrong type
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ValidationError {
    /// Whether no violation was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing_fields.is_empty() && self.type_mismatches.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut problems: Vec<String> = self
            .missing_fields
            .iter()
            .map(|field| format!("missing required field `{field}`"))
            .collect();
        problems.extend(self.type_mismatches.iter().map(ToString::to_string));

        write!(f, "Secret data validation failed: {}", problems.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Invalid caller-supplied configuration, detected before any network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An authentication method was selected without one of its fields
    #[error("{method} authentication requires `{field}`")]
    MissingAuthField {
        /// Authentication method name
        method: &'static str,
        /// Missing field name
        field: &'static str,
    },

    /// Authentication method not implemented
    #[error("Unsupported authentication method: {0}")]
    UnsupportedAuthMethod(String),

    /// No Vault address given
    #[error("Vault URL is required (set vault_url or VAULT_ADDR)")]
    MissingUrl,

    /// Vault address malformed or not http(s)
    #[error("Invalid Vault URL `{url}`: {reason}")]
    InvalidUrl {
        /// Rejected value
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Namespace cannot be sent as a header
    #[error("Invalid Vault namespace `{0}`")]
    InvalidNamespace(String),

    /// Request timeout of zero seconds
    #[error("Timeout must be at least 1 second")]
    InvalidTimeout,

    /// Secret path empty
    #[error("Secret path must not be empty")]
    EmptyPath,

    /// Desired state unknown
    #[error("Invalid state `{0}` (expected present, absent or read)")]
    InvalidState(String),

    /// `present` without data
    #[error("Secret data is required when state is present")]
    DataRequired,

    /// Data supplied for a state that does not write
    #[error("Secret data is not allowed when state is {0}")]
    DataForbidden(&'static str),

    /// KV generation other than 1 or 2
    #[error("Unsupported KV version {0} (expected 1 or 2)")]
    InvalidGeneration(i64),

    /// Schema names a type outside str/int/bool
    #[error("Unknown type `{type_name}` for schema field `{field}` (expected str, int or bool)")]
    UnknownFieldType {
        /// Schema field
        field: String,
        /// Rejected type name
        type_name: String,
    },

    /// HTTP client could not be built
    #[error(transparent)]
    Http(#[from] HttpSetupError),
}

/// Terminal error of a reconciliation.
#[derive(Error, Debug)]
pub enum VaultSecretError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Authentication failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Request to Vault failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload violates the schema
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Secret not found on a read
    #[error("Secret not found at path: {0}")]
    NotFound(String),

    /// Write or delete failed after being attempted
    #[error("Failed to {operation} secret at {path}{}: {source}", unconfirmed_note(.source))]
    Mutation {
        /// `write` or `delete`
        operation: &'static str,
        /// Request path
        path: String,
        /// Transport failure
        #[source]
        source: TransportError,
    },
}

fn unconfirmed_note(source: &TransportError) -> &'static str {
    if source.leaves_state_unconfirmed() {
        " (remote state unconfirmed)"
    } else {
        ""
    }
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultSecretError>;

impl VaultSecretError {
    /// Create a secret not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn client(status: u16, errors: &[&str]) -> TransportError {
        TransportError::Client {
            status,
            message: errors.first().map_or_else(|| format!("{status}"), ToString::to_string),
            errors: errors.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Vault unavailable: connection refused");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(TransportError::Timeout("30s".to_string()).is_retryable());
        assert!(TransportError::unavailable("reset").is_retryable());
        assert!(
            TransportError::Server {
                status: 503,
                message: "sealed".to_string()
            }
            .is_retryable()
        );
        assert!(!client(404, &[]).is_retryable());
        assert!(!client(403, &["permission denied"]).is_retryable());
        assert!(!TransportError::decode("not json").is_retryable());
    }

    #[test]
    fn test_not_found_requires_empty_errors() {
        assert!(client(404, &[]).is_not_found());
        assert!(!client(404, &["no handler for route \"kvx/data/app\""]).is_not_found());
        assert!(!client(403, &[]).is_not_found());
    }

    #[test]
    fn test_exhausted_conversion_keeps_last_status() {
        let err: TransportError = RetryError::Exhausted {
            attempts: 3,
            last: TransportError::Server {
                status: 500,
                message: "internal".to_string(),
            },
        }
        .into();

        assert_eq!(err.kind(), TransportErrorKind::RetriesExhausted);
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_mutation_message_flags_unconfirmed_state() {
        let err = VaultSecretError::Mutation {
            operation: "write",
            path: "kv/data/app".to_string(),
            source: TransportError::Timeout("deadline".to_string()),
        };
        assert!(err.to_string().contains("remote state unconfirmed"));

        let err = VaultSecretError::Mutation {
            operation: "delete",
            path: "kv/data/app".to_string(),
            source: client(403, &["permission denied"]),
        };
        assert!(!err.to_string().contains("unconfirmed"));
    }

    #[test]
    fn test_validation_error_lists_every_problem() {
        let err = ValidationError {
            missing_fields: vec!["port".to_string()],
            type_mismatches: vec![TypeMismatch {
                field: "username".to_string(),
                expected: FieldType::Str,
                actual: "int",
            }],
        };

        let msg = err.to_string();
        assert!(msg.contains("`port`"));
        assert!(msg.contains("username"));
    }
}
