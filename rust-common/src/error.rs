//! Shared error plumbing.
//!
//! Errors that cross the network implement [`Retryable`] so that a single
//! [`RetryPolicy`](crate::RetryPolicy) can drive every remote call, whatever
//! concrete error type the caller uses.

use std::path::PathBuf;
use thiserror::Error;

/// Classification of an error as transient or fatal.
///
/// Retryable errors are transient failures that may succeed on retry, such as
/// connection resets, timeouts, rate limiting or server-side faults.
pub trait Retryable {
    /// Check if this error is retryable.
    fn is_retryable(&self) -> bool;
}

/// Failure while building an HTTP client.
///
/// These are construction-time errors: a client that cannot honour its TLS
/// policy is never handed out.
#[derive(Error, Debug)]
pub enum HttpSetupError {
    /// The configured CA bundle does not exist
    #[error("CA certificate file not found: {}", .0.display())]
    CaCertNotFound(PathBuf),

    /// The configured CA bundle could not be read
    #[error("Failed to read CA certificate {}: {source}", path.display())]
    CaCertUnreadable {
        /// Path of the CA bundle
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configured CA bundle is not valid PEM
    #[error("Invalid CA certificate {}: {source}", path.display())]
    InvalidCaCert {
        /// Path of the CA bundle
        path: PathBuf,
        /// Parser error
        #[source]
        source: reqwest::Error,
    },

    /// The configured CA bundle parsed but held no certificate
    #[error("CA certificate file contains no certificates: {}", .0.display())]
    EmptyCaBundle(PathBuf),

    /// The client builder rejected the configuration
    #[error("HTTP client build failed: {0}")]
    Build(#[from] reqwest::Error),
}

impl Retryable for HttpSetupError {
    fn is_retryable(&self) -> bool {
        false
    }
}
