//! Shared library for cross-cutting concerns in the vault-secret workspace.
//!
//! This crate provides centralized implementations for:
//! - Retryability classification shared by every error type that crosses the network
//! - HTTP client building with an explicit TLS verification policy
//! - Retry policies with exponential backoff
//! - Tracing subscriber setup for binaries

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod retry;
pub mod tracing_config;

pub use error::{HttpSetupError, Retryable};
pub use http::{HttpConfig, TlsPolicy, build_http_client};
pub use retry::{RetryConfig, RetryError, RetryPolicy};
pub use tracing_config::{TracingConfig, init_tracing};
