//! Shared test utilities for the vault-secret workspace.
//!
//! This crate provides:
//! - Proptest generators for secret paths, payloads and schemas
//! - A wiremock-backed fake Vault server
//! - JSON fixtures shaped like Vault API responses

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
