//! Declarative reconciliation of HashiCorp Vault KV secrets.
//!
//! A [`SecretDescriptor`] states what a path should hold. A [`Reconciler`]
//! authenticates once, reads the path, and writes or deletes only when the
//! current state differs, reporting the result as a [`ReconcileOutcome`].
//!
//! ```no_run
//! use vault_secret::{AuthConfig, Reconciler, SecretDescriptor, TransportConfig};
//!
//! # async fn run() -> vault_secret::VaultResult<()> {
//! let transport = TransportConfig::new("https://vault.example.com:8200")?;
//! let auth = AuthConfig::token("hvs.example")?;
//! let data = serde_json::json!({"username": "app"});
//! let descriptor = SecretDescriptor::present(
//!     "secret/app/db",
//!     data.as_object().cloned().unwrap_or_default(),
//! )?;
//!
//! let outcome = Reconciler::new(&transport, auth)?
//!     .reconcile(&descriptor)
//!     .await?;
//! println!("changed: {}", outcome.changed);
//! # Ok(())
//! # }
//! ```

pub mod addressing;
pub mod auth;
pub mod config;
pub mod error;
pub mod params;
pub mod provider;
pub mod reconciler;
pub mod schema;
pub mod secrets;
pub mod transport;

pub use addressing::{StoreGeneration, StoredSecret};
pub use auth::authenticate;
pub use config::{AuthConfig, AuthCredentials, AuthMethod, TransportConfig};
pub use error::{
    AuthError, ConfigError, TransportError, TransportErrorKind, ValidationError,
    VaultResult, VaultSecretError,
};
pub use params::{EnvDefaults, Invocation, ModuleFailure, ModuleParams, ModuleResult};
pub use provider::{KvStore, SecretStore};
pub use reconciler::{Phase, Reconciler, converge};
pub use schema::{FieldType, Schema};
pub use secrets::{
    DesiredState, Operation, Payload, ReconcileOutcome, SecretDescriptor, StateKind,
};
pub use transport::TransportClient;
