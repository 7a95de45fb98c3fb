//! Invocation parameters for the `vault-secret` binary.
//!
//! Parameters arrive as one JSON object. Values missing from it fall back to an
//! [`EnvDefaults`] snapshot; the snapshot is taken by the caller, so this module
//! stays free of process-global state.

use crate::addressing::StoreGeneration;
use crate::config::{AuthConfig, AuthCredentials, AuthMethod, TransportConfig};
use crate::error::{ConfigError, VaultResult};
use crate::reconciler::Reconciler;
use crate::schema::Schema;
use crate::secrets::{Payload, ReconcileOutcome, SecretDescriptor, StateKind};
use chrono::{SecondsFormat, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_KV_VERSION: i64 = 2;

/// Raw invocation parameters. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModuleParams {
    /// Vault server address
    pub vault_url: Option<String>,
    /// Static token for `token` authentication
    #[serde(deserialize_with = "secret_string")]
    pub vault_token: Option<SecretString>,
    /// Logical secret path
    pub secret_path: Option<String>,
    /// Desired payload for `present`
    pub secret_data: Option<Payload>,
    /// `present`, `absent` or `read`
    pub state: Option<String>,
    /// Verify TLS certificates
    pub verify_ssl: Option<bool>,
    /// Overrides `verify_ssl` when set
    pub validate_certs: Option<bool>,
    /// Extra CA bundle
    pub ca_cert_path: Option<PathBuf>,
    /// Vault Enterprise namespace
    pub vault_namespace: Option<String>,
    /// `token`, `approle` or `kubernetes`
    pub auth_method: Option<String>,
    /// AppRole role id
    pub role_id: Option<String>,
    /// AppRole secret id
    #[serde(deserialize_with = "secret_string")]
    pub secret_id: Option<SecretString>,
    /// Kubernetes auth role
    pub kubernetes_role: Option<String>,
    /// Service account token file
    pub jwt_token_path: Option<PathBuf>,
    /// KV engine version, 1 or 2
    pub kv_version: Option<i64>,
    /// Per-request timeout in seconds
    pub timeout: Option<u64>,
    /// Total attempts per request
    pub retries: Option<u32>,
    /// Field name to type name (`str`, `int`, `bool`)
    pub secret_schema: Option<serde_json::Map<String, serde_json::Value>>,
    /// Report changes without applying them
    #[serde(alias = "_ansible_check_mode")]
    pub check_mode: Option<bool>,
    /// Attach `debug_info` to the result
    pub debug: Option<bool>,
}

fn secret_string<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Environment fallbacks for parameters the caller left out.
#[derive(Debug, Default, Clone)]
pub struct EnvDefaults {
    /// `VAULT_ADDR`
    pub vault_addr: Option<String>,
    /// `VAULT_TOKEN`
    pub token: Option<SecretString>,
    /// `VAULT_ROLE_ID`
    pub role_id: Option<String>,
    /// `VAULT_SECRET_ID`
    pub secret_id: Option<SecretString>,
    /// `VAULT_K8S_ROLE`
    pub kubernetes_role: Option<String>,
    /// `VAULT_K8S_TOKEN_PATH`
    pub jwt_path: Option<PathBuf>,
    /// `VAULT_CACERT`
    pub ca_cert: Option<PathBuf>,
    /// `VAULT_NAMESPACE`
    pub namespace: Option<String>,
}

impl EnvDefaults {
    /// Collect fallbacks through `lookup`, typically `std::env::var(..).ok()`.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            vault_addr: get("VAULT_ADDR"),
            token: get("VAULT_TOKEN").map(SecretString::from),
            role_id: get("VAULT_ROLE_ID"),
            secret_id: get("VAULT_SECRET_ID").map(SecretString::from),
            kubernetes_role: get("VAULT_K8S_ROLE"),
            jwt_path: get("VAULT_K8S_TOKEN_PATH").map(PathBuf::from),
            ca_cert: get("VAULT_CACERT").map(PathBuf::from),
            namespace: get("VAULT_NAMESPACE"),
        }
    }
}

impl ModuleParams {
    /// Merge with environment fallbacks and validate into an [`Invocation`].
    ///
    /// Explicit parameters always win over the environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for any missing or malformed setting. No
    /// network activity happens here.
    pub fn resolve(self, env: &EnvDefaults) -> Result<Invocation, ConfigError> {
        let Self {
            vault_url,
            vault_token,
            secret_path,
            secret_data,
            state,
            verify_ssl,
            validate_certs,
            ca_cert_path,
            vault_namespace,
            auth_method,
            role_id,
            secret_id,
            kubernetes_role,
            jwt_token_path,
            kv_version,
            timeout,
            retries,
            secret_schema,
            check_mode,
            debug,
        } = self;

        let vault_url = vault_url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| env.vault_addr.clone())
            .ok_or(ConfigError::MissingUrl)?;

        let timeout = match timeout {
            Some(0) => return Err(ConfigError::InvalidTimeout),
            Some(secs) => secs,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let mut transport = TransportConfig::new(&vault_url)?
            .with_verify_tls(validate_certs.or(verify_ssl).unwrap_or(true))
            .with_timeout(Duration::from_secs(timeout))
            .with_max_retries(retries.unwrap_or(DEFAULT_RETRIES));
        if let Some(ca) = ca_cert_path.or_else(|| env.ca_cert.clone()) {
            transport = transport.with_ca_cert(ca);
        }
        if let Some(ns) = vault_namespace.or_else(|| env.namespace.clone()) {
            transport = transport.with_namespace(ns);
        }

        let method = auth_method
            .as_deref()
            .map_or(Ok(AuthMethod::default()), str::parse)?;
        let auth = AuthConfig::from_credentials(
            method,
            AuthCredentials {
                token: vault_token.or_else(|| env.token.clone()),
                role_id: role_id.or_else(|| env.role_id.clone()),
                secret_id: secret_id.or_else(|| env.secret_id.clone()),
                kubernetes_role: kubernetes_role.or_else(|| env.kubernetes_role.clone()),
                jwt_path: jwt_token_path.or_else(|| env.jwt_path.clone()),
            },
        )?;

        let state = state
            .as_deref()
            .map_or(Ok(StateKind::default()), str::parse)?;
        let generation = StoreGeneration::try_from(kv_version.unwrap_or(DEFAULT_KV_VERSION))?;

        let mut descriptor =
            SecretDescriptor::from_parts(secret_path.unwrap_or_default(), state, secret_data)?
                .with_generation(generation);
        if let Some(fields) = secret_schema {
            descriptor = descriptor.with_schema(Schema::from_json(&fields)?);
        }

        Ok(Invocation {
            vault_url: transport.base_url().to_string(),
            transport,
            auth,
            descriptor,
            dry_run: check_mode.unwrap_or(false),
            debug: debug.unwrap_or(false),
        })
    }
}

/// A validated, ready-to-run reconciliation.
#[derive(Debug)]
pub struct Invocation {
    /// Normalized Vault address, for diagnostics
    pub vault_url: String,
    /// Connection settings
    pub transport: TransportConfig,
    /// Credentials
    pub auth: AuthConfig,
    /// Secret and its desired state
    pub descriptor: SecretDescriptor,
    /// Report without mutating
    pub dry_run: bool,
    /// Attach `debug_info` to the result
    pub debug: bool,
}

impl Invocation {
    /// Run the reconciliation and shape the result for output.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation's terminal error.
    pub async fn execute(self) -> VaultResult<ModuleResult> {
        let debug_info = self.debug.then(|| self.debug_info());
        let outcome = Reconciler::new(&self.transport, self.auth)?
            .with_dry_run(self.dry_run)
            .reconcile(&self.descriptor)
            .await?;

        Ok(ModuleResult {
            outcome,
            debug_info,
        })
    }

    /// Non-secret description of this invocation.
    #[must_use]
    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            vault_url: self.vault_url.clone(),
            secret_path: self.descriptor.path().to_string(),
            kv_version: self.descriptor.generation().as_u8(),
            auth_method: self.auth.method().as_str(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Diagnostic block attached when `debug` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugInfo {
    /// Vault address
    pub vault_url: String,
    /// Logical secret path
    pub secret_path: String,
    /// KV engine version
    pub kv_version: u8,
    /// Authentication method
    pub auth_method: &'static str,
    /// Time the invocation ran, RFC 3339 UTC
    pub timestamp: String,
}

/// Successful result as printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleResult {
    /// Reconciliation outcome
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
    /// Present when `debug` was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
}

/// Failed result as printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleFailure {
    failed: bool,
    changed: bool,
    /// Human-readable reason
    pub msg: String,
}

impl ModuleFailure {
    /// Failure carrying `msg`.
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: msg.into(),
        }
    }
}
