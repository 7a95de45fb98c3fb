//! Vault client configuration.
//!
//! Everything here is plain data handed in by the caller. Nothing in this
//! module reads the environment.

use crate::error::ConfigError;
use rust_common::{HttpConfig, RetryConfig, TlsPolicy};
use secrecy::SecretString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default location of the projected service account token.
pub const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Connection settings for one Vault server.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Vault server address, without trailing slash
    base_url: String,
    /// Verify server certificates and hostnames
    pub verify_tls: bool,
    /// Extra CA bundle to trust
    pub ca_cert_path: Option<PathBuf>,
    /// Vault Enterprise namespace
    pub namespace: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total attempts per request, including the first
    pub max_retries: u32,
    /// Backoff after the first failed attempt; doubles on each further failure
    pub retry_base_delay: Duration,
}

impl TransportConfig {
    /// Create a configuration for the given Vault address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] unless `base_url` is an absolute
    /// `http` or `https` URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ConfigError> {
        let raw = base_url.as_ref().trim();
        let parsed = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }

        Ok(Self {
            base_url: raw.trim_end_matches('/').to_string(),
            verify_tls: true,
            ca_cert_path: None,
            namespace: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
        })
    }

    /// Vault server address.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Enable or disable TLS verification.
    #[must_use]
    pub const fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Trust an extra CA bundle.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Send requests in a Vault Enterprise namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the total number of attempts (minimum 1).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the first backoff delay.
    #[must_use]
    pub const fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub(crate) fn http_config(&self) -> HttpConfig {
        HttpConfig::default()
            .with_timeout(self.timeout)
            .with_user_agent(concat!("vault-secret/", env!("CARGO_PKG_VERSION")))
            .with_tls(TlsPolicy {
                verify: self.verify_tls,
                ca_cert_path: self.ca_cert_path.clone(),
            })
    }

    pub(crate) fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(self.max_retries)
            .with_initial_delay(self.retry_base_delay)
    }
}

/// Authentication method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// Static token
    #[default]
    Token,
    /// AppRole login
    AppRole,
    /// Kubernetes service account login
    Kubernetes,
}

impl AuthMethod {
    /// Name as written in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::AppRole => "approle",
            Self::Kubernetes => "kubernetes",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "approle" => Ok(Self::AppRole),
            "kubernetes" => Ok(Self::Kubernetes),
            _ => Err(ConfigError::UnsupportedAuthMethod(s.to_string())),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for one authentication method.
///
/// Constructors reject a variant whose required fields are missing, so an
/// ill-formed configuration never reaches the network.
#[derive(Debug, Clone)]
pub enum AuthConfig {
    /// Use a token directly
    Token {
        /// Vault token
        token: SecretString,
    },
    /// Exchange a role id and secret id for a token
    AppRole {
        /// AppRole role id
        role_id: String,
        /// AppRole secret id
        secret_id: SecretString,
    },
    /// Exchange a service account JWT for a token
    Kubernetes {
        /// Vault role bound to the service account
        role: String,
        /// File holding the service account JWT
        jwt_path: PathBuf,
    },
}

/// Loosely typed credential fields, as gathered from parameters and environment.
#[derive(Debug, Clone, Default)]
pub struct AuthCredentials {
    /// Static token
    pub token: Option<SecretString>,
    /// AppRole role id
    pub role_id: Option<String>,
    /// AppRole secret id
    pub secret_id: Option<SecretString>,
    /// Kubernetes auth role
    pub kubernetes_role: Option<String>,
    /// Service account token file
    pub jwt_path: Option<PathBuf>,
}

impl AuthConfig {
    /// Token authentication.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAuthField`] for an empty token.
    pub fn token(token: impl Into<String>) -> Result<Self, ConfigError> {
        let token = required(Some(token.into()), AuthMethod::Token, "token")?;
        Ok(Self::Token {
            token: SecretString::from(token),
        })
    }

    /// AppRole authentication.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAuthField`] when either id is missing or empty.
    pub fn app_role(
        role_id: Option<String>,
        secret_id: Option<String>,
    ) -> Result<Self, ConfigError> {
        let role_id = required(role_id, AuthMethod::AppRole, "role_id")?;
        let secret_id = required(secret_id, AuthMethod::AppRole, "secret_id")?;
        Ok(Self::AppRole {
            role_id,
            secret_id: SecretString::from(secret_id),
        })
    }

    /// Kubernetes service account authentication.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAuthField`] when the role is missing or empty.
    pub fn kubernetes(
        role: Option<String>,
        jwt_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let role = required(role, AuthMethod::Kubernetes, "kubernetes_role")?;
        Ok(Self::Kubernetes {
            role,
            jwt_path: jwt_path.into(),
        })
    }

    /// Build the variant for `method` from loose credential fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAuthField`] when the method's fields are incomplete.
    pub fn from_credentials(
        method: AuthMethod,
        credentials: AuthCredentials,
    ) -> Result<Self, ConfigError> {
        use secrecy::ExposeSecret;

        let expose = |s: Option<SecretString>| s.map(|s| s.expose_secret().to_string());

        match method {
            AuthMethod::Token => Self::token(
                expose(credentials.token).ok_or(ConfigError::MissingAuthField {
                    method: AuthMethod::Token.as_str(),
                    field: "token",
                })?,
            ),
            AuthMethod::AppRole => {
                Self::app_role(credentials.role_id, expose(credentials.secret_id))
            }
            AuthMethod::Kubernetes => Self::kubernetes(
                credentials.kubernetes_role,
                credentials
                    .jwt_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_JWT_PATH)),
            ),
        }
    }

    /// Method this configuration uses.
    #[must_use]
    pub const fn method(&self) -> AuthMethod {
        match self {
            Self::Token { .. } => AuthMethod::Token,
            Self::AppRole { .. } => AuthMethod::AppRole,
            Self::Kubernetes { .. } => AuthMethod::Kubernetes,
        }
    }
}

fn required(
    value: Option<String>,
    method: AuthMethod,
    field: &'static str,
) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingAuthField {
            method: method.as_str(),
            field,
        })
}
