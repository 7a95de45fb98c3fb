//! Centralized HTTP client configuration and building.
//!
//! The TLS verification policy is applied once, when the client is built, and
//! cannot be changed for the lifetime of the returned client.

use crate::HttpSetupError;
use reqwest::{Certificate, Client, ClientBuilder};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// TLS verification policy for outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    /// Verify server certificates and hostnames (default: true)
    pub verify: bool,
    /// Extra PEM bundle trusted in addition to the built-in roots
    pub ca_cert_path: Option<PathBuf>,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            verify: true,
            ca_cert_path: None,
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout, covering connect, send and body read (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// TLS verification policy
    pub tls: TlsPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("vault-secret/", env!("CARGO_PKG_VERSION")).to_string(),
            tls: TlsPolicy::default(),
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    ///
    /// The connect timeout is lowered to match when it would otherwise exceed it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }

    /// Set a custom user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the TLS verification policy.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }
}

/// Build a configured HTTP client.
///
/// When `tls.verify` is false, certificate and hostname verification are both
/// skipped and a warning is emitted. When a CA bundle is configured it is loaded
/// here; a missing or malformed bundle fails the build.
///
/// # Errors
///
/// Returns an error if the CA bundle cannot be loaded or the client cannot be built.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, HttpSetupError> {
    let mut builder = ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .use_rustls_tls();

    if let Some(path) = &config.tls.ca_cert_path {
        for cert in load_ca_bundle(path)? {
            builder = builder.add_root_certificate(cert);
        }
        info!(path = %path.display(), "Loaded custom CA certificate");
    }

    if !config.tls.verify {
        // rustls skips the hostname check along with chain validation here.
        warn!("TLS verification disabled, server identity will not be checked");
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
}

fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>, HttpSetupError> {
    if !path.is_file() {
        return Err(HttpSetupError::CaCertNotFound(path.to_path_buf()));
    }

    let pem = std::fs::read(path).map_err(|source| HttpSetupError::CaCertUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let certs =
        Certificate::from_pem_bundle(&pem).map_err(|source| HttpSetupError::InvalidCaCert {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(HttpSetupError::EmptyCaBundle(path.to_path_buf()));
    }

    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.tls.verify);
        assert!(config.user_agent.starts_with("vault-secret/"));
    }

    #[test]
    fn test_short_timeout_caps_connect_timeout() {
        let config = HttpConfig::default().with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_build_client() {
        let result = build_http_client(&HttpConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_client_without_verification() {
        let config = HttpConfig::default().with_tls(TlsPolicy {
            verify: false,
            ca_cert_path: None,
        });
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_missing_ca_file_is_fatal() {
        let config = HttpConfig::default().with_tls(TlsPolicy {
            verify: true,
            ca_cert_path: Some(PathBuf::from("/nonexistent/vault-ca.pem")),
        });

        let result = build_http_client(&config);
        assert!(matches!(result, Err(HttpSetupError::CaCertNotFound(_))));
    }

    #[test]
    fn test_valid_ca_bundle_is_trusted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(test_utils::fixtures::TEST_CA_PEM.as_bytes())
            .unwrap();

        let certs = load_ca_bundle(file.path()).unwrap();
        assert_eq!(certs.len(), 1);

        let config = HttpConfig::default().with_tls(TlsPolicy {
            verify: true,
            ca_cert_path: Some(file.path().to_path_buf()),
        });
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_garbage_ca_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not a certificate").unwrap();

        let config = HttpConfig::default().with_tls(TlsPolicy {
            verify: true,
            ca_cert_path: Some(file.path().to_path_buf()),
        });

        let result = build_http_client(&config);
        assert!(matches!(
            result,
            Err(HttpSetupError::EmptyCaBundle(_) | HttpSetupError::InvalidCaCert { .. })
        ));
    }
}
