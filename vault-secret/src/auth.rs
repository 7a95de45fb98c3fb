//! Vault authentication.
//!
//! Each call performs one fresh login. Tokens are never cached between
//! reconciliations and never logged.

use crate::config::AuthConfig;
use crate::error::{AuthError, TransportError};
use crate::secrets::LoginResponse;
use crate::transport::TransportClient;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument};
use zeroize::Zeroizing;

const APPROLE_LOGIN_PATH: &str = "auth/approle/login";
const KUBERNETES_LOGIN_PATH: &str = "auth/kubernetes/login";

/// AppRole login body. Borrows the credentials so they are serialized
/// straight into the request without an intermediate copy.
#[derive(Serialize)]
struct AppRoleLogin<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

/// Kubernetes login body, borrowing the JWT from its zeroizing buffer.
#[derive(Serialize)]
struct KubernetesLogin<'a> {
    role: &'a str,
    jwt: &'a str,
}

/// Obtain a bearer token for the configured method.
///
/// # Errors
///
/// Returns an [`AuthError`] describing why no token could be obtained.
#[instrument(skip_all, fields(method = %config.method()))]
pub async fn authenticate(
    config: &AuthConfig,
    transport: &TransportClient,
) -> Result<SecretString, AuthError> {
    let token = match config {
        AuthConfig::Token { token } => token.clone(),
        AuthConfig::AppRole { role_id, secret_id } => {
            let body = AppRoleLogin {
                role_id,
                secret_id: secret_id.expose_secret(),
            };
            login(transport, APPROLE_LOGIN_PATH, &body).await?
        }
        AuthConfig::Kubernetes { role, jwt_path } => {
            let jwt = read_jwt(jwt_path).await?;
            let body = KubernetesLogin {
                role,
                jwt: jwt.as_str(),
            };
            login(transport, KUBERNETES_LOGIN_PATH, &body).await?
        }
    };

    info!("Authenticated with Vault");
    Ok(token)
}

async fn login<B>(
    transport: &TransportClient,
    path: &str,
    body: &B,
) -> Result<SecretString, AuthError>
where
    B: Serialize + Sync,
{
    let raw = transport.post(path, body).await.map_err(map_login_error)?;

    let response: LoginResponse = serde_json::from_value(raw).map_err(|e| {
        AuthError::Unexpected(format!("login response missing auth.client_token: {e}"))
    })?;

    if response.auth.client_token.is_empty() {
        return Err(AuthError::Unexpected(
            "login response carried an empty client token".to_string(),
        ));
    }

    info!(
        ttl_secs = response.auth.lease_duration,
        policies = ?response.auth.policies,
        "Vault login succeeded"
    );
    Ok(SecretString::from(response.auth.client_token))
}

fn map_login_error(err: TransportError) -> AuthError {
    match err {
        TransportError::Client { status: 400, .. } => AuthError::InvalidCredentials,
        TransportError::Client { status: 403, .. } => AuthError::InsufficientPermissions,
        other => AuthError::Unexpected(other.to_string()),
    }
}

/// Read a service account JWT, trimming surrounding whitespace.
///
/// The buffer is wiped when dropped, on every exit path.
async fn read_jwt(path: &Path) -> Result<Zeroizing<String>, AuthError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map(Zeroizing::new)
        .map_err(|e| AuthError::CredentialUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let jwt = Zeroizing::new(raw.trim().to_string());
    if jwt.is_empty() {
        return Err(AuthError::CredentialUnreadable {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        });
    }
    Ok(jwt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn client_error(status: u16) -> TransportError {
        TransportError::Client {
            status,
            message: String::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_login_error_mapping() {
        assert!(matches!(
            map_login_error(client_error(400)),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            map_login_error(client_error(403)),
            AuthError::InsufficientPermissions
        ));
        assert!(matches!(
            map_login_error(client_error(404)),
            AuthError::Unexpected(_)
        ));
        assert!(matches!(
            map_login_error(TransportError::unavailable("refused")),
            AuthError::Unexpected(_)
        ));
    }

    #[test]
    fn test_login_bodies_serialize_borrowed_credentials() {
        let jwt = Zeroizing::new("eyJhbGciOiJSUzI1NiJ9.e30.sig".to_string());
        let body = serde_json::to_value(KubernetesLogin {
            role: "app-reader",
            jwt: jwt.as_str(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"role": "app-reader", "jwt": "eyJhbGciOiJSUzI1NiJ9.e30.sig"})
        );

        let secret_id = SecretString::from("secret-456".to_string());
        let body = serde_json::to_value(AppRoleLogin {
            role_id: "role-123",
            secret_id: secret_id.expose_secret(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"role_id": "role-123", "secret_id": "secret-456"})
        );
    }

    #[tokio::test]
    async fn test_read_jwt_trims_whitespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  eyJhbGciOiJSUzI1NiJ9.payload.sig  ").unwrap();

        let jwt = read_jwt(file.path()).await.unwrap();
        assert_eq!(jwt.as_str(), "eyJhbGciOiJSUzI1NiJ9.payload.sig");
    }

    #[tokio::test]
    async fn test_read_jwt_missing_file() {
        let err = read_jwt(Path::new("/nonexistent/sa/token")).await.unwrap_err();
        assert!(matches!(err, AuthError::CredentialUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_read_jwt_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = read_jwt(file.path()).await.unwrap_err();
        assert!(matches!(err, AuthError::CredentialUnreadable { ref reason, .. } if reason == "file is empty"));
    }

    #[tokio::test]
    async fn test_token_method_needs_no_network() {
        let config = AuthConfig::token("hvs.static").unwrap();
        let transport = TransportClient::new(
            &crate::config::TransportConfig::new("http://127.0.0.1:1").unwrap(),
        )
        .unwrap();

        let token = authenticate(&config, &transport).await.unwrap();
        assert_eq!(token.expose_secret(), "hvs.static");
    }
}
