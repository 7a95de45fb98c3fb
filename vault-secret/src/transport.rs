//! Vault HTTP transport with retry and error classification.
//!
//! One [`TransportClient`] serves one reconciliation. It owns the TLS context
//! and, after login, the bearer token; both are dropped with the client.

use crate::config::TransportConfig;
use crate::error::{ConfigError, TransportError};
use reqwest::header::{HeaderValue, InvalidHeaderValue};
use reqwest::{Client, Method, StatusCode};
use rust_common::{RetryPolicy, build_http_client};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Body of a Vault error response.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// HTTP client for the Vault API.
#[derive(Debug)]
pub struct TransportClient {
    http: Client,
    base_url: String,
    namespace: Option<HeaderValue>,
    token: Option<HeaderValue>,
    retry: RetryPolicy,
}

impl TransportClient {
    /// Create a client, applying the TLS policy once.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA bundle cannot be loaded, the namespace is not a
    /// valid header value, or the HTTP client cannot be built.
    pub fn new(config: &TransportConfig) -> Result<Self, ConfigError> {
        let http = build_http_client(&config.http_config())?;

        let namespace = config
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .map(|ns| {
                HeaderValue::from_str(ns).map_err(|_| ConfigError::InvalidNamespace(ns.to_string()))
            })
            .transpose()?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            namespace,
            token: None,
            retry: RetryPolicy::new(config.retry_config()),
        })
    }

    /// Attach a bearer token to every subsequent request.
    ///
    /// # Errors
    ///
    /// Returns an error if the token contains bytes not allowed in a header.
    pub fn set_token(&mut self, token: &SecretString) -> Result<(), InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(token.expose_secret())?;
        value.set_sensitive(true);
        self.token = Some(value);
        Ok(())
    }

    /// Issue a request against `/v1/{path}` with retries.
    ///
    /// Returns the parsed JSON body (an empty object for empty bodies) and the
    /// status code. The request body is serialized straight from `body`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] at once for 4xx responses other than
    /// 429, and [`TransportError::RetriesExhausted`] when every attempt failed
    /// transiently.
    #[instrument(skip(self, body))]
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(Value, u16), TransportError>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.retry
            .execute(|_| self.send_once(method.clone(), path, body))
            .await
            .map_err(TransportError::from)
    }

    /// GET `/v1/{path}`.
    ///
    /// # Errors
    ///
    /// See [`TransportClient::request`].
    pub async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.request::<Value>(Method::GET, path, None)
            .await
            .map(|(v, _)| v)
    }

    /// POST a JSON body to `/v1/{path}`.
    ///
    /// # Errors
    ///
    /// See [`TransportClient::request`].
    pub async fn post<B>(&self, path: &str, body: &B) -> Result<Value, TransportError>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.request(Method::POST, path, Some(body))
            .await
            .map(|(v, _)| v)
    }

    /// DELETE `/v1/{path}`.
    ///
    /// # Errors
    ///
    /// See [`TransportClient::request`].
    pub async fn delete(&self, path: &str) -> Result<u16, TransportError> {
        self.request::<Value>(Method::DELETE, path, None)
            .await
            .map(|(_, status)| status)
    }

    async fn send_once<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(Value, u16), TransportError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%url, "Sending Vault request");

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token.clone());
        }
        if let Some(namespace) = &self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace.clone());
        }
        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_send_error)?;

        if status.is_success() {
            parse_body(&text).map(|value| (value, status.as_u16()))
        } else {
            Err(error_from_response(status, &text))
        }
    }
}

fn classify_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::unavailable(err.to_string())
    }
}

fn parse_body(text: &str) -> Result<Value, TransportError> {
    if text.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(text).map_err(|e| TransportError::decode(e.to_string()))
}

fn error_from_response(status: StatusCode, text: &str) -> TransportError {
    let errors = serde_json::from_str::<ErrorBody>(text)
        .unwrap_or_default()
        .errors;
    let message = errors.first().cloned().unwrap_or_else(|| status_line(status));
    let code = status.as_u16();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        TransportError::Server {
            status: code,
            message,
        }
    } else {
        TransportError::Client {
            status: code,
            message,
            errors,
        }
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    #[test]
    fn test_empty_body_is_empty_object() {
        assert_eq!(parse_body("").unwrap(), serde_json::json!({}));
        assert_eq!(parse_body("  \n").unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_invalid_body_is_decode_error() {
        let err = parse_body("<html>").unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Decode);
    }

    #[test]
    fn test_vault_message_extracted() {
        let err = error_from_response(
            StatusCode::FORBIDDEN,
            r#"{"errors":["1 error occurred:\n\t* permission denied\n\n"]}"#,
        );
        match err {
            TransportError::Client {
                status,
                message,
                errors,
            } => {
                assert_eq!(status, 403);
                assert!(message.contains("permission denied"));
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_error_uses_status_line() {
        let err = error_from_response(StatusCode::NOT_FOUND, "");
        assert_eq!(err.to_string(), "Vault error (404): 404 Not Found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_server_and_rate_limit_are_transient() {
        assert_eq!(
            error_from_response(StatusCode::SERVICE_UNAVAILABLE, r#"{"errors":["Vault is sealed"]}"#)
                .kind(),
            TransportErrorKind::Server
        );
        assert_eq!(
            error_from_response(StatusCode::TOO_MANY_REQUESTS, "").kind(),
            TransportErrorKind::Server
        );
        assert_eq!(
            error_from_response(StatusCode::BAD_REQUEST, "").kind(),
            TransportErrorKind::Client
        );
    }

    #[test]
    fn test_token_header_is_sensitive() {
        let config = TransportConfig::new("http://127.0.0.1:8200").unwrap();
        let mut client = TransportClient::new(&config).unwrap();
        assert!(client.token.is_none());

        client
            .set_token(&SecretString::from("hvs.test-token".to_string()))
            .unwrap();
        assert!(client.token.as_ref().is_some_and(HeaderValue::is_sensitive));
        assert!(!format!("{client:?}").contains("hvs.test-token"));
    }

    #[test]
    fn test_missing_ca_fails_construction() {
        let config = TransportConfig::new("https://vault.example.com")
            .unwrap()
            .with_ca_cert("/nonexistent/ca.pem");
        assert!(matches!(
            TransportClient::new(&config),
            Err(ConfigError::Http(_))
        ));
    }
}
