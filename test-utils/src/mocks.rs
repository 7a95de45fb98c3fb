//! Fake Vault server built on wiremock.
//!
//! [`FakeVault`] keeps KV secrets in memory and answers GET, POST and DELETE
//! under one mount the way a real Vault KV engine does, including the empty
//! `errors` array on a 404 for a missing secret.

use crate::fixtures::{self, vault_errors};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Login path of the AppRole auth method.
pub const APPROLE_LOGIN: &str = "/v1/auth/approle/login";

/// Login path of the Kubernetes auth method.
pub const KUBERNETES_LOGIN: &str = "/v1/auth/kubernetes/login";

#[derive(Debug, Clone)]
struct StoredEntry {
    data: Map<String, Value>,
    version: u64,
}

/// In-memory KV engine answering wiremock requests.
///
/// Clones share state, so a test can keep a handle after mounting.
#[derive(Debug, Clone)]
pub struct FakeVault {
    kv_version: u8,
    required_token: Option<String>,
    secrets: Arc<Mutex<HashMap<String, StoredEntry>>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl FakeVault {
    /// KV version 2 engine.
    #[must_use]
    pub fn kv2() -> Self {
        Self::with_version(2)
    }

    /// KV version 1 engine.
    #[must_use]
    pub fn kv1() -> Self {
        Self::with_version(1)
    }

    fn with_version(kv_version: u8) -> Self {
        Self {
            kv_version,
            required_token: None,
            secrets: Arc::default(),
            reads: Arc::default(),
            writes: Arc::default(),
            deletes: Arc::default(),
        }
    }

    /// Reject requests whose `X-Vault-Token` differs from `token` with 403.
    #[must_use]
    pub fn require_token(mut self, token: impl Into<String>) -> Self {
        self.required_token = Some(token.into());
        self
    }

    /// Serve this engine for every path under `/v1/{mount}`.
    pub async fn mount(&self, server: &MockServer, mount: &str) {
        Mock::given(path_regex(format!("^/v1/{mount}(/.*)?$")))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    /// Store `data` at a request path such as `secret/data/app`.
    pub fn seed(&self, request_path: &str, data: Map<String, Value>) {
        let mut secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        let version = secrets.get(request_path).map_or(1, |e| e.version + 1);
        secrets.insert(request_path.to_string(), StoredEntry { data, version });
    }

    /// Payload stored at a request path.
    #[must_use]
    pub fn secret(&self, request_path: &str) -> Option<Map<String, Value>> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_path)
            .map(|e| e.data.clone())
    }

    /// Number of reads served.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of writes applied.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of deletes applied.
    #[must_use]
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn authorized(&self, request: &Request) -> bool {
        self.required_token.as_deref().is_none_or(|expected| {
            request
                .headers
                .get("x-vault-token")
                .and_then(|v| v.to_str().ok())
                == Some(expected)
        })
    }

    fn read(&self, key: &str) -> ResponseTemplate {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        match secrets.get(key) {
            Some(entry) if self.kv_version == 1 => {
                ResponseTemplate::new(200).set_body_json(fixtures::kv1_read_response(&entry.data))
            }
            Some(entry) => ResponseTemplate::new(200)
                .set_body_json(fixtures::kv2_read_response(&entry.data, entry.version)),
            None => ResponseTemplate::new(404).set_body_json(vault_errors(&[])),
        }
    }

    fn write(&self, key: &str, body: &[u8]) -> ResponseTemplate {
        let Ok(Value::Object(mut body)) = serde_json::from_slice::<Value>(body) else {
            return ResponseTemplate::new(400).set_body_json(vault_errors(&["invalid JSON body"]));
        };

        let data = if self.kv_version == 1 {
            body
        } else {
            match body.remove("data") {
                Some(Value::Object(data)) => data,
                _ => {
                    return ResponseTemplate::new(400)
                        .set_body_json(vault_errors(&["no data provided"]));
                }
            }
        };

        self.writes.fetch_add(1, Ordering::SeqCst);
        self.seed(key, data);

        if self.kv_version == 1 {
            ResponseTemplate::new(204)
        } else {
            let version = self
                .secrets
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .map_or(1, |e| e.version);
            ResponseTemplate::new(200).set_body_json(fixtures::kv2_write_response(version))
        }
    }

    fn delete(&self, key: &str) -> ResponseTemplate {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        ResponseTemplate::new(204)
    }
}

impl Respond for FakeVault {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if !self.authorized(request) {
            return ResponseTemplate::new(403).set_body_json(vault_errors(&["permission denied"]));
        }

        let key = request.url.path().trim_start_matches("/v1/");
        match request.method.as_str() {
            "GET" => self.read(key),
            "POST" | "PUT" => self.write(key, &request.body),
            "DELETE" => self.delete(key),
            _ => ResponseTemplate::new(405).set_body_json(vault_errors(&["unsupported operation"])),
        }
    }
}

/// Mount a successful login at `login_path` issuing `token`.
pub async fn mock_login(server: &MockServer, login_path: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path(login_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::login_response(token)))
        .mount(server)
        .await;
}

/// Mount a failing login at `login_path`.
pub async fn mock_login_failure(server: &MockServer, login_path: &str, status: u16, message: &str) {
    Mock::given(method("POST"))
        .and(path(login_path))
        .respond_with(ResponseTemplate::new(status).set_body_json(vault_errors(&[message])))
        .mount(server)
        .await;
}

/// Mount a route that answers `status` for the first `failures` calls.
///
/// Later calls fall through to mocks mounted afterwards.
pub async fn mock_transient_failures(
    server: &MockServer,
    http_method: &str,
    request_path: &str,
    status: u16,
    failures: u64,
) {
    Mock::given(method(http_method))
        .and(path(request_path))
        .respond_with(
            ResponseTemplate::new(status).set_body_json(vault_errors(&["temporarily unavailable"])),
        )
        .up_to_n_times(failures)
        .mount(server)
        .await;
}
