//! Vault API response bodies and TLS material for tests.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};

/// Self-signed CA certificate (`CN=Vault Test CA`, P-256) in PEM form.
pub const TEST_CA_PEM: &str = "\
-----BEGIN CERTIFICATE-----
MIIBljCCAT2gAwIBAgIUO5UWH8+m6J94S+zyhyConj4uN60wCgYIKoZIzj0EAwIw
GDEWMBQGA1UEAwwNVmF1bHQgVGVzdCBDQTAgFw0yNjEwMTcwNjEwMzFaGA8yMTI2
MDkyMzA2MTAzMVowGDEWMBQGA1UEAwwNVmF1bHQgVGVzdCBDQTBZMBMGByqGSM49
AgEGCCqGSM49AwEHA0IABHnqrs2KyjP0szVq1BYKrRRXpumsOsgud3bBN4yLy0aS
kfBF5Ue+J9yobaR+voJbVQ7U0gdkzaSTPj9nzVg+fVijYzBhMB0GA1UdDgQWBBTY
Y8sStfjkyEBlMSker+hXNDA1kTAfBgNVHSMEGDAWgBTYY8sStfjkyEBlMSker+hX
NDA1kTAPBgNVHRMBAf8EBTADAQH/MA4GA1UdDwEB/wQEAwIBBjAKBggqhkjOPQQD
AgNHADBEAiBBeyK6vtlK8OAVyOJAIeMy1iTKM7yRHDbQCruKEcIAiwIgU0t9RSzu
cGv4T9kTuOiKQzZs4ILfCofB8PVMLA08xxY=
-----END CERTIFICATE-----
";

/// Successful auth login response.
#[must_use]
pub fn login_response(token: &str) -> Value {
    json!({
        "request_id": "5b1d2d4a-0000-0000-0000-000000000000",
        "auth": {
            "client_token": token,
            "accessor": "accessor-token",
            "policies": ["default", "app-read"],
            "lease_duration": 3600,
            "renewable": true
        }
    })
}

/// Login response without an `auth` block.
#[must_use]
pub fn login_response_without_auth() -> Value {
    json!({"request_id": "5b1d2d4a-0000-0000-0000-000000000001", "data": null})
}

/// KV v2 version metadata.
#[must_use]
pub fn kv2_metadata(version: u64) -> Value {
    json!({
        "created_time": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        "custom_metadata": null,
        "deletion_time": "",
        "destroyed": false,
        "version": version
    })
}

/// KV v2 read response wrapping `data`.
#[must_use]
pub fn kv2_read_response(data: &Map<String, Value>, version: u64) -> Value {
    json!({
        "data": {
            "data": data,
            "metadata": kv2_metadata(version)
        },
        "lease_duration": 0,
        "renewable": false
    })
}

/// KV v2 write response.
#[must_use]
pub fn kv2_write_response(version: u64) -> Value {
    json!({"data": kv2_metadata(version)})
}

/// KV v1 read response wrapping `data`.
#[must_use]
pub fn kv1_read_response(data: &Map<String, Value>) -> Value {
    json!({
        "data": data,
        "lease_duration": 2_764_800,
        "renewable": false
    })
}

/// Vault error body.
#[must_use]
pub fn vault_errors(messages: &[&str]) -> Value {
    json!({"errors": messages})
}

/// Database credentials payload.
#[must_use]
pub fn sample_payload() -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("username".to_string(), json!("admin"));
    payload.insert("password".to_string(), json!("s3cr3t-p4ss"));
    payload.insert("port".to_string(), json!(5432));
    payload.insert("ssl".to_string(), json!(true));
    payload
}

/// Schema matching [`sample_payload`].
#[must_use]
pub fn sample_schema() -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("username".to_string(), json!("str"));
    schema.insert("password".to_string(), json!("str"));
    schema.insert("port".to_string(), json!("int"));
    schema.insert("ssl".to_string(), json!("bool"));
    schema
}
