//! End-to-end reconciliation against a fake Vault KV engine.

use serde_json::json;
use std::time::Duration;
use test_utils::fixtures::{kv2_read_response, sample_payload, sample_schema};
use test_utils::mocks::{APPROLE_LOGIN, FakeVault, mock_login, mock_login_failure};
use vault_secret::{
    AuthConfig, AuthError, EnvDefaults, ModuleParams, Operation, Payload, Reconciler, Schema,
    SecretDescriptor, StoreGeneration, TransportConfig, VaultSecretError,
};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "hvs.reconcile-test";

fn transport(server: &MockServer) -> TransportConfig {
    TransportConfig::new(server.uri())
        .unwrap()
        .with_max_retries(2)
        .with_retry_base_delay(Duration::from_millis(1))
}

fn token() -> AuthConfig {
    AuthConfig::token(TOKEN).unwrap()
}

async fn reconcile(
    server: &MockServer,
    descriptor: &SecretDescriptor,
    dry_run: bool,
) -> Result<vault_secret::ReconcileOutcome, VaultSecretError> {
    Reconciler::new(&transport(server), token())
        .unwrap()
        .with_dry_run(dry_run)
        .reconcile(descriptor)
        .await
}

async fn fake_vault(server: &MockServer) -> FakeVault {
    let vault = FakeVault::kv2().require_token(TOKEN);
    vault.mount(server, "secret").await;
    vault
}

#[tokio::test]
async fn test_present_converges() {
    let server = MockServer::start().await;
    let vault = fake_vault(&server).await;
    let descriptor = SecretDescriptor::present("secret/app/db", sample_payload()).unwrap();

    let first = reconcile(&server, &descriptor, false).await.unwrap();
    let second = reconcile(&server, &descriptor, false).await.unwrap();

    assert_eq!((first.changed, first.operation), (true, Operation::Created));
    assert_eq!((second.changed, second.operation), (false, Operation::Unchanged));
    assert_eq!(vault.writes(), 1);
    assert_eq!(vault.secret("secret/data/app/db"), Some(sample_payload()));
}

#[tokio::test]
async fn test_changed_payload_updates() {
    let server = MockServer::start().await;
    let vault = fake_vault(&server).await;
    vault.seed("secret/data/app/db", sample_payload());

    let mut desired = sample_payload();
    desired.insert("port".to_string(), json!(6432));
    let outcome = reconcile(
        &server,
        &SecretDescriptor::present("secret/app/db", desired.clone()).unwrap(),
        false,
    )
    .await
    .unwrap();

    assert_eq!((outcome.changed, outcome.operation), (true, Operation::Updated));
    assert_eq!(vault.secret("secret/data/app/db"), Some(desired));
}

#[tokio::test]
async fn test_present_absent_absent() {
    let server = MockServer::start().await;
    let vault = fake_vault(&server).await;
    let present = SecretDescriptor::present("secret/app/db", sample_payload()).unwrap();
    let absent = SecretDescriptor::absent("secret/app/db").unwrap();

    let changes = [
        reconcile(&server, &present, false).await.unwrap().changed,
        reconcile(&server, &absent, false).await.unwrap().changed,
        reconcile(&server, &absent, false).await.unwrap().changed,
    ];

    assert_eq!(changes, [true, true, false]);
    assert_eq!(vault.deletes(), 1);
    assert!(vault.secret("secret/data/app/db").is_none());
}

#[tokio::test]
async fn test_dry_run_leaves_vault_untouched() {
    let server = MockServer::start().await;
    let vault = fake_vault(&server).await;
    let present = SecretDescriptor::present("secret/app/db", sample_payload()).unwrap();

    let outcome = reconcile(&server, &present, true).await.unwrap();
    assert_eq!((outcome.changed, outcome.operation), (true, Operation::Created));
    assert_eq!(vault.writes(), 0);

    let err = reconcile(&server, &SecretDescriptor::read("secret/app/db").unwrap(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultSecretError::NotFound(ref p) if p == "secret/data/app/db"));
}

#[tokio::test]
async fn test_read_returns_data_and_metadata() {
    let server = MockServer::start().await;
    let vault = fake_vault(&server).await;
    vault.seed("secret/data/app/db", sample_payload());

    let outcome = reconcile(&server, &SecretDescriptor::read("secret/app/db").unwrap(), false)
        .await
        .unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.operation, Operation::Read);
    assert_eq!(outcome.payload, Some(sample_payload()));
    let metadata = outcome.metadata.unwrap();
    assert_eq!(metadata["version"], 1);
}

#[tokio::test]
async fn test_kv1_engine() {
    let server = MockServer::start().await;
    let vault = FakeVault::kv1().require_token(TOKEN);
    vault.mount(&server, "legacy").await;

    let descriptor = SecretDescriptor::present("legacy/app", sample_payload())
        .unwrap()
        .with_generation(StoreGeneration::V1);
    let first = reconcile(&server, &descriptor, false).await.unwrap();
    let second = reconcile(&server, &descriptor, false).await.unwrap();
    assert_eq!([first.changed, second.changed], [true, false]);
    assert_eq!(vault.secret("legacy/app"), Some(sample_payload()));

    let read = SecretDescriptor::read("legacy/app")
        .unwrap()
        .with_generation(StoreGeneration::V1);
    let outcome = reconcile(&server, &read, false).await.unwrap();
    assert_eq!(outcome.payload, Some(sample_payload()));
    assert!(outcome.metadata.is_none());
}

#[tokio::test]
async fn test_schema_violation_prevents_write() {
    let server = MockServer::start().await;
    let vault = fake_vault(&server).await;

    let mut payload = Payload::new();
    payload.insert("username".to_string(), json!(1));
    payload.insert("password".to_string(), json!("pw"));
    let descriptor = SecretDescriptor::present("secret/app/db", payload)
        .unwrap()
        .with_schema(Schema::from_json(&sample_schema()).unwrap());

    let err = reconcile(&server, &descriptor, false).await.unwrap_err();
    match err {
        VaultSecretError::Validation(v) => {
            assert_eq!(v.missing_fields, vec!["port".to_string(), "ssl".to_string()]);
            assert_eq!(v.type_mismatches.len(), 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(vault.writes(), 0);
}

#[tokio::test]
async fn test_auth_failure_short_circuits() {
    let server = MockServer::start().await;
    mock_login_failure(&server, APPROLE_LOGIN, 400, "invalid secret id").await;
    Mock::given(path_regex("^/v1/secret/.*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let auth =
        AuthConfig::app_role(Some("role".to_string()), Some("wrong".to_string())).unwrap();
    let err = Reconciler::new(&transport(&server), auth)
        .unwrap()
        .reconcile(&SecretDescriptor::absent("secret/app/db").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, VaultSecretError::Auth(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_approle_token_is_used_for_kv() {
    let server = MockServer::start().await;
    mock_login(&server, APPROLE_LOGIN, TOKEN).await;
    let vault = fake_vault(&server).await;

    let auth = AuthConfig::app_role(Some("role".to_string()), Some("secret".to_string())).unwrap();
    let outcome = Reconciler::new(&transport(&server), auth)
        .unwrap()
        .reconcile(&SecretDescriptor::present("secret/app", sample_payload()).unwrap())
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(vault.writes(), 1);
}

#[tokio::test]
async fn test_wrong_token_is_reported() {
    let server = MockServer::start().await;
    fake_vault(&server).await;

    let err = Reconciler::new(&transport(&server), AuthConfig::token("hvs.other").unwrap())
        .unwrap()
        .reconcile(&SecretDescriptor::read("secret/app").unwrap())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("permission denied"));
}

#[tokio::test]
async fn test_failed_write_reports_unconfirmed_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/v1/secret/data/app$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex("^/v1/secret/data/app$"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let err = reconcile(
        &server,
        &SecretDescriptor::present("secret/app", sample_payload()).unwrap(),
        false,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, VaultSecretError::Mutation { operation: "write", .. }));
    assert!(err.to_string().contains("remote state unconfirmed"));
}

#[tokio::test]
async fn test_delete_of_already_removed_secret_counts_as_deleted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/v1/secret/data/app$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(kv2_read_response(&sample_payload(), 1)),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex("^/v1/secret/data/app$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = reconcile(&server, &SecretDescriptor::absent("secret/app").unwrap(), false)
        .await
        .unwrap();

    assert_eq!((outcome.changed, outcome.operation), (true, Operation::Deleted));
}

#[tokio::test]
async fn test_invocation_from_params() {
    let server = MockServer::start().await;
    let vault = fake_vault(&server).await;

    let params: ModuleParams = serde_json::from_value(json!({
        "vault_url": server.uri(),
        "secret_path": "secret/app/api",
        "secret_data": {"api_key": "k-123"},
        "secret_schema": {"api_key": "str"},
        "retries": 1,
        "debug": true
    }))
    .unwrap();
    let env = EnvDefaults::from_lookup(|key| (key == "VAULT_TOKEN").then(|| TOKEN.to_string()));

    let result = params.resolve(&env).unwrap().execute().await.unwrap();
    assert!(result.outcome.changed);
    let info = result.debug_info.unwrap();
    assert_eq!(info.secret_path, "secret/app/api");
    assert_eq!(info.kv_version, 2);
    assert!(vault.secret("secret/data/app/api").is_some());
}
