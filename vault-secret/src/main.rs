//! `vault-secret` command.
//!
//! Reads a JSON parameter object from the file named by the first argument, or
//! from stdin, reconciles one secret and prints the result as JSON on stdout.

use anyhow::{Context, Result};
use rust_common::{TracingConfig, init_tracing};
use std::io::Read;
use std::process::ExitCode;
use tracing::{error, info};
use vault_secret::{EnvDefaults, ModuleFailure, ModuleParams, ModuleResult};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let mut tracing = TracingConfig::default();
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing = tracing.with_json_output();
    }
    init_tracing(&tracing);

    match run() {
        Ok(result) => emit(&result),
        Err(e) => {
            error!(error = %format!("{e:#}"), "vault-secret failed");
            emit(&ModuleFailure::new(format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ModuleResult> {
    let params = read_params()?;
    let env = EnvDefaults::from_lookup(|key| std::env::var(key).ok());
    let invocation = params.resolve(&env)?;

    info!(
        path = invocation.descriptor.path(),
        state = invocation.descriptor.desired().kind().as_str(),
        dry_run = invocation.dry_run,
        "Reconciling secret"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    Ok(runtime.block_on(invocation.execute())?)
}

fn read_params() -> Result<ModuleParams> {
    let raw = match std::env::args_os().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read parameters from {}", path.to_string_lossy()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read parameters from stdin")?;
            buf
        }
    };

    serde_json::from_str(&raw).context("parameters must be a JSON object")
}

fn emit<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to serialize result");
            ExitCode::FAILURE
        }
    }
}
