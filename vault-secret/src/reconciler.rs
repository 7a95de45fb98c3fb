//! Desired-state reconciliation.
//!
//! A reconciliation moves through
//! `Idle -> Authenticating -> Reading -> [Validating ->] Writing | Deleting -> Done`
//! and ends in `Failed` on the first unrecovered error. Writes and deletes
//! happen only after every preceding step succeeded, and only when the read
//! shows they are needed, so repeated runs converge to `changed = false`.

use crate::auth::authenticate;
use crate::config::{AuthConfig, TransportConfig};
use crate::error::{AuthError, VaultResult, VaultSecretError};
use crate::provider::{KvStore, SecretStore};
use crate::schema;
use crate::secrets::{DesiredState, Operation, ReconcileOutcome, SecretDescriptor};
use crate::transport::TransportClient;
use tracing::{debug, info, instrument, warn};

/// Step of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started
    Idle,
    /// Obtaining a token
    Authenticating,
    /// Reading the current secret
    Reading,
    /// Checking the desired payload against its schema
    Validating,
    /// Writing the desired payload
    Writing,
    /// Deleting the current secret
    Deleting,
    /// Finished successfully
    Done,
    /// Finished with an error
    Failed,
}

/// Records the phases a reconciliation went through.
#[derive(Debug)]
struct PhaseTracker<'a> {
    path: &'a str,
    history: Vec<Phase>,
}

impl<'a> PhaseTracker<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            history: vec![Phase::Idle],
        }
    }

    fn current(&self) -> Phase {
        self.history.last().copied().unwrap_or(Phase::Idle)
    }

    fn enter(&mut self, phase: Phase) {
        debug!(path = self.path, from = ?self.current(), to = ?phase, "Reconcile phase");
        self.history.push(phase);
    }

    fn fail(&mut self, err: VaultSecretError) -> VaultSecretError {
        warn!(path = self.path, phase = ?self.current(), error = %err, "Reconciliation failed");
        self.history.push(Phase::Failed);
        err
    }

    fn finish(&mut self, outcome: &ReconcileOutcome) {
        info!(
            path = self.path,
            operation = %outcome.operation,
            changed = outcome.changed,
            "Reconciliation complete"
        );
        self.history.push(Phase::Done);
    }
}

/// Reconciles one secret against Vault.
///
/// A reconciler is single use: [`Reconciler::reconcile`] consumes it, so the
/// HTTP client and the token it obtained are dropped when the call returns.
#[derive(Debug)]
pub struct Reconciler {
    transport: TransportClient,
    auth: AuthConfig,
    dry_run: bool,
}

impl Reconciler {
    /// Create a reconciler for one invocation.
    ///
    /// # Errors
    ///
    /// Returns [`VaultSecretError::Config`] when the HTTP client cannot be built
    /// (for example, a missing CA bundle).
    pub fn new(transport: &TransportConfig, auth: AuthConfig) -> VaultResult<Self> {
        Ok(Self {
            transport: TransportClient::new(transport)?,
            auth,
            dry_run: false,
        })
    }

    /// Compute and report changes without writing or deleting.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Authenticate once, then converge the descriptor's path to its desired state.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error; see [`VaultSecretError`].
    #[instrument(
        skip_all,
        fields(path = descriptor.path(), state = descriptor.desired().kind().as_str(), dry_run = self.dry_run)
    )]
    pub async fn reconcile(mut self, descriptor: &SecretDescriptor) -> VaultResult<ReconcileOutcome> {
        let mut tracker = PhaseTracker::new(descriptor.path());

        tracker.enter(Phase::Authenticating);
        if let Err(e) = self.login().await {
            return Err(tracker.fail(e));
        }

        let store = KvStore::new(&self.transport, descriptor.generation());
        run(&store, descriptor, self.dry_run, &mut tracker).await
    }

    async fn login(&mut self) -> VaultResult<()> {
        let token = authenticate(&self.auth, &self.transport).await?;
        self.transport.set_token(&token).map_err(|_| {
            AuthError::Unexpected("issued token is not a valid header value".to_string())
        })?;
        Ok(())
    }
}

/// Converge a path on an already authenticated store.
///
/// # Errors
///
/// Returns the first fatal error; see [`VaultSecretError`].
pub async fn converge<S>(
    store: &S,
    descriptor: &SecretDescriptor,
    dry_run: bool,
) -> VaultResult<ReconcileOutcome>
where
    S: SecretStore + ?Sized,
{
    let mut tracker = PhaseTracker::new(descriptor.path());
    run(store, descriptor, dry_run, &mut tracker).await
}

async fn run<S>(
    store: &S,
    descriptor: &SecretDescriptor,
    dry_run: bool,
    tracker: &mut PhaseTracker<'_>,
) -> VaultResult<ReconcileOutcome>
where
    S: SecretStore + ?Sized,
{
    match apply(store, descriptor, dry_run, tracker).await {
        Ok(outcome) => {
            tracker.finish(&outcome);
            Ok(outcome)
        }
        Err(e) => Err(tracker.fail(e)),
    }
}

async fn apply<S>(
    store: &S,
    descriptor: &SecretDescriptor,
    dry_run: bool,
    tracker: &mut PhaseTracker<'_>,
) -> VaultResult<ReconcileOutcome>
where
    S: SecretStore + ?Sized,
{
    let path = descriptor.path();

    tracker.enter(Phase::Reading);
    let current = store.read(path).await?;

    match descriptor.desired() {
        DesiredState::Read => {
            let secret = current.ok_or_else(|| VaultSecretError::not_found(store.locate(path)))?;
            Ok(ReconcileOutcome::read(secret.data, secret.metadata))
        }

        DesiredState::Present(desired) => {
            tracker.enter(Phase::Validating);
            schema::validate(desired, descriptor.schema())?;

            let operation = match current {
                Some(existing) if existing.data == *desired => {
                    return Ok(ReconcileOutcome::mutation(Operation::Unchanged, false));
                }
                Some(_) => Operation::Updated,
                None => Operation::Created,
            };

            if dry_run {
                info!(path, %operation, "Dry run, write skipped");
                return Ok(ReconcileOutcome::mutation(operation, true));
            }

            tracker.enter(Phase::Writing);
            store
                .write(path, desired)
                .await
                .map_err(|source| VaultSecretError::Mutation {
                    operation: "write",
                    path: store.locate(path),
                    source,
                })?;
            Ok(ReconcileOutcome::mutation(operation, true))
        }

        DesiredState::Absent => {
            if current.is_none() {
                return Ok(ReconcileOutcome::mutation(Operation::Absent, false));
            }

            if dry_run {
                info!(path, "Dry run, delete skipped");
                return Ok(ReconcileOutcome::mutation(Operation::Deleted, true));
            }

            tracker.enter(Phase::Deleting);
            store
                .delete(path)
                .await
                .map_err(|source| VaultSecretError::Mutation {
                    operation: "delete",
                    path: store.locate(path),
                    source,
                })?;
            Ok(ReconcileOutcome::mutation(Operation::Deleted, true))
        }
    }
}
