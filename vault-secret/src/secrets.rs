//! Secret types and structures.

use crate::addressing::StoreGeneration;
use crate::error::ConfigError;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Secret payload: a JSON object of arbitrary values.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Version metadata returned by KV v2.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Name of a desired state, as callers spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// The path holds the given data
    #[default]
    Present,
    /// The path holds nothing
    Absent,
    /// Report what the path holds
    Read,
}

impl StateKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Read => "read",
        }
    }
}

impl FromStr for StateKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "read" => Ok(Self::Read),
            other => Err(ConfigError::InvalidState(other.to_string())),
        }
    }
}

/// What the caller wants the path to hold.
#[derive(Debug, Clone, PartialEq)]
pub enum DesiredState {
    /// The path holds exactly this payload
    Present(Payload),
    /// The path holds nothing
    Absent,
    /// Report the current payload
    Read,
}

impl DesiredState {
    /// Name of this state.
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Present(_) => StateKind::Present,
            Self::Absent => StateKind::Absent,
            Self::Read => StateKind::Read,
        }
    }
}

/// A declared secret: where it lives and what should be there.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretDescriptor {
    path: String,
    desired: DesiredState,
    generation: StoreGeneration,
    schema: Option<Schema>,
}

impl SecretDescriptor {
    /// Declare that `path` must hold `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyPath`] for an empty path.
    pub fn present(path: impl Into<String>, data: Payload) -> Result<Self, ConfigError> {
        Self::build(path.into(), DesiredState::Present(data))
    }

    /// Declare that `path` must hold nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyPath`] for an empty path.
    pub fn absent(path: impl Into<String>) -> Result<Self, ConfigError> {
        Self::build(path.into(), DesiredState::Absent)
    }

    /// Ask for the payload stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyPath`] for an empty path.
    pub fn read(path: impl Into<String>) -> Result<Self, ConfigError> {
        Self::build(path.into(), DesiredState::Read)
    }

    /// Build from loosely typed caller input.
    ///
    /// # Errors
    ///
    /// Data is required for `present` and rejected for `absent` and `read`.
    pub fn from_parts(
        path: impl Into<String>,
        state: StateKind,
        data: Option<Payload>,
    ) -> Result<Self, ConfigError> {
        let desired = match (state, data) {
            (StateKind::Present, Some(data)) => DesiredState::Present(data),
            (StateKind::Present, None) => return Err(ConfigError::DataRequired),
            (StateKind::Absent, None) => DesiredState::Absent,
            (StateKind::Read, None) => DesiredState::Read,
            (other, Some(_)) => return Err(ConfigError::DataForbidden(other.as_str())),
        };
        Self::build(path.into(), desired)
    }

    fn build(path: String, desired: DesiredState) -> Result<Self, ConfigError> {
        if path.trim().is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        Ok(Self {
            path,
            desired,
            generation: StoreGeneration::default(),
            schema: None,
        })
    }

    /// Select the KV API generation.
    #[must_use]
    pub const fn with_generation(mut self, generation: StoreGeneration) -> Self {
        self.generation = generation;
        self
    }

    /// Attach a write-time schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Logical path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Desired state.
    #[must_use]
    pub const fn desired(&self) -> &DesiredState {
        &self.desired
    }

    /// KV API generation.
    #[must_use]
    pub const fn generation(&self) -> StoreGeneration {
        self.generation
    }

    /// Write-time schema, if any.
    #[must_use]
    pub const fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Concrete request path for this descriptor's generation.
    #[must_use]
    pub fn request_path(&self) -> String {
        self.generation.request_path(&self.path)
    }
}

/// What a reconciliation did, or would do in dry-run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Secret written where none existed
    Created,
    /// Secret overwritten with different data
    Updated,
    /// Secret already held the desired data
    Unchanged,
    /// Secret removed
    Deleted,
    /// Secret already missing
    Absent,
    /// Secret read
    Read,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::Absent => "absent",
            Self::Read => "read",
        };
        f.write_str(name)
    }
}

/// Structured result of one reconciliation.
///
/// `changed` is the only signal of whether remote state was (or, in dry-run
/// mode, would be) mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Whether remote state was mutated
    pub changed: bool,
    /// Operation performed
    pub operation: Operation,
    /// Payload, populated for reads only
    #[serde(rename = "secret_data")]
    pub payload: Option<Payload>,
    /// KV v2 version metadata, populated for reads only
    #[serde(rename = "secret_metadata")]
    pub metadata: Option<Metadata>,
}

impl ReconcileOutcome {
    /// Outcome of a non-read operation.
    #[must_use]
    pub const fn mutation(operation: Operation, changed: bool) -> Self {
        Self {
            changed,
            operation,
            payload: None,
            metadata: None,
        }
    }

    /// Outcome of a read.
    #[must_use]
    pub const fn read(payload: Payload, metadata: Option<Metadata>) -> Self {
        Self {
            changed: false,
            operation: Operation::Read,
            payload: Some(payload),
            metadata,
        }
    }
}

/// Vault auth login response.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    /// Auth block
    pub auth: LoginAuth,
}

/// Auth block of a login response.
#[derive(Deserialize)]
pub struct LoginAuth {
    /// Issued token
    pub client_token: String,
    /// Token TTL in seconds
    #[serde(default)]
    pub lease_duration: u64,
    /// Policies attached to the token
    #[serde(default)]
    pub policies: Vec<String>,
}

impl fmt::Debug for LoginAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginAuth")
            .field("client_token", &"[REDACTED]")
            .field("lease_duration", &self.lease_duration)
            .field("policies", &self.policies)
            .finish()
    }
}
