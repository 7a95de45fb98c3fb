//! Secret store abstraction.
//!
//! The reconciler talks to a [`SecretStore`]; [`KvStore`] is the Vault KV
//! implementation over a [`TransportClient`].

use crate::addressing::{StoreGeneration, StoredSecret};
use crate::error::TransportError;
use crate::secrets::Payload;
use crate::transport::TransportClient;
use async_trait::async_trait;
use tracing::debug;

/// Read, write and delete secrets by logical path.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Concrete address of a logical path, used in logs and error messages.
    fn locate(&self, logical_path: &str) -> String;

    /// Current secret, or `None` when the store reports no secret at the path.
    async fn read(&self, logical_path: &str) -> Result<Option<StoredSecret>, TransportError>;

    /// Replace the secret at the path.
    async fn write(&self, logical_path: &str, data: &Payload) -> Result<(), TransportError>;

    /// Remove the secret at the path.
    async fn delete(&self, logical_path: &str) -> Result<(), TransportError>;
}

/// Vault KV engine store.
#[derive(Debug)]
pub struct KvStore<'a> {
    transport: &'a TransportClient,
    generation: StoreGeneration,
}

impl<'a> KvStore<'a> {
    /// Create a store addressing the given KV generation.
    #[must_use]
    pub const fn new(transport: &'a TransportClient, generation: StoreGeneration) -> Self {
        Self {
            transport,
            generation,
        }
    }
}

#[async_trait]
impl SecretStore for KvStore<'_> {
    fn locate(&self, logical_path: &str) -> String {
        self.generation.request_path(logical_path)
    }

    async fn read(&self, logical_path: &str) -> Result<Option<StoredSecret>, TransportError> {
        let path = self.locate(logical_path);
        match self.transport.get(&path).await {
            Ok(raw) => self.generation.unwrap_payload(raw).map(Some),
            Err(e) if e.is_not_found() => {
                debug!(path, "No secret at path");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn write(&self, logical_path: &str, data: &Payload) -> Result<(), TransportError> {
        let path = self.locate(logical_path);
        let body = self.generation.write_body(data);
        self.transport.post(&path, &body).await.map(|_| ())
    }

    async fn delete(&self, logical_path: &str) -> Result<(), TransportError> {
        let path = self.locate(logical_path);
        match self.transport.delete(&path).await {
            Ok(_) => Ok(()),
            // Removed between the existence check and the delete.
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
