use super::{ObjectBody, StoredObject};
use crate::GatewayError;
use async_trait::async_trait;
use bytes::Bytes;

/// Repository interface for the object store
///
/// The store is the sole owner of object bytes; nothing is cached here.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, GatewayError>;

    /// Fails with `NotFound` when the key does not exist
    async fn get(&self, key: &str) -> Result<ObjectBody, GatewayError>;

    /// Objects under a `/`-terminated prefix
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, GatewayError>;

    async fn delete(&self, key: &str) -> Result<(), GatewayError>;
}
