//! Durable key-value storage port.

use async_trait::async_trait;

use super::error::StorageError;

/// Simple string key-value storage.
///
/// The pending-result store keys entries by request id under its own prefix,
/// so `keys` only needs prefix filtering to rebuild state after a restart.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
