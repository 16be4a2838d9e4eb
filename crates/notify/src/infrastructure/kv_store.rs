//! Key-value storage adapters.
//!
//! `InMemoryKeyValueStore` keeps entries for the life of the process.
//! `JsonFileKeyValueStore` mirrors an in-memory cache to a JSON file so that
//! unclaimed results survive a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use directories::ProjectDirs;
use tokio::sync::RwLock;

use crate::infrastructure::config::{NotifyConfig, StorageBackend};
use crate::infrastructure::ports::{KeyValueStore, StorageError};

/// Open the storage backend selected by `config`.
pub async fn open_storage(config: &NotifyConfig) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match config.storage_backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryKeyValueStore::new())),
        StorageBackend::File => {
            let path = config
                .storage_path
                .clone()
                .unwrap_or_else(JsonFileKeyValueStore::default_path);
            Ok(Arc::new(JsonFileKeyValueStore::open(path).await?))
        }
    }
}

/// Process-lifetime storage.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed storage with an in-memory cache.
///
/// Stores key-value pairs in a JSON object at:
/// - Linux: ~/.config/notify/pending_results.json
/// - macOS: ~/Library/Application Support/io.lookbook.notify/pending_results.json
/// - Windows: C:\Users\<User>\AppData\Roaming\lookbook\notify\pending_results.json
pub struct JsonFileKeyValueStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl JsonFileKeyValueStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file starts empty. A corrupt file is logged and replaced on
    /// the next write rather than failing startup.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let cache = match tokio::fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str::<HashMap<String, String>>(&data) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Failed to parse storage file, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StorageError::io("open", e)),
        };

        tracing::debug!(path = ?path, entries = cache.len(), "File storage initialized");

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Platform config directory location, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = ProjectDirs::from("io", "lookbook", "notify") {
            dirs.config_dir().join("pending_results.json")
        } else {
            PathBuf::from("lookbook_pending_results.json")
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole cache to disk via a temp file and rename.
    async fn persist(&self, cache: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::io("create_dir", e))?;
            }
        }

        let data =
            serde_json::to_string_pretty(cache).map_err(StorageError::serialization)?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, data)
            .await
            .map_err(|e| StorageError::io("write", e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StorageError::io("rename", e))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.cache.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Lock held through persist so concurrent writers cannot reorder files.
        let mut cache = self.cache.write().await;
        cache.insert(key.to_string(), value.to_string());
        self.persist(&cache).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.write().await;
        if cache.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&cache).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .cache
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
