//! Configuration stores backing the System module

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::traits::{ConfigData, ConfigStore};
use crate::infrastructure::config::{StoreConfig, StoreDriver};
use crate::infrastructure::database::SqliteConfigStore;

/// Open the store selected by configuration. The store still needs `ready()`.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ConfigStore>, StorageError> {
    let store: Arc<dyn ConfigStore> = match config.driver {
        StoreDriver::Memory => Arc::new(MemoryConfigStore::new()),
        StoreDriver::File => Arc::new(FileConfigStore::new(&config.path)),
        StoreDriver::Sqlite => Arc::new(SqliteConfigStore::open(&config.path, &config.table)?),
    };
    Ok(store)
}

/// In-process store, lost on exit
#[derive(Default)]
pub struct MemoryConfigStore {
    kv: RwLock<ConfigData>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn ready(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn defaults(&self, data: &ConfigData, reset: bool) -> Result<(), StorageError> {
        let mut kv = self.kv.write().await;
        if reset {
            kv.clear();
        }
        for (key, value) in data {
            kv.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.kv.read().await.keys().cloned().collect())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.kv.read().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.kv.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_value(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.kv.write().await.remove(key).is_some())
    }
}

/// YAML file store. Nested mappings are read as dotted keys; the file is
/// rewritten flat after every change.
pub struct FileConfigStore {
    path: PathBuf,
    data: RwLock<ConfigData>,
    ready: AtomicBool,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: RwLock::new(ConfigData::new()),
            ready: AtomicBool::new(false),
        }
    }

    // Writing before the file is read would overwrite it with partial data.
    fn ensure_ready(&self) -> Result<(), StorageError> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StorageError::NotReady)
        }
    }

    async fn save(&self, data: &ConfigData) -> Result<(), StorageError> {
        let yaml = serde_yaml::to_string(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, yaml).await?;
        Ok(())
    }
}

fn flatten(prefix: &str, value: &serde_yaml::Value, out: &mut ConfigData) {
    let key = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{}.{}", prefix, k)
        }
    };
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let k = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                };
                flatten(&key(&k), v, out);
            }
        }
        serde_yaml::Value::Null => {}
        serde_yaml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_yaml::Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        serde_yaml::Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        other => {
            if let Ok(s) = serde_yaml::to_string(other) {
                out.insert(prefix.to_string(), s.trim().to_string());
            }
        }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn ready(&self) -> Result<(), StorageError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut data = ConfigData::new();
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let value: serde_yaml::Value = serde_yaml::from_str(&content)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                flatten("", &value, &mut data);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Config file {} does not exist yet", self.path.display());
            }
            Err(e) => return Err(e.into()),
        }

        *self.data.write().await = data;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn defaults(&self, data: &ConfigData, reset: bool) -> Result<(), StorageError> {
        self.ensure_ready()?;
        let mut current = self.data.write().await;
        if reset {
            current.clear();
        }
        for (key, value) in data {
            current.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self.save(&current).await
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.ensure_ready()?;
        Ok(self.data.read().await.keys().cloned().collect())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_ready()?;
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_ready()?;
        let mut current = self.data.write().await;
        current.insert(key.to_string(), value.to_string());
        self.save(&current).await
    }

    async fn delete_value(&self, key: &str) -> Result<bool, StorageError> {
        self.ensure_ready()?;
        let mut current = self.data.write().await;
        let removed = current.remove(key).is_some();
        if removed {
            self.save(&current).await?;
        }
        Ok(removed)
    }
}
