use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::application::errors::StorageError;

/// Flat key/value configuration data. Keys may be dotted (`Discord.Token`).
pub type ConfigData = BTreeMap<String, String>;

/// Configuration store - key/value persistence handed to modules
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Prepare the store for use. Calling it again is a no-op.
    async fn ready(&self) -> Result<(), StorageError>;

    /// Write every key of `data` that is not already set. With `reset` the
    /// store is cleared first.
    async fn defaults(&self, data: &ConfigData, reset: bool) -> Result<(), StorageError>;

    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn delete_value(&self, key: &str) -> Result<bool, StorageError>;

    /// Values for every key of `data`, falling back to the given defaults
    async fn get_values(&self, data: &ConfigData) -> Result<ConfigData, StorageError> {
        let mut out = ConfigData::new();
        for (key, default) in data {
            let value = self.get_value(key).await?.unwrap_or_else(|| default.clone());
            out.insert(key.clone(), value);
        }
        Ok(out)
    }

    async fn set_values(&self, data: &ConfigData) -> Result<Vec<bool>, StorageError> {
        let mut out = Vec::with_capacity(data.len());
        for (key, value) in data {
            self.set_value(key, value).await?;
            out.push(true);
        }
        Ok(out)
    }

    async fn delete_values(&self, keys: &[String]) -> Result<Vec<bool>, StorageError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.delete_value(key).await?);
        }
        Ok(out)
    }
}
