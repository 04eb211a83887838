pub mod keys;
pub mod memory;
#[cfg(feature = "dir-store")]
pub mod dir;

use async_trait::async_trait;

/// Abstract key-value backend the board data is persisted to.
/// Implementations: MemoryStore (process memory), DirStore (one file per key).
///
/// Values are opaque strings; the core stores JSON in them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Read a value. Absent keys are `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    async fn contains_key(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some_and(|v| !v.is_empty()))
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// First of `base`, `base_1`, `base_2`, ... that holds no value yet.
pub async fn vacant_key(store: &dyn KeyValueStore, base: &str) -> Result<String, StorageError> {
    let mut n = 0;
    loop {
        let key = keys::with_suffix(base, n);
        if store.get(&key).await?.is_none() {
            return Ok(key);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    #[tokio::test]
    async fn test_vacant_key_skips_taken_keys() {
        let store = MemoryStore::new();
        assert_eq!(vacant_key(&store, "k").await.unwrap(), "k");

        store.set("k", "1").await.unwrap();
        store.set("k_1", "2").await.unwrap();
        assert_eq!(vacant_key(&store, "k").await.unwrap(), "k_2");
    }
}
