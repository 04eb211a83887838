/// Directory-backed key-value store.
///
/// One file per key inside a single directory:
/// - file name = percent-encoded key + `.json`
/// - atomic writes (write to .tmp, fsync, rename)
/// - refuses to overwrite non-empty content with empty content
/// - per-key write mutex so two writers never race on the same temp file
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{check_key, KeyValueStore, StorageError};

const EXTENSION: &str = "json";
const TMP_EXTENSION: &str = "taskboard.tmp";

/// Everything except `[A-Za-z0-9_-]` is escaped, which also covers path
/// separators and dots.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-');

pub struct DirStore {
    dir: PathBuf,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let encoded = utf8_percent_encode(key, KEY_ENCODE_SET).to_string();
        self.dir.join(format!("{}.{}", encoded, EXTENSION))
    }

    fn key_for(file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(&format!(".{}", EXTENSION))?;
        percent_decode_str(stem)
            .decode_utf8()
            .ok()
            .map(|k| k.into_owned())
    }

    fn write_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.write_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        if content.trim().is_empty() {
            if let Ok(existing) = fs::read_to_string(path).await {
                if !existing.trim().is_empty() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Refusing to overwrite non-empty value with empty content",
                    ));
                }
            }
        }

        let tmp_path = path.with_extension(TMP_EXTENSION);
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, path).await?;

        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir).await {
                let _ = d.sync_all().await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for DirStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let lock = self.write_lock(key);
        let _guard = lock.lock().await;
        Self::atomic_write(&self.path_for(key), value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        check_key(key)?;
        match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let lock = self.write_lock(key);
        let _guard = lock.lock().await;
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match Self::key_for(name) {
                Some(key) => keys.push(key),
                None => log::debug!(
                    target: "taskboard.storage",
                    "Skipping foreign file in store dir: {}",
                    name
                ),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::open(tmp.path()).await.unwrap();

        store.set("kanban_data_civil", "{\"a\":1}").await.unwrap();
        store.set("kanban_data_a/b c", "{}").await.unwrap();

        assert_eq!(
            store.get("kanban_data_civil").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert_eq!(
            store.list_keys().await.unwrap(),
            vec!["kanban_data_a/b c", "kanban_data_civil"]
        );
        // the slash never reaches the filesystem
        assert!(!tmp.path().join("kanban_data_a").exists());
    }

    #[tokio::test]
    async fn test_idle_write_locks_are_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::open(tmp.path()).await.unwrap();
        for i in 0..20 {
            store.set(&format!("k{}", i), "v").await.unwrap();
        }
        assert!(store.write_locks.lock().unwrap().len() <= 1);
        assert_eq!(store.list_keys().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::open(tmp.path()).await.unwrap();
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert!(!store.contains_key("nope").await.unwrap());
        store.remove("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_refuses_empty_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::open(tmp.path()).await.unwrap();
        store.set("k", "content").await.unwrap();

        assert!(matches!(store.set("k", "  ").await, Err(StorageError::Io(_))));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("content"));
    }

    #[tokio::test]
    async fn test_foreign_files_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        let store = DirStore::open(tmp.path()).await.unwrap();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.list_keys().await.unwrap(), vec!["k"]);
    }
}
