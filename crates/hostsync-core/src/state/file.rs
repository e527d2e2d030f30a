// # File KV Store
//
// File-based implementation of KvStore with crash recovery.
//
// ## Purpose
//
// Persists the dataset across daemon restarts. Each key lives in its own
// JSON file inside a directory.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on read
// - Automatic backup: Keeps .backup of the previous value
// - Recovery: Falls back to backup if corruption detected
//
// ## Layout
//
// ```text
// /var/lib/hostsync/
//   domain_data.json
//   domain_data.backup
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::KvStore;

/// File-based key-value store with crash recovery
///
/// # Crash Recovery
///
/// - **Atomic writes**: New value written to temporary file, then renamed
/// - **Backup**: Previous value kept in a `.backup` file
/// - **Corruption detection**: JSON validation on read
/// - **Automatic recovery**: Falls back to backup if main file corrupted
///
/// # Example
///
/// ```rust,no_run
/// use hostsync_core::state::FileKvStore;
/// use hostsync_core::traits::KvStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileKvStore::new("/var/lib/hostsync").await?;
///
///     store.put("domain_data", "{}".to_string()).await?;
///     let value = store.get("domain_data").await?;
///     assert!(value.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
    /// Serializes writers so temp files never interleave
    write_lock: Arc<Mutex<()>>,
}

impl FileKvStore {
    /// Create or open a file store rooted at `dir`
    ///
    /// The directory is created if it doesn't exist.
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(&dir).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Directory holding the key files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate a key before turning it into a file name
    fn check_key(key: &str) -> Result<(), Error> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::invalid_input(format!(
                "Store key must be non-empty [A-Za-z0-9_-]: '{}'",
                key
            )));
        }
        Ok(())
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.tmp", key))
    }

    fn backup_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.backup", key))
    }

    /// Read and parse one file
    ///
    /// Returns `Ok(None)` when the file doesn't exist.
    async fn read_value(path: &Path) -> Result<Option<serde_json::Value>, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read store file {}: {}", path.display(), e))
        })?;

        let value = serde_json::from_str(&content).map_err(|e| {
            Error::corrupted(format!(
                "Failed to parse store file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Some(value))
    }

    /// Read with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to read the main file
    /// 2. If it is corrupted, try the backup
    /// 3. If the backup is valid, restore it over the main file
    /// 4. Otherwise report the corruption
    async fn read_with_recovery(&self, key: &str) -> Result<Option<serde_json::Value>, Error> {
        let path = self.value_path(key);

        match Self::read_value(&path).await {
            Ok(value) => Ok(value),
            Err(Error::Corrupted(reason)) => {
                tracing::warn!(
                    "Store file appears corrupted: {}. Attempting recovery from backup.",
                    reason
                );

                let backup_path = self.backup_path(key);
                match Self::read_value(&backup_path).await {
                    Ok(Some(value)) => {
                        tracing::info!("Recovered key {} from backup", key);

                        if let Err(restore_err) = fs::copy(&backup_path, &path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(Some(value))
                    }
                    Ok(None) => {
                        tracing::warn!("No backup file found for key {}", key);
                        Err(Error::Corrupted(reason))
                    }
                    Err(backup_err) => {
                        tracing::error!("Backup also unusable: {}", backup_err);
                        Err(Error::Corrupted(reason))
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Write a value atomically
    async fn write_value(&self, key: &str, value: &str) -> Result<(), Error> {
        let path = self.value_path(key);
        let temp_path = self.temp_path(key);

        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(value.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Only back up a value that still parses
        if matches!(Self::read_value(&path).await, Ok(Some(_))) {
            if let Err(e) = fs::copy(&path, self.backup_path(key)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!("Key {} written to {}", key, path.display());
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, Error> {
        Self::check_key(key)?;
        self.read_with_recovery(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<(), Error> {
        Self::check_key(key)?;
        let _guard = self.write_lock.lock().await;
        self.write_value(key, &value).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        Self::check_key(key)?;
        let _guard = self.write_lock.lock().await;

        for path in [self.value_path(key), self.backup_path(key)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::store(format!(
                        "Failed to delete {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path()).await.unwrap();

        assert!(store.get("domain_data").await.unwrap().is_none());

        store
            .put("domain_data", r#"{"lastUpdated":"2025-01-09T12:00:00Z"}"#.to_string())
            .await
            .unwrap();
        assert!(dir.path().join("domain_data.json").exists());

        // A new instance sees the persisted value
        let store2 = FileKvStore::new(dir.path()).await.unwrap();
        let value = store2.get("domain_data").await.unwrap().unwrap();
        assert_eq!(value["lastUpdated"], "2025-01-09T12:00:00Z");
    }

    #[tokio::test]
    async fn test_file_store_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("var").join("lib").join("hostsync");

        let store = FileKvStore::new(&nested).await.unwrap();
        store.put("domain_data", "{}".to_string()).await.unwrap();

        assert!(nested.join("domain_data.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path()).await.unwrap();

        store.put("domain_data", r#"{"n":1}"#.to_string()).await.unwrap();
        // Second write creates the backup of the first
        store.put("domain_data", r#"{"n":2}"#.to_string()).await.unwrap();
        assert!(dir.path().join("domain_data.backup").exists());

        fs::write(dir.path().join("domain_data.json"), b"corrupted json data")
            .await
            .unwrap();

        let recovered = store.get("domain_data").await.unwrap().unwrap();
        assert_eq!(recovered["n"], 1, "Backup holds the previous value");

        // Main file was restored from the backup
        let restored = fs::read_to_string(dir.path().join("domain_data.json"))
            .await
            .unwrap();
        assert_eq!(restored, r#"{"n":1}"#);
    }

    #[tokio::test]
    async fn test_file_store_corruption_without_backup() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path()).await.unwrap();

        fs::write(dir.path().join("domain_data.json"), b"{{{")
            .await
            .unwrap();

        let err = store.get("domain_data").await.unwrap_err();
        assert!(matches!(err, Error::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_file_store_delete_removes_backup() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path()).await.unwrap();

        store.put("domain_data", "{}".to_string()).await.unwrap();
        store.put("domain_data", "{}".to_string()).await.unwrap();
        store.delete("domain_data").await.unwrap();

        assert!(!dir.path().join("domain_data.json").exists());
        assert!(!dir.path().join("domain_data.backup").exists());
        assert!(store.get("domain_data").await.unwrap().is_none());

        // Deleting again is fine
        store.delete("domain_data").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path()).await.unwrap();

        let err = store.put("../escape", "{}".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_file_store_last_write_wins() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path()).await.unwrap();

        for i in 0..10 {
            store
                .put("domain_data", format!(r#"{{"n":{}}}"#, i))
                .await
                .unwrap();
        }

        let value = store.get("domain_data").await.unwrap().unwrap();
        assert_eq!(value["n"], 9);
    }
}
