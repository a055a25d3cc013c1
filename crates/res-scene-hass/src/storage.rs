//! Versioned JSON persistence under `<config_dir>/.storage/`
//!
//! Every file is wrapped in an envelope:
//!
//! ```json
//! {
//!   "version": 1,
//!   "minor_version": 1,
//!   "key": "res_scene.json",
//!   "data": { ... }
//! }
//! ```

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported version for {key}: expected {expected}, found {found}")]
    VersionMismatch {
        key: String,
        expected: u32,
        found: u32,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Envelope written around every stored payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    pub version: u32,
    pub minor_version: u32,
    pub key: String,
    pub data: T,
}

impl<T> StorageFile<T> {
    pub fn new(key: impl Into<String>, data: T, version: u32, minor_version: u32) -> Self {
        Self {
            version,
            minor_version,
            key: key.into(),
            data,
        }
    }
}

/// Handle on the `.storage/` directory
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
}

impl Storage {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(".storage"),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(key)
    }

    pub async fn exists(&self, key: &str) -> bool {
        fs::try_exists(self.file_path(key)).await.unwrap_or(false)
    }

    async fn ensure_dir(&self) -> StorageResult<()> {
        if !fs::try_exists(&self.storage_dir).await.unwrap_or(false) {
            fs::create_dir_all(&self.storage_dir).await?;
            debug!(dir = ?self.storage_dir, "Created storage directory");
        }
        Ok(())
    }

    /// Read an envelope, or `None` when the key was never written
    pub async fn load<T>(&self, key: &str) -> StorageResult<Option<StorageFile<T>>>
    where
        T: DeserializeOwned,
    {
        let path = self.file_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key, "Storage file not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let file: StorageFile<T> = serde_json::from_str(&content)?;
        debug!(key, version = file.version, minor_version = file.minor_version, "Loaded storage file");
        Ok(Some(file))
    }

    /// Write an envelope through a temp file and a rename
    pub async fn save<T>(&self, file: &StorageFile<T>) -> StorageResult<()>
    where
        T: Serialize,
    {
        self.ensure_dir().await?;

        let path = self.file_path(&file.key);
        let temp_path = self.file_path(&format!("{}.tmp", file.key));
        let content = serde_json::to_string_pretty(file)?;

        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(key = %file.key, version = file.version, "Saved storage file");
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.file_path(key)).await {
            Ok(()) => {
                debug!(key, "Deleted storage file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A single typed storage key with a fixed schema version
#[derive(Debug, Clone)]
pub struct Store<T> {
    storage: Storage,
    key: String,
    version: u32,
    minor_version: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Store<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(storage: Storage, key: impl Into<String>, version: u32, minor_version: u32) -> Self {
        Self {
            storage,
            key: key.into(),
            version,
            minor_version,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> PathBuf {
        self.storage.file_path(&self.key)
    }

    /// Load the payload
    ///
    /// A newer major version is refused; an older minor version loads with a
    /// warning.
    pub async fn load(&self) -> StorageResult<Option<T>> {
        let Some(file) = self.storage.load::<T>(&self.key).await? else {
            return Ok(None);
        };

        if file.version != self.version {
            return Err(StorageError::VersionMismatch {
                key: self.key.clone(),
                expected: self.version,
                found: file.version,
            });
        }
        if file.minor_version < self.minor_version {
            warn!(
                key = %self.key,
                found = file.minor_version,
                current = self.minor_version,
                "Storage has older minor version"
            );
        }
        Ok(Some(file.data))
    }

    pub async fn save(&self, data: &T) -> StorageResult<()> {
        let file = StorageFile::new(self.key.clone(), data, self.version, self.minor_version);
        self.storage.save(&file).await
    }
}
