//! In-memory scene document store

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use res_scene::{SceneMap, SceneStorage};
use res_scene_hass::StorageError;

#[derive(Default)]
pub struct MockStorage {
    data: Mutex<Option<SceneMap>>,
    saves: AtomicUsize,
    read_only: AtomicBool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenes(scenes: SceneMap) -> Self {
        Self {
            data: Mutex::new(Some(scenes)),
            saves: AtomicUsize::new(0),
            read_only: AtomicBool::new(false),
        }
    }

    /// Make every following save fail with an IO error
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// The last saved document
    pub fn saved(&self) -> Option<SceneMap> {
        self.data.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SceneStorage for MockStorage {
    async fn load(&self) -> Result<Option<SceneMap>, StorageError> {
        Ok(self.data.lock().unwrap().clone())
    }

    async fn save(&self, scenes: &SceneMap) -> Result<(), StorageError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only file system",
            )));
        }
        *self.data.lock().unwrap() = Some(scenes.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
