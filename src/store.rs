//! Persistence for like counts and per-IP throttle state.
//!
//! The whole [`LikesData`] record is read into memory and rewritten on every
//! accepted like. Callers that need read-modify-write atomicity go through the
//! single writer in [`crate::worker`].

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::models::LikesData;

#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn read(&self) -> Result<LikesData, StoreError>;

    /// Stamps `last_update` and replaces the stored record with `data`.
    async fn write(&self, data: &mut LikesData) -> Result<(), StoreError>;
}

// JSON file on local disk
pub struct JsonFileStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self {
            path,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    // create_new so a concurrent writer's data is never clobbered by the empty shape
    async fn initialize(&self, data: &LikesData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(data)?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        file.write_all(&json).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl CounterStore for JsonFileStore {
    async fn read(&self) -> Result<LikesData, StoreError> {
        let now = self.clock.now();

        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "counter store absent, initializing");
                let data = LikesData::new(now);
                if let Err(e) = self.initialize(&data).await {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to persist initial counter store");
                }
                return Ok(data);
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "counter store unreadable, using empty state");
                return Ok(LikesData::new(now));
            }
        };

        match serde_json::from_slice(&content) {
            Ok(data) => Ok(data),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "counter store corrupt, using empty state");
                Ok(LikesData::new(now))
            }
        }
    }

    async fn write(&self, data: &mut LikesData) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        data.last_update = self.clock.now();
        let json = serde_json::to_vec_pretty(data)?;

        // write aside then rename, so readers never see a truncated file
        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

// In-process store for tests
pub struct MemoryStore {
    data: Mutex<LikesData>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Mutex::new(LikesData::new(clock.now())),
            clock,
        }
    }

    pub async fn snapshot(&self) -> LikesData {
        self.data.lock().await.clone()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn read(&self) -> Result<LikesData, StoreError> {
        Ok(self.data.lock().await.clone())
    }

    async fn write(&self, data: &mut LikesData) -> Result<(), StoreError> {
        data.last_update = self.clock.now();
        *self.data.lock().await = data.clone();
        Ok(())
    }
}
