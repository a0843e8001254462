//! File-backed implementation of the durable model store.
//!
//! One file per key under the data directory. Writes go through a temp file
//! and rename so a crash mid-write never leaves a truncated model behind.

use crate::domain::ports::ModelStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create store directory {:?}", self.dir))?;

        let path = self.path_for(key);
        let temp = path.with_extension("tmp");
        fs::write(&temp, bytes)
            .await
            .with_context(|| format!("failed to write {:?}", temp))?;
        fs::rename(&temp, &path)
            .await
            .with_context(|| format!("failed to move {:?} into place", temp))?;

        debug!(key, bytes = bytes.len(), "stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {:?}", path)),
        }
    }
}
