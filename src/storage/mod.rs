//! Saved-player notes on disk.
//!
//! Notes are appended to a JSONL file; the newest line for a
//! (player, self, region, platform) combination wins.

mod jsonl;

pub use jsonl::{JsonlReader, JsonlWriter};

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::backend::{LoadError, SavedPlayerQuery, SavedPlayerSource};
use crate::models::SavedPlayerInfo;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StorageError> for LoadError {
    fn from(e: StorageError) -> Self {
        LoadError::BackendUnavailable(e.to_string())
    }
}

fn matches(info: &SavedPlayerInfo, query: &SavedPlayerQuery) -> bool {
    info.puuid == query.puuid
        && info.self_puuid == query.self_puuid
        && info.region == query.region
        && info.platform_id == query.platform_id
}

/// JSONL-backed [`SavedPlayerSource`].
#[derive(Debug, Clone)]
pub struct SavedPlayerStore {
    path: PathBuf,
}

impl SavedPlayerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Newest note matching all four query fields.
    pub fn latest(&self, query: &SavedPlayerQuery) -> Result<Option<SavedPlayerInfo>, StorageError> {
        let reader: JsonlReader<SavedPlayerInfo> = JsonlReader::new(self.path.clone());
        let found = reader
            .read_where(|info| matches(info, query))?
            .into_iter()
            .max_by_key(|info| info.updated_at);
        Ok(found)
    }

    pub fn save(&self, info: &SavedPlayerInfo) -> Result<(), StorageError> {
        JsonlWriter::new(self.path.clone()).append(info)?;
        debug!("Saved note for {}", info.puuid);
        Ok(())
    }
}

#[async_trait]
impl SavedPlayerSource for SavedPlayerStore {
    async fn query(&self, query: &SavedPlayerQuery) -> Result<Option<SavedPlayerInfo>, LoadError> {
        let store = self.clone();
        let query = query.clone();
        let found = tokio::task::spawn_blocking(move || store.latest(&query))
            .await
            .map_err(|e| LoadError::TransportFailure(e.to_string()))??;
        Ok(found)
    }
}
