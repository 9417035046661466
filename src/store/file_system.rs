use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{records_for_asset, records_in_range, AssetStore};
use crate::error::CcError;
use crate::records::AssetRecord;
use crate::Result;

/// Asset store persisted as a single JSON array
///
/// The whole file is rewritten on every insert through a temporary file
/// and a rename, so a failed write leaves the previous contents in place.
#[derive(Debug, Clone)]
pub struct JsonFileAssetStore {
    path: PathBuf,
    records: Arc<Mutex<Vec<AssetRecord>>>,
}

impl JsonFileAssetStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CcError::persistence(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&contents)
                .map_err(|e| CcError::persistence(format!("{}: {}", path.display(), e)))?
        } else {
            Vec::new()
        };
        log::info!(
            "Opened asset store {} ({} records)",
            path.display(),
            records.len()
        );
        Ok(Self {
            path,
            records: Arc::new(Mutex::new(records)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[AssetRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CcError::persistence(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| CcError::persistence(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CcError::persistence(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CcError::persistence(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

#[async_trait]
impl AssetStore for JsonFileAssetStore {
    async fn insert(&self, records: Vec<AssetRecord>) -> Result<()> {
        let mut storage = self.records.lock().await;
        let mut updated = storage.clone();
        updated.extend(records);
        self.persist(&updated).await?;
        *storage = updated;
        log::debug!("Asset store now holds {} records", storage.len());
        Ok(())
    }

    async fn find_by_asset(&self, asset_id: &str) -> Result<Vec<AssetRecord>> {
        let storage = self.records.lock().await;
        Ok(records_for_asset(&storage, asset_id))
    }

    async fn find_by_time_range(
        &self,
        gte: i64,
        lte: i64,
        limit: usize,
    ) -> Result<Vec<AssetRecord>> {
        let storage = self.records.lock().await;
        Ok(records_in_range(&storage, gte, lte, limit))
    }
}
