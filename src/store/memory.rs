use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{records_for_asset, records_in_range, AssetStore};
use crate::records::AssetRecord;
use crate::Result;

/// Asset store held in process memory
#[derive(Debug, Default, Clone)]
pub struct MemoryAssetStore {
    records: Arc<Mutex<Vec<AssetRecord>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn insert(&self, records: Vec<AssetRecord>) -> Result<()> {
        let mut storage = self.records.lock().await;
        storage.extend(records);
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
