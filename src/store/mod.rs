//! Asset record storage
//!
//! Two stores are provided: [`MemoryAssetStore`] for tests and short-lived
//! services, and [`JsonFileAssetStore`] which keeps every record in one JSON
//! file. Both share the same query semantics.

mod file_system;
mod memory;

pub use file_system::JsonFileAssetStore;
pub use memory::MemoryAssetStore;

use async_trait::async_trait;

use crate::records::AssetRecord;
use crate::Result;

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store a batch of records, all or none
    async fn insert(&self, records: Vec<AssetRecord>) -> Result<()>;

    /// Every record of an asset, oldest first
    async fn find_by_asset(&self, asset_id: &str) -> Result<Vec<AssetRecord>>;

    /// Records with `gte <= timestamp <= lte` (unix seconds), newest first,
    /// at most `limit` of them
    async fn find_by_time_range(&self, gte: i64, lte: i64, limit: usize)
        -> Result<Vec<AssetRecord>>;
}

pub(crate) fn records_for_asset(records: &[AssetRecord], asset_id: &str) -> Vec<AssetRecord> {
    let mut found: Vec<AssetRecord> = records
        .iter()
        .filter(|r| r.asset_id == asset_id)
        .cloned()
        .collect();
    found.sort_by_key(|r| r.timestamp);
    found
}

pub(crate) fn records_in_range(
    records: &[AssetRecord],
    gte: i64,
    lte: i64,
    limit: usize,
) -> Vec<AssetRecord> {
    let mut found: Vec<AssetRecord> = records
        .iter()
        .filter(|r| (gte..=lte).contains(&r.unix_timestamp()))
        .cloned()
        .collect();
    found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    found.truncate(limit);
    found
}
