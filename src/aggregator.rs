//! Per-asset summaries and date-bucketed asset listings over stored records

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::error::CcError;
use crate::records::AssetRecord;
use crate::store::AssetStore;
use crate::Result;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Leave the record lists empty; totals are still computed
    pub no_tx_list: bool,
    pub from: Option<usize>,
    pub to: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub asset_str: String,
    pub transactions: Vec<AssetRecord>,
    pub issue_transactions: Vec<AssetRecord>,
    pub send_transactions: Vec<AssetRecord>,
    pub balance_sat: i128,
    pub total_received_sat: u64,
    pub total_sent_sat: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    /// Day to list, `yyyy-mm-dd`; today when absent
    pub asset_date: Option<String>,
    /// Upper bound of the window in unix seconds
    pub start_timestamp: Option<i64>,
    /// Records at exactly `start_timestamp` a previous page already returned
    pub skip_at_start: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub next: Option<String>,
    pub prev: String,
    pub more: bool,
    pub is_today: bool,
    pub current_ts: i64,
    pub current: String,
    /// Start timestamp for fetching the rest of the day
    pub more_ts: i64,
    /// `skip_at_start` to pass along with `more_ts`
    pub more_skip: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetListing {
    pub assets: Vec<AssetSummary>,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Clone)]
pub struct AssetAggregator {
    store: Arc<dyn AssetStore>,
    page_limit: usize,
}

impl AssetAggregator {
    pub fn new(store: Arc<dyn AssetStore>, page_limit: usize) -> Self {
        Self { store, page_limit }
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    pub async fn asset_summary(
        &self,
        asset_id: &str,
        options: SummaryOptions,
    ) -> Result<AssetSummary> {
        let records = self.store.find_by_asset(asset_id).await?;
        Ok(summarize(asset_id, records, &options))
    }

    /// Summaries of the assets touched on one UTC day, newest first
    pub async fn list_by_date(
        &self,
        query: &ListingQuery,
        now: DateTime<Utc>,
    ) -> Result<AssetListing> {
        let today = now.format("%Y-%m-%d").to_string();
        let (current, is_today) = match &query.asset_date {
            Some(date) => (date.clone(), *date == today),
            None => (today, true),
        };

        let day = NaiveDate::parse_from_str(&current, "%Y-%m-%d")
            .map_err(|_| CcError::invalid("Please use yyyy-mm-dd format"))?;
        let gte = day
            .and_hms_opt(0, 0, 0)
            .map(|midnight| Utc.from_utc_datetime(&midnight).timestamp())
            .ok_or_else(|| CcError::invalid("Please use yyyy-mm-dd format"))?;
        let lte = query.start_timestamp.unwrap_or(gte + SECONDS_PER_DAY);
        let limit = query.limit.unwrap_or(self.page_limit).max(1);

        let skip = query.skip_at_start;
        let mut records = self
            .store
            .find_by_time_range(gte, lte, limit + skip + 1)
            .await?;
        let already_listed = records
            .iter()
            .take(skip)
            .take_while(|r| r.unix_timestamp() == lte)
            .count();
        records.drain(..already_listed);
        let more = records.len() > limit;
        records.truncate(limit);

        let mut asset_ids: Vec<&str> = Vec::new();
        for record in &records {
            if !asset_ids.contains(&record.asset_id.as_str()) {
                asset_ids.push(&record.asset_id);
            }
        }

        let mut assets = Vec::with_capacity(asset_ids.len());
        for asset_id in asset_ids {
            assets.push(self.asset_summary(asset_id, SummaryOptions::default()).await?);
        }

        let pagination = if more {
            let oldest = records.last().map(AssetRecord::unix_timestamp).unwrap_or(lte);
            let mut more_skip = records
                .iter()
                .filter(|r| r.unix_timestamp() == oldest)
                .count();
            if oldest == lte {
                more_skip += already_listed;
            }
            Some(Pagination {
                next: format_date(lte),
                prev: format_date(gte - SECONDS_PER_DAY).unwrap_or_default(),
                more,
                is_today,
                current_ts: lte - 1,
                current,
                more_ts: oldest,
                more_skip,
            })
        } else {
            None
        };

        log::debug!("Listed {} assets between {} and {}", assets.len(), gte, lte);
        Ok(AssetListing {
            length: assets.len(),
            assets,
            pagination,
        })
    }
}

/// Split a comma-separated asset list, dropping blank entries
pub fn parse_asset_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reject an empty asset list or a blank first id
pub fn check_assets<S: AsRef<str>>(assets: &[S]) -> Result<()> {
    match assets.first() {
        Some(first) if !first.as_ref().trim().is_empty() => Ok(()),
        _ => Err(CcError::MissingAsset),
    }
}

pub fn summarize(
    asset_id: &str,
    records: Vec<AssetRecord>,
    options: &SummaryOptions,
) -> AssetSummary {
    let issued: i128 = records
        .iter()
        .filter(|r| r.is_issuance())
        .filter_map(|r| r.amount)
        .map(i128::from)
        .sum();
    let burned: i128 = records
        .iter()
        .flat_map(|r| r.payments.iter())
        .filter(|p| p.burn)
        .map(|p| i128::from(p.amount))
        .sum();
    let total_received_sat = records
        .iter()
        .flat_map(|r| r.payments.iter())
        .filter(|p| !p.burn)
        .map(|p| p.amount)
        .fold(0u64, u64::saturating_add);
    let total_sent_sat = records
        .iter()
        .filter(|r| !r.is_issuance())
        .flat_map(|r| r.payments.iter())
        .filter(|p| !p.burn)
        .map(|p| p.amount)
        .fold(0u64, u64::saturating_add);

    let transactions = if options.no_tx_list {
        Vec::new()
    } else {
        let from = options.from.unwrap_or(0).min(records.len());
        let to = options.to.unwrap_or(records.len()).clamp(from, records.len());
        records[from..to].to_vec()
    };
    let (issue_transactions, send_transactions): (Vec<_>, Vec<_>) =
        transactions.iter().cloned().partition(AssetRecord::is_issuance);

    AssetSummary {
        asset_str: asset_id.to_string(),
        transactions,
        issue_transactions,
        send_transactions,
        balance_sat: issued - burned,
        total_received_sat,
        total_sent_sat,
    }
}

/// Format unix seconds as a UTC `yyyy-mm-dd` date
pub fn format_date(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}
