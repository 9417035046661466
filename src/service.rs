//! Asset service facade
//!
//! Wires the node, the transformer, the provenance resolver, the funding
//! engine and the record store together and exposes one method per
//! caller-facing operation.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;

use crate::aggregator::{
    check_assets, AssetAggregator, AssetListing, AssetSummary, ListingQuery, SummaryOptions,
};
use crate::builder::{BuildBody, BuildResponse, ColoredTxBuilder};
use crate::colored::MetadataParser;
use crate::config::{ServiceConfig, TX_PAGE_LENGTH};
use crate::error::CcError;
use crate::funding::{FundingEngine, FundingLimits};
use crate::node::NodeService;
use crate::provenance::ProvenanceResolver;
use crate::records::AssetRecord;
use crate::store::{AssetStore, JsonFileAssetStore, MemoryAssetStore};
use crate::transformer::{InvTransaction, TransformOptions, Transformer};
use crate::types::{OperationType, TransformedTransaction};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawTransactionResponse {
    pub rawtx: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResponse {
    pub txid: String,
}

/// Which transactions to list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxListQuery {
    Block { hash: String, page: usize },
    Address { address: String, page: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxPage {
    pub pages_total: usize,
    pub txs: Vec<TransformedTransaction>,
}

/// One page of the transaction history of several assets
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetHistoryPage {
    pub total_items: usize,
    pub from: usize,
    pub to: usize,
    pub items: Vec<TransformedTransaction>,
}

#[derive(Clone)]
pub struct AssetService {
    node: Arc<dyn NodeService>,
    resolver: ProvenanceResolver,
    funding: FundingEngine,
    aggregator: AssetAggregator,
}

impl AssetService {
    pub fn new(
        config: &ServiceConfig,
        node: Arc<dyn NodeService>,
        parser: Arc<dyn MetadataParser>,
        builder: Arc<dyn ColoredTxBuilder>,
        store: Arc<dyn AssetStore>,
    ) -> Self {
        let transformer = Transformer::new(parser, config.network);
        let resolver = ProvenanceResolver::from_config(node.clone(), transformer, config);
        let funding = FundingEngine::new(
            node.clone(),
            resolver.clone(),
            builder,
            FundingLimits::from(config),
        );
        let aggregator = AssetAggregator::new(store, config.assets_page_limit);
        Self {
            node,
            resolver,
            funding,
            aggregator,
        }
    }

    /// Build a service backed by the store named in the config
    pub async fn open(
        config: &ServiceConfig,
        node: Arc<dyn NodeService>,
        parser: Arc<dyn MetadataParser>,
        builder: Arc<dyn ColoredTxBuilder>,
    ) -> Result<Self> {
        let store: Arc<dyn AssetStore> = match &config.asset_store_path {
            Some(path) => Arc::new(JsonFileAssetStore::open(path.clone()).await?),
            None => Arc::new(MemoryAssetStore::new()),
        };
        Ok(Self::new(config, node, parser, builder, store))
    }

    pub async fn build_issue(&self, body: BuildBody) -> Result<BuildResponse> {
        self.funding.build(OperationType::Issue, body).await
    }

    pub async fn build_send(&self, body: BuildBody) -> Result<BuildResponse> {
        self.funding.build(OperationType::Send, body).await
    }

    pub async fn build_burn(&self, body: BuildBody) -> Result<BuildResponse> {
        self.funding.build(OperationType::Burn, body).await
    }

    /// Transformed transaction with its transfer asset id resolved
    pub async fn transaction(&self, txid: &str) -> Result<TransformedTransaction> {
        self.resolver.lookup(txid).await
    }

    pub async fn raw_transaction(&self, txid: &str) -> Result<RawTransactionResponse> {
        let rawtx = self
            .node
            .get_raw_transaction_hex(txid)
            .await?
            .ok_or_else(|| CcError::TransactionNotFound(txid.to_string()))?;
        Ok(RawTransactionResponse { rawtx })
    }

    pub async fn list_transactions(
        &self,
        query: &TxListQuery,
        options: &TransformOptions,
    ) -> Result<TxPage> {
        let tip = self.node.tip_height().await?;
        let now = chrono::Utc::now().timestamp();
        let transformer = self.resolver.transformer();

        match query {
            TxListQuery::Block { hash, page } => {
                let txids = self
                    .node
                    .get_block_txids(hash)
                    .await?
                    .ok_or_else(|| CcError::TransactionNotFound(format!("block {}", hash)))?;
                let pages_total = txids.len().div_ceil(TX_PAGE_LENGTH);

                let mut txs = Vec::new();
                for txid in txids.iter().skip(page * TX_PAGE_LENGTH).take(TX_PAGE_LENGTH) {
                    let raw = crate::node::require_transaction(self.node.as_ref(), txid).await?;
                    txs.push(transformer.transform(&raw, tip, now, options));
                }
                Ok(TxPage { pages_total, txs })
            }
            TxListQuery::Address { address, page } => {
                let from = page * TX_PAGE_LENGTH;
                let history = self
                    .node
                    .get_address_history(address, from, from + TX_PAGE_LENGTH)
                    .await?;
                let pages_total = history.total_count.div_ceil(TX_PAGE_LENGTH);

                let mut seen = HashSet::new();
                let txs = history
                    .items
                    .iter()
                    .filter(|raw| seen.insert(raw.hash.clone()))
                    .map(|raw| transformer.transform(raw, tip, now, options))
                    .collect();
                Ok(TxPage { pages_total, txs })
            }
        }
    }

    /// Parse a `block`/`address` query pair, block taking precedence
    pub fn tx_list_query(
        block: Option<&str>,
        address: Option<&str>,
        page: usize,
    ) -> Result<TxListQuery> {
        match (block.filter(|b| !b.is_empty()), address.filter(|a| !a.is_empty())) {
            (Some(hash), _) => Ok(TxListQuery::Block {
                hash: hash.to_string(),
                page,
            }),
            (None, Some(address)) => Ok(TxListQuery::Address {
                address: address.to_string(),
                page,
            }),
            (None, None) => Err(CcError::invalid("Block hash or address expected")),
        }
    }

    pub async fn send_transaction(&self, tx_hex: &str) -> Result<SendResponse> {
        let tx_hex = tx_hex.trim();
        if tx_hex.is_empty() {
            return Err(CcError::invalid("Must include \"rawtx\""));
        }
        let txid = self.node.send_transaction(tx_hex).await?;
        log::info!("Broadcast transaction {}", txid);
        Ok(SendResponse { txid })
    }

    /// Summary of a consensus-encoded transaction seen on the network
    pub fn inv_transaction(&self, tx_hex: &str) -> Result<InvTransaction> {
        let bytes = hex::decode(tx_hex.trim()).map_err(|e| CcError::invalid(e.to_string()))?;
        let tx: bitcoin::Transaction = bitcoin::consensus::deserialize(&bytes)
            .map_err(|e| CcError::invalid(e.to_string()))?;
        Ok(self.resolver.transformer().transform_inv_transaction(&tx))
    }

    /// Detect a colored transaction and store a record per colored entry
    ///
    /// Returns `None` when the transaction carries no colored data.
    pub async fn check_and_store(&self, txid: &str) -> Result<Option<Vec<AssetRecord>>> {
        let tx = self.resolver.lookup(txid).await?;
        if tx.assets.is_empty() {
            log::debug!("{} carries no colored data", txid);
            return Ok(None);
        }

        let records = AssetRecord::from_transaction(&tx).map_err(|e| {
            log::warn!("Skipping malformed colored transaction {}: {}", txid, e);
            e
        })?;

        if let Err(e) = self.aggregator.store().insert(records.clone()).await {
            log::error!("Failed to store records of {}: {}", txid, e);
            return Err(match e {
                CcError::PersistenceFailure(_) => e,
                other => CcError::persistence(other.to_string()),
            });
        }
        log::info!("Stored {} asset records for {}", records.len(), txid);
        Ok(Some(records))
    }

    pub async fn asset_summary(
        &self,
        asset_id: &str,
        options: SummaryOptions,
    ) -> Result<AssetSummary> {
        check_assets(&[asset_id])?;
        self.aggregator.asset_summary(asset_id, options).await
    }

    pub async fn list_assets(&self, query: &ListingQuery) -> Result<AssetListing> {
        self.aggregator.list_by_date(query, chrono::Utc::now()).await
    }

    pub async fn balance(&self, asset_id: &str) -> Result<i128> {
        Ok(self.totals(asset_id).await?.balance_sat)
    }

    pub async fn total_received(&self, asset_id: &str) -> Result<u64> {
        Ok(self.totals(asset_id).await?.total_received_sat)
    }

    pub async fn total_sent(&self, asset_id: &str) -> Result<u64> {
        Ok(self.totals(asset_id).await?.total_sent_sat)
    }

    /// Sum of non-burn payments in records whose transaction is unconfirmed
    pub async fn unconfirmed_balance(&self, asset_id: &str) -> Result<u64> {
        let summary = self.asset_summary(asset_id, SummaryOptions::default()).await?;

        let mut hashes: Vec<&str> = Vec::new();
        for record in &summary.transactions {
            if !hashes.contains(&record.hash.as_str()) {
                hashes.push(&record.hash);
            }
        }
        let lookups = hashes
            .iter()
            .map(|hash| self.node.get_detailed_transaction(hash));
        let unconfirmed: HashSet<String> = try_join_all(lookups)
            .await?
            .into_iter()
            .flatten()
            .filter(|raw| !raw.is_confirmed())
            .map(|raw| raw.hash)
            .collect();

        Ok(summary
            .transactions
            .iter()
            .filter(|record| unconfirmed.contains(&record.hash))
            .flat_map(|record| record.payments.iter())
            .filter(|p| !p.burn)
            .map(|p| p.amount)
            .fold(0u64, u64::saturating_add))
    }

    /// Transactions touching any of `asset_ids`, newest first, each listed once
    ///
    /// `from` defaults to 0 and `to` to `from + TX_PAGE_LENGTH`.
    pub async fn asset_transactions<S: AsRef<str>>(
        &self,
        asset_ids: &[S],
        from: Option<usize>,
        to: Option<usize>,
        options: &TransformOptions,
    ) -> Result<AssetHistoryPage> {
        check_assets(asset_ids)?;
        let from = from.unwrap_or(0);
        let to = to.unwrap_or(from + TX_PAGE_LENGTH);

        let mut records = Vec::new();
        for asset_id in asset_ids.iter().map(AsRef::as_ref) {
            if !asset_id.trim().is_empty() {
                records.extend(self.aggregator.store().find_by_asset(asset_id.trim()).await?);
            }
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut hashes: Vec<&str> = Vec::new();
        for record in &records {
            if !hashes.contains(&record.hash.as_str()) {
                hashes.push(&record.hash);
            }
        }

        let total_items = hashes.len();
        let end = to.min(total_items);
        let page = &hashes[from.min(end)..end];
        let items = try_join_all(page.iter().map(|hash| async move {
            let tx = self.resolver.transformed(hash, options).await?;
            self.resolver.resolve(tx).await
        }))
        .await?;

        log::debug!(
            "Listed {} of {} transactions for {} assets",
            items.len(),
            total_items,
            asset_ids.len()
        );
        Ok(AssetHistoryPage {
            total_items,
            from,
            to: end,
            items,
        })
    }

    async fn totals(&self, asset_id: &str) -> Result<AssetSummary> {
        let options = SummaryOptions {
            no_tx_list: true,
            ..Default::default()
        };
        self.asset_summary(asset_id, options).await
    }
}
