//! Provenance resolution: finding the issuance behind a transfer
//!
//! A transfer's colored data does not name its asset. The resolver walks
//! the transfer's inputs back through the chain until it reaches a
//! colored issuance, then copies that issuance's asset id onto the
//! transfer. The walk is sequential in input order so the same chain state
//! always resolves to the same issuance, and it is bounded by both depth
//! and total lookups.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::config::ServiceConfig;
use crate::error::CcError;
use crate::node::{require_transaction, NodeService};
use crate::transformer::{is_null_data, TransformOptions, Transformer};
use crate::types::TransformedTransaction;
use crate::Result;

#[derive(Clone)]
pub struct ProvenanceResolver {
    node: Arc<dyn NodeService>,
    transformer: Transformer,
    max_depth: usize,
    max_lookups: usize,
}

/// Bookkeeping for one resolution
struct Search {
    /// Shallowest depth each txid has been explored at
    visited: HashMap<String, usize>,
    lookups: usize,
    exhausted: bool,
    tip_height: u64,
    now: i64,
}

impl ProvenanceResolver {
    pub fn new(
        node: Arc<dyn NodeService>,
        transformer: Transformer,
        max_depth: usize,
        max_lookups: usize,
    ) -> Self {
        Self {
            node,
            transformer,
            max_depth,
            max_lookups,
        }
    }

    pub fn from_config(
        node: Arc<dyn NodeService>,
        transformer: Transformer,
        config: &ServiceConfig,
    ) -> Self {
        Self::new(
            node,
            transformer,
            config.provenance_max_depth,
            config.provenance_max_lookups,
        )
    }

    pub fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    /// Fetch and transform a transaction without resolving provenance
    pub async fn transformed(
        &self,
        txid: &str,
        options: &TransformOptions,
    ) -> Result<TransformedTransaction> {
        let raw = require_transaction(self.node.as_ref(), txid).await?;
        let tip = self.node.tip_height().await?;
        Ok(self
            .transformer
            .transform(&raw, tip, chrono::Utc::now().timestamp(), options))
    }

    /// Fetch, transform and resolve a transaction
    pub async fn lookup(&self, txid: &str) -> Result<TransformedTransaction> {
        let tx = self.transformed(txid, &TransformOptions::default()).await?;
        self.resolve(tx).await
    }

    /// Fill in the asset id of a transfer from its issuance
    ///
    /// Uncolored transactions and issuances are returned unchanged.
    pub async fn resolve(&self, mut tx: TransformedTransaction) -> Result<TransformedTransaction> {
        match tx.assets.first() {
            None => return Ok(tx),
            Some(data) if data.is_issuance() => return Ok(tx),
            Some(_) => {}
        }

        let mut search = Search {
            visited: HashMap::from([(tx.txid.clone(), 0)]),
            lookups: 0,
            exhausted: false,
            tip_height: self.node.tip_height().await?,
            now: chrono::Utc::now().timestamp(),
        };

        let issuance = match self.search_issuance(&tx, 0, &mut search).await {
            Ok(issuance) => issuance,
            Err(CcError::ProvenanceNotFound(_)) => {
                log::warn!(
                    "No issuance found for {} after {} lookups",
                    tx.txid,
                    search.lookups
                );
                return Err(CcError::ProvenanceNotFound(tx.txid));
            }
            Err(e) => return Err(e),
        };

        log::debug!("Resolved {} to issuance {}", tx.txid, issuance.txid);
        let asset_id = issuance.assets.first().and_then(|data| data.asset_id.clone());
        if let Some(data) = tx.assets.first_mut() {
            data.asset_id = asset_id;
        }
        Ok(tx)
    }

    /// Depth-first walk over the inputs of `tx`, in input order
    fn search_issuance<'a>(
        &'a self,
        tx: &'a TransformedTransaction,
        depth: usize,
        search: &'a mut Search,
    ) -> BoxFuture<'a, Result<TransformedTransaction>> {
        Box::pin(async move {
            if depth >= self.max_depth {
                log::debug!("Depth limit reached at {}", tx.txid);
                return Err(CcError::ProvenanceNotFound(tx.txid.clone()));
            }

            let origin_depth = depth + 1;
            for input in tx.spend_inputs() {
                // Revisit only when reached shallower than before
                let explored = search.visited.get(&input.txid).copied();
                if explored.is_some_and(|seen| seen <= origin_depth) {
                    continue;
                }
                search.visited.insert(input.txid.clone(), origin_depth);
                if search.lookups >= self.max_lookups {
                    search.exhausted = true;
                    return Err(CcError::ProvenanceNotFound(tx.txid.clone()));
                }
                search.lookups += 1;

                let Some(origin) = self.node.get_detailed_transaction(&input.txid).await? else {
                    log::debug!("Origin {} of {} is unknown", input.txid, tx.txid);
                    continue;
                };
                if !origin.outputs.iter().any(is_null_data) {
                    continue;
                }

                let ancestor = self.transformer.transform(
                    &origin,
                    search.tip_height,
                    search.now,
                    &TransformOptions::default(),
                );
                let Some(data) = ancestor.assets.first() else {
                    continue;
                };

                if data.is_issuance() {
                    if data.asset_id.is_some() {
                        return Ok(ancestor);
                    }
                    continue;
                }

                match self.search_issuance(&ancestor, origin_depth, search).await {
                    Ok(found) => return Ok(found),
                    Err(CcError::ProvenanceNotFound(_)) if !search.exhausted => continue,
                    Err(e) => return Err(e),
                }
            }

            Err(CcError::ProvenanceNotFound(tx.txid.clone()))
        })
    }
}
