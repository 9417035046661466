//! Node service seam
//!
//! Everything the overlay needs from a Bitcoin full node goes through
//! [`NodeService`]. The production implementation is
//! [`EsploraNode`](crate::esplora::EsploraNode); tests plug in scripted
//! fakes.

use async_trait::async_trait;

use crate::error::CcError;
use crate::types::{AddressHistory, RawTransaction, UtxoCandidate};
use crate::Result;

#[async_trait]
pub trait NodeService: Send + Sync {
    /// Detailed transaction, `None` when the node does not know it
    async fn get_detailed_transaction(&self, txid: &str) -> Result<Option<RawTransaction>>;

    /// Consensus-serialized transaction hex, `None` when unknown
    async fn get_raw_transaction_hex(&self, txid: &str) -> Result<Option<String>>;

    /// Fee estimate in whole coins per kB for confirmation within
    /// `target_blocks`; negative when the node cannot estimate
    async fn estimate_fee(&self, target_blocks: u32) -> Result<f64>;

    /// Unspent outputs of an address
    async fn get_utxos(&self, address: &str) -> Result<Vec<UtxoCandidate>>;

    /// Transactions touching an address, items `from..to` newest first
    async fn get_address_history(&self, address: &str, from: usize, to: usize)
        -> Result<AddressHistory>;

    /// Transaction ids of a block, `None` when the block is unknown
    async fn get_block_txids(&self, block_hash: &str) -> Result<Option<Vec<String>>>;

    /// Broadcast a signed transaction, returning its txid
    async fn send_transaction(&self, tx_hex: &str) -> Result<String>;

    /// Height of the best block
    async fn tip_height(&self) -> Result<u64>;
}

/// Fetch a transaction the caller expects to exist
pub async fn require_transaction(node: &dyn NodeService, txid: &str) -> Result<RawTransaction> {
    node.get_detailed_transaction(txid)
        .await?
        .ok_or_else(|| CcError::TransactionNotFound(txid.to_string()))
}
