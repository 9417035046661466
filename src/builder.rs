//! Transaction builder seam and build request bodies
//!
//! The overlay never encodes colored-coin payloads itself. It hands the
//! request body and a set of funding UTXOs to a [`ColoredTxBuilder`] and
//! only looks at the shape of what comes back.

use serde::{Deserialize, Serialize};

use crate::types::{OperationType, UtxoCandidate};
use crate::Result;

/// Destination of asset units in a send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub address: Option<String>,
    pub amount: u64,
    #[serde(default)]
    pub asset_id: Option<String>,
}

/// Asset units destroyed by a burn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnEntry {
    pub asset_id: String,
    pub amount: u64,
}

/// Caller-supplied description of the transaction to build
///
/// Only the fields the funding engine reads are typed; everything else is
/// carried through to the builder untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_address: Option<String>,
    /// Sender addresses; the first one funds a send or burn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<Recipient>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub burn: Vec<BurnEntry>,
    #[serde(default)]
    pub amount: u64,
    /// Explicit funding set; disables automatic selection and top-up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utxos: Option<Vec<UtxoCandidate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nb_blocks: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BuildBody {
    /// Address whose UTXOs fund the transaction
    pub fn funding_address(&self, operation: OperationType) -> Option<&str> {
        let address = match operation {
            OperationType::Issue => self.issue_address.as_deref(),
            OperationType::Send | OperationType::Burn => self.from.first().map(String::as_str),
        };
        address.filter(|a| !a.is_empty())
    }

    /// Asset units the transaction moves, on top of the mining fee
    pub fn requested_amount(&self, operation: OperationType) -> Option<u64> {
        match operation {
            OperationType::Issue => Some(self.amount),
            OperationType::Send => self.to.first().map(|r| r.amount),
            OperationType::Burn => self
                .burn
                .first()
                .map(|b| b.amount)
                .or_else(|| self.to.first().map(|r| r.amount)),
        }
    }

    /// `(asset id, amount)` pairs a send or burn asks for
    pub fn requested_assets(&self) -> Vec<(&str, u64)> {
        self.to
            .iter()
            .filter_map(|r| r.asset_id.as_deref().map(|id| (id, r.amount)))
            .chain(self.burn.iter().map(|b| (b.asset_id.as_str(), b.amount)))
            .collect()
    }
}

/// Unsigned transaction produced by a builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub tx_hex: String,
    /// Asset id minted by an issuance
    pub asset_id: Option<String>,
    pub input_count: usize,
    pub output_count: usize,
}

impl BuiltTransaction {
    pub fn from_transaction(tx: &bitcoin::Transaction, asset_id: Option<String>) -> Self {
        Self {
            tx_hex: bitcoin::consensus::encode::serialize_hex(tx),
            asset_id,
            input_count: tx.input.len(),
            output_count: tx.output.len(),
        }
    }
}

/// Result of a successful funding request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    pub tx_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

/// Builds an unsigned colored-coin transaction from a body and a UTXO set
pub trait ColoredTxBuilder: Send + Sync {
    fn build(
        &self,
        operation: OperationType,
        body: &BuildBody,
        utxos: &[UtxoCandidate],
    ) -> Result<BuiltTransaction>;
}
