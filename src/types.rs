//! Chain and asset data shapes shared by every component
//!
//! Raw shapes mirror what the node service hands back. Transformed shapes
//! are the canonical view the funding engine and provenance resolver work
//! on, serialized with the field names external tooling expects.

use serde::{Deserialize, Serialize};

use crate::colored::ColoredData;

/// Kind of colored-coin transaction being built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Issue,
    Send,
    Burn,
}

impl OperationType {
    /// Send and burn move existing assets, so their inputs must be tagged
    pub fn needs_asset_lookup(&self) -> bool {
        !matches!(self, Self::Issue)
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issue => write!(f, "issue"),
            Self::Send => write!(f, "send"),
            Self::Burn => write!(f, "burn"),
        }
    }
}

/// Asset carried by a UTXO or transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTag {
    pub asset_id: String,
    pub amount: u64,
}

/// Spendable output of the funding address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoCandidate {
    pub txid: String,
    #[serde(alias = "vout")]
    pub output_index: u32,
    /// Value in satoshis
    pub value: u64,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub assets: Vec<AssetTag>,
}

impl UtxoCandidate {
    pub fn new(txid: impl Into<String>, output_index: u32, value: u64, confirmations: u32) -> Self {
        Self {
            txid: txid.into(),
            output_index,
            value,
            confirmations,
            assets: Vec::new(),
        }
    }

    pub fn carries(&self, asset_id: &str) -> bool {
        self.assets.iter().any(|tag| tag.asset_id == asset_id)
    }
}

/// Input of a transaction as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    pub prev_txid: String,
    pub output_index: u32,
    pub sequence: u32,
    /// scriptSig (or coinbase data) as hex
    pub script: String,
    pub script_asm: String,
    pub address: Option<String>,
    pub satoshis: u64,
}

/// Output of a transaction as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
    pub satoshis: u64,
    /// scriptPubKey as hex
    pub script: String,
    pub script_asm: String,
    pub address: Option<String>,
    pub spent_txid: Option<String>,
    pub spent_index: Option<u32>,
    pub spent_height: Option<i64>,
}

/// Detailed transaction as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    pub version: i32,
    pub locktime: u32,
    pub coinbase: bool,
    pub inputs: Vec<RawInput>,
    pub outputs: Vec<RawOutput>,
    pub block_hash: Option<String>,
    /// Block height, `-1` while unconfirmed
    pub height: i64,
    pub block_timestamp: Option<i64>,
    pub input_satoshis: u64,
    pub output_satoshis: u64,
    pub fee_satoshis: u64,
    /// Consensus-serialized transaction as hex
    pub hex: String,
}

impl RawTransaction {
    pub fn is_confirmed(&self) -> bool {
        self.height >= 0
    }
}

/// Page of transactions touching an address
#[derive(Debug, Clone, Default)]
pub struct AddressHistory {
    pub items: Vec<RawTransaction>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptSig {
    pub hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinbaseInput {
    pub coinbase: String,
    pub sequence: u32,
    pub n: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendInput {
    pub txid: String,
    pub vout: u32,
    pub sequence: u32,
    pub n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_sig: Option<ScriptSig>,
    pub address: Option<String>,
    pub value_sat: u64,
    pub value: f64,
    #[serde(rename = "doubleSpentTxID")]
    pub double_spent_tx_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TransformedInput {
    Coinbase(CoinbaseInput),
    Spend(SpendInput),
}

impl TransformedInput {
    pub fn as_spend(&self) -> Option<&SpendInput> {
        match self {
            Self::Spend(input) => Some(input),
            Self::Coinbase(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptPubKey {
    pub hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpentInfo {
    pub spent_tx_id: Option<String>,
    pub spent_index: Option<u32>,
    pub spent_height: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedOutput {
    /// Whole-coin value with 8 decimal places
    pub value: String,
    pub n: u32,
    pub script_pub_key: ScriptPubKey,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub spent: Option<SpentInfo>,
}

impl TransformedOutput {
    pub fn first_address(&self) -> Option<&str> {
        self.script_pub_key
            .addresses
            .as_ref()
            .and_then(|addresses| addresses.first())
            .map(String::as_str)
    }
}

/// Canonical view of a chain transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedTransaction {
    pub txid: String,
    pub version: i32,
    pub locktime: u32,
    pub vin: Vec<TransformedInput>,
    pub vout: Vec<TransformedOutput>,
    #[serde(rename = "blockhash")]
    pub block_hash: Option<String>,
    #[serde(rename = "blockheight")]
    pub block_height: i64,
    pub confirmations: u64,
    pub time: i64,
    #[serde(rename = "blocktime", skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(rename = "isCoinBase", skip_serializing_if = "std::ops::Not::not")]
    pub is_coinbase: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_in: Option<f64>,
    pub value_out: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees: Option<f64>,
    /// Size in bytes
    pub size: u64,
    pub assets: Vec<ColoredData>,
}

impl TransformedTransaction {
    /// Address of the first spending input, the sender of a colored transfer
    pub fn first_input_address(&self) -> Option<&str> {
        self.vin
            .first()
            .and_then(TransformedInput::as_spend)
            .and_then(|input| input.address.as_deref())
    }

    pub fn spend_inputs(&self) -> impl Iterator<Item = &SpendInput> {
        self.vin.iter().filter_map(TransformedInput::as_spend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utxo_accepts_vout_alias() {
        let utxo: UtxoCandidate = serde_json::from_value(serde_json::json!({
            "txid": "aa",
            "vout": 2,
            "value": 1500,
        }))
        .unwrap();
        assert_eq!(utxo.output_index, 2);
        assert_eq!(utxo.confirmations, 0);
        assert!(utxo.assets.is_empty());
    }

    #[test]
    fn test_operation_type_serde() {
        assert_eq!(serde_json::to_value(OperationType::Burn).unwrap(), "burn");
        assert!(OperationType::Send.needs_asset_lookup());
        assert!(!OperationType::Issue.needs_asset_lookup());
    }
}
