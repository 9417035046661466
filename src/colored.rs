//! Colored-coin metadata attached to a transaction
//!
//! Decoding the protocol payload out of a transaction is the job of an
//! external parser; this module only defines the decoded shape and the
//! seam the parser plugs into.

use serde::{Deserialize, Serialize};

use crate::types::{AssetTag, TransformedTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Issuance,
    Transfer,
}

/// One movement of asset units inside a colored transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColoredPayment {
    #[serde(default)]
    pub input: Option<u32>,
    /// Index of the receiving output
    pub output: u32,
    pub amount: u64,
    #[serde(default)]
    pub burn: bool,
}

/// Decoded colored-coin data of one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColoredData {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Known for issuances; filled in by provenance resolution for transfers
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub protocol: u32,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub lock_status: Option<bool>,
    #[serde(default)]
    pub aggregation_policy: Option<String>,
    #[serde(default)]
    pub divisibility: Option<u32>,
    #[serde(default)]
    pub payments: Vec<ColoredPayment>,
    #[serde(default)]
    pub multi_sig: Vec<serde_json::Value>,
}

impl ColoredData {
    pub fn issuance(asset_id: impl Into<String>, amount: u64) -> Self {
        Self {
            kind: AssetKind::Issuance,
            asset_id: Some(asset_id.into()),
            amount: Some(amount),
            protocol: 0x4343,
            version: 0x02,
            lock_status: Some(true),
            aggregation_policy: Some("aggregatable".to_string()),
            divisibility: Some(0),
            payments: Vec::new(),
            multi_sig: Vec::new(),
        }
    }

    pub fn transfer(payments: Vec<ColoredPayment>) -> Self {
        Self {
            kind: AssetKind::Transfer,
            asset_id: None,
            amount: None,
            protocol: 0x4343,
            version: 0x02,
            lock_status: None,
            aggregation_policy: None,
            divisibility: None,
            payments,
            multi_sig: Vec::new(),
        }
    }

    pub fn is_issuance(&self) -> bool {
        self.kind == AssetKind::Issuance
    }

    /// Asset tag for UTXO population, `None` until the asset id is known
    ///
    /// The tagged amount is the issued amount, or the sum of non-burn
    /// payments for transfers.
    pub fn tag(&self) -> Option<AssetTag> {
        let asset_id = self.asset_id.clone()?;
        let amount = match (self.kind, self.amount) {
            (AssetKind::Issuance, Some(amount)) => amount,
            _ => self
                .payments
                .iter()
                .filter(|p| !p.burn)
                .map(|p| p.amount)
                .sum(),
        };
        Some(AssetTag { asset_id, amount })
    }
}

/// Decodes colored-coin data out of a transformed transaction
///
/// Returns an empty list for uncolored transactions. Implementations must
/// be pure: the same transaction always yields the same data.
pub trait MetadataParser: Send + Sync {
    fn parse(&self, tx: &TransformedTransaction) -> Vec<ColoredData>;
}

/// Parser that never finds colored data
#[derive(Debug, Clone, Copy, Default)]
pub struct NoColoredData;

impl MetadataParser for NoColoredData {
    fn parse(&self, _tx: &TransformedTransaction) -> Vec<ColoredData> {
        Vec::new()
    }
}
