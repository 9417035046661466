//! Persistent asset records
//!
//! One record is stored per colored entry of a confirmed or seen colored
//! transaction. Payments are denormalized with the address of the output
//! they pay so summaries never need the chain.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::colored::{AssetKind, ColoredData};
use crate::error::CcError;
use crate::types::TransformedTransaction;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub input: Option<u32>,
    pub output: u32,
    pub amount: u64,
    #[serde(default)]
    pub burn: bool,
    /// Address of the paid output, if it has one
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub asset_id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Paid addresses plus the sender
    pub addresses: BTreeSet<String>,
    pub payments: Vec<Payment>,
    pub protocol: u32,
    pub version: u32,
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub lock_status: Option<bool>,
    #[serde(default)]
    pub aggregation_policy: Option<String>,
    #[serde(default)]
    pub divisibility: Option<u32>,
    #[serde(default)]
    pub multi_sig: Vec<serde_json::Value>,
}

impl AssetRecord {
    /// Records for every colored entry of a resolved transaction
    ///
    /// Fails without producing anything if any entry lacks an asset id or
    /// pays an output the transaction does not have.
    pub fn from_transaction(tx: &TransformedTransaction) -> Result<Vec<AssetRecord>> {
        let timestamp = DateTime::<Utc>::from_timestamp(tx.time, 0)
            .ok_or_else(|| CcError::invalid(format!("{} has invalid time {}", tx.txid, tx.time)))?;

        for (index, data) in tx.assets.iter().enumerate() {
            if data.asset_id.as_deref().map_or(true, str::is_empty) {
                return Err(CcError::invalid(format!(
                    "colored entry {} of {} has no asset id",
                    index, tx.txid
                )));
            }
            if let Some(payment) = data
                .payments
                .iter()
                .find(|p| p.output as usize >= tx.vout.len())
            {
                return Err(CcError::invalid(format!(
                    "payment to output {} of {} which has {} outputs",
                    payment.output,
                    tx.txid,
                    tx.vout.len()
                )));
            }
        }

        Ok(tx
            .assets
            .iter()
            .map(|data| Self::from_colored(tx, data, timestamp))
            .collect())
    }

    fn from_colored(
        tx: &TransformedTransaction,
        data: &ColoredData,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut addresses = BTreeSet::new();
        let payments = data
            .payments
            .iter()
            .map(|p| {
                let address = tx
                    .vout
                    .get(p.output as usize)
                    .and_then(|out| out.first_address())
                    .map(str::to_string);
                if let Some(address) = &address {
                    addresses.insert(address.clone());
                }
                Payment {
                    input: p.input,
                    output: p.output,
                    amount: p.amount,
                    burn: p.burn,
                    address,
                }
            })
            .collect();
        if let Some(sender) = tx.first_input_address() {
            addresses.insert(sender.to_string());
        }

        Self {
            hash: tx.txid.clone(),
            timestamp,
            asset_id: data.asset_id.clone().unwrap_or_default(),
            kind: data.kind,
            addresses,
            payments,
            protocol: data.protocol,
            version: data.version,
            amount: data.amount,
            lock_status: data.lock_status,
            aggregation_policy: data.aggregation_policy.clone(),
            divisibility: data.divisibility,
            multi_sig: data.multi_sig.clone(),
        }
    }

    pub fn is_issuance(&self) -> bool {
        self.kind == AssetKind::Issuance
    }

    pub fn unix_timestamp(&self) -> i64 {
        self.timestamp.timestamp()
    }
}
