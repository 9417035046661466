//! Normalization of node transactions into the canonical transformed view
//!
//! The transformer is pure: callers supply the chain tip and the current
//! time, so the same inputs always produce the same output. Colored-coin
//! data is attached by the injected [`MetadataParser`].

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use bitcoin::{Address, AddressType, Network, ScriptBuf, Transaction};
use serde::Serialize;

use crate::colored::MetadataParser;
use crate::fee::sats_to_coins;
use crate::types::{
    CoinbaseInput, RawInput, RawOutput, RawTransaction, ScriptPubKey, ScriptSig, SpendInput,
    SpentInfo, TransformedInput, TransformedOutput, TransformedTransaction,
};

/// Sequence numbers below this signal replace-by-fee
const RBF_SEQUENCE_THRESHOLD: u32 = 0xffff_ffff - 1;

/// Fields to leave out of a transformed transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub no_asm: bool,
    pub no_script_sig: bool,
    pub no_spent: bool,
}

/// Compact summary of a transaction seen on the network inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvTransaction {
    pub txid: String,
    pub value_out: f64,
    /// One `{address: satoshis}` entry per output with a decodable address
    pub vout: Vec<BTreeMap<String, u64>>,
    #[serde(rename = "isRBF")]
    pub is_rbf: bool,
}

#[derive(Clone)]
pub struct Transformer {
    parser: Arc<dyn MetadataParser>,
    network: Network,
}

impl Transformer {
    pub fn new(parser: Arc<dyn MetadataParser>, network: Network) -> Self {
        Self { parser, network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Transform a node transaction relative to `tip_height`
    ///
    /// `now` (unix seconds) stands in for the block time of unconfirmed
    /// transactions.
    pub fn transform(
        &self,
        raw: &RawTransaction,
        tip_height: u64,
        now: i64,
        options: &TransformOptions,
    ) -> TransformedTransaction {
        let confirmations = if raw.height >= 0 {
            (tip_height as i64 - raw.height + 1).max(0) as u64
        } else {
            0
        };

        let vin = if raw.coinbase {
            raw.inputs
                .first()
                .map(|input| {
                    vec![TransformedInput::Coinbase(CoinbaseInput {
                        coinbase: input.script.clone(),
                        sequence: input.sequence,
                        n: 0,
                    })]
                })
                .unwrap_or_default()
        } else {
            raw.inputs
                .iter()
                .enumerate()
                .map(|(n, input)| {
                    TransformedInput::Spend(transform_input(input, n as u32, options))
                })
                .collect()
        };

        let vout = raw
            .outputs
            .iter()
            .enumerate()
            .map(|(n, output)| transform_output(output, n as u32, options))
            .collect();

        let time = raw.block_timestamp.unwrap_or(now);

        let mut transformed = TransformedTransaction {
            txid: raw.hash.clone(),
            version: raw.version,
            locktime: raw.locktime,
            vin,
            vout,
            block_hash: raw.block_hash.clone(),
            block_height: raw.height,
            confirmations,
            time,
            block_time: (confirmations > 0).then_some(time),
            is_coinbase: raw.coinbase,
            value_in: (!raw.coinbase).then(|| sats_to_coins(raw.input_satoshis)),
            value_out: sats_to_coins(raw.output_satoshis),
            fees: (!raw.coinbase).then(|| sats_to_coins(raw.fee_satoshis)),
            size: (raw.hex.len() / 2) as u64,
            assets: Vec::new(),
        };
        transformed.assets = self.parser.parse(&transformed);
        transformed
    }

    /// Summarize a decoded transaction for inventory notifications
    pub fn transform_inv_transaction(&self, tx: &Transaction) -> InvTransaction {
        let mut value_out = 0u64;
        let mut vout = Vec::new();
        for output in &tx.output {
            let sats = output.value.to_sat();
            value_out = value_out.saturating_add(sats);
            if let Ok(address) = Address::from_script(&output.script_pubkey, self.network) {
                let mut entry = BTreeMap::new();
                entry.insert(address.to_string(), sats);
                vout.push(entry);
            }
        }

        InvTransaction {
            txid: tx.compute_txid().to_string(),
            value_out: sats_to_coins(value_out),
            vout,
            is_rbf: tx
                .input
                .iter()
                .any(|input| input.sequence.0 < RBF_SEQUENCE_THRESHOLD),
        }
    }
}

fn transform_input(input: &RawInput, n: u32, options: &TransformOptions) -> SpendInput {
    let script_sig = (!options.no_script_sig).then(|| ScriptSig {
        hex: input.script.clone(),
        asm: (!options.no_asm).then(|| input.script_asm.clone()),
    });

    SpendInput {
        txid: input.prev_txid.clone(),
        vout: input.output_index,
        sequence: input.sequence,
        n,
        script_sig,
        address: input.address.clone(),
        value_sat: input.satoshis,
        value: sats_to_coins(input.satoshis),
        double_spent_tx_id: None,
    }
}

fn transform_output(output: &RawOutput, n: u32, options: &TransformOptions) -> TransformedOutput {
    let mut script_pub_key = ScriptPubKey {
        hex: output.script.clone(),
        asm: (!options.no_asm).then(|| output.script_asm.clone()),
        addresses: None,
        kind: None,
    };
    if let Some(address) = &output.address {
        script_pub_key.addresses = Some(vec![address.clone()]);
        script_pub_key.kind = address_type(address);
    }

    TransformedOutput {
        value: format!("{:.8}", sats_to_coins(output.satoshis)),
        n,
        script_pub_key,
        spent: (!options.no_spent).then(|| SpentInfo {
            spent_tx_id: output.spent_txid.clone(),
            spent_index: output.spent_index,
            spent_height: output.spent_height,
        }),
    }
}

/// Script type label of an encoded address, `None` when it does not parse
pub fn address_type(address: &str) -> Option<String> {
    let address = Address::from_str(address).ok()?.assume_checked();
    let label = match address.address_type()? {
        AddressType::P2pkh => "pubkeyhash",
        AddressType::P2sh => "scripthash",
        AddressType::P2wpkh => "witness_v0_keyhash",
        AddressType::P2wsh => "witness_v0_scripthash",
        AddressType::P2tr => "witness_v1_taproot",
        _ => "unknown",
    };
    Some(label.to_string())
}

/// Whether an output script is a null-data (OP_RETURN) script
///
/// Falls back to the node's assembly when the hex does not decode.
pub fn is_null_data(output: &RawOutput) -> bool {
    match ScriptBuf::from_hex(&output.script) {
        Ok(script) if !script.is_empty() => script.is_op_return(),
        _ => output.script_asm.starts_with("OP_RETURN"),
    }
}
