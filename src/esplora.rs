//! Esplora-backed node service
//!
//! Talks to an Esplora REST API (mempool.space or a local electrs) and maps
//! its JSON into the node-level shapes in [`crate::types`]. A 404 means the
//! object is unknown; every other failure is a node outage.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use crate::config::ServiceConfig;
use crate::error::CcError;
use crate::node::NodeService;
use crate::types::{AddressHistory, RawInput, RawOutput, RawTransaction, UtxoCandidate};
use crate::Result;

/// Esplora returns at most this many confirmed transactions per history page
const CHAIN_PAGE_SIZE: usize = 25;

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
    block_height: Option<i64>,
    block_hash: Option<String>,
    block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EsploraPrevout {
    scriptpubkey: String,
    #[serde(default)]
    scriptpubkey_asm: String,
    scriptpubkey_address: Option<String>,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraVin {
    txid: String,
    vout: u32,
    prevout: Option<EsploraPrevout>,
    #[serde(default)]
    scriptsig: String,
    #[serde(default)]
    scriptsig_asm: String,
    #[serde(default)]
    is_coinbase: bool,
    sequence: u32,
}

#[derive(Debug, Deserialize)]
struct EsploraVout {
    scriptpubkey: String,
    #[serde(default)]
    scriptpubkey_asm: String,
    scriptpubkey_address: Option<String>,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    version: i32,
    locktime: u32,
    vin: Vec<EsploraVin>,
    vout: Vec<EsploraVout>,
    #[serde(default)]
    fee: u64,
    status: EsploraStatus,
}

#[derive(Debug, Default, Deserialize)]
struct EsploraOutspend {
    spent: bool,
    txid: Option<String>,
    vin: Option<u32>,
    status: Option<EsploraStatus>,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    status: EsploraStatus,
}

#[derive(Debug, Default, Deserialize)]
struct EsploraTxStats {
    tx_count: usize,
}

#[derive(Debug, Deserialize)]
struct EsploraAddress {
    #[serde(default)]
    chain_stats: EsploraTxStats,
    #[serde(default)]
    mempool_stats: EsploraTxStats,
}

pub struct EsploraNode {
    client: reqwest::Client,
    base_url: String,
}

impl EsploraNode {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.esplora_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a path, `None` on 404
    async fn get(&self, path: &str) -> Result<Option<Response>> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CcError::node(format!("GET {} failed ({}): {}", path, status, body)));
        }
        Ok(Some(response))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path).await? {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }

    async fn get_text(&self, path: &str) -> Result<Option<String>> {
        match self.get(path).await? {
            Some(response) => Ok(Some(response.text().await?.trim().to_string())),
            None => Ok(None),
        }
    }

    async fn raw_transaction(&self, tx: EsploraTx) -> Result<RawTransaction> {
        let outspends: Vec<EsploraOutspend> = self
            .get_json(&format!("/tx/{}/outspends", tx.txid))
            .await?
            .unwrap_or_default();
        let hex = self
            .get_text(&format!("/tx/{}/hex", tx.txid))
            .await?
            .unwrap_or_default();
        Ok(map_transaction(tx, &outspends, hex))
    }

    async fn chain_page(&self, address: &str, after: Option<&str>) -> Result<Vec<EsploraTx>> {
        let path = match after {
            Some(last) => format!("/address/{}/txs/chain/{}", address, last),
            None => format!("/address/{}/txs", address),
        };
        Ok(self.get_json(&path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl NodeService for EsploraNode {
    async fn get_detailed_transaction(&self, txid: &str) -> Result<Option<RawTransaction>> {
        let Some(tx) = self.get_json::<EsploraTx>(&format!("/tx/{}", txid)).await? else {
            return Ok(None);
        };
        Ok(Some(self.raw_transaction(tx).await?))
    }

    async fn get_raw_transaction_hex(&self, txid: &str) -> Result<Option<String>> {
        self.get_text(&format!("/tx/{}/hex", txid)).await
    }

    async fn estimate_fee(&self, target_blocks: u32) -> Result<f64> {
        let estimates: std::collections::HashMap<String, f64> = self
            .get_json("/fee-estimates")
            .await?
            .unwrap_or_default();
        Ok(pick_fee_estimate(&estimates, target_blocks)
            .map(sat_per_vbyte_to_coin_per_kb)
            .unwrap_or(-1.0))
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<UtxoCandidate>> {
        let utxos: Vec<EsploraUtxo> = self
            .get_json(&format!("/address/{}/utxo", address))
            .await?
            .unwrap_or_default();
        let tip = self.tip_height().await?;

        Ok(utxos
            .into_iter()
            .map(|utxo| {
                let confirmations = match (utxo.status.confirmed, utxo.status.block_height) {
                    (true, Some(height)) if height >= 0 => {
                        (tip.saturating_sub(height as u64) + 1) as u32
                    }
                    _ => 0,
                };
                UtxoCandidate::new(utxo.txid, utxo.vout, utxo.value, confirmations)
            })
            .collect())
    }

    async fn get_address_history(
        &self,
        address: &str,
        from: usize,
        to: usize,
    ) -> Result<AddressHistory> {
        let stats: Option<EsploraAddress> = self.get_json(&format!("/address/{}", address)).await?;
        let total_count = stats
            .map(|s| s.chain_stats.tx_count + s.mempool_stats.tx_count)
            .unwrap_or(0);

        let mut collected: Vec<EsploraTx> = self.chain_page(address, None).await?;
        while collected.len() < to && collected.len() < total_count {
            let last_confirmed = collected
                .iter()
                .rev()
                .find(|tx| tx.status.confirmed)
                .map(|tx| tx.txid.clone());
            let Some(last) = last_confirmed else { break };
            let page = self.chain_page(address, Some(&last)).await?;
            let exhausted = page.len() < CHAIN_PAGE_SIZE;
            collected.extend(page);
            if exhausted {
                break;
            }
        }

        let mut items = Vec::new();
        for tx in collected.into_iter().skip(from).take(to.saturating_sub(from)) {
            items.push(self.raw_transaction(tx).await?);
        }
        Ok(AddressHistory { items, total_count })
    }

    async fn get_block_txids(&self, block_hash: &str) -> Result<Option<Vec<String>>> {
        self.get_json(&format!("/block/{}/txids", block_hash)).await
    }

    async fn send_transaction(&self, tx_hex: &str) -> Result<String> {
        let url = format!("{}/tx", self.base_url);
        log::debug!("Broadcasting transaction to: {}", url);
        let response = self.client.post(&url).body(tx_hex.to_string()).send().await?;
        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CcError::node(format!("Broadcast failed: {}", error_text)));
        }
        Ok(response.text().await?.trim().to_string())
    }

    async fn tip_height(&self) -> Result<u64> {
        let height = self
            .get_text("/blocks/tip/height")
            .await?
            .ok_or_else(|| CcError::node("tip height unavailable"))?;
        height
            .parse()
            .map_err(|e| CcError::node(format!("bad tip height '{}': {}", height, e)))
    }
}

fn map_transaction(tx: EsploraTx, outspends: &[EsploraOutspend], hex: String) -> RawTransaction {
    let coinbase = tx.vin.first().map_or(false, |vin| vin.is_coinbase);

    let inputs: Vec<RawInput> = tx
        .vin
        .into_iter()
        .map(|vin| {
            let (address, satoshis) = vin
                .prevout
                .map(|p| (p.scriptpubkey_address, p.value))
                .unwrap_or((None, 0));
            RawInput {
                prev_txid: vin.txid,
                output_index: vin.vout,
                sequence: vin.sequence,
                script: vin.scriptsig,
                script_asm: vin.scriptsig_asm,
                address,
                satoshis,
            }
        })
        .collect();

    let outputs: Vec<RawOutput> = tx
        .vout
        .into_iter()
        .enumerate()
        .map(|(index, vout)| {
            let spend = outspends.get(index).filter(|s| s.spent);
            RawOutput {
                satoshis: vout.value,
                script: vout.scriptpubkey,
                script_asm: vout.scriptpubkey_asm,
                address: vout.scriptpubkey_address,
                spent_txid: spend.and_then(|s| s.txid.clone()),
                spent_index: spend.and_then(|s| s.vin),
                spent_height: spend
                    .and_then(|s| s.status.as_ref())
                    .and_then(|status| status.block_height),
            }
        })
        .collect();

    let input_satoshis = inputs.iter().map(|i| i.satoshis).sum();
    let output_satoshis = outputs.iter().map(|o| o.satoshis).sum();

    RawTransaction {
        hash: tx.txid,
        version: tx.version,
        locktime: tx.locktime,
        coinbase,
        inputs,
        outputs,
        block_hash: tx.status.block_hash,
        height: if tx.status.confirmed {
            tx.status.block_height.unwrap_or(-1)
        } else {
            -1
        },
        block_timestamp: tx.status.block_time,
        input_satoshis,
        output_satoshis,
        fee_satoshis: tx.fee,
        hex,
    }
}

/// Estimate for `target` blocks, or the nearest slower target available
fn pick_fee_estimate(
    estimates: &std::collections::HashMap<String, f64>,
    target: u32,
) -> Option<f64> {
    let mut targets: Vec<(u32, f64)> = estimates
        .iter()
        .filter_map(|(blocks, rate)| blocks.parse().ok().map(|b| (b, *rate)))
        .collect();
    targets.sort_by_key(|(blocks, _)| *blocks);
    targets
        .iter()
        .find(|(blocks, _)| *blocks >= target)
        .or_else(|| targets.last())
        .map(|(_, rate)| *rate)
}

/// sat/vB (Esplora) to whole coins per kB (node fee estimate unit)
fn sat_per_vbyte_to_coin_per_kb(sat_per_vbyte: f64) -> f64 {
    sat_per_vbyte * 1000.0 / crate::fee::COIN
}
