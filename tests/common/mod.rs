//! Shared test doubles for the cc-assets integration tests
//!
//! - `MockNode`: scripted node service with per-txid delays and failures
//! - `FakeParser`: colored data registered per txid
//! - `MockBuilder`: builds real unsigned transactions over the chosen UTXOs

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, WPubkeyHash, Witness,
};

use cc_assets::{
    AddressHistory, AssetService, AssetStore, BuildBody, BuiltTransaction, CcError, ColoredData,
    ColoredTxBuilder, FundingEngine, FundingLimits, MetadataParser, NodeService, OperationType,
    ProvenanceResolver, RawInput, RawOutput, RawTransaction, ServiceConfig, TransformedTransaction,
    Transformer, UtxoCandidate,
};

pub const TIP_HEIGHT: u64 = 1_000;

// ============================================================================
// Helpers
// ============================================================================

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic 64-hex txid from a counter
pub fn txid(n: u32) -> String {
    format!("{:064x}", n)
}

pub fn op_return_output() -> RawOutput {
    RawOutput {
        satoshis: 0,
        script: "6a0443430201".to_string(),
        script_asm: "OP_RETURN 43430201".to_string(),
        address: None,
        spent_txid: None,
        spent_index: None,
        spent_height: None,
    }
}

pub fn pay_output(address: &str, satoshis: u64) -> RawOutput {
    RawOutput {
        satoshis,
        script: format!("0014{}", "11".repeat(20)),
        script_asm: format!("OP_0 OP_PUSHBYTES_20 {}", "11".repeat(20)),
        address: Some(address.to_string()),
        spent_txid: None,
        spent_index: None,
        spent_height: None,
    }
}

pub fn spend(prev_txid: &str, output_index: u32, address: Option<&str>, satoshis: u64) -> RawInput {
    RawInput {
        prev_txid: prev_txid.to_string(),
        output_index,
        sequence: 0xffff_ffff,
        script: String::new(),
        script_asm: String::new(),
        address: address.map(str::to_string),
        satoshis,
    }
}

/// Confirmed ordinary transaction at `height`
pub fn raw_tx(
    hash: &str,
    inputs: Vec<RawInput>,
    outputs: Vec<RawOutput>,
    height: i64,
) -> RawTransaction {
    let input_satoshis: u64 = inputs.iter().map(|i| i.satoshis).sum();
    let output_satoshis: u64 = outputs.iter().map(|o| o.satoshis).sum();
    RawTransaction {
        hash: hash.to_string(),
        version: 2,
        locktime: 0,
        coinbase: false,
        inputs,
        outputs,
        block_hash: (height >= 0).then(|| format!("{:064x}", height)),
        height,
        block_timestamp: (height >= 0).then_some(1_700_000_000 + height),
        input_satoshis,
        output_satoshis,
        fee_satoshis: input_satoshis.saturating_sub(output_satoshis),
        hex: "00".repeat(120),
    }
}

pub fn utxo(hash: &str, output_index: u32, value: u64, confirmations: u32) -> UtxoCandidate {
    UtxoCandidate::new(hash, output_index, value, confirmations)
}

// ============================================================================
// MockNode
// ============================================================================

pub struct MockNode {
    txs: Mutex<HashMap<String, RawTransaction>>,
    utxos: Mutex<HashMap<String, Vec<UtxoCandidate>>>,
    blocks: Mutex<HashMap<String, Vec<String>>>,
    history: Mutex<HashMap<String, Vec<RawTransaction>>>,
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    fee_estimate: Mutex<f64>,
    tip: AtomicU64,
    pub lookups: Mutex<Vec<String>>,
    pub broadcast: Mutex<Vec<String>>,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            txs: Mutex::new(HashMap::new()),
            utxos: Mutex::new(HashMap::new()),
            blocks: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            // 10_000 sat/kB
            fee_estimate: Mutex::new(0.0001),
            tip: AtomicU64::new(TIP_HEIGHT),
            lookups: Mutex::new(Vec::new()),
            broadcast: Mutex::new(Vec::new()),
        }
    }

    pub fn add_tx(&self, tx: RawTransaction) {
        self.txs.lock().unwrap().insert(tx.hash.clone(), tx);
    }

    pub fn set_utxos(&self, address: &str, utxos: Vec<UtxoCandidate>) {
        self.utxos.lock().unwrap().insert(address.to_string(), utxos);
    }

    pub fn set_block(&self, hash: &str, txids: Vec<String>) {
        self.blocks.lock().unwrap().insert(hash.to_string(), txids);
    }

    pub fn set_history(&self, address: &str, txs: Vec<RawTransaction>) {
        self.history.lock().unwrap().insert(address.to_string(), txs);
    }

    pub fn delay(&self, key: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
    }

    /// Make every request naming `key` (txid or address) fail
    pub fn fail(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn set_fee_estimate(&self, coins_per_kb: f64) {
        *self.fee_estimate.lock().unwrap() = coins_per_kb;
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }

    async fn gate(&self, key: &str) -> cc_assets::Result<()> {
        let delay = self.delays.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(key) {
            return Err(CcError::node(format!("connection reset while fetching {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeService for MockNode {
    async fn get_detailed_transaction(
        &self,
        txid: &str,
    ) -> cc_assets::Result<Option<RawTransaction>> {
        self.lookups.lock().unwrap().push(txid.to_string());
        self.gate(txid).await?;
        Ok(self.txs.lock().unwrap().get(txid).cloned())
    }

    async fn get_raw_transaction_hex(&self, txid: &str) -> cc_assets::Result<Option<String>> {
        self.gate(txid).await?;
        Ok(self.txs.lock().unwrap().get(txid).map(|tx| tx.hex.clone()))
    }

    async fn estimate_fee(&self, _target_blocks: u32) -> cc_assets::Result<f64> {
        Ok(*self.fee_estimate.lock().unwrap())
    }

    async fn get_utxos(&self, address: &str) -> cc_assets::Result<Vec<UtxoCandidate>> {
        self.gate(address).await?;
        Ok(self.utxos.lock().unwrap().get(address).cloned().unwrap_or_default())
    }

    async fn get_address_history(
        &self,
        address: &str,
        from: usize,
        to: usize,
    ) -> cc_assets::Result<AddressHistory> {
        self.gate(address).await?;
        let all = self.history.lock().unwrap().get(address).cloned().unwrap_or_default();
        Ok(AddressHistory {
            total_count: all.len(),
            items: all.into_iter().skip(from).take(to.saturating_sub(from)).collect(),
        })
    }

    async fn get_block_txids(&self, block_hash: &str) -> cc_assets::Result<Option<Vec<String>>> {
        self.gate(block_hash).await?;
        Ok(self.blocks.lock().unwrap().get(block_hash).cloned())
    }

    async fn send_transaction(&self, tx_hex: &str) -> cc_assets::Result<String> {
        self.broadcast.lock().unwrap().push(tx_hex.to_string());
        Ok(txid(9_999))
    }

    async fn tip_height(&self) -> cc_assets::Result<u64> {
        Ok(self.tip.load(Ordering::SeqCst))
    }
}

// ============================================================================
// FakeParser
// ============================================================================

#[derive(Default)]
pub struct FakeParser {
    colored: Mutex<HashMap<String, Vec<ColoredData>>>,
}

impl FakeParser {
    pub fn register(&self, txid: &str, data: Vec<ColoredData>) {
        self.colored.lock().unwrap().insert(txid.to_string(), data);
    }
}

impl MetadataParser for FakeParser {
    fn parse(&self, tx: &TransformedTransaction) -> Vec<ColoredData> {
        self.colored
            .lock()
            .unwrap()
            .get(&tx.txid)
            .cloned()
            .unwrap_or_default()
    }
}

// ============================================================================
// MockBuilder
// ============================================================================

/// Builds `outputs` outputs (an OP_RETURN first) over the chosen UTXOs
pub struct MockBuilder {
    outputs: usize,
    fail: bool,
    pub input_counts: Mutex<Vec<usize>>,
}

impl MockBuilder {
    pub fn new(outputs: usize) -> Self {
        Self {
            outputs,
            fail: false,
            input_counts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            outputs: 1,
            fail: true,
            input_counts: Mutex::new(Vec::new()),
        }
    }

    pub fn builds(&self) -> usize {
        self.input_counts.lock().unwrap().len()
    }
}

impl ColoredTxBuilder for MockBuilder {
    fn build(
        &self,
        operation: OperationType,
        _body: &BuildBody,
        utxos: &[UtxoCandidate],
    ) -> cc_assets::Result<BuiltTransaction> {
        if self.fail {
            return Err(CcError::Builder("codec rejected the request".to_string()));
        }
        self.input_counts.lock().unwrap().push(utxos.len());

        let input = utxos
            .iter()
            .map(|u| {
                let txid = Txid::from_str(&u.txid).map_err(|e| CcError::Builder(e.to_string()))?;
                Ok(TxIn {
                    previous_output: OutPoint::new(txid, u.output_index),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::default(),
                })
            })
            .collect::<cc_assets::Result<Vec<_>>>()?;

        let mut output = vec![TxOut {
            value: Amount::ZERO,
            script_pubkey: ScriptBuf::new_op_return(&[0x43u8; 32]),
        }];
        while output.len() < self.outputs {
            let n = output.len() as u8;
            output.push(TxOut {
                value: Amount::from_sat(600),
                script_pubkey: ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([n; 20])),
            });
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        };
        let asset_id = (operation == OperationType::Issue)
            .then(|| format!("La{}", &tx.compute_txid().to_string()[..16]));
        Ok(BuiltTransaction::from_transaction(&tx, asset_id))
    }
}

// ============================================================================
// Fixture
// ============================================================================

pub struct Fixture {
    pub node: Arc<MockNode>,
    pub parser: Arc<FakeParser>,
    pub builder: Arc<MockBuilder>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_builder(MockBuilder::new(3))
    }

    pub fn with_builder(builder: MockBuilder) -> Self {
        init_logging();
        Self {
            node: Arc::new(MockNode::new()),
            parser: Arc::new(FakeParser::default()),
            builder: Arc::new(builder),
        }
    }

    /// Register a transaction with the node and its colored data with the parser
    pub fn add_tx(&self, tx: RawTransaction, colored: Vec<ColoredData>) {
        if !colored.is_empty() {
            self.parser.register(&tx.hash, colored);
        }
        self.node.add_tx(tx);
    }

    pub fn transformer(&self) -> Transformer {
        Transformer::new(self.parser.clone(), bitcoin::Network::Regtest)
    }

    pub fn resolver(&self) -> ProvenanceResolver {
        let config = ServiceConfig::default();
        ProvenanceResolver::from_config(self.node.clone(), self.transformer(), &config)
    }

    pub fn resolver_with_bounds(&self, max_depth: usize, max_lookups: usize) -> ProvenanceResolver {
        ProvenanceResolver::new(self.node.clone(), self.transformer(), max_depth, max_lookups)
    }

    pub fn engine(&self) -> FundingEngine {
        FundingEngine::new(
            self.node.clone(),
            self.resolver(),
            self.builder.clone(),
            FundingLimits::default(),
        )
    }

    pub fn service(&self, store: Arc<dyn AssetStore>) -> AssetService {
        let config = ServiceConfig {
            network: bitcoin::Network::Regtest,
            ..ServiceConfig::default()
        };
        AssetService::new(
            &config,
            self.node.clone(),
            self.parser.clone(),
            self.builder.clone(),
            store,
        )
    }
}
