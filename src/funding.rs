//! UTXO funding engine
//!
//! Chooses the inputs that pay for a colored-coin transaction. The engine
//! builds a trial transaction, prices it with the fee model, and tops up
//! the input set until the collected value covers fee plus amount.
//!
//! The loop is an explicit state machine: every transition consumes the
//! session and returns the next state, so a request can only end in one
//! [`FundingState::Funded`] or one [`FundingState::Failed`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::builder::{BuildBody, BuildResponse, BuiltTransaction, ColoredTxBuilder};
use crate::config::ServiceConfig;
use crate::error::CcError;
use crate::fee::{
    fee_rate_from_estimate, mining_fee, DEFAULT_FEE_TARGET_BLOCKS, MAX_TOPUP_ITERATIONS,
    MAX_UTXOS_PER_BATCH, MINIMUM_FEE,
};
use crate::node::NodeService;
use crate::provenance::ProvenanceResolver;
use crate::types::{AssetTag, OperationType, UtxoCandidate};
use crate::Result;

/// Loop bounds for one funding request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingLimits {
    pub fee_target_blocks: u32,
    pub max_iterations: u32,
    pub max_batch: usize,
}

impl Default for FundingLimits {
    fn default() -> Self {
        Self {
            fee_target_blocks: DEFAULT_FEE_TARGET_BLOCKS,
            max_iterations: MAX_TOPUP_ITERATIONS,
            max_batch: MAX_UTXOS_PER_BATCH,
        }
    }
}

impl From<&ServiceConfig> for FundingLimits {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            fee_target_blocks: config.fee_target_blocks,
            max_iterations: config.max_topup_iterations,
            max_batch: config.max_utxos_per_batch,
        }
    }
}

/// Working state of one funding request
#[derive(Debug, Clone)]
pub struct FundingSession {
    pub operation: OperationType,
    pub body: BuildBody,
    /// Candidates in selection order
    pub candidates: Vec<UtxoCandidate>,
    /// Candidates before this index are chosen
    pub cursor: usize,
    /// Trial builds evaluated so far
    pub builds: u32,
    pub value_needed: u64,
    pub amount: u64,
    /// Satoshis per kB, fixed for the whole request
    pub fee_rate_per_kb: u64,
    /// Explicit funding sets are never topped up
    pub explicit: bool,
}

/// Outcome of a funded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundedTransaction {
    pub built: BuiltTransaction,
    pub chosen: Vec<UtxoCandidate>,
    pub fee: u64,
    pub value_needed: u64,
    pub collected: u64,
    pub builds: u32,
}

#[derive(Debug)]
pub enum FundingState {
    Selecting(FundingSession),
    Building(FundingSession),
    Evaluating(FundingSession, BuiltTransaction),
    Funded(FundedTransaction),
    Failed(CcError),
}

impl FundingSession {
    pub fn new(
        operation: OperationType,
        body: BuildBody,
        candidates: Vec<UtxoCandidate>,
        amount: u64,
        fee_rate_per_kb: u64,
        explicit: bool,
    ) -> Self {
        Self {
            operation,
            body,
            candidates,
            cursor: 0,
            builds: 0,
            value_needed: MINIMUM_FEE.saturating_add(amount),
            amount,
            fee_rate_per_kb,
            explicit,
        }
    }

    pub fn chosen(&self) -> &[UtxoCandidate] {
        &self.candidates[..self.cursor]
    }

    pub fn collected(&self) -> u64 {
        self.chosen().iter().map(|u| u.value).sum()
    }

    fn not_enough_funds(&self) -> CcError {
        CcError::NotEnoughFunds {
            needed: self.value_needed,
            collected: self.collected(),
        }
    }

    /// Extend the chosen set toward `value_needed`
    pub fn select(mut self, limits: &FundingLimits) -> FundingState {
        if self.builds >= limits.max_iterations {
            log::warn!("Giving up after {} trial builds", self.builds);
            return FundingState::Failed(self.not_enough_funds());
        }

        let start = self.cursor;
        let mut collected = self.collected();
        if self.explicit {
            self.cursor = self.candidates.len();
            collected = self.collected();
        } else {
            while self.cursor < self.candidates.len()
                && self.cursor - start < limits.max_batch
                && collected < self.value_needed
            {
                collected = collected.saturating_add(self.candidates[self.cursor].value);
                self.cursor += 1;
            }
        }

        let added = self.cursor - start;
        let exhausted = self.cursor == self.candidates.len();
        if added == 0 || (exhausted && collected < self.value_needed) {
            log::debug!(
                "Funding stalled: {} chosen, {} of {} collected",
                self.cursor,
                collected,
                self.value_needed
            );
            return FundingState::Failed(self.not_enough_funds());
        }

        log::debug!("Selected {} more UTXOs ({} total)", added, self.cursor);
        FundingState::Building(self)
    }

    /// Price a trial build and decide whether it is funded
    pub fn evaluate(mut self, built: BuiltTransaction) -> FundingState {
        self.builds += 1;
        let fee = mining_fee(built.input_count, built.output_count, self.fee_rate_per_kb);
        let value_needed = fee.saturating_add(self.amount);
        let collected = self.collected();
        log::debug!(
            "Build {}: {} inputs, {} outputs, fee {}, needed {}, collected {}",
            self.builds,
            built.input_count,
            built.output_count,
            fee,
            value_needed,
            collected
        );

        if collected >= value_needed {
            return FundingState::Funded(FundedTransaction {
                chosen: self.chosen().to_vec(),
                built,
                fee,
                value_needed,
                collected,
                builds: self.builds,
            });
        }

        self.value_needed = value_needed;
        FundingState::Selecting(self)
    }
}

#[derive(Clone)]
pub struct FundingEngine {
    node: Arc<dyn NodeService>,
    resolver: ProvenanceResolver,
    builder: Arc<dyn ColoredTxBuilder>,
    limits: FundingLimits,
}

impl FundingEngine {
    pub fn new(
        node: Arc<dyn NodeService>,
        resolver: ProvenanceResolver,
        builder: Arc<dyn ColoredTxBuilder>,
        limits: FundingLimits,
    ) -> Self {
        Self {
            node,
            resolver,
            builder,
            limits,
        }
    }

    /// Choose funding UTXOs and build an unsigned transaction
    pub async fn build(&self, operation: OperationType, body: BuildBody) -> Result<BuildResponse> {
        let funded = self.fund(operation, body).await?;
        log::info!(
            "Funded {} with {} UTXOs after {} builds (fee {})",
            operation,
            funded.chosen.len(),
            funded.builds,
            funded.fee
        );
        Ok(BuildResponse {
            tx_hex: funded.built.tx_hex,
            asset_id: funded.built.asset_id,
        })
    }

    /// Run the funding loop to completion
    pub async fn fund(
        &self,
        operation: OperationType,
        body: BuildBody,
    ) -> Result<FundedTransaction> {
        let amount = self.validate(operation, &body)?;

        let (candidates, explicit) = match body.utxos.clone() {
            Some(utxos) => (utxos, true),
            None => (self.gather_candidates(operation, &body).await?, false),
        };

        let target = body.nb_blocks.unwrap_or(self.limits.fee_target_blocks);
        let fee_rate = fee_rate_from_estimate(self.node.estimate_fee(target).await?);
        log::debug!(
            "Funding {} of {} from {} candidates at {} sat/kB",
            operation,
            amount,
            candidates.len(),
            fee_rate
        );

        let session = FundingSession::new(operation, body, candidates, amount, fee_rate, explicit);
        self.drive(session)
    }

    fn drive(&self, session: FundingSession) -> Result<FundedTransaction> {
        let mut state = FundingState::Selecting(session);
        loop {
            state = match state {
                FundingState::Selecting(session) => session.select(&self.limits),
                FundingState::Building(session) => {
                    match self
                        .builder
                        .build(session.operation, &session.body, session.chosen())
                    {
                        Ok(built) => FundingState::Evaluating(session, built),
                        Err(e) => FundingState::Failed(e),
                    }
                }
                FundingState::Evaluating(session, built) => session.evaluate(built),
                FundingState::Funded(funded) => return Ok(funded),
                FundingState::Failed(e) => return Err(e),
            };
        }
    }

    fn validate(&self, operation: OperationType, body: &BuildBody) -> Result<u64> {
        if body.utxos.is_none() && body.funding_address(operation).is_none() {
            return Err(CcError::MissingAddress);
        }
        if operation.needs_asset_lookup() && body.requested_assets().is_empty() {
            return Err(CcError::MissingAsset);
        }
        body.requested_amount(operation).ok_or(CcError::MissingAsset)
    }

    /// Fetch, filter and order the funding address's UTXOs
    async fn gather_candidates(
        &self,
        operation: OperationType,
        body: &BuildBody,
    ) -> Result<Vec<UtxoCandidate>> {
        let address = body
            .funding_address(operation)
            .ok_or(CcError::MissingAddress)?;

        let mut utxos: Vec<UtxoCandidate> = self
            .node
            .get_utxos(address)
            .await?
            .into_iter()
            .filter(|u| u.value > 0)
            .collect();
        if utxos.is_empty() {
            return Err(CcError::NoInputsForAddress);
        }

        match operation {
            OperationType::Issue => {
                utxos.retain(|u| u.confirmations > 0);
                if utxos.is_empty() {
                    return Err(CcError::NoInputsConfirmed);
                }
            }
            OperationType::Send | OperationType::Burn => {
                self.populate_assets(&mut utxos).await?;
                utxos = filter_by_requested_assets(utxos, &body.requested_assets());
                if utxos.is_empty() {
                    log::warn!("No UTXO of {} carries the requested assets", address);
                }
            }
        }

        utxos.sort_by(|a, b| b.value.cmp(&a.value));
        Ok(utxos)
    }

    /// Tag each UTXO with the assets of the transaction that created it
    async fn populate_assets(&self, utxos: &mut [UtxoCandidate]) -> Result<()> {
        let mut txids: Vec<&str> = Vec::new();
        for utxo in utxos.iter() {
            if !txids.contains(&utxo.txid.as_str()) {
                txids.push(&utxo.txid);
            }
        }

        let resolved = try_join_all(txids.iter().map(|txid| self.resolver.lookup(txid))).await?;
        let tags: HashMap<String, Vec<AssetTag>> = resolved
            .into_iter()
            .map(|tx| {
                let tags = tx.assets.iter().filter_map(|data| data.tag()).collect();
                (tx.txid, tags)
            })
            .collect();

        for utxo in utxos.iter_mut() {
            utxo.assets = tags.get(&utxo.txid).cloned().unwrap_or_default();
        }
        Ok(())
    }
}

/// Keep UTXOs carrying a requested asset, tagged with the requested amount
///
/// Tags for other assets on a kept UTXO are left as they are.
pub fn filter_by_requested_assets(
    utxos: Vec<UtxoCandidate>,
    requested: &[(&str, u64)],
) -> Vec<UtxoCandidate> {
    utxos
        .into_iter()
        .filter(|utxo| requested.iter().any(|(id, _)| utxo.carries(id)))
        .map(|mut utxo| {
            for tag in utxo.assets.iter_mut() {
                if let Some((_, amount)) = requested.iter().find(|(id, _)| *id == tag.asset_id) {
                    tag.amount = *amount;
                }
            }
            utxo
        })
        .collect()
}
