//! Mining fee model for colored-coin transactions
//!
//! The builder only tells us how many inputs and outputs a trial
//! transaction has, so the fee is estimated from those counts rather than
//! from the serialized size.

/// Satoshi-equivalent units per whole coin
pub const COIN: f64 = 1e8;

/// Fee floor, in satoshis
pub const MINIMUM_FEE: u64 = 100_000;

/// Estimated serialized bytes per input
pub const INPUT_BYTE_COST: u64 = 180;

/// Estimated serialized bytes per output
pub const OUTPUT_BYTE_COST: u64 = 34;

/// Extra bytes added to every size estimate
pub const FEE_TOLERANCE: u64 = 10;

/// Fee rates are quoted per kilobyte
pub const FEE_DIVISOR: u64 = 1000;

/// Confirmation target used when the request does not name one
pub const DEFAULT_FEE_TARGET_BLOCKS: u32 = 3;

/// Build/evaluate rounds allowed before a funding request gives up
pub const MAX_TOPUP_ITERATIONS: u32 = 20;

/// UTXOs appended per top-up round
pub const MAX_UTXOS_PER_BATCH: usize = 50;

/// Estimated size in bytes of a transaction with the given shape
pub fn estimated_size(num_inputs: usize, num_outputs: usize) -> u64 {
    (num_inputs as u64)
        .saturating_mul(INPUT_BYTE_COST)
        .saturating_add((num_outputs as u64).saturating_mul(OUTPUT_BYTE_COST))
        .saturating_add(FEE_TOLERANCE)
}

/// Mining fee for a transaction shape at `fee_rate_per_kb` satoshis per kB
///
/// Never below [`MINIMUM_FEE`] and non-decreasing in both counts.
pub fn mining_fee(num_inputs: usize, num_outputs: usize, fee_rate_per_kb: u64) -> u64 {
    let fee = estimated_size(num_inputs, num_outputs).saturating_mul(fee_rate_per_kb) / FEE_DIVISOR;
    fee.max(MINIMUM_FEE)
}

/// Convert a node fee estimate (whole coins per kB) into satoshis per kB
///
/// Nodes report `-1` when they cannot estimate; anything non-positive or
/// non-finite becomes zero so the fee floor applies.
pub fn fee_rate_from_estimate(coins_per_kb: f64) -> u64 {
    if !coins_per_kb.is_finite() || coins_per_kb <= 0.0 {
        return 0;
    }
    (coins_per_kb * COIN).round() as u64
}

/// Satoshis expressed in whole coins
pub fn sats_to_coins(sats: u64) -> f64 {
    sats as f64 / COIN
}
