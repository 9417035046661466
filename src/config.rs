//! Service configuration from environment variables
//!
//! Controls the Bitcoin network, the Esplora endpoint used as node service,
//! and the bounds applied by the funding engine and provenance resolver.
//! Defaults to Signet with the documented protocol constants.

use std::env;
use std::path::PathBuf;

use crate::fee::{DEFAULT_FEE_TARGET_BLOCKS, MAX_TOPUP_ITERATIONS, MAX_UTXOS_PER_BATCH};

/// Default page size for date-bucketed asset listings
pub const ASSETS_PAGE_LIMIT: usize = 200;

/// Page length for transaction listings by block or address
pub const TX_PAGE_LENGTH: usize = 10;

pub const DEFAULT_PROVENANCE_MAX_DEPTH: usize = 16;
pub const DEFAULT_PROVENANCE_MAX_LOOKUPS: usize = 256;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Bitcoin network type (address typing, inventory decoding)
    pub network: bitcoin::Network,
    /// Esplora API base URL
    pub esplora_url: String,
    /// Confirmation target handed to fee estimation
    pub fee_target_blocks: u32,
    /// Upper bound on build/evaluate rounds per funding request
    pub max_topup_iterations: u32,
    /// Upper bound on UTXOs appended per top-up round
    pub max_utxos_per_batch: usize,
    /// Maximum ancestor hops walked by the provenance resolver
    pub provenance_max_depth: usize,
    /// Maximum origin transactions fetched for one provenance search
    pub provenance_max_lookups: usize,
    /// Default page size for asset listings
    pub assets_page_limit: usize,
    /// Optional JSON file backing the asset record store
    pub asset_store_path: Option<PathBuf>,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BITCOIN_NETWORK`: "signet" (default), "regtest", "testnet" or "bitcoin"
    /// - `ESPLORA_URL`: Esplora API endpoint (has per-network defaults)
    /// - `FEE_TARGET_BLOCKS`: fee estimation horizon (default 3)
    /// - `PROVENANCE_MAX_DEPTH` / `PROVENANCE_MAX_LOOKUPS`: ancestor search bounds
    /// - `ASSETS_PAGE_LIMIT`: listing page size (default 200)
    /// - `ASSET_STORE_PATH`: JSON file for asset records (in-memory when unset)
    ///
    /// A `.env` file is loaded first when present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let network_str = env::var("BITCOIN_NETWORK")
            .unwrap_or_else(|_| "signet".to_string())
            .to_lowercase();

        let network = match network_str.as_str() {
            "regtest" => bitcoin::Network::Regtest,
            "testnet" => bitcoin::Network::Testnet,
            "bitcoin" | "mainnet" => bitcoin::Network::Bitcoin,
            "signet" | "" => bitcoin::Network::Signet,
            other => {
                log::warn!("Unknown network '{}', defaulting to Signet", other);
                bitcoin::Network::Signet
            }
        };
        log::info!("Using {} network", network);

        let esplora_url = env::var("ESPLORA_URL").unwrap_or_else(|_| default_esplora_url(network));
        log::info!("Esplora URL: {}", esplora_url);

        let defaults = Self::default();
        let asset_store_path = env::var("ASSET_STORE_PATH").ok().map(PathBuf::from);
        if let Some(ref path) = asset_store_path {
            log::info!("Asset store file: {}", path.display());
        }

        Self {
            network,
            esplora_url,
            fee_target_blocks: parse_var("FEE_TARGET_BLOCKS", defaults.fee_target_blocks),
            max_topup_iterations: defaults.max_topup_iterations,
            max_utxos_per_batch: defaults.max_utxos_per_batch,
            provenance_max_depth: parse_var("PROVENANCE_MAX_DEPTH", defaults.provenance_max_depth),
            provenance_max_lookups: parse_var(
                "PROVENANCE_MAX_LOOKUPS",
                defaults.provenance_max_lookups,
            ),
            assets_page_limit: parse_var("ASSETS_PAGE_LIMIT", defaults.assets_page_limit),
            asset_store_path,
        }
    }
}

impl Default for ServiceConfig {
    /// Default configuration (Signet)
    fn default() -> Self {
        Self {
            network: bitcoin::Network::Signet,
            esplora_url: default_esplora_url(bitcoin::Network::Signet),
            fee_target_blocks: DEFAULT_FEE_TARGET_BLOCKS,
            max_topup_iterations: MAX_TOPUP_ITERATIONS,
            max_utxos_per_batch: MAX_UTXOS_PER_BATCH,
            provenance_max_depth: DEFAULT_PROVENANCE_MAX_DEPTH,
            provenance_max_lookups: DEFAULT_PROVENANCE_MAX_LOOKUPS,
            assets_page_limit: ASSETS_PAGE_LIMIT,
            asset_store_path: None,
        }
    }
}

fn default_esplora_url(network: bitcoin::Network) -> String {
    match network {
        bitcoin::Network::Regtest => "http://localhost:3000".to_string(),
        bitcoin::Network::Bitcoin => "https://mempool.space/api".to_string(),
        bitcoin::Network::Testnet => "https://mempool.space/testnet/api".to_string(),
        _ => "https://mempool.space/signet/api".to_string(),
    }
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring unparsable {}='{}'", name, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_signet() {
        let config = ServiceConfig::default();
        assert!(matches!(config.network, bitcoin::Network::Signet));
        assert_eq!(config.esplora_url, "https://mempool.space/signet/api");
    }

    #[test]
    fn test_default_bounds_match_protocol_constants() {
        let config = ServiceConfig::default();
        assert_eq!(config.fee_target_blocks, 3);
        assert_eq!(config.max_topup_iterations, 20);
        assert_eq!(config.max_utxos_per_batch, 50);
        assert_eq!(config.assets_page_limit, 200);
        assert!(config.provenance_max_depth > 0);
        assert!(config.asset_store_path.is_none());
    }

    #[test]
    fn test_regtest_url() {
        assert_eq!(
            default_esplora_url(bitcoin::Network::Regtest),
            "http://localhost:3000"
        );
    }
}
