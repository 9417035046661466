//! cc-assets: Colored-Coin Asset Overlay for a Bitcoin full node
//!
//! This crate funds, resolves and normalizes colored-coin transactions on
//! top of a node service, and keeps per-asset records for summaries and
//! listings.
//!
//! # Architecture
//!
//! - **Funding Engine**: chooses UTXOs and tops them up until the fee is covered
//! - **Provenance Resolver**: walks a transfer back to its issuance
//! - **Transformer**: turns node transactions into the canonical view
//! - **Aggregator**: balances and date listings over stored records
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cc_assets::{AssetService, BuildBody, EsploraNode, ServiceConfig};
//!
//! let config = ServiceConfig::from_env();
//! let node = Arc::new(EsploraNode::from_config(&config));
//! let service = AssetService::open(&config, node, parser, builder).await?;
//!
//! let body = BuildBody {
//!     issue_address: Some("mxNTyQ3WdFMQE7SGVpSQGXnSDevGMLq7dg".to_string()),
//!     amount: 1000,
//!     ..Default::default()
//! };
//! let response = service.build_issue(body).await?;
//! println!("unsigned tx: {}", response.tx_hex);
//! ```

// Public modules
pub mod aggregator;
pub mod builder;
pub mod colored;
pub mod config;
pub mod error;
pub mod esplora;
pub mod fee;
pub mod funding;
pub mod node;
pub mod provenance;
pub mod records;
pub mod service;
pub mod store;
pub mod transformer;
pub mod types;

// Re-exports for convenience
pub use aggregator::{
    parse_asset_list, AssetAggregator, AssetListing, AssetSummary, ListingQuery, Pagination,
    SummaryOptions,
};
pub use builder::{
    BuildBody, BuildResponse, BuiltTransaction, BurnEntry, ColoredTxBuilder, Recipient,
};
pub use colored::{AssetKind, ColoredData, ColoredPayment, MetadataParser, NoColoredData};
pub use config::ServiceConfig;
pub use error::{CcError, ErrorResponse};
pub use esplora::EsploraNode;
pub use funding::{FundedTransaction, FundingEngine, FundingLimits, FundingSession, FundingState};
pub use node::NodeService;
pub use provenance::ProvenanceResolver;
pub use records::{AssetRecord, Payment};
pub use service::{
    AssetHistoryPage, AssetService, RawTransactionResponse, SendResponse, TxListQuery, TxPage,
};
pub use store::{AssetStore, JsonFileAssetStore, MemoryAssetStore};
pub use transformer::{InvTransaction, TransformOptions, Transformer};
pub use types::{
    AddressHistory, AssetTag, OperationType, RawInput, RawOutput, RawTransaction,
    TransformedInput, TransformedOutput, TransformedTransaction, UtxoCandidate,
};

// Common result type
pub type Result<T> = std::result::Result<T, CcError>;
