//! Pool Bootstrap - SPL token-swap pool bootstrap client
//!
//! This library exposes the bootstrap pipeline (address derivation, account
//! creation, sequencing and submission), its ledger seam and the supporting
//! configuration, metrics and logging modules used by the CLI.

pub mod config;
pub mod metrics;
pub mod pool_engine;
pub mod resolver;
pub mod streaming;
pub mod structured_logging;
pub mod token_accounts;
pub mod types;
pub mod wallet;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod tx_builder;

pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use pool_engine::{BootstrapReport, PoolBootstrapEngine, PoolBootstrapRequest};
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use tx_builder::BootstrapError;
