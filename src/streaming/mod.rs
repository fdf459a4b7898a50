//! Streaming data sources for account-change notifications

#[cfg(feature = "ws-stream")]
pub mod websocket_stream;

use solana_sdk::pubkey::Pubkey;

/// Account change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountNotification {
    pub address: Pubkey,
    pub slot: u64,
    pub lamports: u64,
}
