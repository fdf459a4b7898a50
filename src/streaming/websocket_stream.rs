//! WebSocket account-change feed
//!
//! Subscribes to `accountSubscribe` for a single address and forwards
//! notifications into a bounded channel. When the channel is full the
//! notification is dropped: the consumer refreshes from the ledger anyway,
//! so one queued notification is as good as many.

use futures_util::StreamExt;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::RpcAccountInfoConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::AccountNotification;
use crate::tx_builder::BootstrapError;

/// Account-change subscription over the ledger's pubsub endpoint
pub struct AccountChangeFeed {
    ws_url: String,
    commitment: CommitmentConfig,
}

impl AccountChangeFeed {
    pub fn new(ws_url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            ws_url: ws_url.into(),
            commitment,
        }
    }

    /// Connect to WebSocket endpoint and return client
    pub async fn connect(&self) -> Result<Arc<PubsubClient>, BootstrapError> {
        info!(url = %self.ws_url, "Connecting to WebSocket");

        let client = PubsubClient::new(&self.ws_url)
            .await
            .map_err(|e| BootstrapError::Rpc(format!("websocket connect {}: {}", self.ws_url, e)))?;

        info!("WebSocket connected successfully");
        Ok(Arc::new(client))
    }

    /// Subscribe to changes of `address`
    ///
    /// The subscription runs in a spawned task that ends when the stream
    /// closes or the receiver is dropped.
    pub async fn subscribe_account(
        &self,
        client: Arc<PubsubClient>,
        address: Pubkey,
        tx: mpsc::Sender<AccountNotification>,
    ) -> JoinHandle<()> {
        info!(address = %address, "Subscribing to account changes");
        let commitment = self.commitment;

        tokio::spawn(async move {
            let (mut notifications, unsubscribe) = match client
                .account_subscribe(
                    &address,
                    Some(RpcAccountInfoConfig {
                        encoding: Some(UiAccountEncoding::Base64),
                        commitment: Some(commitment),
                        ..Default::default()
                    }),
                )
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    error!(address = %address, error = %e, "Failed to subscribe to account");
                    return;
                }
            };

            while let Some(response) = notifications.next().await {
                let notification = AccountNotification {
                    address,
                    slot: response.context.slot,
                    lamports: response.value.lamports,
                };
                match tx.try_send(notification) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!(address = %address, "Notification channel full, dropping");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!("Receiver dropped, unsubscribing");
                        break;
                    }
                }
            }
            unsubscribe().await;
        })
    }
}
