//! Bootstrap context
//!
//! Carries the connection parameters every ledger-touching operation needs.
//! There is no global connection: the context is built once per invocation
//! and passed explicitly.

use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use std::time::Duration;

use crate::tx_builder::errors::BootstrapError;
use crate::types::{Cluster, ProgramIds};

/// Default time to wait for a signature to reach the requested commitment
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between signature status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connection parameters for one bootstrap invocation
///
/// # Example
///
/// ```no_run
/// use pool_bootstrap::tx_builder::BootstrapContext;
/// use pool_bootstrap::types::Cluster;
/// use solana_sdk::commitment_config::CommitmentConfig;
///
/// # fn example() -> Result<(), pool_bootstrap::tx_builder::BootstrapError> {
/// let ctx = BootstrapContext::for_cluster(Cluster::Devnet, None, None)?
///     .with_commitment(CommitmentConfig::finalized());
/// assert_eq!(ctx.endpoint, "https://api.devnet.solana.com");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BootstrapContext {
    pub endpoint: String,
    pub cluster: Cluster,
    pub commitment: CommitmentConfig,
    pub program_ids: ProgramIds,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl BootstrapContext {
    /// Context with the cluster's default endpoint and program ids
    pub fn for_cluster(
        cluster: Cluster,
        endpoint: Option<String>,
        swap_program_override: Option<solana_sdk::pubkey::Pubkey>,
    ) -> Result<Self, BootstrapError> {
        let program_ids = cluster.program_ids(swap_program_override)?;
        Ok(Self {
            endpoint: endpoint.unwrap_or_else(|| cluster.default_endpoint().to_string()),
            cluster,
            commitment: CommitmentConfig::confirmed(),
            program_ids,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_timeouts(mut self, confirmation_timeout: Duration, poll_interval: Duration) -> Self {
        self.confirmation_timeout = confirmation_timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Websocket endpoint matching `endpoint`
    pub fn websocket_endpoint(&self) -> String {
        Cluster::websocket_endpoint(&self.endpoint)
    }
}

/// Parse a commitment level name (`processed`, `confirmed`, `finalized`)
pub fn parse_commitment(name: &str) -> Result<CommitmentConfig, BootstrapError> {
    let level = match name.to_ascii_lowercase().as_str() {
        "processed" => CommitmentLevel::Processed,
        "confirmed" => CommitmentLevel::Confirmed,
        "finalized" => CommitmentLevel::Finalized,
        other => {
            return Err(BootstrapError::config(format!(
                "unknown commitment level '{}'",
                other
            )))
        }
    };
    Ok(CommitmentConfig { commitment: level })
}
