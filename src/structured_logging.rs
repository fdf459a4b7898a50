//! Structured logging and bootstrap run context

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use uuid::Uuid;

use crate::tx_builder::BootstrapStep;

/// Structured logger for bootstrap events
///
/// Every event carries the run's correlation id so the lines of one
/// bootstrap can be pulled out of interleaved output.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_addresses(&self, state: &Pubkey, authority: &Pubkey, pool_mint: &Pubkey) {
        tracing::info!(
            context_id = %self.context_id,
            state = %state,
            authority = %authority,
            pool_mint = %pool_mint,
            "Pool addresses derived"
        );
    }

    pub fn log_plan_assembled(&self, transactions: usize, instructions: usize) {
        tracing::info!(
            context_id = %self.context_id,
            transactions = %transactions,
            instructions = %instructions,
            "Bootstrap plan assembled"
        );
    }

    pub fn log_step_queued(&self, step: BootstrapStep, instructions: usize) {
        tracing::debug!(
            context_id = %self.context_id,
            step = %step,
            instructions = %instructions,
            "Step queued"
        );
    }

    pub fn log_transaction_confirmed(&self, index: usize, steps: &[BootstrapStep], sig: &Signature) {
        tracing::info!(
            context_id = %self.context_id,
            index = %index,
            steps = ?steps,
            signature = %sig,
            "Transaction confirmed"
        );
    }

    pub fn log_bootstrap_success(&self, swap_state: &Pubkey, transactions: usize, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            swap_state = %swap_state,
            transactions = %transactions,
            latency_ms = %latency_ms,
            "Pool bootstrap complete"
        );
    }

    pub fn log_bootstrap_failure(&self, completed: &[BootstrapStep], error: &str, latency_ms: u64) {
        tracing::error!(
            context_id = %self.context_id,
            completed = ?completed,
            error = %error,
            latency_ms = %latency_ms,
            "Pool bootstrap failed; completed steps are left on the ledger"
        );
    }
}

/// Execution context for one CLI operation
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Unique request ID, also used as the correlation id
    pub request_id: String,

    /// Span ID
    pub span_id: String,

    /// Parent span ID (if any)
    pub parent_span_id: Option<String>,

    /// Operation name
    pub operation: String,

    pub logger: StructuredLogger,
}

impl PipelineContext {
    pub fn new(operation: &str) -> Self {
        let request_id = Uuid::new_v4().to_string();

        Self {
            request_id: request_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            operation: operation.to_string(),
            logger: StructuredLogger::new(request_id),
        }
    }

    /// Create a child context sharing the correlation id
    pub fn child(&self, operation: &str) -> Self {
        Self {
            request_id: self.request_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_string(),
            logger: self.logger.clone(),
        }
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new("default")
    }
}
