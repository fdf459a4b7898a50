use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_rpc_client_api::request::{RpcError, RpcResponseErrorData};
use thiserror::Error;

use crate::tx_builder::BootstrapError;

/// Ledger RPC failures, classified from client errors
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout (endpoint: {endpoint})")]
    Timeout { endpoint: String },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    #[error("Transaction expired (endpoint: {endpoint})")]
    TransactionExpired { endpoint: String },

    /// Preflight simulation rejected the transaction
    #[error("Preflight failure: {message} (endpoint: {endpoint})")]
    PreflightFailure {
        endpoint: String,
        message: String,
        logs: Vec<String>,
    },

    #[error("Insufficient funds (endpoint: {endpoint})")]
    InsufficientFunds { endpoint: String },

    /// Response could not be decoded into the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Transport { .. } => true,
            LedgerError::Timeout { .. } => true,
            LedgerError::BlockhashNotFound { .. } => true,

            LedgerError::TransactionExpired { .. } => false,
            LedgerError::PreflightFailure { .. } => false,
            LedgerError::InsufficientFunds { .. } => false,
            LedgerError::Decode(_) => false,

            // Retry on server errors (5xx)
            LedgerError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// Create from ClientError with context
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        if let ClientErrorKind::RpcError(RpcError::RpcResponseError {
            code,
            message,
            data: RpcResponseErrorData::SendTransactionPreflightFailure(result),
        }) = err.kind()
        {
            let logs = result.logs.clone().unwrap_or_default();
            let detail = match &result.err {
                Some(tx_err) => format!("{} ({:?})", message, tx_err),
                None => format!("{} (code {})", message, code),
            };
            return LedgerError::PreflightFailure {
                endpoint: endpoint.to_string(),
                message: detail,
                logs,
            };
        }

        let err_str = err.to_string().to_lowercase();

        // Classify based on error message
        if err_str.contains("blockhash not found") {
            LedgerError::BlockhashNotFound {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("transaction expired")
            || err_str.contains("block height exceeded")
        {
            LedgerError::TransactionExpired {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("insufficient funds")
            || err_str.contains("insufficient lamports")
        {
            LedgerError::InsufficientFunds {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            LedgerError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else if matches!(err.kind(), ClientErrorKind::Reqwest(_) | ClientErrorKind::Io(_)) {
            LedgerError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        } else {
            let code = match err.kind() {
                ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. }) => Some(*code),
                _ => None,
            };
            LedgerError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
                code,
            }
        }
    }

    /// Map a failed send into the submission taxonomy
    ///
    /// Program-level rejections become `SimulationFailed`; anything the
    /// ledger refused before execution becomes `SubmissionRejected`.
    pub fn into_submission_error(self) -> BootstrapError {
        match self {
            LedgerError::PreflightFailure { message, logs, .. } => {
                if logs.is_empty() {
                    BootstrapError::SimulationFailed(message)
                } else {
                    BootstrapError::SimulationFailed(format!("{}; logs: {}", message, logs.join(" | ")))
                }
            }
            err @ LedgerError::InsufficientFunds { .. } => {
                BootstrapError::SimulationFailed(err.to_string())
            }
            other => BootstrapError::SubmissionRejected(other.to_string()),
        }
    }
}

impl From<LedgerError> for BootstrapError {
    fn from(err: LedgerError) -> Self {
        BootstrapError::Rpc(err.to_string())
    }
}
