//! Error types for the pool bootstrap pipeline
//!
//! One taxonomy covers the whole bootstrap lifecycle, from address derivation
//! through confirmation. Nothing in the crate retries automatically;
//! `is_retryable` only tells the caller whether re-running the workflow could
//! plausibly succeed.

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

/// Comprehensive error type for all bootstrap operations
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Missing or invalid inputs: identity, mints, fee configuration, cluster
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Seeds violate the ledger's derivation limits
    #[error("Invalid seeds: {0}")]
    InvalidSeeds(String),

    /// No bump in [0, 255] produced an off-curve address
    #[error("Address derivation exhausted all bumps (program={program})")]
    DerivationExhausted {
        /// Program the derivation was attempted against
        program: Pubkey,
    },

    /// Rent-exemption minimum could not be fetched from the ledger
    #[error("Rent query failed for {space} bytes: {reason}")]
    RentQuery { space: u64, reason: String },

    /// Failed to build an instruction for a specific program
    #[error("Instruction build error (program={program}): {reason}")]
    InstructionBuild {
        /// The program the instruction targets
        program: String,
        /// Detailed reason for the failure
        reason: String,
    },

    /// An instruction consumes an address that a later instruction produces
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// A required signer has no keypair in the supplied signer set
    #[error("Missing signer {pubkey} for transaction plan {plan_index}")]
    MissingSigner { pubkey: Pubkey, plan_index: usize },

    /// Failed to sign the transaction
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The ledger refused the transaction (malformed, stale blockhash, transport)
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// Preflight simulation or on-ledger execution rejected the transaction
    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    /// Requested commitment was not observed in time
    #[error("Confirmation timeout for {signature} after {waited_ms}ms (commitment={commitment})")]
    ConfirmationTimeout {
        signature: Signature,
        commitment: String,
        waited_ms: u64,
    },

    /// A multi-plan submission stopped part way; earlier plans stay confirmed
    #[error(
        "Submission stopped at plan {failed_index} after {} confirmed plan(s): {source}",
        .completed.len()
    )]
    PartialSubmission {
        /// Signatures of plans that reached the requested commitment
        completed: Vec<Signature>,
        /// Index of the plan that failed
        failed_index: usize,
        #[source]
        source: Box<BootstrapError>,
    },

    /// Generic ledger read failure (account lookups, blockhash)
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Wrapped error from external crates
    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl BootstrapError {
    /// Check if re-running the failed operation might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RentQuery { .. } => true,
            Self::ConfirmationTimeout { .. } => true,
            Self::Rpc(_) => true,
            Self::SubmissionRejected(msg) => {
                // A stale blockhash is fixed by rebuilding; a malformed tx is not
                msg.to_lowercase().contains("blockhash")
            }
            Self::PartialSubmission { source, .. } => source.is_retryable(),

            Self::Configuration(_) => false,
            Self::InvalidSeeds(_) => false,
            Self::DerivationExhausted { .. } => false,
            Self::InstructionBuild { .. } => false,
            Self::InvalidInstructionOrder(_) => false,
            Self::MissingSigner { .. } => false,
            Self::Signing(_) => false,
            Self::SimulationFailed(_) => false,
            Self::External(_) => false,
        }
    }

    /// Get the error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config",
            Self::InvalidSeeds(_) | Self::DerivationExhausted { .. } => "derivation",
            Self::RentQuery { .. } => "rent",
            Self::InstructionBuild { .. } => "instruction",
            Self::InvalidInstructionOrder(_) | Self::MissingSigner { .. } => "validation",
            Self::Signing(_) => "signing",
            Self::SubmissionRejected(_) => "submission",
            Self::SimulationFailed(_) => "simulation",
            Self::ConfirmationTimeout { .. } => "confirmation",
            Self::PartialSubmission { .. } => "partial",
            Self::Rpc(_) => "rpc",
            Self::External(_) => "external",
        }
    }
}

// Convenience constructors for common error scenarios
impl BootstrapError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Create an instruction build error for a specific program
    pub fn instruction_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstructionBuild {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    /// The innermost error of a `PartialSubmission`, or `self`
    pub fn root_cause(&self) -> &BootstrapError {
        match self {
            Self::PartialSubmission { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BootstrapError::Configuration("missing mint".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing mint");

        let err = BootstrapError::instruction_failed("token_swap", "bad accounts");
        assert_eq!(
            err.to_string(),
            "Instruction build error (program=token_swap): bad accounts"
        );
    }

    #[test]
    fn test_partial_submission_display_and_root_cause() {
        let err = BootstrapError::PartialSubmission {
            completed: vec![Signature::default()],
            failed_index: 1,
            source: Box::new(BootstrapError::SubmissionRejected("blockhash not found".into())),
        };
        assert!(err.to_string().contains("plan 1 after 1 confirmed"));
        assert!(matches!(err.root_cause(), BootstrapError::SubmissionRejected(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_retryability() {
        assert!(BootstrapError::Rpc("down".into()).is_retryable());
        assert!(BootstrapError::SubmissionRejected("Blockhash not found".into()).is_retryable());
        assert!(!BootstrapError::SubmissionRejected("malformed".into()).is_retryable());
        assert!(!BootstrapError::SimulationFailed("insufficient funds".into()).is_retryable());
        assert!(!BootstrapError::DerivationExhausted {
            program: Pubkey::new_unique()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(BootstrapError::config("x").category(), "config");
        assert_eq!(BootstrapError::invalid_order("x").category(), "validation");
        assert_eq!(
            BootstrapError::RentQuery {
                space: 165,
                reason: "x".into()
            }
            .category(),
            "rent"
        );
    }
}
