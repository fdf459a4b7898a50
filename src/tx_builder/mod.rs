//! Pool bootstrap transaction pipeline
//!
//! The pipeline is split into focused modules, leaves first:
//! - **address**: program-derived and associated token account addresses
//! - **token_swap**: swap pool fees/curve and the initialize encoding
//! - **accounts**: account-creation and initialization instructions
//! - **instructions**: ordering validation and packing into plans
//! - **plan**: immutable transaction plans with their minimal signer set
//! - **submit**: signing, sending and confirmation
//! - **context**: connection parameters passed to every ledger operation
//! - **errors**: the error taxonomy shared by all of the above
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use pool_bootstrap::tx_builder::{assemble, BootstrapStep, SequencedInstruction, SequencerLimits};
//! # use std::sync::Arc;
//! # use solana_sdk::{signature::Keypair, signer::Signer, system_instruction};
//!
//! # fn example() -> Result<(), pool_bootstrap::tx_builder::BootstrapError> {
//! let payer = Arc::new(Keypair::new());
//! let state = Arc::new(Keypair::new());
//! let create = system_instruction::create_account(
//!     &payer.pubkey(), &state.pubkey(), 1_000_000, 324, &Keypair::new().pubkey(),
//! );
//!
//! let plans = assemble(
//!     vec![SequencedInstruction::new(BootstrapStep::StateAccount, create).producing([state.pubkey()])],
//!     &payer.pubkey(),
//!     &[payer.clone(), state.clone()],
//!     &SequencerLimits::default(),
//! )?;
//! assert_eq!(plans.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub use errors::BootstrapError;

pub mod accounts;
pub mod address;
pub mod context;
pub mod instructions;
pub mod plan;
pub mod submit;
pub mod token_swap;

// Re-export key types for convenience
pub use accounts::{
    AccountBootstrapper, AccountCreationSpec, CreatedTokenAccount, LiquidityDeposit, PoolMint,
};
pub use address::{AddressDeriver, ProgramDerivedAddress};
pub use context::BootstrapContext;
pub use instructions::{
    assemble, validate_order, BootstrapStep, SequencedInstruction, SequencerLimits,
};
pub use plan::TransactionPlan;
pub use submit::TransactionSubmitter;
pub use token_swap::{CurveType, FeeFraction, InitSwapAccounts, SwapPoolConfig, SWAP_STATE_LEN};
