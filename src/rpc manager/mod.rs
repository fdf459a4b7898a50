//! Ledger access
//!
//! Everything the bootstrap needs from the chain goes through the `Ledger`
//! trait so the instruction and submission logic can run against an
//! in-memory ledger in tests.

use async_trait::async_trait;
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::TransactionError, transaction::VersionedTransaction,
};

// Submodules
pub mod rpc_errors;
pub mod rpc_ledger;

// Re-exports for convenience
pub use rpc_errors::LedgerError;
pub use rpc_ledger::RpcLedger;

/// Read/submit surface of the ledger RPC
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Endpoint label used in logs and errors
    fn endpoint(&self) -> &str;

    async fn minimum_balance_for_rent_exemption(&self, space: usize) -> Result<u64, LedgerError>;

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// Send with preflight enabled
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError>;

    /// `None` while the signature has not reached `commitment`
    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<Option<Result<(), TransactionError>>, LedgerError>;

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError>;

    /// Token accounts owned by `owner` under `token_program`
    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<Vec<(Pubkey, Account)>, LedgerError>;
}
