//! Mint metadata providers
//!
//! The bootstrap needs the decimals and owning token program of both pool
//! mints. They come either from the ledger or from static configuration.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::rpc_manager::Ledger;
use crate::tx_builder::BootstrapError;
use crate::types::{MintInfo, ProgramIds};

/// Source of mint metadata
#[async_trait]
pub trait MintInfoSource: Send + Sync {
    async fn mint_info(&self, mint: &Pubkey) -> Result<MintInfo, BootstrapError>;
}

/// Reads mint accounts from the ledger
pub struct LedgerMintSource<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    program_ids: ProgramIds,
}

impl<L: Ledger + ?Sized> LedgerMintSource<L> {
    pub fn new(ledger: Arc<L>, program_ids: ProgramIds) -> Self {
        Self {
            ledger,
            program_ids,
        }
    }
}

#[async_trait]
impl<L: Ledger + ?Sized> MintInfoSource for LedgerMintSource<L> {
    async fn mint_info(&self, mint: &Pubkey) -> Result<MintInfo, BootstrapError> {
        let account = self
            .ledger
            .account(mint)
            .await?
            .ok_or_else(|| BootstrapError::config(format!("mint {} does not exist", mint)))?;

        if !self.program_ids.token_programs().contains(&account.owner) {
            return Err(BootstrapError::config(format!(
                "account {} is owned by {}, not a token program",
                mint, account.owner
            )));
        }

        // Token-2022 mints carry extensions after the base layout
        let base = account
            .data
            .get(..spl_token::state::Mint::LEN)
            .ok_or_else(|| BootstrapError::config(format!("account {} is not a mint", mint)))?;
        let state = spl_token::state::Mint::unpack(base).map_err(|e| {
            BootstrapError::config(format!("account {} is not an initialized mint: {}", mint, e))
        })?;

        debug!(mint = %mint, decimals = state.decimals, program = %account.owner, "Resolved mint");
        Ok(MintInfo {
            address: *mint,
            decimals: state.decimals,
            token_program: account.owner,
        })
    }
}

/// Mint metadata from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticMintSource {
    mints: HashMap<Pubkey, MintInfo>,
}

impl StaticMintSource {
    pub fn new(mints: impl IntoIterator<Item = MintInfo>) -> Self {
        Self {
            mints: mints.into_iter().map(|m| (m.address, m)).collect(),
        }
    }
}

#[async_trait]
impl MintInfoSource for StaticMintSource {
    async fn mint_info(&self, mint: &Pubkey) -> Result<MintInfo, BootstrapError> {
        self.mints
            .get(mint)
            .copied()
            .ok_or_else(|| BootstrapError::config(format!("no static metadata for mint {}", mint)))
    }
}
