//! Test Utilities Module
//!
//! In-memory `Ledger` for deterministic tests of the bootstrap pipeline.
//! Nothing here touches the network.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{TransactionError, VersionedTransaction},
};
use spl_token::solana_program::{program_option::COption, program_pack::Pack};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::rpc_manager::{Ledger, LedgerError};

/// Lamports per byte for two years of rent at the default rate
const MOCK_RENT_PER_BYTE: u64 = 6960;

/// Storage overhead the runtime charges for every account
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

#[derive(Default)]
struct MockState {
    sent: Vec<VersionedTransaction>,
    accounts: HashMap<Pubkey, Account>,
    token_accounts: HashMap<(Pubkey, Pubkey), Vec<(Pubkey, Account)>>,
    fail_send_at: Option<(usize, LedgerError)>,
    fail_rent: bool,
    never_confirm: bool,
    land_with_error: Option<TransactionError>,
}

/// In-memory ledger with configurable failures
///
/// Sent transactions are recorded and confirm immediately unless configured
/// otherwise.
pub struct MockLedger {
    state: Mutex<MockState>,
    fetch_delay: Duration,
    fetches: AtomicUsize,
    in_flight_fetches: AtomicUsize,
    max_concurrent_fetches: AtomicUsize,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fetch_delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
            in_flight_fetches: AtomicUsize::new(0),
            max_concurrent_fetches: AtomicUsize::new(0),
        }
    }

    /// Rent the mock charges for `space` bytes
    pub fn rent_for(space: usize) -> u64 {
        (ACCOUNT_STORAGE_OVERHEAD + space as u64) * MOCK_RENT_PER_BYTE
    }

    pub fn with_account(self, address: Pubkey, account: Account) -> Self {
        self.state.lock().accounts.insert(address, account);
        self
    }

    /// Register an initialized SPL mint with `decimals`, owned by `token_program`
    pub fn with_mint(self, mint: Pubkey, decimals: u8, token_program: Pubkey) -> Self {
        let state = spl_token::state::Mint {
            mint_authority: COption::None,
            supply: 0,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        };
        let mut data = vec![0u8; spl_token::state::Mint::LEN];
        // Packing a freshly built mint cannot fail
        let _ = spl_token::state::Mint::pack(state, &mut data);

        self.with_account(
            mint,
            Account {
                lamports: Self::rent_for(data.len()),
                data,
                owner: token_program,
                executable: false,
                rent_epoch: 0,
            },
        )
    }

    /// Register a token account holding `amount` of `mint` for `owner`
    pub fn with_token_account(
        self,
        owner: Pubkey,
        token_program: Pubkey,
        address: Pubkey,
        mint: Pubkey,
        amount: u64,
    ) -> Self {
        let state = spl_token::state::Account {
            mint,
            owner,
            amount,
            state: spl_token::state::AccountState::Initialized,
            ..Default::default()
        };
        let mut data = vec![0u8; spl_token::state::Account::LEN];
        let _ = spl_token::state::Account::pack(state, &mut data);

        let account = Account {
            lamports: Self::rent_for(data.len()),
            data,
            owner: token_program,
            executable: false,
            rent_epoch: 0,
        };
        self.state
            .lock()
            .token_accounts
            .entry((owner, token_program))
            .or_default()
            .push((address, account));
        self
    }

    /// Reject the send with zero-based index `index` with `err`
    pub fn fail_send_at(self, index: usize, err: LedgerError) -> Self {
        self.state.lock().fail_send_at = Some((index, err));
        self
    }

    pub fn fail_rent(self) -> Self {
        self.state.lock().fail_rent = true;
        self
    }

    /// Sent transactions never reach any commitment
    pub fn never_confirm(self) -> Self {
        self.state.lock().never_confirm = true;
        self
    }

    /// Sent transactions land but fail on execution
    pub fn land_with_error(self, err: TransactionError) -> Self {
        self.state.lock().land_with_error = Some(err);
        self
    }

    /// Delay applied to every token-account fetch
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Transactions accepted so far, in send order
    pub fn sent_transactions(&self) -> Vec<VersionedTransaction> {
        self.state.lock().sent.clone()
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// Number of `token_accounts_by_owner` calls
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `token_accounts_by_owner` calls
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    fn endpoint(&self) -> &str {
        "mock://ledger"
    }

    async fn minimum_balance_for_rent_exemption(&self, space: usize) -> Result<u64, LedgerError> {
        if self.state.lock().fail_rent {
            return Err(LedgerError::Transport {
                endpoint: self.endpoint().to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(Self::rent_for(space))
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(Hash::new_unique())
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError> {
        let mut state = self.state.lock();
        let attempt = state.sent.len();
        if let Some((index, err)) = &state.fail_send_at {
            if *index == attempt {
                return Err(err.clone());
            }
        }
        state.sent.push(tx.clone());
        Ok(tx.signatures.first().copied().unwrap_or_default())
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        _commitment: CommitmentConfig,
    ) -> Result<Option<Result<(), TransactionError>>, LedgerError> {
        let state = self.state.lock();
        let known = state
            .sent
            .iter()
            .any(|tx| tx.signatures.first() == Some(signature));
        if !known || state.never_confirm {
            return Ok(None);
        }
        match &state.land_with_error {
            Some(err) => Ok(Some(Err(err.clone()))),
            None => Ok(Some(Ok(()))),
        }
    }

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError> {
        Ok(self.state.lock().accounts.get(address).cloned())
    }

    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<Vec<(Pubkey, Account)>, LedgerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_fetches.fetch_max(now, Ordering::SeqCst);

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let accounts = self
            .state
            .lock()
            .token_accounts
            .get(&(*owner, *token_program))
            .cloned()
            .unwrap_or_default();

        self.in_flight_fetches.fetch_sub(1, Ordering::SeqCst);
        Ok(accounts)
    }
}
