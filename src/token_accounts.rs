//! Owner token-account tracking
//!
//! Keeps a snapshot of the owner's native balance and token accounts
//! (under both the token and token-2022 programs) fresh in response to
//! account-change notifications.
//!
//! Refreshes never overlap. A request that arrives while a refresh is
//! running only sets a single pending flag, so a burst of notifications
//! collapses into at most one follow-up refresh.

use parking_lot::RwLock;
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics::metrics;
use crate::rpc_manager::Ledger;
use crate::streaming::AccountNotification;
use crate::tx_builder::BootstrapError;

/// One parsed token account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountEntry {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub token_program: Pubkey,
}

/// Owner balances at the time of the last refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountSnapshot {
    pub owner: Pubkey,
    pub lamports: u64,
    pub accounts: Vec<TokenAccountEntry>,
}

impl TokenAccountSnapshot {
    /// Sum of balances held for `mint`
    pub fn balance_of(&self, mint: &Pubkey) -> u64 {
        self.accounts
            .iter()
            .filter(|entry| entry.mint == *mint)
            .map(|entry| entry.amount)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call ran one or more refreshes
    Refreshed,
    /// A refresh was already running and will pick this request up
    Coalesced,
}

pub struct TokenAccountRefresher<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    owner: Pubkey,
    token_programs: Vec<Pubkey>,
    in_flight: AtomicBool,
    pending: AtomicBool,
    snapshot: RwLock<Option<TokenAccountSnapshot>>,
    refreshes: AtomicU64,
}

impl<L: Ledger + ?Sized> TokenAccountRefresher<L> {
    pub fn new(ledger: Arc<L>, owner: Pubkey, token_programs: impl IntoIterator<Item = Pubkey>) -> Self {
        Self {
            ledger,
            owner,
            token_programs: token_programs.into_iter().collect(),
            in_flight: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            snapshot: RwLock::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn owner(&self) -> &Pubkey {
        &self.owner
    }

    /// Latest snapshot, if any refresh has completed
    pub fn snapshot(&self) -> Option<TokenAccountSnapshot> {
        self.snapshot.read().clone()
    }

    /// Number of completed refreshes
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Ask for a refresh
    ///
    /// Runs the refresh inline unless one is already in flight, in which
    /// case the request is folded into a single follow-up.
    pub async fn request_refresh(&self) -> Result<RefreshOutcome, BootstrapError> {
        self.pending.store(true, Ordering::SeqCst);
        if self.in_flight.swap(true, Ordering::SeqCst) {
            metrics().refreshes_coalesced.inc();
            return Ok(RefreshOutcome::Coalesced);
        }

        loop {
            {
                let _guard = scopeguard::guard(&self.in_flight, |flag| {
                    flag.store(false, Ordering::SeqCst);
                });
                while self.pending.swap(false, Ordering::SeqCst) {
                    self.refresh_once().await?;
                }
            }

            // A request may land between the last pending check and the release
            if !self.pending.load(Ordering::SeqCst) || self.in_flight.swap(true, Ordering::SeqCst) {
                return Ok(RefreshOutcome::Refreshed);
            }
        }
    }

    async fn refresh_once(&self) -> Result<(), BootstrapError> {
        let lamports = self
            .ledger
            .account(&self.owner)
            .await?
            .map(|account| account.lamports)
            .unwrap_or(0);

        let mut accounts = Vec::new();
        for program in &self.token_programs {
            for (address, account) in self.ledger.token_accounts_by_owner(&self.owner, program).await? {
                match parse_token_account(&account.data) {
                    Some((mint, amount)) => accounts.push(TokenAccountEntry {
                        address,
                        mint,
                        amount,
                        token_program: *program,
                    }),
                    None => debug!(account = %address, "Skipping unparseable token account"),
                }
            }
        }

        debug!(owner = %self.owner, lamports, token_accounts = accounts.len(), "Token accounts refreshed");
        *self.snapshot.write() = Some(TokenAccountSnapshot {
            owner: self.owner,
            lamports,
            accounts,
        });
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        metrics().token_account_refreshes.inc();
        Ok(())
    }

    /// Refresh on every notification until the channel closes
    ///
    /// Notifications queued behind the one being handled are drained first,
    /// since a single refresh covers all of them.
    pub async fn run_listener(self: Arc<Self>, mut rx: mpsc::Receiver<AccountNotification>) {
        info!(owner = %self.owner, "Token account listener started");
        while let Some(notification) = rx.recv().await {
            let mut drained = 0usize;
            while rx.try_recv().is_ok() {
                drained += 1;
            }
            debug!(
                address = %notification.address,
                slot = notification.slot,
                drained,
                "Account change notification"
            );

            if let Err(e) = self.request_refresh().await {
                warn!(owner = %self.owner, error = %e, "Token account refresh failed");
            }
        }
        info!(owner = %self.owner, "Token account listener stopped");
    }
}

fn parse_token_account(data: &[u8]) -> Option<(Pubkey, u64)> {
    let base = data.get(..spl_token::state::Account::LEN)?;
    let account = spl_token::state::Account::unpack(base).ok()?;
    Some((account.mint, account.amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;
    use crate::types::TOKEN_2022_PROGRAM_ID;
    use futures::future::join_all;
    use std::time::Duration;

    #[tokio::test]
    async fn test_refresh_collects_both_programs() {
        let owner = Pubkey::new_unique();
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();
        let ledger = MockLedger::new()
            .with_token_account(owner, spl_token::id(), Pubkey::new_unique(), mint_a, 500)
            .with_token_account(owner, TOKEN_2022_PROGRAM_ID, Pubkey::new_unique(), mint_b, 7);
        let refresher = TokenAccountRefresher::new(
            Arc::new(ledger),
            owner,
            [spl_token::id(), TOKEN_2022_PROGRAM_ID],
        );

        assert!(refresher.snapshot().is_none());
        assert_eq!(refresher.request_refresh().await.unwrap(), RefreshOutcome::Refreshed);

        let snapshot = refresher.snapshot().unwrap();
        assert_eq!(snapshot.accounts.len(), 2);
        assert_eq!(snapshot.balance_of(&mint_a), 500);
        assert_eq!(snapshot.balance_of(&mint_b), 7);
        assert_eq!(refresher.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_follow_up() {
        let ledger = Arc::new(MockLedger::new().with_fetch_delay(Duration::from_millis(50)));
        let refresher = TokenAccountRefresher::new(
            ledger.clone(),
            Pubkey::new_unique(),
            [spl_token::id(), TOKEN_2022_PROGRAM_ID],
        );

        let outcomes = join_all((0..10).map(|_| refresher.request_refresh())).await;
        let outcomes: Vec<RefreshOutcome> = outcomes.into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(outcomes[0], RefreshOutcome::Refreshed);
        assert!(outcomes[1..].iter().all(|o| *o == RefreshOutcome::Coalesced));
        // The initial refresh plus exactly one follow-up for the burst
        assert_eq!(refresher.refresh_count(), 2);
        assert_eq!(ledger.max_concurrent_fetches(), 1);
    }

    #[tokio::test]
    async fn test_listener_refreshes_until_channel_closes() {
        let owner = Pubkey::new_unique();
        let refresher = Arc::new(TokenAccountRefresher::new(
            Arc::new(MockLedger::new()),
            owner,
            [spl_token::id()],
        ));
        let (tx, rx) = mpsc::channel(8);

        for slot in 0..3 {
            tx.send(AccountNotification {
                address: owner,
                slot,
                lamports: 1,
            })
            .await
            .unwrap();
        }
        drop(tx);

        refresher.clone().run_listener(rx).await;
        // All three queued notifications are served by one refresh
        assert_eq!(refresher.refresh_count(), 1);
    }
}
