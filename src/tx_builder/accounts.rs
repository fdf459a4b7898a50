//! Account-creation and initialization instructions
//!
//! `AccountBootstrapper` only builds instructions. The ledger is consulted
//! for rent-exemption minimums, nothing is submitted from here.

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    system_instruction,
};
use spl_token::solana_program::program_pack::Pack;
use std::sync::Arc;
use tracing::debug;

use crate::rpc_manager::Ledger;
use crate::tx_builder::address::AddressDeriver;
use crate::tx_builder::errors::BootstrapError;
use crate::tx_builder::token_swap::{self, InitSwapAccounts, SwapPoolConfig};
use crate::types::MintInfo;

/// Inputs of a system create-account instruction
///
/// Consumed by [`AccountCreationSpec::into_instruction`], so a spec produces
/// exactly one instruction.
#[derive(Debug)]
pub struct AccountCreationSpec {
    pub funder: Pubkey,
    pub new_account: Pubkey,
    pub space: u64,
    pub rent_lamports: u64,
    pub owning_program: Pubkey,
}

impl AccountCreationSpec {
    pub fn into_instruction(self) -> Instruction {
        system_instruction::create_account(
            &self.funder,
            &self.new_account,
            self.rent_lamports,
            self.space,
            &self.owning_program,
        )
    }
}

/// Freshly generated LP mint
///
/// The mint keypair must sign the transaction that creates it.
#[derive(Debug, Clone)]
pub struct PoolMint {
    pub address: Pubkey,
    pub authority: Pubkey,
    pub decimals: u8,
    pub token_program: Pubkey,
    pub instructions: Vec<Instruction>,
    keypair: Arc<Keypair>,
}

impl PoolMint {
    pub fn keypair(&self) -> Arc<Keypair> {
        self.keypair.clone()
    }
}

/// A token account about to be created
#[derive(Debug, Clone)]
pub struct CreatedTokenAccount {
    pub address: Pubkey,
    pub instructions: Vec<Instruction>,
    /// Present when the account is a fresh keypair that must sign
    pub keypair: Option<Arc<Keypair>>,
}

/// One initial deposit into a pool vault
#[derive(Debug, Clone, Copy)]
pub struct LiquidityDeposit {
    pub mint: MintInfo,
    pub vault: Pubkey,
    pub amount: u64,
}

/// Builds the individual instructions of a pool bootstrap
pub struct AccountBootstrapper<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    deriver: AddressDeriver,
    token_program: Pubkey,
}

impl<L: Ledger + ?Sized> AccountBootstrapper<L> {
    /// `token_program` owns the LP mint and the LP token accounts
    pub fn new(ledger: Arc<L>, deriver: AddressDeriver, token_program: Pubkey) -> Self {
        Self {
            ledger,
            deriver,
            token_program,
        }
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    /// Query rent for `space` bytes and describe the account to create
    pub async fn account_creation_spec(
        &self,
        funder: &Pubkey,
        new_account: &Pubkey,
        space: usize,
        owning_program: &Pubkey,
    ) -> Result<AccountCreationSpec, BootstrapError> {
        crate::metrics::metrics().rent_queries.inc();
        let rent_lamports = self
            .ledger
            .minimum_balance_for_rent_exemption(space)
            .await
            .map_err(|e| BootstrapError::RentQuery {
                space: space as u64,
                reason: e.to_string(),
            })?;

        debug!(space, rent_lamports, account = %new_account, "Rent-exempt minimum resolved");

        Ok(AccountCreationSpec {
            funder: *funder,
            new_account: *new_account,
            space: space as u64,
            rent_lamports,
            owning_program: *owning_program,
        })
    }

    /// System create-account instruction funded with the rent-exempt minimum
    pub async fn create_raw_account(
        &self,
        funder: &Pubkey,
        new_account: &Pubkey,
        space: usize,
        owning_program: &Pubkey,
    ) -> Result<Instruction, BootstrapError> {
        let spec = self
            .account_creation_spec(funder, new_account, space, owning_program)
            .await?;
        Ok(spec.into_instruction())
    }

    /// Associated token account of `owner` for `mint`
    ///
    /// Off-curve owners such as the swap authority are accepted.
    pub fn create_associated_account(
        &self,
        payer: &Pubkey,
        owner: &Pubkey,
        mint: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<(Pubkey, Instruction), BootstrapError> {
        let address = self
            .deriver
            .derive_associated_address(owner, mint, token_program)?;

        let ix = spl_associated_token_account::instruction::create_associated_token_account(
            payer,
            owner,
            mint,
            token_program,
        );

        // accounts: [payer, ata, owner, mint, system, token_program]
        if ix.accounts.get(1).map(|meta| meta.pubkey) != Some(address) {
            return Err(BootstrapError::instruction_failed(
                "associated_token_account",
                format!(
                    "derived address {} does not match the instruction (ATA program {})",
                    address,
                    self.deriver.associated_token_program()
                ),
            ));
        }

        Ok((address, ix))
    }

    /// Fresh LP mint with `authority` as mint authority and no freeze authority
    pub async fn create_pool_mint(
        &self,
        payer: &Pubkey,
        authority: &Pubkey,
        decimals: u8,
    ) -> Result<PoolMint, BootstrapError> {
        let keypair = Arc::new(Keypair::new());
        let address = keypair.pubkey();

        let create = self
            .create_raw_account(payer, &address, spl_token::state::Mint::LEN, &self.token_program)
            .await?;
        let init = spl_token::instruction::initialize_mint2(
            &self.token_program,
            &address,
            authority,
            None,
            decimals,
        )
        .map_err(|e| BootstrapError::instruction_failed("spl_token", e.to_string()))?;

        Ok(PoolMint {
            address,
            authority: *authority,
            decimals,
            token_program: self.token_program,
            instructions: vec![create, init],
            keypair,
        })
    }

    /// Fresh-keypair LP token account owned by `owner`
    pub async fn create_pool_token_account(
        &self,
        payer: &Pubkey,
        pool_mint: &PoolMint,
        owner: &Pubkey,
        expected_decimals: u8,
    ) -> Result<CreatedTokenAccount, BootstrapError> {
        check_decimals(pool_mint, expected_decimals)?;

        let keypair = Arc::new(Keypair::new());
        let address = keypair.pubkey();

        let create = self
            .create_raw_account(
                payer,
                &address,
                spl_token::state::Account::LEN,
                &pool_mint.token_program,
            )
            .await?;
        let init = spl_token::instruction::initialize_account3(
            &pool_mint.token_program,
            &address,
            &pool_mint.address,
            owner,
        )
        .map_err(|e| BootstrapError::instruction_failed("spl_token", e.to_string()))?;

        Ok(CreatedTokenAccount {
            address,
            instructions: vec![create, init],
            keypair: Some(keypair),
        })
    }

    /// Associated LP token account of `fee_owner`
    pub fn create_fee_account(
        &self,
        payer: &Pubkey,
        pool_mint: &PoolMint,
        fee_owner: &Pubkey,
        expected_decimals: u8,
    ) -> Result<CreatedTokenAccount, BootstrapError> {
        check_decimals(pool_mint, expected_decimals)?;

        let (address, ix) = self.create_associated_account(
            payer,
            fee_owner,
            &pool_mint.address,
            &pool_mint.token_program,
        )?;

        Ok(CreatedTokenAccount {
            address,
            instructions: vec![ix],
            keypair: None,
        })
    }

    /// The swap program's initialize instruction
    pub fn create_init_swap_instruction(
        &self,
        accounts: &InitSwapAccounts,
        swap_program: &Pubkey,
        config: &SwapPoolConfig,
    ) -> Instruction {
        token_swap::create_init_swap_instruction(accounts, swap_program, config)
    }

    /// `transfer_checked` from the payer's associated accounts into the vaults
    pub fn seed_liquidity(
        &self,
        payer: &Pubkey,
        deposits: &[LiquidityDeposit],
    ) -> Result<Vec<Instruction>, BootstrapError> {
        let mut instructions = Vec::with_capacity(deposits.len());
        for deposit in deposits {
            if deposit.amount == 0 {
                return Err(BootstrapError::config(format!(
                    "zero initial deposit for mint {}",
                    deposit.mint.address
                )));
            }

            let source = self.deriver.derive_associated_address(
                payer,
                &deposit.mint.address,
                &deposit.mint.token_program,
            )?;

            let mut ix = spl_token::instruction::transfer_checked(
                &spl_token::id(),
                &source,
                &deposit.mint.address,
                &deposit.vault,
                payer,
                &[],
                deposit.amount,
                deposit.mint.decimals,
            )
            .map_err(|e| BootstrapError::instruction_failed("spl_token", e.to_string()))?;
            // TransferChecked has the same encoding under token-2022
            ix.program_id = deposit.mint.token_program;

            instructions.push(ix);
        }
        Ok(instructions)
    }
}

fn check_decimals(pool_mint: &PoolMint, expected: u8) -> Result<(), BootstrapError> {
    if pool_mint.decimals != expected {
        return Err(BootstrapError::instruction_failed(
            "spl_token",
            format!(
                "pool mint {} has {} decimals, expected {}",
                pool_mint.address, pool_mint.decimals, expected
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;
    use solana_sdk::system_program;

    fn bootstrapper(ledger: MockLedger) -> AccountBootstrapper<MockLedger> {
        AccountBootstrapper::new(Arc::new(ledger), AddressDeriver::default(), spl_token::id())
    }

    #[tokio::test]
    async fn test_create_raw_account_uses_rent_minimum() {
        let accounts = bootstrapper(MockLedger::new());
        let payer = Pubkey::new_unique();
        let state = Pubkey::new_unique();
        let swap_program = Pubkey::new_unique();

        let ix = accounts
            .create_raw_account(&payer, &state, token_swap::SWAP_STATE_LEN, &swap_program)
            .await
            .unwrap();

        assert_eq!(ix.program_id, system_program::id());
        assert_eq!(ix.accounts[0].pubkey, payer);
        assert_eq!(ix.accounts[1].pubkey, state);
        assert!(ix.accounts[1].is_signer);

        let expected = system_instruction::create_account(
            &payer,
            &state,
            MockLedger::rent_for(token_swap::SWAP_STATE_LEN),
            token_swap::SWAP_STATE_LEN as u64,
            &swap_program,
        );
        assert_eq!(ix.data, expected.data);
    }

    #[tokio::test]
    async fn test_rent_failure_maps_to_rent_query() {
        let accounts = bootstrapper(MockLedger::new().fail_rent());
        let err = accounts
            .create_raw_account(&Pubkey::new_unique(), &Pubkey::new_unique(), 165, &spl_token::id())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::RentQuery { space: 165, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_associated_account_for_off_curve_owner() {
        let accounts = bootstrapper(MockLedger::new());
        let payer = Pubkey::new_unique();
        let (authority, _) = Pubkey::find_program_address(&[b"state".as_ref()], &Pubkey::new_unique());
        let mint = Pubkey::new_unique();

        let (address, ix) = accounts
            .create_associated_account(&payer, &authority, &mint, &spl_token::id())
            .unwrap();

        assert_eq!(
            address,
            spl_associated_token_account::get_associated_token_address_with_program_id(
                &authority,
                &mint,
                &spl_token::id()
            )
        );
        assert_eq!(ix.program_id, spl_associated_token_account::id());
    }

    #[tokio::test]
    async fn test_pool_mint_and_accounts() {
        let accounts = bootstrapper(MockLedger::new());
        let payer = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let fee_owner = Pubkey::new_unique();

        let mint = accounts.create_pool_mint(&payer, &authority, 2).await.unwrap();
        assert_eq!(mint.instructions.len(), 2);
        assert_eq!(mint.decimals, 2);
        assert_eq!(mint.keypair().pubkey(), mint.address);
        assert_eq!(mint.instructions[1].program_id, spl_token::id());

        let pool_account = accounts
            .create_pool_token_account(&payer, &mint, &payer, 2)
            .await
            .unwrap();
        assert_eq!(pool_account.instructions.len(), 2);
        assert!(pool_account.keypair.is_some());

        let fee = accounts.create_fee_account(&payer, &mint, &fee_owner, 2).unwrap();
        assert!(fee.keypair.is_none());
        assert_eq!(
            fee.address,
            spl_associated_token_account::get_associated_token_address(&fee_owner, &mint.address)
        );
    }

    #[tokio::test]
    async fn test_decimals_mismatch() {
        let accounts = bootstrapper(MockLedger::new());
        let payer = Pubkey::new_unique();
        let mint = accounts
            .create_pool_mint(&payer, &Pubkey::new_unique(), 2)
            .await
            .unwrap();

        let err = accounts
            .create_pool_token_account(&payer, &mint, &payer, 6)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::InstructionBuild { .. }));

        let err = accounts
            .create_fee_account(&payer, &mint, &Pubkey::new_unique(), 9)
            .unwrap_err();
        assert!(matches!(err, BootstrapError::InstructionBuild { .. }));
    }

    #[test]
    fn test_seed_liquidity() {
        let accounts = bootstrapper(MockLedger::new());
        let payer = Pubkey::new_unique();
        let mint = MintInfo {
            address: Pubkey::new_unique(),
            decimals: 6,
            token_program: spl_token::id(),
        };
        let vault = Pubkey::new_unique();

        let ixs = accounts
            .seed_liquidity(&payer, &[LiquidityDeposit { mint, vault, amount: 1_000 }])
            .unwrap();
        assert_eq!(ixs.len(), 1);
        let ix = &ixs[0];
        assert_eq!(ix.accounts[0].pubkey, accounts.deriver().derive_associated_address(&payer, &mint.address, &spl_token::id()).unwrap());
        assert_eq!(ix.accounts[2].pubkey, vault);
        assert_eq!(ix.accounts[3].pubkey, payer);
        assert!(ix.accounts[3].is_signer);

        let zero = accounts.seed_liquidity(&payer, &[LiquidityDeposit { mint, vault, amount: 0 }]);
        assert!(zero.is_err());
    }
}
