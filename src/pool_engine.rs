//! Pool bootstrap engine
//!
//! Drives one bootstrap invocation end to end: resolves both mints, derives
//! the swap authority, builds every account and the initialize instruction,
//! packs them into plans and submits them. Completed transactions are never
//! rolled back; a failure is reported together with the steps that landed.

use serde::Serialize;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::sync::Arc;

use crate::metrics::{metrics, Timer};
use crate::resolver::MintInfoSource;
use crate::rpc_manager::Ledger;
use crate::structured_logging::PipelineContext;
use crate::tx_builder::{
    assemble, AccountBootstrapper, AddressDeriver, BootstrapContext, BootstrapError,
    BootstrapStep, InitSwapAccounts, LiquidityDeposit, SequencedInstruction, SequencerLimits,
    SwapPoolConfig, TransactionPlan, TransactionSubmitter, SWAP_STATE_LEN,
};
use crate::types::pubkey_string;
use crate::wallet::WalletManager;

/// Initial deposits moved into the vaults before initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedLiquidity {
    pub amount_a: u64,
    pub amount_b: u64,
}

/// Everything one bootstrap needs from the caller
#[derive(Debug, Clone)]
pub struct PoolBootstrapRequest {
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub fee_owner: Pubkey,
    pub config: SwapPoolConfig,
    pub pool_mint_decimals: u8,
    pub seed_liquidity: Option<SeedLiquidity>,
    pub sequential: bool,
}

/// Addresses of every account the bootstrap creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolAddresses {
    #[serde(with = "pubkey_string")]
    pub swap_state: Pubkey,
    #[serde(with = "pubkey_string")]
    pub swap_authority: Pubkey,
    pub authority_bump: u8,
    #[serde(with = "pubkey_string")]
    pub token_a_vault: Pubkey,
    #[serde(with = "pubkey_string")]
    pub token_b_vault: Pubkey,
    #[serde(with = "pubkey_string")]
    pub pool_mint: Pubkey,
    #[serde(with = "pubkey_string")]
    pub pool_token_account: Pubkey,
    #[serde(with = "pubkey_string")]
    pub fee_account: Pubkey,
}

/// Plans ready for submission
pub struct PreparedBootstrap {
    pub addresses: PoolAddresses,
    pub plans: Vec<TransactionPlan>,
}

/// One confirmed transaction and the steps it carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedPlan {
    pub index: usize,
    pub steps: Vec<BootstrapStep>,
    pub signature: Signature,
}

#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub addresses: PoolAddresses,
    pub confirmed: Vec<ConfirmedPlan>,
}

pub struct PoolBootstrapEngine<L: Ledger + ?Sized> {
    ctx: BootstrapContext,
    ledger: Arc<L>,
    payer: Arc<Keypair>,
    mints: Arc<dyn MintInfoSource>,
    limits: SequencerLimits,
}

impl<L: Ledger + ?Sized> PoolBootstrapEngine<L> {
    pub fn new(
        ctx: BootstrapContext,
        ledger: Arc<L>,
        wallet: &WalletManager,
        mints: Arc<dyn MintInfoSource>,
    ) -> Self {
        Self {
            ctx,
            ledger,
            payer: wallet.keypair_arc(),
            mints,
            limits: SequencerLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SequencerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn payer(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Build and pack every instruction without sending anything
    pub async fn prepare(
        &self,
        request: &PoolBootstrapRequest,
        pipeline: &PipelineContext,
    ) -> Result<PreparedBootstrap, BootstrapError> {
        if request.mint_a == request.mint_b {
            return Err(BootstrapError::config(format!(
                "pool needs two distinct mints, got {} twice",
                request.mint_a
            )));
        }

        let mint_a = self.mints.mint_info(&request.mint_a).await?;
        let mint_b = self.mints.mint_info(&request.mint_b).await?;

        let payer = self.payer.pubkey();
        let ids = self.ctx.program_ids;

        // Init-swap passes one token program for both vaults and the LP mint
        for mint in [&mint_a, &mint_b] {
            if mint.token_program != ids.token {
                return Err(BootstrapError::instruction_failed(
                    "token_swap",
                    format!(
                        "mint {} is owned by {}, pool token program is {}",
                        mint.address, mint.token_program, ids.token
                    ),
                ));
            }
        }
        let swap_program = ids.token_swap;
        let bootstrapper = AccountBootstrapper::new(
            self.ledger.clone(),
            AddressDeriver::new(ids.associated_token),
            ids.token,
        );
        let log = &pipeline.logger;
        let mut sequence: Vec<SequencedInstruction> = Vec::new();

        // 1-2: state account, and the authority that only exists relative to it
        let state = Arc::new(Keypair::new());
        let authority = bootstrapper
            .deriver()
            .derive(&[state.pubkey().as_ref()], &swap_program)?;
        let create_state = bootstrapper
            .create_raw_account(&payer, &state.pubkey(), SWAP_STATE_LEN, &swap_program)
            .await?;
        sequence.push(
            SequencedInstruction::new(BootstrapStep::StateAccount, create_state)
                .producing([state.pubkey(), authority.address]),
        );
        log.log_step_queued(BootstrapStep::StateAccount, 1);

        // 3: vaults owned by the authority
        let (vault_a, create_a) = bootstrapper.create_associated_account(
            &payer,
            &authority.address,
            &mint_a.address,
            &mint_a.token_program,
        )?;
        let (vault_b, create_b) = bootstrapper.create_associated_account(
            &payer,
            &authority.address,
            &mint_b.address,
            &mint_b.token_program,
        )?;
        sequence.push(
            SequencedInstruction::new(BootstrapStep::VaultAccounts, create_a).producing([vault_a]),
        );
        sequence.push(
            SequencedInstruction::new(BootstrapStep::VaultAccounts, create_b).producing([vault_b]),
        );
        log.log_step_queued(BootstrapStep::VaultAccounts, 2);

        // 4: LP mint controlled by the authority
        let pool_mint = bootstrapper
            .create_pool_mint(&payer, &authority.address, request.pool_mint_decimals)
            .await?;
        push_step(
            &mut sequence,
            BootstrapStep::PoolMint,
            pool_mint.instructions.clone(),
            [pool_mint.address],
        );
        log.log_step_queued(BootstrapStep::PoolMint, pool_mint.instructions.len());

        // 5: LP destination for the payer and the fee account
        let pool_token = bootstrapper
            .create_pool_token_account(&payer, &pool_mint, &payer, request.pool_mint_decimals)
            .await?;
        let fee_account = bootstrapper.create_fee_account(
            &payer,
            &pool_mint,
            &request.fee_owner,
            request.pool_mint_decimals,
        )?;
        push_step(
            &mut sequence,
            BootstrapStep::PoolTokenAccounts,
            pool_token.instructions.clone(),
            [pool_token.address],
        );
        push_step(
            &mut sequence,
            BootstrapStep::PoolTokenAccounts,
            fee_account.instructions.clone(),
            [fee_account.address],
        );
        log.log_step_queued(
            BootstrapStep::PoolTokenAccounts,
            pool_token.instructions.len() + fee_account.instructions.len(),
        );

        if let Some(seed) = request.seed_liquidity {
            let deposits = [
                LiquidityDeposit {
                    mint: mint_a,
                    vault: vault_a,
                    amount: seed.amount_a,
                },
                LiquidityDeposit {
                    mint: mint_b,
                    vault: vault_b,
                    amount: seed.amount_b,
                },
            ];
            let transfers = bootstrapper.seed_liquidity(&payer, &deposits)?;
            log.log_step_queued(BootstrapStep::SeedLiquidity, transfers.len());
            push_step(&mut sequence, BootstrapStep::SeedLiquidity, transfers, Vec::<Pubkey>::new());
        }

        // 6: initialize the pool
        let init_accounts = InitSwapAccounts {
            state_account: state.pubkey(),
            swap_authority: authority.address,
            token_a_account: vault_a,
            token_b_account: vault_b,
            pool_mint: pool_mint.address,
            fee_account: fee_account.address,
            destination_account: pool_token.address,
            token_program: pool_mint.token_program,
        };
        let init = bootstrapper.create_init_swap_instruction(
            &init_accounts,
            &swap_program,
            &request.config,
        );
        sequence.push(SequencedInstruction::new(BootstrapStep::InitializeSwap, init));
        log.log_step_queued(BootstrapStep::InitializeSwap, 1);

        let addresses = PoolAddresses {
            swap_state: state.pubkey(),
            swap_authority: authority.address,
            authority_bump: authority.bump,
            token_a_vault: vault_a,
            token_b_vault: vault_b,
            pool_mint: pool_mint.address,
            pool_token_account: pool_token.address,
            fee_account: fee_account.address,
        };
        log.log_addresses(&addresses.swap_state, &addresses.swap_authority, &addresses.pool_mint);

        let mut signers = vec![self.payer.clone(), state, pool_mint.keypair()];
        signers.extend(pool_token.keypair.iter().cloned());
        signers.extend(fee_account.keypair.iter().cloned());

        let instruction_count = sequence.len();
        let plans = assemble(sequence, &payer, &signers, &self.limits)?;
        log.log_plan_assembled(plans.len(), instruction_count);

        Ok(PreparedBootstrap { addresses, plans })
    }

    /// Prepare and submit a bootstrap
    ///
    /// # Errors
    ///
    /// Preparation errors are returned before anything is sent. Submission
    /// errors arrive as `PartialSubmission`, after the steps that did
    /// confirm have been logged.
    pub async fn bootstrap(
        &self,
        request: &PoolBootstrapRequest,
    ) -> Result<BootstrapReport, BootstrapError> {
        let pipeline = PipelineContext::new("bootstrap");
        let timer = Timer::new();

        let prepared = match self.prepare(request, &pipeline).await {
            Ok(prepared) => prepared,
            Err(e) => {
                log_failure(&pipeline, &timer, &[], &e);
                return Err(e);
            }
        };

        let submitter = TransactionSubmitter::new(self.ledger.clone(), &self.ctx);
        let submit = pipeline.child("submit");
        match submitter.submit_all(&prepared.plans, request.sequential).await {
            Ok(signatures) => {
                let confirmed = confirmed_plans(&prepared.plans, &signatures);
                for plan in &confirmed {
                    submit
                        .logger
                        .log_transaction_confirmed(plan.index, &plan.steps, &plan.signature);
                }
                timer.observe_duration(&metrics().bootstrap_latency);
                pipeline.logger.log_bootstrap_success(
                    &prepared.addresses.swap_state,
                    confirmed.len(),
                    elapsed_ms(&timer),
                );
                Ok(BootstrapReport {
                    addresses: prepared.addresses,
                    confirmed,
                })
            }
            Err(e) => {
                let landed: Vec<BootstrapStep> = match &e {
                    BootstrapError::PartialSubmission { completed, .. } => {
                        confirmed_plans(&prepared.plans, completed)
                            .into_iter()
                            .flat_map(|plan| plan.steps)
                            .collect()
                    }
                    _ => Vec::new(),
                };
                log_failure(&pipeline, &timer, &landed, &e);
                Err(e)
            }
        }
    }
}

fn log_failure(
    pipeline: &PipelineContext,
    timer: &Timer,
    landed: &[BootstrapStep],
    error: &BootstrapError,
) {
    timer.observe_duration(&metrics().bootstrap_latency);
    pipeline
        .logger
        .log_bootstrap_failure(landed, &error.to_string(), elapsed_ms(timer));
}

fn elapsed_ms(timer: &Timer) -> u64 {
    (timer.elapsed_secs() * 1000.0) as u64
}

fn push_step(
    sequence: &mut Vec<SequencedInstruction>,
    step: BootstrapStep,
    instructions: Vec<solana_sdk::instruction::Instruction>,
    produces: impl IntoIterator<Item = Pubkey> + Clone,
) {
    // The first instruction of an account step is the one that creates it
    for (idx, ix) in instructions.into_iter().enumerate() {
        let sequenced = SequencedInstruction::new(step, ix);
        sequence.push(if idx == 0 {
            sequenced.producing(produces.clone())
        } else {
            sequenced
        });
    }
}

fn confirmed_plans(plans: &[TransactionPlan], signatures: &[Signature]) -> Vec<ConfirmedPlan> {
    plans
        .iter()
        .zip(signatures)
        .map(|(plan, signature)| {
            let mut steps = plan.steps().to_vec();
            steps.dedup();
            ConfirmedPlan {
                index: plan.index(),
                steps,
                signature: *signature,
            }
        })
        .collect()
}
