//! Instruction sequencing and ordering validation
//!
//! Bootstrap instructions are labelled with the step that emits them and the
//! addresses they bring into existence. The sequencer checks that nothing
//! consumes an address before it is produced, then packs the instructions,
//! in order, into as few transaction plans as the size and signature limits
//! allow.
//!
//! Instructions of the same step are kept in the same plan whenever the
//! step fits in one transaction on its own.

use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::VersionedMessage,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::VersionedTransaction,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::tx_builder::errors::BootstrapError;
use crate::tx_builder::plan::{compile, TransactionPlan};

/// Default cap on required signatures per transaction
pub const DEFAULT_MAX_SIGNATURES: usize = 8;

/// Bootstrap step an instruction belongs to, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BootstrapStep {
    /// Swap state account creation (also fixes the swap authority)
    StateAccount,
    /// Token A / token B vaults owned by the swap authority
    VaultAccounts,
    /// LP mint creation and initialization
    PoolMint,
    /// LP destination account and fee account
    PoolTokenAccounts,
    /// Initial deposits into the vaults
    SeedLiquidity,
    /// The swap program's initialize instruction
    InitializeSwap,
}

impl BootstrapStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapStep::StateAccount => "state_account",
            BootstrapStep::VaultAccounts => "vault_accounts",
            BootstrapStep::PoolMint => "pool_mint",
            BootstrapStep::PoolTokenAccounts => "pool_token_accounts",
            BootstrapStep::SeedLiquidity => "seed_liquidity",
            BootstrapStep::InitializeSwap => "initialize_swap",
        }
    }
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instruction with its step label and the addresses it produces
#[derive(Debug, Clone)]
pub struct SequencedInstruction {
    pub step: BootstrapStep,
    pub instruction: Instruction,
    pub produces: Vec<Pubkey>,
}

impl SequencedInstruction {
    pub fn new(step: BootstrapStep, instruction: Instruction) -> Self {
        Self {
            step,
            instruction,
            produces: Vec::new(),
        }
    }

    pub fn producing(mut self, addresses: impl IntoIterator<Item = Pubkey>) -> Self {
        self.produces.extend(addresses);
        self
    }

    fn references(&self) -> impl Iterator<Item = &Pubkey> {
        self.instruction.accounts.iter().map(|meta| &meta.pubkey)
    }
}

/// Per-transaction packing limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerLimits {
    /// Serialized transaction size cap, in bytes
    pub max_transaction_bytes: usize,
    /// Required-signature cap
    pub max_signatures: usize,
}

impl Default for SequencerLimits {
    fn default() -> Self {
        Self {
            max_transaction_bytes: PACKET_DATA_SIZE,
            max_signatures: DEFAULT_MAX_SIGNATURES,
        }
    }
}

/// Validate that no instruction references an address produced later
///
/// # Errors
///
/// Returns `InvalidInstructionOrder` naming the consumer, the producer and
/// the address, or when the list is empty.
pub fn validate_order(instructions: &[SequencedInstruction]) -> Result<(), BootstrapError> {
    if instructions.is_empty() {
        return Err(BootstrapError::invalid_order("Instruction list is empty"));
    }

    for (idx, ix) in instructions.iter().enumerate() {
        for (later_idx, later) in instructions.iter().enumerate().skip(idx + 1) {
            if let Some(addr) = ix.references().find(|key| later.produces.contains(key)) {
                return Err(BootstrapError::invalid_order(format!(
                    "instruction {} ({}) references {} before instruction {} ({}) produces it",
                    idx, ix.step, addr, later_idx, later.step
                )));
            }
        }
    }

    Ok(())
}

/// Assemble sequenced instructions into transaction plans
///
/// Steps are packed greedily in order. A step that fits in a fresh
/// transaction is never split across plans; a step too large for one
/// transaction is split per instruction.
///
/// # Errors
///
/// - `InvalidInstructionOrder` from [`validate_order`]
/// - `InstructionBuild` if a single instruction exceeds the limits
/// - `MissingSigner` if a plan needs a keypair absent from `signers`
pub fn assemble(
    instructions: Vec<SequencedInstruction>,
    payer: &Pubkey,
    signers: &[Arc<Keypair>],
    limits: &SequencerLimits,
) -> Result<Vec<TransactionPlan>, BootstrapError> {
    validate_order(&instructions)?;

    let mut packer = Packer {
        payer,
        signers,
        limits,
        plans: Vec::new(),
        produced: HashSet::new(),
        current: Vec::new(),
    };

    for group in group_by_step(instructions) {
        let mut candidate = packer.current.clone();
        candidate.extend(group.iter().cloned());
        if packer.fits(&candidate)? {
            packer.current = candidate;
            continue;
        }

        packer.flush()?;
        if packer.fits(&group)? {
            packer.current = group;
            continue;
        }

        for ix in group {
            let mut candidate = packer.current.clone();
            candidate.push(ix.clone());
            if packer.fits(&candidate)? {
                packer.current = candidate;
                continue;
            }

            packer.flush()?;
            let single = vec![ix];
            if !packer.fits(&single)? {
                let (bytes, sigs) = measure(payer, &single)?;
                return Err(BootstrapError::instruction_failed(
                    single[0].instruction.program_id.to_string(),
                    format!(
                        "{} instruction alone needs {} bytes and {} signatures (limits {} / {})",
                        single[0].step,
                        bytes,
                        sigs,
                        limits.max_transaction_bytes,
                        limits.max_signatures
                    ),
                ));
            }
            packer.current = single;
        }
    }
    packer.flush()?;

    debug!(plans = packer.plans.len(), "Assembled transaction plans");
    Ok(packer.plans)
}

struct Packer<'a> {
    payer: &'a Pubkey,
    signers: &'a [Arc<Keypair>],
    limits: &'a SequencerLimits,
    plans: Vec<TransactionPlan>,
    produced: HashSet<Pubkey>,
    current: Vec<SequencedInstruction>,
}

impl Packer<'_> {
    fn fits(&self, candidate: &[SequencedInstruction]) -> Result<bool, BootstrapError> {
        let (bytes, sigs) = measure(self.payer, candidate)?;
        Ok(bytes <= self.limits.max_transaction_bytes && sigs <= self.limits.max_signatures)
    }

    fn flush(&mut self) -> Result<(), BootstrapError> {
        if self.current.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.current);

        let depends_on_previous = batch
            .iter()
            .flat_map(|ix| ix.references())
            .any(|key| self.produced.contains(key));

        let mut instructions = Vec::with_capacity(batch.len());
        let mut steps = Vec::with_capacity(batch.len());
        for ix in batch {
            self.produced.extend(ix.produces.iter().copied());
            steps.push(ix.step);
            instructions.push(ix.instruction);
        }

        let plan = TransactionPlan::new(
            self.plans.len(),
            *self.payer,
            instructions,
            steps,
            self.signers,
            depends_on_previous,
        )?;
        self.plans.push(plan);
        Ok(())
    }
}

fn group_by_step(instructions: Vec<SequencedInstruction>) -> Vec<Vec<SequencedInstruction>> {
    let mut groups: Vec<Vec<SequencedInstruction>> = Vec::new();
    for ix in instructions {
        match groups.last_mut() {
            Some(group) if group[0].step == ix.step => group.push(ix),
            _ => groups.push(vec![ix]),
        }
    }
    groups
}

/// Serialized size and signature count of a transaction holding `batch`
fn measure(payer: &Pubkey, batch: &[SequencedInstruction]) -> Result<(usize, usize), BootstrapError> {
    let instructions: Vec<Instruction> = batch.iter().map(|ix| ix.instruction.clone()).collect();
    let message = compile(payer, &instructions, Hash::default())?;
    let sigs = message.header.num_required_signatures as usize;

    let tx = VersionedTransaction {
        signatures: vec![Signature::default(); sigs],
        message: VersionedMessage::V0(message),
    };
    let bytes = bincode::serialized_size(&tx)
        .map_err(|e| BootstrapError::instruction_failed("message", e.to_string()))?;

    Ok((bytes as usize, sigs))
}
