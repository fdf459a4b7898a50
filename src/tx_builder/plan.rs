//! Signed-ready transaction plans
//!
//! A `TransactionPlan` is an ordered instruction list together with exactly
//! the keypairs needed to authorize it. Plans are immutable once assembled;
//! a fresh blockhash is bound only at signing time.

use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0::Message as MessageV0, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::sync::Arc;

use crate::tx_builder::errors::BootstrapError;
use crate::tx_builder::instructions::BootstrapStep;

/// Ordered instructions plus the minimal signer set that authorizes them
pub struct TransactionPlan {
    index: usize,
    payer: Pubkey,
    instructions: Vec<Instruction>,
    steps: Vec<BootstrapStep>,
    signers: Vec<Arc<Keypair>>,
    required_signers: Vec<Pubkey>,
    depends_on_previous: bool,
}

impl TransactionPlan {
    /// Build a plan, resolving its signers from `available`
    ///
    /// The required signer set is read from the compiled message header:
    /// the fee payer plus every account marked signer. Keypairs in
    /// `available` that are not required are left out of the plan.
    ///
    /// # Errors
    ///
    /// - `MissingSigner` when a required signer has no keypair in `available`
    /// - `InstructionBuild` when the instructions do not compile into a message
    pub fn new(
        index: usize,
        payer: Pubkey,
        instructions: Vec<Instruction>,
        steps: Vec<BootstrapStep>,
        available: &[Arc<Keypair>],
        depends_on_previous: bool,
    ) -> Result<Self, BootstrapError> {
        let message = compile(&payer, &instructions, Hash::default())?;
        let required_signers = required_signer_keys(&message);

        let mut signers = Vec::with_capacity(required_signers.len());
        for key in &required_signers {
            let keypair = available
                .iter()
                .find(|kp| kp.pubkey() == *key)
                .ok_or(BootstrapError::MissingSigner {
                    pubkey: *key,
                    plan_index: index,
                })?;
            signers.push(keypair.clone());
        }

        Ok(Self {
            index,
            payer,
            instructions,
            steps,
            signers,
            required_signers,
            depends_on_previous,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn payer(&self) -> &Pubkey {
        &self.payer
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Step label of each instruction, parallel to `instructions()`
    pub fn steps(&self) -> &[BootstrapStep] {
        &self.steps
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        &self.required_signers
    }

    /// Public keys of the keypairs held by this plan
    pub fn signer_pubkeys(&self) -> Vec<Pubkey> {
        self.signers.iter().map(|kp| kp.pubkey()).collect()
    }

    /// Whether this plan references an address produced by an earlier plan
    pub fn depends_on_previous(&self) -> bool {
        self.depends_on_previous
    }

    /// Compile against `blockhash` and sign with every plan keypair
    pub fn sign(&self, blockhash: Hash) -> Result<VersionedTransaction, BootstrapError> {
        let message = compile(&self.payer, &self.instructions, blockhash)?;
        let signers: Vec<&dyn Signer> = self
            .signers
            .iter()
            .map(|kp| kp.as_ref() as &dyn Signer)
            .collect();

        VersionedTransaction::try_new(VersionedMessage::V0(message), &signers)
            .map_err(|e| BootstrapError::Signing(format!("plan {}: {}", self.index, e)))
    }
}

impl std::fmt::Debug for TransactionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionPlan")
            .field("index", &self.index)
            .field("payer", &self.payer)
            .field("instructions", &self.instructions.len())
            .field("steps", &self.steps)
            .field("required_signers", &self.required_signers)
            .field("depends_on_previous", &self.depends_on_previous)
            .finish()
    }
}

pub(crate) fn compile(
    payer: &Pubkey,
    instructions: &[Instruction],
    blockhash: Hash,
) -> Result<MessageV0, BootstrapError> {
    MessageV0::try_compile(payer, instructions, &[], blockhash)
        .map_err(|e| BootstrapError::instruction_failed("message", e.to_string()))
}

pub(crate) fn required_signer_keys(message: &MessageV0) -> Vec<Pubkey> {
    let n = message.header.num_required_signatures as usize;
    message.account_keys.iter().take(n).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::system_instruction;

    #[test]
    fn test_plan_keeps_only_required_signers() {
        let payer = Arc::new(Keypair::new());
        let new_account = Arc::new(Keypair::new());
        let unrelated = Arc::new(Keypair::new());

        let ix = system_instruction::create_account(
            &payer.pubkey(),
            &new_account.pubkey(),
            1_000,
            165,
            &spl_token::id(),
        );

        let plan = TransactionPlan::new(
            0,
            payer.pubkey(),
            vec![ix],
            vec![BootstrapStep::StateAccount],
            &[payer.clone(), new_account.clone(), unrelated.clone()],
            false,
        )
        .unwrap();

        let held = plan.signer_pubkeys();
        assert_eq!(held.len(), 2);
        assert!(held.contains(&payer.pubkey()));
        assert!(held.contains(&new_account.pubkey()));
        assert!(!held.contains(&unrelated.pubkey()));
        assert_eq!(plan.required_signers()[0], payer.pubkey());

        let tx = plan.sign(Hash::new_unique()).unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.verify_with_results().iter().all(|ok| *ok));
    }

    #[test]
    fn test_missing_signer_fails_construction() {
        let payer = Arc::new(Keypair::new());
        let new_account = Keypair::new();

        let ix = system_instruction::create_account(
            &payer.pubkey(),
            &new_account.pubkey(),
            1_000,
            165,
            &spl_token::id(),
        );

        let err = TransactionPlan::new(
            3,
            payer.pubkey(),
            vec![ix],
            vec![BootstrapStep::StateAccount],
            &[payer.clone()],
            false,
        )
        .unwrap_err();

        match err {
            BootstrapError::MissingSigner { pubkey, plan_index } => {
                assert_eq!(pubkey, new_account.pubkey());
                assert_eq!(plan_index, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_payer_keypair() {
        let payer = Pubkey::new_unique();
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);

        let err = TransactionPlan::new(0, payer, vec![ix], vec![BootstrapStep::SeedLiquidity], &[], false)
            .unwrap_err();
        assert!(matches!(err, BootstrapError::MissingSigner { pubkey, .. } if pubkey == payer));
    }
}
