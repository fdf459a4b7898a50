//! Program-derived address search
//!
//! Addresses are derived by hashing the caller's seeds together with a bump
//! byte, the owning program and a fixed domain tag, walking the bump down
//! from 255 until the digest is *not* a valid ed25519 point. Such an address
//! has no private key, so only its owning program can sign for it.

use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use tracing::trace;

use crate::tx_builder::errors::BootstrapError;

/// Domain tag appended to every derivation hash
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum length of a single seed, in bytes
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds including the bump
pub const MAX_SEEDS: usize = 16;

/// Number of bump values searched before giving up
pub const BUMP_SEARCH_SPACE: u16 = 256;

/// A derived, off-curve address together with the inputs that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDerivedAddress {
    pub seeds: Vec<Vec<u8>>,
    pub owning_program: Pubkey,
    pub bump: u8,
    pub address: Pubkey,
}

impl ProgramDerivedAddress {
    /// Seeds plus the bump byte, as a program would pass them to `invoke_signed`
    pub fn signer_seeds(&self) -> Vec<Vec<u8>> {
        let mut seeds = self.seeds.clone();
        seeds.push(vec![self.bump]);
        seeds
    }
}

/// Derives program addresses and associated token account addresses
#[derive(Debug, Clone, Copy)]
pub struct AddressDeriver {
    associated_token_program: Pubkey,
}

impl Default for AddressDeriver {
    fn default() -> Self {
        Self::new(spl_associated_token_account::id())
    }
}

impl AddressDeriver {
    pub fn new(associated_token_program: Pubkey) -> Self {
        Self {
            associated_token_program,
        }
    }

    /// Find the canonical (highest-bump) off-curve address for `seeds`
    ///
    /// # Errors
    ///
    /// - `InvalidSeeds` if a seed is longer than 32 bytes or there are more
    ///   than 15 seeds
    /// - `DerivationExhausted` if all 256 bumps land on the curve
    pub fn derive(
        &self,
        seeds: &[&[u8]],
        owning_program: &Pubkey,
    ) -> Result<ProgramDerivedAddress, BootstrapError> {
        let (address, bump) = search_bump(seeds, owning_program, |candidate| {
            candidate.is_on_curve()
        })?;

        crate::metrics::metrics()
            .derivation_attempts
            .inc_by(u64::from(BUMP_SEARCH_SPACE - u16::from(bump)));

        Ok(ProgramDerivedAddress {
            seeds: seeds.iter().map(|s| s.to_vec()).collect(),
            owning_program: *owning_program,
            bump,
            address,
        })
    }

    /// Associated token account address for `owner` holding `mint`
    ///
    /// Seeds are `(owner, token_program, mint)` against the associated
    /// token account program. Off-curve owners (PDAs) are allowed.
    pub fn derive_associated_address(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<Pubkey, BootstrapError> {
        self.derive(
            &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
            &self.associated_token_program,
        )
        .map(|pda| pda.address)
    }

    pub fn associated_token_program(&self) -> &Pubkey {
        &self.associated_token_program
    }
}

/// Hash one candidate: `sha256(seeds.. || bump || program || marker)`
pub fn hash_candidate(seeds: &[&[u8]], bump: u8, owning_program: &Pubkey) -> Pubkey {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(owning_program.as_ref());
    hasher.update(PDA_MARKER);
    let digest: [u8; 32] = hasher.finalize().into();
    Pubkey::new_from_array(digest)
}

/// Descending bump search with a pluggable curve check
///
/// Performs at most `BUMP_SEARCH_SPACE` hash evaluations.
pub fn search_bump<F>(
    seeds: &[&[u8]],
    owning_program: &Pubkey,
    mut is_on_curve: F,
) -> Result<(Pubkey, u8), BootstrapError>
where
    F: FnMut(&Pubkey) -> bool,
{
    validate_seeds(seeds)?;

    for bump in (0..=u8::MAX).rev() {
        let candidate = hash_candidate(seeds, bump, owning_program);
        if !is_on_curve(&candidate) {
            trace!(program = %owning_program, bump, address = %candidate, "Derived off-curve address");
            return Ok((candidate, bump));
        }
    }

    Err(BootstrapError::DerivationExhausted {
        program: *owning_program,
    })
}

fn validate_seeds(seeds: &[&[u8]]) -> Result<(), BootstrapError> {
    // The bump occupies one of the MAX_SEEDS slots
    if seeds.len() >= MAX_SEEDS {
        return Err(BootstrapError::InvalidSeeds(format!(
            "{} seeds given, at most {} allowed",
            seeds.len(),
            MAX_SEEDS - 1
        )));
    }
    if let Some((idx, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(BootstrapError::InvalidSeeds(format!(
            "seed {} is {} bytes, max {}",
            idx,
            seed.len(),
            MAX_SEED_LEN
        )));
    }
    Ok(())
}
