//! Address derivation checked against the reference implementations

use pool_bootstrap::tx_builder::address::hash_candidate;
use pool_bootstrap::tx_builder::{AddressDeriver, BootstrapError};
use pool_bootstrap::types::{SPL_TOKEN_SWAP_PROGRAM_ID, TOKEN_2022_PROGRAM_ID};
use proptest::prelude::*;
use solana_sdk::pubkey::Pubkey;

#[test]
fn test_swap_authority_matches_find_program_address() {
    let deriver = AddressDeriver::default();
    for _ in 0..32 {
        let state = Pubkey::new_unique();
        let pda = deriver
            .derive(&[state.as_ref()], &SPL_TOKEN_SWAP_PROGRAM_ID)
            .unwrap();
        let (expected, bump) =
            Pubkey::find_program_address(&[state.as_ref()], &SPL_TOKEN_SWAP_PROGRAM_ID);
        assert_eq!(pda.address, expected);
        assert_eq!(pda.bump, bump);
        assert_eq!(pda.signer_seeds(), vec![state.to_bytes().to_vec(), vec![bump]]);
    }
}

#[test]
fn test_candidate_hash_matches_create_program_address() {
    let program = Pubkey::new_unique();
    let seeds: [&[u8]; 2] = [b"pool", b"authority"];
    let (_, bump) = Pubkey::find_program_address(&seeds, &program);

    let expected =
        Pubkey::create_program_address(&[seeds[0], seeds[1], &[bump][..]], &program).unwrap();
    assert_eq!(hash_candidate(&seeds, bump, &program), expected);
}

#[test]
fn test_associated_addresses_for_both_token_programs() {
    let deriver = AddressDeriver::default();
    let owner = Pubkey::new_unique();
    let mint = Pubkey::new_unique();

    for program in [spl_token::id(), TOKEN_2022_PROGRAM_ID] {
        assert_eq!(
            deriver
                .derive_associated_address(&owner, &mint, &program)
                .unwrap(),
            spl_associated_token_account::get_associated_token_address_with_program_id(
                &owner, &mint, &program
            )
        );
    }
}

#[test]
fn test_seed_limits() {
    let deriver = AddressDeriver::default();
    let program = Pubkey::new_unique();

    let long = [7u8; 33];
    assert!(matches!(
        deriver.derive(&[long.as_slice()], &program),
        Err(BootstrapError::InvalidSeeds(_))
    ));

    let seed = [1u8; 32];
    let fifteen: Vec<&[u8]> = vec![seed.as_slice(); 15];
    assert!(deriver.derive(&fifteen, &program).is_ok());

    let sixteen: Vec<&[u8]> = vec![seed.as_slice(); 16];
    assert!(matches!(
        deriver.derive(&sixteen, &program),
        Err(BootstrapError::InvalidSeeds(_))
    ));
}

proptest! {
    #[test]
    fn prop_derivation_is_deterministic_and_off_curve(
        seed_a in proptest::collection::vec(any::<u8>(), 0..=32),
        seed_b in proptest::collection::vec(any::<u8>(), 0..=32),
    ) {
        let deriver = AddressDeriver::default();
        let program = SPL_TOKEN_SWAP_PROGRAM_ID;
        let first = deriver.derive(&[seed_a.as_slice(), seed_b.as_slice()], &program).unwrap();
        let second = deriver.derive(&[seed_a.as_slice(), seed_b.as_slice()], &program).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert!(!first.address.is_on_curve());
        prop_assert_eq!(
            (first.address, first.bump),
            Pubkey::find_program_address(&[seed_a.as_slice(), seed_b.as_slice()], &program)
        );
    }
}
