//! Pool configuration files down to the initialize instruction bytes

use pool_bootstrap::config::Config;
use pool_bootstrap::tx_builder::token_swap::create_init_swap_instruction;
use pool_bootstrap::tx_builder::{BootstrapError, CurveType, InitSwapAccounts};
use pool_bootstrap::types::SPL_TOKEN_SWAP_PROGRAM_ID;
use solana_sdk::pubkey::Pubkey;
use std::io::Write;

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn pool_section(curve: &str) -> String {
    format!(
        r#"
[cluster]
name = "mainnet-beta"

[pool]
mint_a = "{}"
mint_b = "{}"
fee_owner = "{}"
sequential = false

[pool.fees]
trade = {{ numerator = 30, denominator = 10000 }}
owner_trade = {{ numerator = 0, denominator = 0 }}
owner_withdraw = {{ numerator = 1, denominator = 6 }}
host = {{ numerator = 0, denominator = 100 }}

{}
"#,
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        curve
    )
}

fn accounts() -> InitSwapAccounts {
    InitSwapAccounts {
        state_account: Pubkey::new_unique(),
        swap_authority: Pubkey::new_unique(),
        token_a_account: Pubkey::new_unique(),
        token_b_account: Pubkey::new_unique(),
        pool_mint: Pubkey::new_unique(),
        fee_account: Pubkey::new_unique(),
        destination_account: Pubkey::new_unique(),
        token_program: spl_token::id(),
    }
}

fn fee_fields(data: &[u8]) -> Vec<u64> {
    data[1..65]
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

#[test]
fn test_constant_product_file_encodes_zeroed_curve_block() {
    let file = write_config(&pool_section(""));
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    config.validate().unwrap();

    let pool = config.pool.as_ref().unwrap();
    assert!(!pool.sequential);
    let swap = pool.swap_pool_config().unwrap();
    assert_eq!(swap.curve(), CurveType::ConstantProduct);

    let ix = create_init_swap_instruction(&accounts(), &SPL_TOKEN_SWAP_PROGRAM_ID, &swap);
    assert_eq!(ix.data.len(), 98);
    assert!(ix.data[65..].iter().all(|b| *b == 0));
    assert_eq!(fee_fields(&ix.data), vec![30, 10_000, 0, 0, 1, 6, 0, 100]);
    assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
}

#[test]
fn test_stable_curve_file_appends_parameter_block() {
    let file = write_config(&pool_section("[pool.curve]\ntype = \"stable\"\namp = 100\n"));
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    let swap = config.pool.as_ref().unwrap().swap_pool_config().unwrap();

    let ix = create_init_swap_instruction(&accounts(), &SPL_TOKEN_SWAP_PROGRAM_ID, &swap);
    assert_eq!(ix.data.len(), 98);
    assert_eq!(ix.data[65], 2);
    assert_eq!(&ix.data[66..74], &100u64.to_le_bytes());
    assert!(ix.data[74..].iter().all(|b| *b == 0));
}

#[test]
fn test_invalid_fee_fraction_is_a_configuration_error() {
    let body = pool_section("").replace(
        "trade = { numerator = 30, denominator = 10000 }",
        "trade = { numerator = 3, denominator = 0 }",
    );
    let file = write_config(&body);
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

    assert!(matches!(config.validate(), Err(BootstrapError::Configuration(_))));
}

#[test]
fn test_missing_file_is_a_configuration_error() {
    let err = Config::from_file("/nonexistent/pool-bootstrap.toml").unwrap_err();
    assert!(matches!(err, BootstrapError::Configuration(_)));
}
