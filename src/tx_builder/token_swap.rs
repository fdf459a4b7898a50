//! SPL token-swap pool parameters and the initialize instruction encoding
//!
//! Wire layout of the initialize payload:
//!
//! | offset | size | field                          |
//! |--------|------|--------------------------------|
//! | 0      | 1    | discriminator (`0`)            |
//! | 1      | 64   | 8 x `u64` LE fee fields        |
//! | 65     | 1    | curve tag                      |
//! | 66     | 32   | curve parameters (zero if none)|

use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::tx_builder::errors::BootstrapError;

/// Discriminator of the swap program's initialize instruction
pub const INITIALIZE_TAG: u8 = 0;

/// Size of the swap state account the program expects
pub const SWAP_STATE_LEN: usize = 324;

/// Length of the fixed part of the payload (tag + fees + curve tag)
pub const INIT_SWAP_BASE_LEN: usize = 1 + 8 * 8 + 1;

/// Length of the curve parameter block; the program reads it for every curve
pub const CURVE_PARAMS_LEN: usize = 32;

/// Length of the full initialize payload
pub const INIT_SWAP_DATA_LEN: usize = INIT_SWAP_BASE_LEN + CURVE_PARAMS_LEN;

/// A fee expressed as `numerator / denominator`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeFraction {
    pub numerator: u64,
    pub denominator: u64,
}

impl FeeFraction {
    pub const ZERO: FeeFraction = FeeFraction {
        numerator: 0,
        denominator: 0,
    };

    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    fn validate(&self, name: &str) -> Result<(), BootstrapError> {
        if self.denominator == 0 {
            if self.numerator != 0 {
                return Err(BootstrapError::config(format!(
                    "{} fee has zero denominator with numerator {}",
                    name, self.numerator
                )));
            }
            return Ok(());
        }
        if self.numerator > self.denominator {
            return Err(BootstrapError::config(format!(
                "{} fee {}/{} exceeds 100%",
                name, self.numerator, self.denominator
            )));
        }
        Ok(())
    }
}

/// Pricing curve of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CurveType {
    #[default]
    ConstantProduct,
    ConstantPrice { token_b_price: u64 },
    Stable { amp: u64 },
    Offset { token_b_offset: u64 },
}

impl CurveType {
    /// Wire tag of the curve
    pub fn tag(&self) -> u8 {
        match self {
            CurveType::ConstantProduct => 0,
            CurveType::ConstantPrice { .. } => 1,
            CurveType::Stable { .. } => 2,
            CurveType::Offset { .. } => 3,
        }
    }

    /// The single `u64` parameter of a parameterized curve
    pub fn parameter(&self) -> Option<u64> {
        match *self {
            CurveType::ConstantProduct => None,
            CurveType::ConstantPrice { token_b_price } => Some(token_b_price),
            CurveType::Stable { amp } => Some(amp),
            CurveType::Offset { token_b_offset } => Some(token_b_offset),
        }
    }
}

/// Fees and curve of a swap pool, validated at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPoolConfig {
    trade_fee: FeeFraction,
    owner_trade_fee: FeeFraction,
    owner_withdraw_fee: FeeFraction,
    host_fee: FeeFraction,
    curve: CurveType,
}

impl SwapPoolConfig {
    pub fn new(
        trade_fee: FeeFraction,
        owner_trade_fee: FeeFraction,
        owner_withdraw_fee: FeeFraction,
        host_fee: FeeFraction,
        curve: CurveType,
    ) -> Result<Self, BootstrapError> {
        trade_fee.validate("trade")?;
        owner_trade_fee.validate("owner trade")?;
        owner_withdraw_fee.validate("owner withdraw")?;
        host_fee.validate("host")?;

        if let CurveType::ConstantPrice { token_b_price: 0 } = curve {
            return Err(BootstrapError::config("constant-price curve needs a non-zero token_b_price"));
        }
        if let CurveType::Stable { amp: 0 } = curve {
            return Err(BootstrapError::config("stable curve needs a non-zero amp"));
        }

        Ok(Self {
            trade_fee,
            owner_trade_fee,
            owner_withdraw_fee,
            host_fee,
            curve,
        })
    }

    pub fn trade_fee(&self) -> FeeFraction {
        self.trade_fee
    }

    pub fn owner_trade_fee(&self) -> FeeFraction {
        self.owner_trade_fee
    }

    pub fn owner_withdraw_fee(&self) -> FeeFraction {
        self.owner_withdraw_fee
    }

    pub fn host_fee(&self) -> FeeFraction {
        self.host_fee
    }

    pub fn curve(&self) -> CurveType {
        self.curve
    }

    /// Fee fractions in wire order
    pub fn fees(&self) -> [FeeFraction; 4] {
        [
            self.trade_fee,
            self.owner_trade_fee,
            self.owner_withdraw_fee,
            self.host_fee,
        ]
    }

    /// Encode the initialize payload
    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(INIT_SWAP_DATA_LEN);

        data.push(INITIALIZE_TAG);
        for fee in self.fees() {
            data.extend_from_slice(&fee.numerator.to_le_bytes());
            data.extend_from_slice(&fee.denominator.to_le_bytes());
        }
        data.push(self.curve.tag());

        let mut block = [0u8; CURVE_PARAMS_LEN];
        if let Some(param) = self.curve.parameter() {
            block[..8].copy_from_slice(&param.to_le_bytes());
        }
        data.extend_from_slice(&block);

        data
    }
}

impl Default for SwapPoolConfig {
    /// 0% trade, 0.05% owner trade, 0% owner withdraw, 1% host, constant product
    fn default() -> Self {
        Self {
            trade_fee: FeeFraction::new(0, 100),
            owner_trade_fee: FeeFraction::new(5, 10_000),
            owner_withdraw_fee: FeeFraction::new(0, 100),
            host_fee: FeeFraction::new(1, 100),
            curve: CurveType::ConstantProduct,
        }
    }
}

/// Accounts of the initialize instruction
#[derive(Debug, Clone, Copy)]
pub struct InitSwapAccounts {
    pub state_account: Pubkey,
    pub swap_authority: Pubkey,
    pub token_a_account: Pubkey,
    pub token_b_account: Pubkey,
    pub pool_mint: Pubkey,
    pub fee_account: Pubkey,
    pub destination_account: Pubkey,
    pub token_program: Pubkey,
}

/// Build the swap program's initialize instruction
///
/// The state account is marked writable and signer; the program requires
/// the freshly created state account to sign its own initialization.
pub fn create_init_swap_instruction(
    accounts: &InitSwapAccounts,
    swap_program: &Pubkey,
    config: &SwapPoolConfig,
) -> Instruction {
    let metas = vec![
        AccountMeta::new(accounts.state_account, true),
        AccountMeta::new_readonly(accounts.swap_authority, false),
        AccountMeta::new_readonly(accounts.token_a_account, false),
        AccountMeta::new_readonly(accounts.token_b_account, false),
        AccountMeta::new(accounts.pool_mint, false),
        AccountMeta::new(accounts.fee_account, false),
        AccountMeta::new(accounts.destination_account, false),
        AccountMeta::new_readonly(accounts.token_program, false),
    ];

    Instruction {
        program_id: *swap_program,
        accounts: metas,
        data: config.pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u64(data: &[u8], offset: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&data[offset..offset + 8]);
        u64::from_le_bytes(buf)
    }

    #[test]
    fn test_constant_product_payload_carries_zeroed_params() {
        let config = SwapPoolConfig::new(
            FeeFraction::new(25, 10_000),
            FeeFraction::new(5, 10_000),
            FeeFraction::new(0, 100),
            FeeFraction::new(1, 100),
            CurveType::ConstantProduct,
        )
        .unwrap();

        let data = config.pack();
        assert_eq!(data.len(), INIT_SWAP_DATA_LEN);
        assert_eq!(data.len(), 98);
        assert_eq!(data[0], INITIALIZE_TAG);

        let expected = [25, 10_000, 5, 10_000, 0, 100, 1, 100];
        for (i, value) in expected.iter().enumerate() {
            assert_eq!(read_u64(&data, 1 + i * 8), *value, "fee field {}", i);
        }
        assert_eq!(data[65], 0);
        assert!(data[66..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parameterized_curve_appends_block() {
        let config = SwapPoolConfig::new(
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            CurveType::Stable { amp: 85 },
        )
        .unwrap();

        let data = config.pack();
        assert_eq!(data.len(), INIT_SWAP_DATA_LEN);
        assert_eq!(data[65], 2);
        assert_eq!(read_u64(&data, 66), 85);
        assert!(data[74..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_fee_validation() {
        let bad = SwapPoolConfig::new(
            FeeFraction::new(101, 100),
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            CurveType::ConstantProduct,
        );
        assert!(matches!(bad, Err(BootstrapError::Configuration(_))));

        let zero_den = SwapPoolConfig::new(
            FeeFraction::new(1, 0),
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            CurveType::ConstantProduct,
        );
        assert!(zero_den.is_err());

        let stable = SwapPoolConfig::new(
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            FeeFraction::ZERO,
            CurveType::Stable { amp: 0 },
        );
        assert!(stable.is_err());
    }

    #[test]
    fn test_init_swap_account_order() {
        let accounts = InitSwapAccounts {
            state_account: Pubkey::new_unique(),
            swap_authority: Pubkey::new_unique(),
            token_a_account: Pubkey::new_unique(),
            token_b_account: Pubkey::new_unique(),
            pool_mint: Pubkey::new_unique(),
            fee_account: Pubkey::new_unique(),
            destination_account: Pubkey::new_unique(),
            token_program: spl_token::id(),
        };
        let program = Pubkey::new_unique();
        let ix = create_init_swap_instruction(&accounts, &program, &SwapPoolConfig::default());

        assert_eq!(ix.program_id, program);
        let keys: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        assert_eq!(
            keys,
            vec![
                accounts.state_account,
                accounts.swap_authority,
                accounts.token_a_account,
                accounts.token_b_account,
                accounts.pool_mint,
                accounts.fee_account,
                accounts.destination_account,
                accounts.token_program,
            ]
        );

        let state = &ix.accounts[0];
        assert!(state.is_signer && state.is_writable);
        assert!(ix.accounts[4].is_writable && ix.accounts[5].is_writable && ix.accounts[6].is_writable);
        assert!(!ix.accounts[1].is_writable && !ix.accounts[7].is_writable);
    }

    #[test]
    fn test_curve_config_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            curve: CurveType,
        }
        let parsed: Wrapper = toml::from_str("[curve]\ntype = \"constant-price\"\ntoken_b_price = 42\n").unwrap();
        assert_eq!(parsed.curve, CurveType::ConstantPrice { token_b_price: 42 });

        let parsed: Wrapper = toml::from_str("[curve]\ntype = \"constant-product\"\n").unwrap();
        assert_eq!(parsed.curve, CurveType::ConstantProduct);
    }
}
