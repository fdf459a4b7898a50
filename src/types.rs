//! Common types used throughout the application

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey, pubkey::Pubkey};
use std::fmt;
use std::str::FromStr;

use crate::tx_builder::BootstrapError;

/// SPL token-swap program, deployed at the same address on the public clusters
pub const SPL_TOKEN_SWAP_PROGRAM_ID: Pubkey = pubkey!("SwaPpA9LAaLfeLi3a68M4DjnLqgtticKg6CnyNwgAC8");

/// Token-2022 program id (not a dependency of this crate, only an address)
pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

/// Named network the bootstrap targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    Devnet,
    Testnet,
    MainnetBeta,
    Localnet,
}

impl Cluster {
    /// Public JSON-RPC endpoint for the cluster
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Localnet => "http://127.0.0.1:8899",
        }
    }

    /// Websocket endpoint derived from an HTTP endpoint
    pub fn websocket_endpoint(http_endpoint: &str) -> String {
        if let Some(rest) = http_endpoint.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = http_endpoint.strip_prefix("http://") {
            // Local validators serve pubsub on rpc port + 1
            match rest.rsplit_once(':') {
                Some((host, port)) => match port.trim_end_matches('/').parse::<u16>() {
                    Ok(port) => format!("ws://{}:{}", host, port.saturating_add(1)),
                    Err(_) => format!("ws://{}", rest),
                },
                None => format!("ws://{}", rest),
            }
        } else {
            http_endpoint.to_string()
        }
    }

    /// Program ids for this cluster
    ///
    /// `swap_override` wins when set. Localnet has no canonical swap
    /// deployment, so it requires the override.
    pub fn program_ids(&self, swap_override: Option<Pubkey>) -> Result<ProgramIds, BootstrapError> {
        let token_swap = match (self, swap_override) {
            (_, Some(id)) => id,
            (Cluster::Localnet, None) => {
                return Err(BootstrapError::config(
                    "localnet requires an explicit swap_program_id",
                ))
            }
            _ => SPL_TOKEN_SWAP_PROGRAM_ID,
        };

        Ok(ProgramIds {
            token_swap,
            token: spl_token::id(),
            token_2022: TOKEN_2022_PROGRAM_ID,
            associated_token: spl_associated_token_account::id(),
        })
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Localnet => "localnet",
        };
        f.write_str(name)
    }
}

impl FromStr for Cluster {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet" | "mainnet-beta" => Ok(Cluster::MainnetBeta),
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            other => Err(BootstrapError::config(format!("unknown cluster '{}'", other))),
        }
    }
}

/// Program identifiers the bootstrap instructions target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramIds {
    pub token_swap: Pubkey,
    pub token: Pubkey,
    pub token_2022: Pubkey,
    pub associated_token: Pubkey,
}

impl ProgramIds {
    /// Token programs whose accounts are enumerated for an owner
    pub fn token_programs(&self) -> [Pubkey; 2] {
        [self.token, self.token_2022]
    }
}

/// Mint metadata as supplied by a `MintInfoSource`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    #[serde(with = "pubkey_string")]
    pub address: Pubkey,
    pub decimals: u8,
    #[serde(with = "pubkey_string", default = "default_token_program")]
    pub token_program: Pubkey,
}

fn default_token_program() -> Pubkey {
    spl_token::id()
}

/// Serde adapter storing a `Pubkey` as its base58 string
pub(crate) mod pubkey_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Pubkey::from_str(&raw).map_err(serde::de::Error::custom)
    }
}
