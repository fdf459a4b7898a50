use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcSendTransactionConfig, RpcTokenAccountsFilter,
};
use solana_client::rpc_request::RpcRequest;
use solana_client::rpc_response::{Response, RpcKeyedAccount};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::TransactionError, transaction::VersionedTransaction,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Ledger, LedgerError};

/// `Ledger` over the nonblocking JSON-RPC client
pub struct RpcLedger {
    client: Arc<RpcClient>,
    endpoint: String,
    commitment: CommitmentConfig,
}

impl RpcLedger {
    pub fn new(endpoint: impl Into<String>, commitment: CommitmentConfig) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: Arc::new(RpcClient::new_with_commitment(endpoint.clone(), commitment)),
            endpoint,
            commitment,
        }
    }

    pub fn client(&self) -> Arc<RpcClient> {
        self.client.clone()
    }

    fn classify(&self, err: solana_client::client_error::ClientError) -> LedgerError {
        LedgerError::from_client_error(err, &self.endpoint)
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("endpoint", &self.endpoint)
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn minimum_balance_for_rent_exemption(&self, space: usize) -> Result<u64, LedgerError> {
        self.client
            .get_minimum_balance_for_rent_exemption(space)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| self.classify(e))
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            ..Default::default()
        };
        self.client
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<Option<Result<(), TransactionError>>, LedgerError> {
        self.client
            .get_signature_status_with_commitment(signature, commitment)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError> {
        self.client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| self.classify(e))
    }

    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<Vec<(Pubkey, Account)>, LedgerError> {
        // The typed client helper requests jsonParsed; the refresher unpacks raw bytes
        let response: Response<Vec<RpcKeyedAccount>> = self
            .client
            .send(
                RpcRequest::GetTokenAccountsByOwner,
                token_accounts_params(owner, token_program, self.commitment),
            )
            .await
            .map_err(|e| self.classify(e))?;

        let accounts = decode_keyed_accounts(response.value);
        debug!(
            owner = %owner,
            program = %token_program,
            count = accounts.len(),
            "Fetched token accounts"
        );
        Ok(accounts)
    }
}

fn token_accounts_params(
    owner: &Pubkey,
    token_program: &Pubkey,
    commitment: CommitmentConfig,
) -> serde_json::Value {
    let config = RpcAccountInfoConfig {
        encoding: Some(UiAccountEncoding::Base64),
        commitment: Some(commitment),
        ..Default::default()
    };
    serde_json::json!([
        owner.to_string(),
        RpcTokenAccountsFilter::ProgramId(token_program.to_string()),
        config,
    ])
}

fn decode_keyed_accounts(keyed: Vec<RpcKeyedAccount>) -> Vec<(Pubkey, Account)> {
    keyed
        .into_iter()
        .filter_map(|entry| {
            let address = Pubkey::from_str(&entry.pubkey).ok();
            match (address, entry.account.decode::<Account>()) {
                (Some(address), Some(account)) => Some((address, account)),
                _ => {
                    warn!(address = %entry.pubkey, "Skipping undecodable token account");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use solana_account_decoder::{UiAccount, UiAccountData};

    fn keyed(pubkey: String, data: &[u8], owner: &Pubkey) -> RpcKeyedAccount {
        RpcKeyedAccount {
            pubkey,
            account: UiAccount {
                lamports: 2_039_280,
                data: UiAccountData::Binary(
                    base64::engine::general_purpose::STANDARD.encode(data),
                    UiAccountEncoding::Base64,
                ),
                owner: owner.to_string(),
                executable: false,
                rent_epoch: 0,
                space: Some(data.len() as u64),
            },
        }
    }

    #[test]
    fn test_params_filter_by_token_program_in_base64() {
        let owner = Pubkey::new_unique();
        let program = spl_token::id();
        let params = token_accounts_params(&owner, &program, CommitmentConfig::confirmed());

        assert_eq!(params[0], owner.to_string());
        assert_eq!(params[1]["programId"], program.to_string());
        assert!(params[1].get("mint").is_none());
        assert_eq!(params[2]["encoding"], "base64");
        assert_eq!(params[2]["commitment"], "confirmed");
    }

    #[test]
    fn test_decode_keeps_raw_bytes_and_skips_bad_entries() {
        let program = spl_token::id();
        let address = Pubkey::new_unique();
        let data = vec![7u8; 165];

        let accounts = decode_keyed_accounts(vec![
            keyed(address.to_string(), &data, &program),
            keyed("not-a-pubkey".to_string(), &data, &program),
        ]);

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].0, address);
        assert_eq!(accounts[0].1.data, data);
        assert_eq!(accounts[0].1.owner, program);
        assert_eq!(accounts[0].1.lamports, 2_039_280);
    }
}
