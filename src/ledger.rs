use std::str::FromStr;
use std::time::Duration;

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_program::pubkey::Pubkey;
use solana_sdk::hash::Hash;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding,
};

use crate::models::{InstructionView, SignatureRef, TransactionView};

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("rpc endpoint rate limited the request")]
    RateLimited,
    #[error("failed to decode solana transaction: `{0}`")]
    Decode(String),
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// Boundary to the ledger. The production implementation talks to a
/// Solana RPC endpoint; tests substitute a canned implementation.
#[allow(async_fn_in_trait)]
pub trait LedgerClient {
    /// Signatures involving `address`, newest first, up to `limit`.
    async fn list_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRef>, LedgerError>;

    /// Full transaction record for a signature. `Ok(None)` when the
    /// ledger has no (longer any) record of it.
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<TransactionView>, LedgerError>;

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    async fn submit_transaction(&self, transaction: &Transaction)
        -> Result<String, LedgerError>;

    async fn confirm(&self, signature: &str) -> Result<(), LedgerError>;
}

impl<L: LedgerClient> LedgerClient for std::sync::Arc<L> {
    async fn list_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRef>, LedgerError> {
        (**self).list_signatures(address, limit).await
    }

    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<TransactionView>, LedgerError> {
        (**self).get_transaction(signature).await
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        (**self).latest_blockhash().await
    }

    async fn submit_transaction(&self, transaction: &Transaction)
        -> Result<String, LedgerError> {
        (**self).submit_transaction(transaction).await
    }

    async fn confirm(&self, signature: &str) -> Result<(), LedgerError> {
        (**self).confirm(signature).await
    }
}

pub struct RpcLedgerClient {
    rpc_client: RpcClient,
}

impl RpcLedgerClient {
    pub fn new(rpc_endpoint: String) -> Self {
        Self {
            rpc_client: RpcClient::new_with_timeout(rpc_endpoint, Duration::from_secs(60)),
        }
    }
}

impl LedgerClient for RpcLedgerClient {
    async fn list_signatures(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRef>, LedgerError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit),
            ..Default::default()
        };

        let sigs = self
            .rpc_client
            .get_signatures_for_address_with_config(address, config)
            .await
            .map_err(map_client_error)?;

        Ok(sigs
            .into_iter()
            // Skip failed transactions
            .filter(|status| status.err.is_none())
            .map(|status| SignatureRef {
                signature: status.signature,
                block_time: status.block_time,
            })
            .collect())
    }

    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<TransactionView>, LedgerError> {
        let signature = Signature::from_str(signature)
            .map_err(|_| LedgerError::Decode(signature.to_string()))?;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            ..Default::default()
        };

        match self
            .rpc_client
            .get_transaction_with_config(&signature, config)
            .await
        {
            Ok(transaction) => Ok(Some(view_of(&signature.to_string(), transaction)?)),
            Err(e) if is_rate_limited(&e) => Err(LedgerError::RateLimited),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(LedgerError::Rpc(e.to_string())),
        }
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.rpc_client
            .get_latest_blockhash()
            .await
            .map_err(map_client_error)
    }

    async fn submit_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<String, LedgerError> {
        let signature = self
            .rpc_client
            .send_transaction(transaction)
            .await
            .map_err(map_client_error)?;
        Ok(signature.to_string())
    }

    async fn confirm(&self, signature: &str) -> Result<(), LedgerError> {
        let signature = Signature::from_str(signature)
            .map_err(|_| LedgerError::Decode(signature.to_string()))?;
        let confirmed = self
            .rpc_client
            .confirm_transaction(&signature)
            .await
            .map_err(map_client_error)?;
        if confirmed {
            Ok(())
        } else {
            Err(LedgerError::Rpc(format!(
                "transaction `{signature}` was not confirmed"
            )))
        }
    }
}

fn map_client_error(e: ClientError) -> LedgerError {
    if is_rate_limited(&e) {
        LedgerError::RateLimited
    } else {
        LedgerError::Rpc(e.to_string())
    }
}

fn is_rate_limited(e: &ClientError) -> bool {
    match e.kind() {
        ClientErrorKind::Reqwest(e) => {
            e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
        }
        _ => e.to_string().contains("429"),
    }
}

fn is_not_found(e: &ClientError) -> bool {
    let message = e.to_string();
    message.contains("not found") || message.contains("invalid type: null")
}

/// Projects a fetched transaction into the read-only view the pipeline
/// works on: resolved account keys, raw instruction payloads, log lines.
fn view_of(
    signature: &str,
    transaction: EncodedConfirmedTransactionWithStatusMeta,
) -> Result<TransactionView, LedgerError> {
    let decoded = transaction
        .transaction
        .transaction
        .decode()
        .ok_or_else(|| LedgerError::Decode(signature.to_string()))?;

    let account_keys: Vec<String> = decoded
        .message
        .static_account_keys()
        .iter()
        .map(|key| key.to_string())
        .collect();

    let instructions = decoded
        .message
        .instructions()
        .iter()
        .map(|ix| InstructionView {
            program: account_keys
                .get(ix.program_id_index as usize)
                .cloned()
                .unwrap_or_default(),
            data: ix.data.clone(),
        })
        .collect();

    let log_messages = transaction
        .transaction
        .meta
        .and_then(|meta| Option::<Vec<String>>::from(meta.log_messages))
        .unwrap_or_default();

    Ok(TransactionView {
        signature: signature.to_string(),
        block_time: transaction.block_time,
        account_keys,
        instructions,
        log_messages,
    })
}
