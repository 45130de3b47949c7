use std::str::FromStr;

use once_cell::sync::Lazy;
use solana_program::pubkey::Pubkey;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::signer::SignerError;
use solana_sdk::transaction::Transaction;

use crate::extractor::MEMO_PROGRAM_IDS;
use crate::ledger::{LedgerClient, LedgerError};
use crate::session::{Wallet, WalletSession};
use crate::settings::Config;

static TOKEN_PROGRAM_ID: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA").unwrap());
static ASSOCIATED_TOKEN_PROGRAM_ID: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL").unwrap());
static MEMO_PROGRAM_ID: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(MEMO_PROGRAM_IDS[0]).unwrap());

#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("failed to fetch a recent blockhash: {0}")]
    Blockhash(#[source] LedgerError),
    #[error("wallet signing failed: {0}")]
    Signing(#[from] SignerError),
    #[error("failed to submit fee transfer: {0}")]
    Submit(#[source] LedgerError),
    #[error("fee transfer `{signature}` was not confirmed: {source}")]
    Confirm {
        signature: String,
        #[source]
        source: LedgerError,
    },
}

/// Builds and submits the token-fee + memo transaction that pays the
/// message service for one diary entry. Errors are surfaced to the
/// caller; there is no automatic retry.
pub struct FeeTransferBuilder<'a, L> {
    ledger: &'a L,
    config: &'a Config,
}

impl<'a, L: LedgerClient> FeeTransferBuilder<'a, L> {
    pub fn new(ledger: &'a L, config: &'a Config) -> Self {
        Self { ledger, config }
    }

    /// Transfers the entry fee to the message service, tagged with
    /// `memo`, and waits for confirmation. Returns the transaction
    /// signature.
    pub async fn pay_for_entry<W: Wallet>(
        &self,
        session: &WalletSession<W>,
        memo: &str,
    ) -> Result<String, TransferError> {
        let owner = session.owner();
        let source = associated_token_address(&owner, &self.config.token_mint);
        let destination = associated_token_address(
            &self.config.message_service_account,
            &self.config.token_mint,
        );

        let instructions = [
            token_transfer_instruction(&source, &destination, &owner, self.config.fee_amount()),
            memo_instruction(memo, &owner),
        ];
        let mut transaction = Transaction::new_with_payer(&instructions, Some(&owner));

        let blockhash = self
            .ledger
            .latest_blockhash()
            .await
            .map_err(TransferError::Blockhash)?;
        session.wallet().sign_transaction(&mut transaction, blockhash)?;

        let signature = self
            .ledger
            .submit_transaction(&transaction)
            .await
            .map_err(TransferError::Submit)?;

        self.ledger
            .confirm(&signature)
            .await
            .map_err(|source| TransferError::Confirm {
                signature: signature.clone(),
                source,
            })?;

        tracing::info!(signature = %signature, "fee transfer confirmed");
        Ok(signature)
    }
}

/// Canonical associated token account for an owner and mint.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// SPL token `Transfer`: tag byte 3 followed by the amount in base
/// units, little endian.
fn token_transfer_instruction(
    source: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(3);
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction {
        program_id: *TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data,
    }
}

fn memo_instruction(memo: &str, signer: &Pubkey) -> Instruction {
    Instruction {
        program_id: *MEMO_PROGRAM_ID,
        accounts: vec![AccountMeta::new_readonly(*signer, true)],
        data: memo.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associated_token_address_is_deterministic() {
        let config = Config::default();
        let a = associated_token_address(&config.message_service_account, &config.token_mint);
        let b = associated_token_address(&config.message_service_account, &config.token_mint);
        assert_eq!(a, b);

        let other = associated_token_address(&config.message_service_account, &config.usdc_mint);
        assert_ne!(a, other);
    }

    #[test]
    fn transfer_instruction_encodes_tag_and_amount() {
        let config = Config::default();
        let owner = Pubkey::new_unique();
        let source = associated_token_address(&owner, &config.token_mint);
        let destination =
            associated_token_address(&config.message_service_account, &config.token_mint);

        let ix = token_transfer_instruction(&source, &destination, &owner, 10_000_000_000);
        assert_eq!(ix.program_id, *TOKEN_PROGRAM_ID);
        assert_eq!(ix.data[0], 3);
        assert_eq!(u64::from_le_bytes(ix.data[1..9].try_into().unwrap()), 10_000_000_000);
        assert!(ix.accounts[2].is_signer);
    }

    #[test]
    fn memo_instruction_carries_the_raw_text() {
        let owner = Pubkey::new_unique();
        let memo = "📔 IPFS: bafkreidet2m5xtzhgejsvhzknouxigedvb64precu67p3yurvtz5umiele";
        let ix = memo_instruction(memo, &owner);
        assert_eq!(ix.program_id, *MEMO_PROGRAM_ID);
        assert_eq!(ix.data, memo.as_bytes());
    }
}
