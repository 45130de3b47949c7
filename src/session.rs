use std::path::Path;

use solana_program::pubkey::Pubkey;
use solana_sdk::hash::Hash;
use solana_sdk::signer::keypair::{read_keypair_file, Keypair};
use solana_sdk::signer::{Signer, SignerError};
use solana_sdk::transaction::Transaction;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("no wallet provider available")]
    NoProvider,
    #[error("failed to load wallet keypair: {0}")]
    Keypair(String),
}

/// Wallet boundary: holds the key material and signs on request.
pub trait Wallet {
    fn pubkey(&self) -> Pubkey;

    fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        blockhash: Hash,
    ) -> Result<(), SignerError>;
}

/// File-backed keypair wallet, the stand-in for a browser extension.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let keypair =
            read_keypair_file(path).map_err(|e| SessionError::Keypair(e.to_string()))?;
        Ok(Self { keypair })
    }
}

impl Wallet for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        blockhash: Hash,
    ) -> Result<(), SignerError> {
        transaction.try_sign(&[&self.keypair], blockhash)
    }
}

/// Connected-wallet context passed into the pipeline calls. Created on
/// connect, dropped on disconnect; nothing wallet-related lives in
/// process-wide state.
pub struct WalletSession<W> {
    wallet: W,
    owner: Pubkey,
}

impl<W: Wallet> WalletSession<W> {
    /// Absence of a wallet provider is a fatal precondition failure for
    /// the whole session.
    pub fn connect(provider: Option<W>) -> Result<Self, SessionError> {
        let wallet = provider.ok_or(SessionError::NoProvider)?;
        let owner = wallet.pubkey();
        tracing::info!(owner = %owner, "wallet connected");
        Ok(Self { wallet, owner })
    }

    pub fn owner(&self) -> Pubkey {
        self.owner
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }
}
