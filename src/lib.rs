use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use solana_program::pubkey::Pubkey;
use tracing_subscriber::EnvFilter;

use crate::feed::{EntryFeed, Pacer};
use crate::ledger::RpcLedgerClient;
use crate::models::DiaryEntry;
use crate::resolver::{ContentResolver, HttpContentStore, LocalServiceStore, StoreBackend};
use crate::service::DiaryServiceClient;
use crate::session::{KeypairWallet, WalletSession};
use crate::settings::Config;
use crate::transfer::FeeTransferBuilder;

pub mod assembler;
pub mod extractor;
pub mod feed;
pub mod ledger;
pub mod models;
pub mod resolver;
pub mod service;
pub mod session;
pub mod settings;
pub mod transfer;

/// Runtime options carried in from the command line.
#[derive(Debug, Default)]
pub struct ServiceOptions {
    /// Wallet address to scan; defaults to the configured keypair.
    pub owner: Option<String>,
    pub page_limit: Option<usize>,
    /// Pay the token fee for a fresh diary entry before reading.
    pub pay: bool,
    /// Fetch one page of entries, print them and exit.
    pub once: bool,
}

pub async fn start_service(options: ServiceOptions) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().context("Failed to load configuration")?;

    let session = match &config.keypair_path {
        Some(path) => Some(
            WalletSession::connect(Some(KeypairWallet::read_from(path)?))
                .context("Failed to connect wallet")?,
        ),
        None => None,
    };

    let owner = match (&options.owner, &session) {
        (Some(address), _) => Pubkey::from_str(address)
            .with_context(|| format!("Invalid owner address `{address}`"))?,
        (None, Some(session)) => session.owner(),
        (None, None) => {
            bail!("no wallet provider available: configure a keypair or pass an owner address")
        }
    };

    let ledger = Arc::new(RpcLedgerClient::new(config.rpc_endpoint.clone()));

    if options.pay {
        let session = session
            .as_ref()
            .context("Paying for an entry requires a configured keypair")?;
        pay_for_entry(ledger.as_ref(), &config, session).await?;
    }

    let store = match &config.diary_service_url {
        Some(url) => StoreBackend::Local(LocalServiceStore::new(url.clone())),
        None => StoreBackend::Hosted(HttpContentStore::new(config.content_store_url.clone())),
    };
    let resolver = ContentResolver::new(store, config.image_store_url.clone());

    let page_limit = options.page_limit.unwrap_or(config.page_limit);
    let poll_interval = config.poll_interval_sec;
    let feed = Arc::new(EntryFeed::new(
        ledger,
        resolver,
        config.message_service_account,
        Pacer::from(&config),
    ));

    if options.once {
        let entries = feed
            .fetch_recent_entries(&owner, page_limit)
            .await
            .context("Failed to load diary entries")?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    tokio::spawn(async move {
        loop {
            match feed.fetch_recent_entries(&owner, page_limit).await {
                Ok(entries) => render_entries(&entries),
                Err(e) => tracing::error!("error occurred during feed refresh: {e:?}"),
            }

            tokio::time::sleep(Duration::from_secs(poll_interval)).await;
        }
    });

    futures::future::pending().await
}

/// Pays the token fee and, when a generation service is configured,
/// requests the matching diary entry.
async fn pay_for_entry(
    ledger: &RpcLedgerClient,
    config: &Config,
    session: &WalletSession<KeypairWallet>,
) -> Result<()> {
    let builder = FeeTransferBuilder::new(ledger, config);
    let signature = builder
        .pay_for_entry(session, "📔 tokens for one diary entry")
        .await
        .context("Fee transfer failed")?;

    if let Some(url) = &config.diary_service_url {
        let client = DiaryServiceClient::new(url.clone());
        let entry = client
            .generate(&signature, &session.owner().to_string())
            .await
            .context("Diary generation failed")?;
        tracing::info!(content_id = %entry.content_id, "diary entry generated");
    }

    Ok(())
}

fn render_entries(entries: &[DiaryEntry]) {
    tracing::info!(count = entries.len(), "loaded diary entries");
    for entry in entries {
        tracing::info!(
            date = %entry.display_date,
            signature = %entry.signature,
            content_id = %entry.content_id,
            "📔 {}",
            entry.content
        );
    }
}
