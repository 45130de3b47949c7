use std::time::Duration;

use itertools::Itertools;
use solana_program::pubkey::Pubkey;

use crate::assembler::assemble;
use crate::extractor::extract;
use crate::ledger::{LedgerClient, LedgerError};
use crate::models::{DiaryEntry, TransactionView};
use crate::resolver::{ContentResolver, ContentStore};
use crate::settings::Config;

const LISTING_RETRIES: u32 = 2;
const LISTING_BACKOFF: Duration = Duration::from_millis(500);

#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("failed to list signatures for `{owner}`: {source}")]
    Listing {
        owner: String,
        #[source]
        source: LedgerError,
    },
}

/// Pacing policy for per-transaction lookups: a short pause after every
/// few lookups, a longer cool-down after a detected rate limit.
#[derive(Debug, Clone)]
pub struct Pacer {
    lookups_per_pause: usize,
    pause: Duration,
    cooldown: Duration,
}

impl Pacer {
    pub fn new(lookups_per_pause: usize, pause: Duration, cooldown: Duration) -> Self {
        Self {
            lookups_per_pause: lookups_per_pause.max(1),
            pause,
            cooldown,
        }
    }

    /// Zero-delay policy for tests.
    pub fn unthrottled() -> Self {
        Self::new(usize::MAX, Duration::ZERO, Duration::ZERO)
    }

    pub async fn pace(&self, lookups_done: usize) {
        if lookups_done > 0 && lookups_done % self.lookups_per_pause == 0 {
            tokio::time::sleep(self.pause).await;
        }
    }

    pub async fn cool_down(&self) {
        tokio::time::sleep(self.cooldown).await;
    }
}

impl From<&Config> for Pacer {
    fn from(config: &Config) -> Self {
        Self::new(
            config.lookups_per_pause,
            Duration::from_millis(config.pause_ms),
            Duration::from_millis(config.cooldown_ms),
        )
    }
}

/// Pages through recent signatures for an owner and turns the matching
/// transactions into normalized diary entries.
pub struct EntryFeed<L, S> {
    ledger: L,
    resolver: ContentResolver<S>,
    service_account: Pubkey,
    pacer: Pacer,
}

impl<L: LedgerClient, S: ContentStore> EntryFeed<L, S> {
    pub fn new(
        ledger: L,
        resolver: ContentResolver<S>,
        service_account: Pubkey,
        pacer: Pacer,
    ) -> Self {
        Self {
            ledger,
            resolver,
            service_account,
            pacer,
        }
    }

    /// Newest-first diary entries for `owner`, deduplicated by signature.
    ///
    /// A failure on a single transaction is skipped, a rate limit is
    /// cooled down and retried once; only a total failure of the initial
    /// signature listing is surfaced to the caller.
    pub async fn fetch_recent_entries(
        &self,
        owner: &Pubkey,
        page_limit: usize,
    ) -> Result<Vec<DiaryEntry>, FeedError> {
        let signatures = tryhard::retry_fn(|| self.ledger.list_signatures(owner, page_limit))
            .retries(LISTING_RETRIES)
            .fixed_backoff(LISTING_BACKOFF)
            .await
            .map_err(|source| FeedError::Listing {
                owner: owner.to_string(),
                source,
            })?;

        tracing::debug!(owner = %owner, count = signatures.len(), "listed signatures");

        let owner_label = owner.to_string();
        let mut entries = Vec::new();

        for (lookups_done, sig) in signatures.iter().enumerate() {
            self.pacer.pace(lookups_done).await;

            let Some(transaction) = self.lookup(&sig.signature).await else {
                continue;
            };

            let Some(memo) = extract(&transaction, &self.service_account) else {
                continue;
            };

            let resolved = match &memo.content_id {
                Some(content_id) => self.resolver.resolve(content_id).await,
                None => None,
            };

            if let Some(entry) = assemble(sig, Some(&memo), resolved, Some(&owner_label)) {
                entries.push(entry);
            }
        }

        // A transaction may match more than one extraction rule.
        let mut entries: Vec<DiaryEntry> = entries
            .into_iter()
            .unique_by(|entry| entry.signature.clone())
            .collect();
        // RFC 3339 UTC strings order lexicographically.
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(entries)
    }

    async fn lookup(&self, signature: &str) -> Option<TransactionView> {
        match self.ledger.get_transaction(signature).await {
            Ok(transaction) => transaction,
            Err(LedgerError::RateLimited) => {
                tracing::warn!(signature, "rpc rate limited, cooling down");
                self.pacer.cool_down().await;
                match self.ledger.get_transaction(signature).await {
                    Ok(transaction) => transaction,
                    Err(e) => {
                        tracing::debug!(signature, error = %e, "skipping transaction");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::debug!(signature, error = %e, "skipping transaction");
                None
            }
        }
    }
}
