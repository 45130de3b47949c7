use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use solana_program::pubkey::Pubkey;

/// Static service configuration, read once at startup. Defaults mirror
/// the devnet deployment; any field can be overridden through a
/// `config.yaml` next to the binary or a `DIARY_`-prefixed environment
/// variable.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub rpc_endpoint: String,
    /// Hosted-file store serving `<content_id>.json` documents.
    pub content_store_url: String,
    /// Hosted-file store serving `<content_id>.png` image assets.
    pub image_store_url: String,
    /// Local diary generation service, if one is running.
    pub diary_service_url: Option<String>,
    /// Pay-to keypair used to sign fee transfers. Without it the reader
    /// runs in read-only mode and needs an explicit owner address.
    pub keypair_path: Option<String>,

    #[serde(deserialize_with = "pubkey_from_str")]
    pub message_service_account: Pubkey,
    #[serde(deserialize_with = "pubkey_from_str")]
    pub token_mint: Pubkey,
    #[serde(deserialize_with = "pubkey_from_str")]
    pub usdc_mint: Pubkey,
    /// Tokens charged per diary entry, in whole tokens.
    pub tokens_per_message: u64,
    pub token_decimals: u32,
    /// Minimum USDC accepted by the token exchange.
    pub min_exchange_usdc: f64,

    pub page_limit: usize,
    pub poll_interval_sec: u64,
    /// Pacing: pause after this many per-transaction lookups.
    pub lookups_per_pause: usize,
    pub pause_ms: u64,
    /// Longer pause applied after a detected rate-limit failure.
    pub cooldown_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_endpoint: "https://api.devnet.solana.com".to_string(),
            content_store_url: "https://alfonsoaru.github.io/lego-diary-reader/public/diaries"
                .to_string(),
            image_store_url: "https://alfonsoaru.github.io/lego-diary-reader/public/images"
                .to_string(),
            diary_service_url: None,
            keypair_path: None,
            message_service_account: Pubkey::from_str(
                "4rBjRyfSNWGbbCNcTzEyrJUNxUj5im1dGCgKMta93R3j",
            )
            .unwrap(),
            token_mint: Pubkey::from_str("6Pc8qwhy99qZca23RqY92DbcLQxweUwxWPEKpb9psbAi").unwrap(),
            usdc_mint: Pubkey::from_str("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU").unwrap(),
            tokens_per_message: 10,
            token_decimals: 9,
            min_exchange_usdc: 0.10,
            page_limit: 100,
            poll_interval_sec: 60,
            lookups_per_pause: 3,
            pause_ms: 500,
            cooldown_ms: 5_000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("DIARY").try_parsing(true))
            .build()
            .context("Failed to read configuration sources")?;

        raw.try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Fee for one diary entry in base token units.
    pub fn fee_amount(&self) -> u64 {
        self.tokens_per_message * 10u64.pow(self.token_decimals)
    }
}

fn pubkey_from_str<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Pubkey::from_str(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = Config::default();
        assert_eq!(config.page_limit, 100);
        assert_eq!(config.fee_amount(), 10_000_000_000);
        assert!(config.diary_service_url.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        temp_env::with_vars(
            [
                ("DIARY_RPC_ENDPOINT", Some("http://localhost:8899")),
                ("DIARY_PAGE_LIMIT", Some("25")),
                (
                    "DIARY_MESSAGE_SERVICE_ACCOUNT",
                    Some("bNFMSsTXGZxhAA7mUcdUid5Yir3zWJf1myfP4TSQ46x"),
                ),
            ],
            || {
                let config = Config::load().unwrap();
                assert_eq!(config.rpc_endpoint, "http://localhost:8899");
                assert_eq!(config.page_limit, 25);
                assert_eq!(
                    config.message_service_account.to_string(),
                    "bNFMSsTXGZxhAA7mUcdUid5Yir3zWJf1myfP4TSQ46x"
                );
                // Untouched fields keep their defaults.
                assert_eq!(config.tokens_per_message, 10);
            },
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        temp_env::with_vars(
            [("DIARY_TOKEN_MINT", Some("not-a-pubkey"))],
            || {
                assert!(Config::load().is_err());
            },
        );
    }
}
