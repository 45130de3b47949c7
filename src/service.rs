use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::extractor::MEMO_MARKER;
use crate::resolver::{
    content_fingerprint, placeholder_image, ContentStore, StoreError, StoredEntry, StoredImage,
};

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("diary service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("diary service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("diary service reported failure for `{0}`")]
    Rejected(String),
    #[error("failed to store generated entry: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedEntry {
    pub signature: String,
    pub content: String,
    pub timestamp: String,
    pub wallet: String,
    #[serde(rename = "ipfsHash")]
    pub content_id: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    success: bool,
    entry: GeneratedEntry,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    signature: &'a str,
    wallet: &'a str,
}

/// Client for the diary generation service. Only wired up when a
/// service URL is configured.
pub struct DiaryServiceClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl DiaryServiceClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Kicks off generation for a confirmed fee transfer.
    pub async fn generate(
        &self,
        signature: &str,
        wallet: &str,
    ) -> Result<GeneratedEntry, ServiceError> {
        let url = format!("{}/generate-diary", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&GenerateRequest { signature, wallet })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status()));
        }

        let body: GenerateResponse = response.json().await?;
        if !body.success {
            return Err(ServiceError::Rejected(signature.to_string()));
        }
        Ok(body.entry)
    }

    pub async fn entry(&self, signature: &str) -> Result<Option<GeneratedEntry>, ServiceError> {
        let url = format!("{}/diary/{}", self.base_url, signature);
        let response = self.http_client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status()));
        }
        Ok(Some(response.json().await?))
    }
}

const CANNED_ENTRIES: [&str; 5] = [
    "Today I experimented with a new building technique using overlapping plates to create a stronger foundation. The result was incredibly sturdy and opened up new possibilities for my castle build!",
    "Found some rare transparent yellow pieces at a local store today! They're perfect for the lighthouse beacon I've been planning. The way they catch the light is absolutely magical.",
    "Completed my most ambitious build yet, a working clock mechanism! It took weeks of trial and error, but seeing those gears turn for the first time was pure joy.",
    "Spent the afternoon teaching my young cousin how to build. Watching their face light up when they created their first stable tower reminded me why I love building so much.",
    "Discovered that combining different shades of blue creates an amazing ocean effect. My pirate ship now sits on the most realistic water I've ever built!",
];

/// In-process stand-in for the generation service: picks a canned entry
/// deterministically from the signature, fingerprints it, and writes the
/// document into the backing store so the resolver can find it.
pub struct StandInDiaryService<S> {
    store: S,
}

impl<S: ContentStore> StandInDiaryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn generate(
        &self,
        signature: &str,
        wallet: &str,
    ) -> Result<GeneratedEntry, ServiceError> {
        let index = signature
            .chars()
            .rev()
            .find_map(|c| c.to_digit(16))
            .unwrap_or(0) as usize
            % CANNED_ENTRIES.len();
        let content = CANNED_ENTRIES[index];
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let image = placeholder_image(content);
        let document = StoredEntry {
            content: content.to_string(),
            image: Some(StoredImage {
                content_id: None,
                url: Some(image.url),
                kind: Some("placeholder".to_string()),
            }),
            timestamp: Some(timestamp.clone()),
        };

        let content_id = content_fingerprint(&serde_json::to_vec(&document).unwrap_or_default());
        self.store.put(&content_id, document).await?;

        Ok(GeneratedEntry {
            signature: signature.to_string(),
            content: content.to_string(),
            timestamp,
            wallet: short_wallet(wallet),
            content_id,
        })
    }
}

/// Memo line referencing a generated entry, as the service stamps it on
/// the fee transfer.
pub fn memo_for(entry: &GeneratedEntry) -> String {
    let preview: String = entry.content.chars().take(50).collect();
    format!(
        "{MEMO_MARKER} {} - Dear Diary, {}... - Diary Lover {}",
        entry.content_id, preview, entry.wallet
    )
}

fn short_wallet(wallet: &str) -> String {
    let prefix: String = wallet.chars().take(8).collect();
    format!("{prefix}...")
}
