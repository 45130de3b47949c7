use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::models::{ImageKind, ImageRef};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("content store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content store returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("content store is read-only")]
    ReadOnly,
}

/// Document shape of the off-chain store, as written by the generation
/// service. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub content: String,
    #[serde(default)]
    pub image: Option<StoredImage>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    #[serde(rename = "ipfsHash", default)]
    pub content_id: Option<String>,
    #[serde(rename = "githubPagesUrl", default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Key-value boundary to the off-chain content store. Production
/// backends are networked; the in-memory backend serves tests and the
/// stand-in generation service.
#[allow(async_fn_in_trait)]
pub trait ContentStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError>;
    async fn put(&self, key: &str, entry: StoredEntry) -> Result<(), StoreError>;
}

/// Static hosted-file store: documents at `{base}/{key}.json`.
pub struct HttpContentStore {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpContentStore {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl ContentStore for HttpContentStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        let url = format!("{}/{}.json", self.base_url, key);
        let response = self.http_client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }

        Ok(Some(response.json().await?))
    }

    async fn put(&self, _key: &str, _entry: StoredEntry) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }
}

/// Local diary service backend: documents at `{base}/diary/{key}`, with
/// the service's own secondary store serving the images.
pub struct LocalServiceStore {
    http_client: reqwest::Client,
    base_url: String,
}

impl LocalServiceStore {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl ContentStore for LocalServiceStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        let url = format!("{}/diary/{}", self.base_url, key);
        let response = self.http_client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }

        Ok(Some(response.json().await?))
    }

    async fn put(&self, _key: &str, _entry: StoredEntry) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }
}

/// Configured production backend: the static hosted-file store, or a
/// local diary service when one is running.
pub enum StoreBackend {
    Hosted(HttpContentStore),
    Local(LocalServiceStore),
}

impl ContentStore for StoreBackend {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        match self {
            StoreBackend::Hosted(store) => store.get(key).await,
            StoreBackend::Local(store) => store.get(key).await,
        }
    }

    async fn put(&self, key: &str, entry: StoredEntry) -> Result<(), StoreError> {
        match self {
            StoreBackend::Hosted(store) => store.put(key, entry).await,
            StoreBackend::Local(store) => store.put(key, entry).await,
        }
    }
}

/// In-memory backend keyed by content identifier.
#[derive(Default)]
pub struct MemoryContentStore {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryContentStore {
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn put(&self, key: &str, entry: StoredEntry) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }
}

/// Resolver output: full content, preferred over any inline preview, and
/// an optional image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub content: String,
    pub image: Option<ImageRef>,
}

pub struct ContentResolver<S> {
    store: S,
    image_base_url: String,
}

impl<S: ContentStore> ContentResolver<S> {
    pub fn new(store: S, image_base_url: String) -> Self {
        Self {
            store,
            image_base_url,
        }
    }

    /// Fetches the stored document for a content identifier. A miss or a
    /// network failure resolves to `None`; callers fall back to inline
    /// preview text. Every call re-fetches.
    pub async fn resolve(&self, content_id: &str) -> Option<ResolvedContent> {
        let entry = match self.store.get(content_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(content_id, error = %e, "content store lookup failed");
                return None;
            }
        };

        let image = entry.image.and_then(|image| self.image_ref(image));
        Some(ResolvedContent {
            content: entry.content,
            image,
        })
    }

    fn image_ref(&self, image: StoredImage) -> Option<ImageRef> {
        if let Some(content_id) = image.content_id {
            return Some(ImageRef {
                url: format!("{}/{}.png", self.image_base_url, content_id),
                content_id: Some(content_id),
                kind: ImageKind::Generated,
            });
        }

        let url = image.url?;
        let kind = match image.kind.as_deref() {
            Some(kind) if kind.contains("fallback") => ImageKind::Fallback,
            Some(kind) if kind.contains("placeholder") => ImageKind::Placeholder,
            _ => ImageKind::Generated,
        };
        Some(ImageRef {
            url,
            content_id: None,
            kind,
        })
    }
}

const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// CID-style fingerprint of a document: "bafkrei" plus 52 base32
/// characters derived from a SHA3-256 digest. Matches the identifiers
/// the generation service stamps into memos.
pub fn content_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha3_256::digest(bytes);
    let mut fingerprint = String::with_capacity(59);
    fingerprint.push_str("bafkrei");
    for i in 0..52 {
        let byte = digest[i % digest.len()] as usize;
        fingerprint.push(BASE32_ALPHABET[byte % 32] as char);
    }
    fingerprint
}

const PLACEHOLDER_COLORS: [&str; 6] =
    ["#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF6600", "#990099"];

/// Brick-themed SVG placeholder rendered as a base64 data URL, used when
/// no generated image exists for an entry.
pub fn placeholder_image(prompt: &str) -> ImageRef {
    let color = PLACEHOLDER_COLORS[prompt.len() % PLACEHOLDER_COLORS.len()];
    let caption: String = prompt.chars().take(30).collect();
    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300"><rect width="400" height="300" fill="#f8f9fa"/><rect x="50" y="50" width="60" height="40" fill="{color}" stroke="#333" stroke-width="2"/><circle cx="65" cy="65" r="8" fill="#fff"/><circle cx="95" cy="65" r="8" fill="#fff"/><text x="200" y="200" text-anchor="middle" font-family="Arial" font-size="16" fill="#666">{caption}</text></svg>"##
    );

    ImageRef {
        url: format!("data:image/svg+xml;base64,{}", base64::encode(svg)),
        content_id: None,
        kind: ImageKind::Placeholder,
    }
}
