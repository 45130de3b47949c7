use serde::{Deserialize, Serialize};

/// Item of a signature listing as returned by the ledger, newest first.
/// Ordering is not guaranteed stable across pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRef {
    pub signature: String,
    pub block_time: Option<i64>,
}

/// One instruction of a fetched transaction, with its program address
/// resolved and its payload left as raw bytes.
#[derive(Debug, Clone, Default)]
pub struct InstructionView {
    pub program: String,
    pub data: Vec<u8>,
}

/// Read-only projection of a fetched transaction: account list,
/// instruction list and log lines. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct TransactionView {
    pub signature: String,
    pub block_time: Option<i64>,
    pub account_keys: Vec<String>,
    pub instructions: Vec<InstructionView>,
    pub log_messages: Vec<String>,
}

/// Memo material recovered from a single transaction. Discarded when no
/// recognizable pattern was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMemo {
    pub content_id: Option<String>,
    pub preview_text: Option<String>,
    pub raw_log: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Generated,
    Placeholder,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    pub content_id: Option<String>,
    pub kind: ImageKind,
}

/// Normalized display record combining on-chain metadata with off-chain
/// content. Uniqueness key is the transaction signature. Held only for
/// the duration of one feed render; the content store stays the system
/// of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub signature: String,
    pub content: String,
    pub image: Option<ImageRef>,
    /// ISO-8601, derived from the block time.
    pub timestamp: String,
    pub display_date: String,
    pub display_time: String,
    pub owner_label: String,
    pub content_id: String,
}
