use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::models::{DiaryEntry, ExtractedMemo, SignatureRef};
use crate::resolver::ResolvedContent;

/// Preview delimiter of the memo format:
/// `📔 IPFS: <cid> - Dear Diary, <text> - <owner label>`.
const PREVIEW_DELIMITER: &str = " - ";

/// Shown when the memo carries no usable inline preview.
const PREVIEW_PLACEHOLDER: &str = "content available on content store";

const ANONYMOUS_LABEL: &str = "anonymous";

/// Combines extractor and resolver output into a normalized entry.
///
/// Returns `None` when there is no memo or the memo carries no content
/// identifier; partial records are dropped rather than materialized.
/// Resolved content and image take precedence over the inline preview.
pub fn assemble(
    signature: &SignatureRef,
    memo: Option<&ExtractedMemo>,
    resolved: Option<ResolvedContent>,
    owner: Option<&str>,
) -> Option<DiaryEntry> {
    let memo = memo?;
    let content_id = memo.content_id.clone()?;

    let (content, image) = match resolved {
        Some(resolved) => (resolved.content, resolved.image),
        None => (
            inline_preview(memo.preview_text.as_deref().unwrap_or(&memo.raw_log)),
            None,
        ),
    };

    let stamped = block_timestamp(signature.block_time);

    Some(DiaryEntry {
        signature: signature.signature.clone(),
        content,
        image,
        timestamp: stamped.to_rfc3339_opts(SecondsFormat::Secs, true),
        display_date: stamped.format("%A, %B %-d, %Y").to_string(),
        display_time: stamped.format("%H:%M").to_string(),
        owner_label: owner.map(short_address).unwrap_or_else(|| ANONYMOUS_LABEL.to_string()),
        content_id,
    })
}

/// Derives a preview string from the memo's inline text: the first two
/// segments are payment/identifier metadata and are discarded, the
/// remainder is the preview.
fn inline_preview(text: &str) -> String {
    let segments: Vec<&str> = text.split(PREVIEW_DELIMITER).collect();
    if segments.len() > 2 {
        let preview = segments[2..].join(PREVIEW_DELIMITER);
        if !preview.trim().is_empty() {
            return preview;
        }
    }
    PREVIEW_PLACEHOLDER.to_string()
}

fn block_timestamp(block_time: Option<i64>) -> DateTime<Utc> {
    block_time
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

fn short_address(address: &str) -> String {
    if address.len() < 16 {
        return ANONYMOUS_LABEL.to_string();
    }
    format!("{}...{}", &address[..8], &address[address.len() - 8..])
}
