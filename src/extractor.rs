use once_cell::sync::Lazy;
use regex::Regex;
use solana_program::pubkey::Pubkey;

use crate::models::{ExtractedMemo, TransactionView};

/// Marker prefixed to every diary memo by the generation service.
pub const MEMO_MARKER: &str = "📔 IPFS:";

/// SPL memo program, v2 then v1.
pub const MEMO_PROGRAM_IDS: [&str; 2] = [
    "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr",
    "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo",
];

// CIDv1 as produced by the generation service: "bafkrei" plus 52 base32
// characters.
static CID_V1: Lazy<Regex> = Lazy::new(|| Regex::new(r"bafkrei[a-z2-7]{52}").unwrap());
// Legacy CIDv0: "Qm" plus 44 base58 characters.
static CID_V0: Lazy<Regex> = Lazy::new(|| Regex::new(r"Qm[1-9A-HJ-NP-Za-km-z]{44}").unwrap());

fn match_cid_v1(text: &str) -> Option<String> {
    CID_V1.find(text).map(|m| m.as_str().to_string())
}

fn match_cid_v0(text: &str) -> Option<String> {
    CID_V0.find(text).map(|m| m.as_str().to_string())
}

/// Identifier matchers in priority order: the stricter fixed-length CIDv1
/// before the looser legacy format. First match wins.
static MATCHERS: &[fn(&str) -> Option<String>] = &[match_cid_v1, match_cid_v0];

pub fn match_content_id(text: &str) -> Option<String> {
    MATCHERS.iter().find_map(|matcher| matcher(text))
}

/// Inspects a transaction for a recognizable diary memo. Recognized
/// shapes, scanned in instruction then log order:
///
/// - a memo-program instruction on a transaction involving the message
///   service account,
/// - any instruction payload or log line carrying the diary marker,
/// - a bare content identifier in the logs of a message-service
///   transaction.
///
/// `None` is the expected outcome for unrelated transactions, not an
/// error. Marker-text detection is authoritative; service-account
/// involvement only gates the weaker shapes.
pub fn extract(transaction: &TransactionView, service_account: &Pubkey) -> Option<ExtractedMemo> {
    let service_account = service_account.to_string();
    let service_involved = transaction
        .account_keys
        .iter()
        .any(|key| *key == service_account);

    for ix in &transaction.instructions {
        let Ok(text) = std::str::from_utf8(&ix.data) else {
            continue;
        };
        let is_memo_instruction = MEMO_PROGRAM_IDS.contains(&ix.program.as_str());

        if text.contains(MEMO_MARKER) || (is_memo_instruction && service_involved) {
            return Some(ExtractedMemo {
                content_id: match_content_id(text),
                preview_text: Some(text.to_string()),
                raw_log: text.to_string(),
            });
        }
    }

    for log in &transaction.log_messages {
        if log.contains(MEMO_MARKER) {
            return Some(ExtractedMemo {
                content_id: match_content_id(log),
                preview_text: Some(log.clone()),
                raw_log: log.clone(),
            });
        }
        if service_involved {
            if let Some(content_id) = match_content_id(log) {
                return Some(ExtractedMemo {
                    content_id: Some(content_id),
                    preview_text: None,
                    raw_log: log.clone(),
                });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstructionView;
    use std::str::FromStr;

    const SERVICE: &str = "4rBjRyfSNWGbbCNcTzEyrJUNxUj5im1dGCgKMta93R3j";
    const CID: &str = "bafkreidet2m5xtzhgejsvhzknouxigedvb64precu67p3yurvtz5umiele";
    const LEGACY_CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    fn service_pubkey() -> Pubkey {
        Pubkey::from_str(SERVICE).unwrap()
    }

    fn transaction_with_logs(keys: Vec<&str>, logs: Vec<&str>) -> TransactionView {
        TransactionView {
            signature: "sig".to_string(),
            block_time: Some(100),
            account_keys: keys.into_iter().map(str::to_string).collect(),
            instructions: vec![],
            log_messages: logs.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn unrelated_transaction_yields_nothing() {
        let tx = transaction_with_logs(
            vec!["11111111111111111111111111111111"],
            vec!["Program 11111111111111111111111111111111 invoke [1]", "success"],
        );
        assert_eq!(extract(&tx, &service_pubkey()), None);
    }

    #[test]
    fn embedded_identifier_round_trips() {
        let log = format!("{MEMO_MARKER} {CID} - Dear Diary, hello");
        let tx = transaction_with_logs(vec![], vec![&log]);

        let memo = extract(&tx, &service_pubkey()).unwrap();
        assert_eq!(memo.content_id.as_deref(), Some(CID));
        assert_eq!(memo.raw_log, log);
    }

    #[test]
    fn structured_identifier_beats_legacy_format() {
        let text = format!("memo {LEGACY_CID} then {CID}");
        assert_eq!(match_content_id(&text).as_deref(), Some(CID));
    }

    #[test]
    fn legacy_identifier_still_matches_alone() {
        let text = format!("Program log: Memo {LEGACY_CID}");
        assert_eq!(match_content_id(&text).as_deref(), Some(LEGACY_CID));
    }

    #[test]
    fn memo_instruction_on_service_transaction_is_recognized() {
        let payload = "paid 10 tokens";
        let tx = TransactionView {
            account_keys: vec![SERVICE.to_string()],
            instructions: vec![InstructionView {
                program: MEMO_PROGRAM_IDS[0].to_string(),
                data: payload.as_bytes().to_vec(),
            }],
            ..Default::default()
        };

        let memo = extract(&tx, &service_pubkey()).unwrap();
        assert_eq!(memo.content_id, None);
        assert_eq!(memo.preview_text.as_deref(), Some(payload));
    }

    #[test]
    fn memo_instruction_without_service_account_is_ignored() {
        let tx = TransactionView {
            account_keys: vec!["11111111111111111111111111111111".to_string()],
            instructions: vec![InstructionView {
                program: MEMO_PROGRAM_IDS[0].to_string(),
                data: b"just a note".to_vec(),
            }],
            ..Default::default()
        };
        assert_eq!(extract(&tx, &service_pubkey()), None);
    }

    #[test]
    fn bare_identifier_in_logs_requires_service_involvement() {
        let log = format!("Program log: {CID}");

        let unrelated = transaction_with_logs(vec![], vec![&log]);
        assert_eq!(extract(&unrelated, &service_pubkey()), None);

        let related = transaction_with_logs(vec![SERVICE], vec![&log]);
        let memo = extract(&related, &service_pubkey()).unwrap();
        assert_eq!(memo.content_id.as_deref(), Some(CID));
        assert_eq!(memo.preview_text, None);
    }

    #[test]
    fn instruction_scan_runs_before_log_scan() {
        let ix_text = format!("{MEMO_MARKER} {CID}");
        let other_cid = "bafkreib2kwkw6jmnx2bv3e3lzmkmwamsnxmj22doihwmyzzjcbnvxnrbky";
        let log = format!("{MEMO_MARKER} {other_cid}");

        let tx = TransactionView {
            account_keys: vec![SERVICE.to_string()],
            instructions: vec![InstructionView {
                program: MEMO_PROGRAM_IDS[0].to_string(),
                data: ix_text.as_bytes().to_vec(),
            }],
            log_messages: vec![log],
            ..Default::default()
        };

        let memo = extract(&tx, &service_pubkey()).unwrap();
        assert_eq!(memo.content_id.as_deref(), Some(CID));
    }

    #[test]
    fn non_utf8_payloads_are_skipped() {
        let tx = TransactionView {
            account_keys: vec![SERVICE.to_string()],
            instructions: vec![InstructionView {
                program: "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".to_string(),
                data: vec![3, 0, 0xFF, 0xFE, 64],
            }],
            ..Default::default()
        };
        assert_eq!(extract(&tx, &service_pubkey()), None);
    }
}
