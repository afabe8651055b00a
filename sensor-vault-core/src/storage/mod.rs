pub mod generic_log;
pub mod record_store;
pub mod secure_fs;
pub mod structured;

use serde_json::Value;

use crate::models::envelope::{EncryptedEnvelope, EntryBody, StoredEntry};
use crate::models::error::VaultError;

/// Raw entries read from one source, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryScan {
    pub entries: Vec<StoredEntry>,
    /// Rows or lines that could not be parsed.
    pub skipped: usize,
}

impl EntryScan {
    pub fn merge(&mut self, other: EntryScan) {
        self.entries.extend(other.entries);
        self.skipped += other.skipped;
    }
}

/// Split a stored metadata value into its body and an embedded display name.
///
/// Accepts a base64 ciphertext string, a full encrypted envelope, or a
/// legacy plaintext payload. Legacy payloads may carry `display_name` and
/// `display_summary`; both are removed from the payload.
pub(crate) fn decode_body(value: Value) -> Result<(EntryBody, Option<String>), VaultError> {
    match value {
        Value::String(ciphertext) => Ok((EntryBody::Sealed(ciphertext), None)),
        Value::Object(map) if map.get("encrypted").and_then(Value::as_bool) == Some(true) => {
            let envelope: EncryptedEnvelope = serde_json::from_value(Value::Object(map))?;
            let ciphertext = envelope
                .ciphertext
                .ok_or_else(|| VaultError::Parse(format!("envelope {} has no ciphertext", envelope.id)))?;
            let name = Some(envelope.display_name).filter(|n| !n.is_empty());
            Ok((EntryBody::Sealed(ciphertext), name))
        }
        Value::Object(mut map) => {
            let name = map
                .remove("display_name")
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|n| !n.is_empty());
            map.remove("display_summary");
            Ok((EntryBody::Plain(map), name))
        }
        other => Err(VaultError::Parse(format!("unexpected metadata value: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_is_ciphertext() {
        let (body, name) = decode_body(json!("QUJD")).unwrap();
        assert_eq!(body, EntryBody::Sealed("QUJD".into()));
        assert!(name.is_none());
    }

    #[test]
    fn envelope_yields_ciphertext_and_name() {
        let value = json!({
            "type": "location", "id": "a", "timestamp": 1,
            "encrypted": true, "encrypted_data": "QUJD", "display_name": "Location Point"
        });
        let (body, name) = decode_body(value).unwrap();
        assert_eq!(body, EntryBody::Sealed("QUJD".into()));
        assert_eq!(name.as_deref(), Some("Location Point"));
    }

    #[test]
    fn legacy_payload_lifts_display_fields() {
        let value = json!({
            "duration_ms": 1000, "display_name": "Voice memo", "display_summary": "Voice memo (1.0s)"
        });
        let (body, name) = decode_body(value).unwrap();
        assert_eq!(name.as_deref(), Some("Voice memo"));
        match body {
            EntryBody::Plain(map) => {
                assert_eq!(map.len(), 1);
                assert_eq!(map["duration_ms"], 1000);
            }
            other => panic!("expected plaintext body, got {:?}", other),
        }
    }

    #[test]
    fn scalars_are_rejected() {
        assert!(matches!(decode_body(json!(5)), Err(VaultError::Parse(_))));
    }
}
