use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::traits::record::Payload;

/// Encrypted-at-rest wrapper around a record's serialized payload.
///
/// `type`, `id`, `timestamp` and `display_name` stay in cleartext so rows
/// can be indexed and listed without decryption. When `encrypted` is false
/// the row predates encryption and carries no ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub encrypted: bool,
    /// Base64 of `nonce || ciphertext || tag`.
    #[serde(rename = "encrypted_data", default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

/// Backup state of a structured row. Mutated only by a backup subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudStatus {
    Local,
    Queued,
    Synced,
}

impl CloudStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Queued => "queued",
            Self::Synced => "synced",
        }
    }
}

impl fmt::Display for CloudStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "queued" => Ok(Self::Queued),
            "synced" => Ok(Self::Synced),
            other => Err(format!("unknown cloud status: {}", other)),
        }
    }
}

/// Where a stored entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntrySource {
    /// `data_items` table.
    Structured,
    /// Per-kind encrypted log.
    GenericLog,
    /// Per-kind plaintext log written by older builds or the fallback path.
    LegacyLog,
}

/// Stored metadata body, before decryption.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryBody {
    /// Base64 ciphertext of the payload JSON.
    Sealed(String),
    /// Legacy plaintext payload.
    Plain(Payload),
}

/// A raw entry as yielded by the storage layer, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub id: String,
    pub kind: String,
    pub timestamp: i64,
    pub display_name: String,
    pub file_path: Option<PathBuf>,
    pub cloud_status: CloudStatus,
    pub source: EntrySource,
    pub body: EntryBody,
}

impl StoredEntry {
    pub fn is_encrypted(&self) -> bool {
        matches!(self.body, EntryBody::Sealed(_))
    }
}

/// A decrypted record as returned by listings.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub kind: String,
    pub timestamp: i64,
    pub display_name: String,
    pub file_path: Option<PathBuf>,
    pub cloud_status: CloudStatus,
    pub source: EntrySource,
    /// False for legacy plaintext rows.
    pub encrypted: bool,
    pub payload: Payload,
}

/// Result of a bulk read for one kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordListing {
    /// Newest first; ties keep insertion order.
    pub records: Vec<StoredRecord>,
    /// Log lines that could not be parsed.
    pub skipped: usize,
    /// Entries whose ciphertext failed to decode or authenticate.
    pub undecryptable: usize,
}

impl RecordListing {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// What a delete removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedEntry {
    pub id: String,
    pub kind: String,
    pub source: EntrySource,
    /// Whether an associated file existed and was securely deleted.
    pub file_removed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wire_format() {
        let envelope = EncryptedEnvelope {
            kind: "audio".into(),
            id: "abc".into(),
            timestamp: 42,
            encrypted: true,
            ciphertext: Some("AAAA".into()),
            display_name: "Audio Recording".into(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["encrypted"], true);
        assert_eq!(json["encrypted_data"], "AAAA");
        assert_eq!(json["display_name"], "Audio Recording");
    }

    #[test]
    fn plaintext_envelope_omits_ciphertext() {
        let envelope = EncryptedEnvelope {
            kind: "location".into(),
            id: "x".into(),
            timestamp: 1,
            encrypted: false,
            ciphertext: None,
            display_name: String::new(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("encrypted_data"));
    }

    #[test]
    fn cloud_status_parses() {
        assert_eq!("queued".parse::<CloudStatus>().unwrap(), CloudStatus::Queued);
        assert!("pending".parse::<CloudStatus>().is_err());
        assert_eq!(CloudStatus::Synced.to_string(), "synced");
    }
}
