//! Known record kinds and their typed read-back.

use super::audio::{AudioRecord, AUDIO_KIND};
use super::envelope::StoredRecord;
use super::error::VaultError;
use super::location::{LocationRecord, LOCATION_KIND};
use crate::traits::record::Record;

/// Rebuild the typed record for a decrypted listing entry.
///
/// Unknown kinds yield `Ok(None)`: they are still listed, just not decoded.
pub fn decode_stored(stored: &StoredRecord) -> Result<Option<Box<dyn Record>>, VaultError> {
    let record: Box<dyn Record> = match stored.kind.as_str() {
        LOCATION_KIND => Box::new(LocationRecord::from_stored(stored)?),
        AUDIO_KIND => Box::new(AudioRecord::from_stored(stored)?),
        _ => return Ok(None),
    };
    Ok(Some(record))
}

/// Label used for entries whose stored display name is missing.
pub fn default_display_name(kind: &str) -> String {
    match kind {
        LOCATION_KIND => "Location Point".into(),
        AUDIO_KIND => "Audio Recording".into(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}
