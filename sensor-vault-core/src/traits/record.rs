use std::path::Path;

use serde::Serialize;

use crate::models::geo::GeoContext;

/// Kind-specific fields of a record, as a JSON object.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// One captured unit of data (a location fix, an audio clip, ...).
///
/// This is the only contract the pipeline depends on: encryption and
/// persistence never look at concrete record types, and only storage
/// routing consults [`Record::kind`]. Records are immutable once built.
pub trait Record: Send + Sync {
    /// Discriminator, e.g. `"location"` or `"audio"`.
    fn kind(&self) -> &str;

    /// Globally unique id, generated at construction.
    fn id(&self) -> &str;

    /// Kind-specific payload. Must round-trip into an equal record via the
    /// variant's `from_stored` constructor.
    fn to_json(&self) -> Payload;

    /// Associated file, for file-bearing kinds.
    fn file_path(&self) -> Option<&Path>;

    /// Creation time in milliseconds since the Unix epoch.
    fn timestamp(&self) -> i64;

    fn geo_context(&self) -> GeoContext;

    fn display_name(&self) -> &str;

    fn display_summary(&self) -> String;

    /// File-bearing kinds must point at an existing file to be captured.
    fn requires_file(&self) -> bool {
        false
    }

    /// Kind-specific checks run before a capture starts. The error names
    /// the offending field.
    fn validate_fields(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Serialize a payload struct into a JSON object map.
pub fn payload_of<T: Serialize>(value: &T) -> Payload {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            log::warn!("payload serialized to a non-object value: {}", other);
            Payload::new()
        }
        Err(e) => {
            log::warn!("payload serialization failed: {}", e);
            Payload::new()
        }
    }
}
