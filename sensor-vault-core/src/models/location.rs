use std::path::Path;

use serde::{Deserialize, Serialize};

use super::envelope::StoredRecord;
use super::error::VaultError;
use super::geo::GeoContext;
use crate::traits::record::{payload_of, Payload, Record};

pub const LOCATION_KIND: &str = "location";

const UNKNOWN_PROVIDER: &str = "unknown";

fn unknown_provider() -> String {
    UNKNOWN_PROVIDER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LocationPayload {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    accuracy: f64,
    #[serde(default = "unknown_provider")]
    provider: String,
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    bearing: f64,
}

/// A single location fix as delivered by the platform location provider.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    id: String,
    timestamp: i64,
    payload: LocationPayload,
}

impl LocationRecord {
    /// Creates a fix without motion data (speed and bearing are 0).
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, provider: Option<&str>) -> Self {
        Self::with_motion(latitude, longitude, accuracy, provider, 0.0, 0.0)
    }

    pub fn with_motion(
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        provider: Option<&str>,
        speed: f64,
        bearing: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            payload: LocationPayload {
                latitude,
                longitude,
                accuracy,
                provider: provider.map(str::to_string).unwrap_or_else(unknown_provider),
                speed,
                bearing,
            },
        }
    }

    /// Rebuild a fix from a decrypted listing entry.
    pub fn from_stored(stored: &StoredRecord) -> Result<Self, VaultError> {
        if stored.kind != LOCATION_KIND {
            return Err(VaultError::InvalidInput(format!(
                "expected a {} record, got {}",
                LOCATION_KIND, stored.kind
            )));
        }
        let payload: LocationPayload =
            serde_json::from_value(serde_json::Value::Object(stored.payload.clone()))?;
        Ok(Self {
            id: stored.id.clone(),
            timestamp: stored.timestamp,
            payload,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.payload.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.payload.longitude
    }

    pub fn accuracy(&self) -> f64 {
        self.payload.accuracy
    }

    pub fn provider(&self) -> &str {
        &self.payload.provider
    }

    pub fn speed(&self) -> f64 {
        self.payload.speed
    }

    pub fn bearing(&self) -> f64 {
        self.payload.bearing
    }
}

impl Record for LocationRecord {
    fn kind(&self) -> &str {
        LOCATION_KIND
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn to_json(&self) -> Payload {
        payload_of(&self.payload)
    }

    fn file_path(&self) -> Option<&Path> {
        None
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn geo_context(&self) -> GeoContext {
        GeoContext::new(self.payload.latitude, self.payload.longitude)
    }

    fn display_name(&self) -> &str {
        "Location Point"
    }

    fn display_summary(&self) -> String {
        format!(
            "{:.6}, {:.6} (±{:.0}m)",
            self.payload.latitude, self.payload.longitude, self.payload.accuracy
        )
    }

    fn validate_fields(&self) -> Result<(), String> {
        let fields = [
            ("latitude", self.payload.latitude),
            ("longitude", self.payload.longitude),
            ("accuracy", self.payload.accuracy),
            ("speed", self.payload.speed),
            ("bearing", self.payload.bearing),
        ];
        match fields.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(format!("{} is not a finite number: {}", name, value)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::envelope::{CloudStatus, EntrySource};
    use approx::assert_relative_eq;

    fn stored_from(record: &LocationRecord) -> StoredRecord {
        StoredRecord {
            id: record.id().to_string(),
            kind: record.kind().to_string(),
            timestamp: record.timestamp(),
            display_name: record.display_name().to_string(),
            file_path: None,
            cloud_status: CloudStatus::Local,
            source: EntrySource::Structured,
            encrypted: true,
            payload: record.to_json(),
        }
    }

    #[test]
    fn non_finite_fields_fail_validation() {
        assert!(LocationRecord::new(1.0, 2.0, 3.0, None).validate_fields().is_ok());
        let err = LocationRecord::new(1.0, 2.0, f64::NAN, None).validate_fields().unwrap_err();
        assert!(err.starts_with("accuracy"));
        let err = LocationRecord::with_motion(1.0, 2.0, 3.0, None, 0.0, f64::INFINITY)
            .validate_fields()
            .unwrap_err();
        assert!(err.starts_with("bearing"));
    }

    #[test]
    fn payload_fields() {
        let record = LocationRecord::new(-37.8136, 144.9631, 10.0, Some("gps"));
        let json = record.to_json();

        assert_eq!(json["provider"], "gps");
        assert_relative_eq!(json["latitude"].as_f64().unwrap(), -37.8136);
        assert_relative_eq!(json["longitude"].as_f64().unwrap(), 144.9631);
        assert_relative_eq!(json["speed"].as_f64().unwrap(), 0.0);
        assert!(record.file_path().is_none());
        assert!(!record.requires_file());
    }

    #[test]
    fn missing_provider_defaults_to_unknown() {
        let record = LocationRecord::new(1.0, 2.0, 3.0, None);
        assert_eq!(record.provider(), "unknown");
    }

    #[test]
    fn ids_are_unique() {
        let a = LocationRecord::new(1.0, 2.0, 3.0, None);
        let b = LocationRecord::new(1.0, 2.0, 3.0, None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn summary_format() {
        let record = LocationRecord::new(-37.8136, 144.9631, 10.0, Some("gps"));
        assert_eq!(record.display_summary(), "-37.813600, 144.963100 (±10m)");
        assert_eq!(record.display_name(), "Location Point");
    }

    #[test]
    fn round_trips_through_stored_record() {
        let record = LocationRecord::with_motion(48.8584, 2.2945, 4.5, Some("fused"), 1.25, 270.0);
        let restored = LocationRecord::from_stored(&stored_from(&record)).unwrap();
        assert_eq!(restored, record);
        assert_eq!(restored.to_json(), record.to_json());
    }

    #[test]
    fn legacy_payload_without_motion_fields() {
        let record = LocationRecord::new(1.0, 2.0, 3.0, Some("gps"));
        let mut stored = stored_from(&record);
        stored.payload.remove("speed");
        stored.payload.remove("bearing");
        stored.payload.remove("provider");

        let restored = LocationRecord::from_stored(&stored).unwrap();
        assert_eq!(restored.provider(), "unknown");
        assert_relative_eq!(restored.bearing(), 0.0);
    }

    #[test]
    fn rejects_other_kinds() {
        let record = LocationRecord::new(1.0, 2.0, 3.0, None);
        let mut stored = stored_from(&record);
        stored.kind = "audio".into();
        assert!(LocationRecord::from_stored(&stored).is_err());
    }
}
