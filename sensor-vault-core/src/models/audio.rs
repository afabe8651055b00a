use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::envelope::StoredRecord;
use super::error::VaultError;
use super::geo::GeoContext;
use crate::traits::record::{payload_of, Payload, Record};

pub const AUDIO_KIND: &str = "audio";

/// Encoding details of a finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDetails {
    /// Container/codec label (default: `aac`).
    pub format: String,
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,
    /// Channel count (default: 1).
    pub channels: u16,
    /// What the recording is for, e.g. `voice_memo`, `meeting`, `interview`, `note`.
    pub recording_context: String,
}

impl Default for AudioDetails {
    fn default() -> Self {
        Self {
            format: "aac".into(),
            sample_rate: 44100,
            channels: 1,
            recording_context: "voice_memo".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AudioPayload {
    duration_ms: u64,
    format: String,
    sample_rate: u32,
    channels: u16,
    file_size_bytes: u64,
    latitude: f64,
    longitude: f64,
    recording_context: String,
}

/// A finished audio recording produced by the platform microphone codec.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRecord {
    id: String,
    timestamp: i64,
    file_path: PathBuf,
    payload: AudioPayload,
}

impl AudioRecord {
    pub fn new(file_path: impl Into<PathBuf>, duration_ms: u64, geo: GeoContext) -> Self {
        Self::with_details(file_path, duration_ms, AudioDetails::default(), geo)
    }

    /// The file size is measured from disk now; a missing file yields 0.
    pub fn with_details(
        file_path: impl Into<PathBuf>,
        duration_ms: u64,
        details: AudioDetails,
        geo: GeoContext,
    ) -> Self {
        let file_path = file_path.into();
        let file_size_bytes = fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            payload: AudioPayload {
                duration_ms,
                format: details.format,
                sample_rate: details.sample_rate,
                channels: details.channels,
                file_size_bytes,
                latitude: geo.latitude,
                longitude: geo.longitude,
                recording_context: details.recording_context,
            },
            file_path,
        }
    }

    /// Rebuild a recording from a decrypted listing entry. The file path is
    /// the stored one, i.e. the encrypted file.
    pub fn from_stored(stored: &StoredRecord) -> Result<Self, VaultError> {
        if stored.kind != AUDIO_KIND {
            return Err(VaultError::InvalidInput(format!(
                "expected an {} record, got {}",
                AUDIO_KIND, stored.kind
            )));
        }
        let file_path = stored
            .file_path
            .clone()
            .ok_or_else(|| VaultError::InvalidInput(format!("audio record {} has no file", stored.id)))?;
        let payload: AudioPayload = serde_json::from_value(serde_json::Value::Object(stored.payload.clone()))?;
        Ok(Self {
            id: stored.id.clone(),
            timestamp: stored.timestamp,
            file_path,
            payload,
        })
    }

    pub fn duration_ms(&self) -> u64 {
        self.payload.duration_ms
    }

    pub fn format(&self) -> &str {
        &self.payload.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.payload.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.payload.channels
    }

    pub fn file_size_bytes(&self) -> u64 {
        self.payload.file_size_bytes
    }

    pub fn recording_context(&self) -> &str {
        &self.payload.recording_context
    }

    fn context_label(&self) -> &'static str {
        match self.payload.recording_context.to_lowercase().as_str() {
            "voice_memo" => "Voice memo",
            "meeting" => "Meeting",
            "interview" => "Interview",
            "note" => "Audio note",
            _ => "Audio",
        }
    }
}

impl Record for AudioRecord {
    fn kind(&self) -> &str {
        AUDIO_KIND
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn to_json(&self) -> Payload {
        payload_of(&self.payload)
    }

    fn file_path(&self) -> Option<&Path> {
        Some(&self.file_path)
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn geo_context(&self) -> GeoContext {
        GeoContext::new(self.payload.latitude, self.payload.longitude)
    }

    fn display_name(&self) -> &str {
        "Audio Recording"
    }

    fn display_summary(&self) -> String {
        format!(
            "{} recording ({:.1}s, {})",
            self.context_label(),
            self.payload.duration_ms as f64 / 1000.0,
            format_file_size(self.payload.file_size_bytes)
        )
    }

    fn requires_file(&self) -> bool {
        true
    }
}

/// Human-readable size, 1024 based: `512B`, `4.9KB`, `2.0MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::envelope::{CloudStatus, EntrySource};

    #[test]
    fn measures_file_size_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.m4a");
        fs::write(&path, vec![7u8; 5000]).unwrap();

        let record = AudioRecord::new(&path, 12_000, GeoContext::NONE);
        assert_eq!(record.file_size_bytes(), 5000);
        assert_eq!(record.display_summary(), "Voice memo recording (12.0s, 4.9KB)");
        assert!(record.requires_file());
        assert_eq!(record.file_path(), Some(path.as_path()));
    }

    #[test]
    fn missing_file_has_zero_size() {
        let record = AudioRecord::new("/nonexistent/clip.aac", 1500, GeoContext::NONE);
        assert_eq!(record.file_size_bytes(), 0);
        assert_eq!(record.display_summary(), "Voice memo recording (1.5s, 0B)");
    }

    #[test]
    fn context_labels() {
        let details = AudioDetails {
            recording_context: "Meeting".into(),
            ..Default::default()
        };
        let record = AudioRecord::with_details("/x.aac", 60_000, details, GeoContext::NONE);
        assert!(record.display_summary().starts_with("Meeting recording (60.0s"));

        let details = AudioDetails {
            recording_context: "podcast".into(),
            ..Default::default()
        };
        let record = AudioRecord::with_details("/x.aac", 0, details, GeoContext::NONE);
        assert!(record.display_summary().starts_with("Audio recording"));
    }

    #[test]
    fn payload_fields() {
        let record = AudioRecord::new("/x.aac", 12_000, GeoContext::new(1.5, 2.5));
        let json = record.to_json();
        assert_eq!(json["duration_ms"], 12_000);
        assert_eq!(json["format"], "aac");
        assert_eq!(json["sample_rate"], 44100);
        assert_eq!(json["channels"], 1);
        assert_eq!(json["recording_context"], "voice_memo");
        assert_eq!(json["latitude"], 1.5);
        assert_eq!(record.geo_context(), GeoContext::new(1.5, 2.5));
    }

    #[test]
    fn round_trips_through_stored_record() {
        let record = AudioRecord::new("/clips/a.aac.enc", 3_000, GeoContext::new(-1.0, 1.0));
        let stored = StoredRecord {
            id: record.id().to_string(),
            kind: AUDIO_KIND.into(),
            timestamp: record.timestamp(),
            display_name: record.display_name().into(),
            file_path: Some(PathBuf::from("/clips/a.aac.enc")),
            cloud_status: CloudStatus::Local,
            source: EntrySource::GenericLog,
            encrypted: true,
            payload: record.to_json(),
        };
        let restored = AudioRecord::from_stored(&stored).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(512), "512B");
        assert_eq!(format_file_size(5000), "4.9KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2.0MB");
    }
}
