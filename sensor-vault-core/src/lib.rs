//! # sensor-vault-core
//!
//! Platform-agnostic capture, encryption and persistence pipeline for
//! personal sensor records.
//!
//! Producers build a [`Record`] (a location fix, an audio clip, or any new
//! kind implementing the trait) and hand it to the [`CaptureOrchestrator`].
//! The orchestrator encrypts the associated file and the record metadata
//! with a hardware-backed AES-256-GCM key and writes the result to the
//! structured store or the per-kind encrypted log. Platform key stores
//! implement the [`KeyStore`] trait and live in `sensor-vault-keystore`.
//!
//! ## Architecture
//!
//! ```text
//! sensor-vault-core (this crate)
//! ├── traits/    ← Record, KeyStore, PayloadCipher, CaptureService, CaptureDelegate, SideEffectHook
//! ├── models/    ← VaultError, CaptureError, VaultConfiguration, LocationRecord, AudioRecord, envelopes
//! ├── crypto/    ← KeyManager (AES-256-GCM), EncryptionService (files + metadata)
//! ├── storage/   ← StructuredStore (SQLite), GenericLog (JSONL), RecordStore, secure file helpers
//! └── session/   ← CaptureOrchestrator
//! ```

pub mod crypto;
pub mod models;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use crypto::encryption_service::{EncryptionService, ENCRYPTED_SUFFIX, TEMP_SUFFIX};
pub use crypto::key_manager::{KeyManager, KeyMaterial};
pub use models::audio::{AudioDetails, AudioRecord, AUDIO_KIND};
pub use models::config::VaultConfiguration;
pub use models::envelope::{
    CloudStatus, DeletedEntry, EncryptedEnvelope, EntrySource, RecordListing, StoredRecord,
};
pub use models::error::{CaptureError, VaultError};
pub use models::geo::GeoContext;
pub use models::location::{LocationRecord, LOCATION_KIND};
pub use models::receipt::{CaptureFeedback, CaptureReceipt, StorageRoute};
pub use models::registry::decode_stored;
pub use models::state::CaptureStage;
pub use session::orchestrator::{CaptureOrchestrator, PlaybackGuard};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_session::CaptureService;
pub use traits::encryptor::PayloadCipher;
pub use traits::key_store::KeyStore;
pub use traits::record::{Payload, Record};
pub use traits::side_effect::SideEffectHook;
