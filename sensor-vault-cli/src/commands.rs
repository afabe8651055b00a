use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use serde::Serialize;

use sensor_vault_core::{
    decode_stored, AudioDetails, AudioRecord, CaptureOrchestrator, CloudStatus, GeoContext,
    LocationRecord, Record, StoredRecord, VaultConfiguration,
};

use crate::console::ConsoleDelegate;
use crate::{Cli, Command, SessionCommand};

/// One listed record, printed as JSON with `--json`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRow {
    pub id: String,
    pub kind: String,
    pub created_at: String,
    pub display_name: String,
    pub summary: String,
    pub encrypted: bool,
    pub cloud_status: String,
    pub file_path: Option<String>,
}

impl RecordRow {
    fn from_stored(stored: &StoredRecord) -> Self {
        let summary = match decode_stored(stored) {
            Ok(Some(record)) => record.display_summary(),
            Ok(None) => String::new(),
            Err(e) => {
                log::warn!("record {} could not be decoded: {}", stored.id, e);
                String::new()
            }
        };
        Self {
            id: stored.id.clone(),
            kind: stored.kind.clone(),
            created_at: format_timestamp(stored.timestamp),
            display_name: stored.display_name.clone(),
            summary,
            encrypted: stored.encrypted,
            cloud_status: stored.cloud_status.to_string(),
            file_path: stored.file_path.as_ref().map(|p| p.display().to_string()),
        }
    }
}

fn data_dir(cli: &Cli) -> PathBuf {
    cli.data_dir.clone().unwrap_or_else(|| {
        dirs_next::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensor-vault")
    })
}

fn open_vault(cli: &Cli) -> Result<CaptureOrchestrator, String> {
    let mut config = VaultConfiguration::new(data_dir(cli));
    config.allow_legacy_fallback = !cli.no_legacy_fallback;

    let key_store = sensor_vault_keystore::platform_key_store();
    log::debug!("using key store: {}", key_store.description());
    let mut vault =
        CaptureOrchestrator::open(config, key_store.as_ref()).map_err(|e| e.to_string())?;
    vault.set_delegate(Arc::new(ConsoleDelegate));
    Ok(vault)
}

pub fn run(cli: Cli) -> Result<(), String> {
    let vault = open_vault(&cli)?;

    match cli.command {
        Command::CaptureLocation {
            lat,
            lon,
            accuracy,
            provider,
            speed,
            bearing,
            session,
        } => {
            let record =
                LocationRecord::with_motion(lat, lon, accuracy, provider.as_deref(), speed, bearing);
            capture(&vault, &record, session.as_deref())
        }
        Command::CaptureAudio {
            file,
            duration_ms,
            format,
            sample_rate,
            channels,
            context,
            lat,
            lon,
            session,
        } => {
            let geo = match (lat, lon) {
                (Some(lat), Some(lon)) => GeoContext::new(lat, lon),
                _ => GeoContext::default(),
            };
            let details = AudioDetails {
                format,
                sample_rate,
                channels,
                recording_context: context,
            };
            let record = AudioRecord::with_details(file, duration_ms, details, geo);
            capture(&vault, &record, session.as_deref())
        }
        Command::List { kind, json } => list(&vault, &kind, json),
        Command::Export { id, dest } => export(&vault, &id, &dest),
        Command::Delete { id } => {
            let deleted = vault.delete(&id).map_err(|e| e.to_string())?;
            if deleted.file_removed {
                println!("deleted {} record {} and its file", deleted.kind, deleted.id);
            } else {
                println!("deleted {} record {}", deleted.kind, deleted.id);
            }
            Ok(())
        }
        Command::CloudStatus { id, status } => {
            let status: CloudStatus = status.parse()?;
            vault
                .update_cloud_status(&id, status)
                .map_err(|e| e.to_string())?;
            println!("{} is now {}", id, status);
            Ok(())
        }
        Command::Orphans { dir } => {
            let orphans = vault.find_orphaned_files(&dir).map_err(|e| e.to_string())?;
            if orphans.is_empty() {
                println!("no orphaned files in {}", dir.display());
            }
            for path in orphans {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::Session { command } => session(&vault, command),
    }
}

fn capture(vault: &CaptureOrchestrator, record: &dyn Record, session: Option<&str>) -> Result<(), String> {
    if let Some(id) = session {
        vault.resume_session(id).map_err(|e| e.to_string())?;
    }
    let receipt = vault.capture(record).map_err(|e| match e.orphaned_file() {
        Some(path) => format!("{} (encrypted file left at {})", e, path.display()),
        None => e.to_string(),
    })?;
    if let Some(checksum) = &receipt.file_checksum {
        println!("sha256 {}", checksum);
    }
    Ok(())
}

fn list(vault: &CaptureOrchestrator, kind: &str, json: bool) -> Result<(), String> {
    let listing = vault.list_by_type(kind).map_err(|e| e.to_string())?;
    let rows: Vec<RecordRow> = listing.records.iter().map(RecordRow::from_stored).collect();

    if json {
        let text = serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?;
        println!("{}", text);
    } else {
        for row in &rows {
            let marker = if row.encrypted { ' ' } else { '!' };
            println!(
                "{}{}  {}  {:<8} {}",
                marker, row.created_at, row.id, row.cloud_status, row.summary
            );
        }
        println!("{} {} record(s)", rows.len(), kind);
    }

    if listing.skipped > 0 {
        eprintln!("warning: {} corrupt log line(s) skipped", listing.skipped);
    }
    if listing.undecryptable > 0 {
        eprintln!("warning: {} record(s) could not be decrypted", listing.undecryptable);
    }
    Ok(())
}

fn export(vault: &CaptureOrchestrator, id: &str, dest: &Path) -> Result<(), String> {
    let playback = vault.open_playback(id).map_err(|e| e.to_string())?;
    let bytes = fs::copy(playback.path(), dest)
        .map_err(|e| format!("failed to copy to {}: {}", dest.display(), e))?;
    playback.release().map_err(|e| e.to_string())?;
    println!("exported {} ({} bytes) to {}", id, bytes, dest.display());
    Ok(())
}

fn session(vault: &CaptureOrchestrator, command: SessionCommand) -> Result<(), String> {
    match command {
        SessionCommand::Begin { name } => {
            let id = vault.begin_session(&name).map_err(|e| e.to_string())?;
            println!("{}", id);
        }
        SessionCommand::End { id } => {
            vault.resume_session(&id).map_err(|e| e.to_string())?;
            vault.end_session().map_err(|e| e.to_string())?;
            println!("session {} ended", id);
        }
        SessionCommand::Items { id } => {
            for item in vault.session_items(&id).map_err(|e| e.to_string())? {
                println!("{}", item);
            }
        }
    }
    Ok(())
}

fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}
