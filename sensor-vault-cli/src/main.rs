//! sensor-vault command-line front end.

mod commands;
mod console;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sensor-vault", version, about = "Encrypted capture of location fixes and audio recordings")]
pub struct Cli {
    /// Vault data directory (defaults to the platform data directory)
    #[arg(long, global = true, env = "SENSOR_VAULT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Fail captures instead of storing them unencrypted when the store is unavailable
    #[arg(long, global = true)]
    pub no_legacy_fallback: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Capture a location fix
    CaptureLocation {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Horizontal accuracy in meters
        #[arg(long, default_value_t = 0.0)]
        accuracy: f64,
        #[arg(long)]
        provider: Option<String>,
        /// Speed in m/s
        #[arg(long, default_value_t = 0.0)]
        speed: f64,
        /// Bearing in degrees
        #[arg(long, default_value_t = 0.0)]
        bearing: f64,
        /// Link the capture to an open session
        #[arg(long)]
        session: Option<String>,
    },

    /// Encrypt and capture a finished audio recording
    CaptureAudio {
        /// Recording file; replaced by its encrypted copy
        file: PathBuf,
        #[arg(long)]
        duration_ms: u64,
        #[arg(long, default_value = "aac")]
        format: String,
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
        #[arg(long, default_value_t = 1)]
        channels: u16,
        /// voice_memo, meeting, interview or note
        #[arg(long, default_value = "voice_memo")]
        context: String,
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
        #[arg(long)]
        session: Option<String>,
    },

    /// List decrypted records of one kind, newest first
    List {
        kind: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Decrypt a record's file and copy it to DEST
    Export { id: String, dest: PathBuf },

    /// Delete a record and securely delete its file
    Delete { id: String },

    /// Set the backup state of a structured record (local, queued, synced)
    CloudStatus { id: String, status: String },

    /// List encrypted files in DIR that no record references
    Orphans { dir: PathBuf },

    /// Manage capture sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Start a session and print its id
    Begin { name: String },
    /// End an open session
    End { id: String },
    /// List record ids linked to a session
    Items { id: String },
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "sensor-vault",
            "capture-location",
            "--lat",
            "-37.8136",
            "--lon",
            "144.9631",
            "--accuracy",
            "10",
            "--provider",
            "gps",
        ])
        .unwrap();
        match cli.command {
            Command::CaptureLocation { lat, provider, .. } => {
                assert_eq!(lat, -37.8136);
                assert_eq!(provider.as_deref(), Some("gps"));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn audio_coordinates_come_in_pairs() {
        let result = Cli::try_parse_from([
            "sensor-vault",
            "capture-audio",
            "memo.aac",
            "--duration-ms",
            "1000",
            "--lat",
            "1.0",
        ]);
        assert!(result.is_err());
    }
}
