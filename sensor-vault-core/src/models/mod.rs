pub mod audio;
pub mod config;
pub mod envelope;
pub mod error;
pub mod geo;
pub mod location;
pub mod receipt;
pub mod registry;
pub mod state;
