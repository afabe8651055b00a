pub mod encryption_service;
pub mod key_manager;
