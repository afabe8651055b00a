pub mod capture_delegate;
pub mod capture_session;
pub mod encryptor;
pub mod key_store;
pub mod record;
pub mod side_effect;
