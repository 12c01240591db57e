pub mod connection;
pub mod error;
pub mod log_sink;
pub mod random_message;
pub mod settings;
pub mod signaling;
pub mod text_store;
