pub mod config;
pub mod coordinator;
pub mod error;
pub mod event_log;
pub mod maps;
pub mod plot;
pub mod quantize;
pub mod sink;
pub mod sweep;
pub mod types;

#[cfg(feature = "device")]
pub mod device;

pub use error::{Error, Result};
