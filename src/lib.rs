//! DSMR smart meter simulator
//!
//! Writes a DSMR P1 telegram to a serial port at a fixed interval so meter
//! reading software can be tested without a meter attached.

pub mod config;
pub mod channel;
pub mod emitter;
pub mod obis_utils;
pub mod telegram;

// Re-export common types for easier access
pub use config::{Config, ConfigError};
pub use channel::{open_channel, Channel};
pub use emitter::{CurrentSource, Emitter, EmitterError};
pub use telegram::{Template, TemplateError};
