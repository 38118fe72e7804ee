//! Shared types for the domotica pin-control system
//!
//! This crate holds the plain data shared by the GPIO layer and the daemon:
//! pin kinds, electrical levels and the configuration schema.

pub mod config;
pub mod pin;

// Re-export commonly used types
pub use config::*;
pub use pin::*;
