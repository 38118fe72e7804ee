//! Pin-control daemon
//!
//! Serves the line-oriented pin-control protocol to one client at a time
//! and runs one edge monitor per port group with a triggering input.

pub mod action;
pub mod actuator;
pub mod codec;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod monitor;
pub mod pid_manager;
pub mod pin_index;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use actuator::{Actuator, PinError};
pub use error::StartupError;
pub use lifecycle::{Daemon, Lifecycle};
pub use registry::{CallEntry, PinDescriptor, PortGroup, Registry};
