//! Fatal startup failures and the process exit status each one maps to.

use domotica_types::ConfigError;
use nix::errno::Errno;
use thiserror::Error;

use crate::actuator::PinError;
use crate::config::ConfigLoadError;
use crate::pid_manager::LockError;
use crate::protocol::VersionParseError;
use crate::server::ServerError;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Load(#[from] ConfigLoadError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Version(#[from] VersionParseError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("failed to claim GPIO lines: {0}")]
    Gpio(#[from] PinError),
}

impl StartupError {
    /// Each startup failure class exits with its own errno value.
    pub fn errno(&self) -> Errno {
        match self {
            StartupError::Load(ConfigLoadError::NotFound(_)) => Errno::ENOENT,
            StartupError::Load(ConfigLoadError::Io { .. }) => Errno::EIO,
            StartupError::Load(_) | StartupError::Config(_) | StartupError::Version(_) => {
                Errno::EINVAL
            }
            StartupError::Lock(LockError::AlreadyRunning { .. }) => Errno::EEXIST,
            StartupError::Lock(LockError::Io { .. }) => Errno::EACCES,
            StartupError::Server(ServerError::AddrInUse { .. }) => Errno::EADDRINUSE,
            StartupError::Server(_) => Errno::EADDRNOTAVAIL,
            StartupError::Gpio(_) => Errno::EBUSY,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.errno() as i32
    }
}
