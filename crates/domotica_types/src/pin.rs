//! Pin kinds and electrical levels

use std::fmt;
use std::ops::Not;

use serde::{Deserialize, Serialize};

/// Lowest BCM line number a descriptor may use.
pub const MIN_PIN: u8 = 1;
/// Highest BCM line number a descriptor may use (Raspberry Pi header).
pub const MAX_PIN: u8 = 27;

/// Returns true if `pin` is an addressable line on the target board.
pub fn is_valid_pin(pin: i64) -> bool {
    pin >= MIN_PIN as i64 && pin <= MAX_PIN as i64
}

/// What is wired to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinKind {
    Relay,
    Led,
    LedPwm,
    Fan,
    FanPwm,
    /// Monostable input, acts on press only
    Button,
    /// Bistable input, acts on both transitions
    Probe,
}

impl PinKind {
    /// Inputs that can start a port group.
    pub fn is_trigger(self) -> bool {
        matches!(self, PinKind::Button | PinKind::Probe)
    }

    pub fn is_output(self) -> bool {
        !self.is_trigger()
    }

    /// Kinds driven by a duty cycle instead of a binary level.
    pub fn is_pwm(self) -> bool {
        matches!(self, PinKind::LedPwm | PinKind::FanPwm)
    }
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinKind::Relay => "relay",
            PinKind::Led => "led",
            PinKind::LedPwm => "led_pwm",
            PinKind::Fan => "fan",
            PinKind::FanPwm => "fan_pwm",
            PinKind::Button => "button",
            PinKind::Probe => "probe",
        };
        f.pad(name)
    }
}

/// Electrical level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Electrical level that represents logical `active` for the given polarity.
    pub fn for_logical(active: bool, active_high: bool) -> Self {
        if active == active_high {
            Level::High
        } else {
            Level::Low
        }
    }

    /// Logical state this level represents for the given polarity.
    pub fn is_active(self, active_high: bool) -> bool {
        (self == Level::High) == active_high
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Classified transition of an input's logical level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}
