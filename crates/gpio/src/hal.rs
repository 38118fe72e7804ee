use std::io;

use domotica_types::Level;

/// A line configured as a binary output (object-safe)
pub trait OutputLine: Send + 'static {
    /// Drive the line to the given electrical level
    fn write(&mut self, level: Level) -> Result<(), io::Error>;

    /// Level the line is currently driven to
    fn level(&self) -> Level;
}

/// A line configured as an input
pub trait InputLine: Send + 'static {
    /// Sample the electrical level. Never blocks.
    fn level(&self) -> Level;
}

/// A line driven by a duty cycle
pub trait PwmLine: Send + 'static {
    /// Set the duty cycle, from 0.0 (always low) to 1.0 (always high)
    fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<(), io::Error>;

    /// Duty cycle currently applied
    fn duty_cycle(&self) -> f64;
}

/// Bias resistor applied to an input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Down,
    Up,
    Off,
}

impl Pull {
    /// Bias that keeps an idle input in its inactive state.
    pub fn idle_for(active_high: bool) -> Self {
        if active_high {
            Pull::Down
        } else {
            Pull::Up
        }
    }
}

/// Hands out exclusive line handles
///
/// Each line can be claimed once; claiming a line that is already in use
/// fails with `io::ErrorKind::AlreadyExists`. Dropping a handle releases the line.
pub trait GpioBackend: Send + Sync + 'static {
    /// Claim `pin` as an output, driven to `initial` right away
    fn output(&self, pin: u8, initial: Level) -> Result<Box<dyn OutputLine>, io::Error>;

    /// Claim `pin` as an input with the given bias
    fn input(&self, pin: u8, pull: Pull) -> Result<Box<dyn InputLine>, io::Error>;

    /// Claim `pin` as a PWM output at `frequency_hz`, starting at `duty_cycle`
    fn pwm(
        &self,
        pin: u8,
        frequency_hz: f64,
        duty_cycle: f64,
    ) -> Result<Box<dyn PwmLine>, io::Error>;
}
