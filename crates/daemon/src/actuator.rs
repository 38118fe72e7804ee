//! Polarity-aware operations on output lines.
//!
//! Every write goes through one mutex, so mutations of a given pin are
//! totally ordered no matter whether they come from a session or a monitor.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use domotica_gpio::{GpioBackend, OutputLine, PwmLine};
use domotica_types::Level;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::{PinDescriptor, Registry};

#[derive(Error, Debug)]
pub enum PinError {
    #[error("pin {0} not found")]
    NotFound(i64),
    #[error("pin {0} is not an output")]
    NotAnOutput(u8),
    #[error("GPIO{pin}: {source}")]
    Gpio {
        pin: u8,
        #[source]
        source: io::Error,
    },
}

/// Hardware handle of an output; PWM kinds own a duty-cycle controller.
enum OutputHandle {
    Digital(Box<dyn OutputLine>),
    Pwm(Box<dyn PwmLine>),
}

struct Output {
    active_high: bool,
    handle: OutputHandle,
}

impl Output {
    fn claim(
        descriptor: &PinDescriptor,
        backend: &dyn GpioBackend,
        pwm_frequency_hz: f64,
    ) -> Result<Self, PinError> {
        let pin = descriptor.pin;
        let handle = if descriptor.kind.is_pwm() {
            let duty = duty_for(false, descriptor.active_high);
            OutputHandle::Pwm(
                backend
                    .pwm(pin, pwm_frequency_hz, duty)
                    .map_err(|source| PinError::Gpio { pin, source })?,
            )
        } else {
            let initial = Level::for_logical(false, descriptor.active_high);
            OutputHandle::Digital(
                backend
                    .output(pin, initial)
                    .map_err(|source| PinError::Gpio { pin, source })?,
            )
        };
        Ok(Self {
            active_high: descriptor.active_high,
            handle,
        })
    }

    fn is_active(&self) -> bool {
        match &self.handle {
            OutputHandle::Digital(line) => line.level().is_active(self.active_high),
            OutputHandle::Pwm(line) => {
                let logical = if self.active_high {
                    line.duty_cycle()
                } else {
                    1.0 - line.duty_cycle()
                };
                logical > 0.0
            }
        }
    }

    fn set(&mut self, active: bool) -> io::Result<()> {
        match &mut self.handle {
            OutputHandle::Digital(line) => line.write(Level::for_logical(active, self.active_high)),
            OutputHandle::Pwm(line) => line.set_duty_cycle(duty_for(active, self.active_high)),
        }
    }
}

fn duty_for(active: bool, active_high: bool) -> f64 {
    if active == active_high {
        1.0
    } else {
        0.0
    }
}

/// Owns every output line and the lock that guards them.
pub struct Actuator {
    registry: Arc<Registry>,
    outputs: Mutex<HashMap<u8, Output>>,
    pulse: Duration,
}

impl Actuator {
    /// Claim every output of the registry, driving each to its "off" state.
    pub fn new(
        registry: Arc<Registry>,
        backend: &dyn GpioBackend,
        pwm_frequency_hz: f64,
        pulse: Duration,
    ) -> Result<Self, PinError> {
        let mut outputs = HashMap::new();
        for descriptor in registry.outputs() {
            debug!(pin = descriptor.pin, kind = %descriptor.kind, "Claiming output");
            outputs.insert(
                descriptor.pin,
                Output::claim(descriptor, backend, pwm_frequency_hz)?,
            );
        }
        info!(count = outputs.len(), "Outputs configured");

        Ok(Self {
            registry,
            outputs: Mutex::new(outputs),
            pulse,
        })
    }

    fn bank(&self) -> MutexGuard<'_, HashMap<u8, Output>> {
        // Outputs stay consistent even if a holder panicked mid-write
        self.outputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, pin: i64) -> Result<&PinDescriptor, PinError> {
        let descriptor = self.registry.find(pin).ok_or(PinError::NotFound(pin))?;
        if descriptor.kind.is_output() {
            Ok(descriptor)
        } else {
            Err(PinError::NotAnOutput(descriptor.pin))
        }
    }

    fn with_output<R>(
        &self,
        pin: i64,
        f: impl FnOnce(&mut Output) -> io::Result<R>,
    ) -> Result<R, PinError> {
        let descriptor = self.resolve(pin)?;
        let mut bank = self.bank();
        let output = bank
            .get_mut(&descriptor.pin)
            .ok_or(PinError::NotFound(pin))?;
        f(output).map_err(|source| PinError::Gpio {
            pin: descriptor.pin,
            source,
        })
    }

    pub fn turn_on(&self, pin: i64) -> Result<(), PinError> {
        self.with_output(pin, |output| output.set(true))
    }

    pub fn turn_off(&self, pin: i64) -> Result<(), PinError> {
        self.with_output(pin, |output| output.set(false))
    }

    /// Invert the logical state; read and write happen under one lock hold.
    pub fn toggle(&self, pin: i64) -> Result<(), PinError> {
        self.with_output(pin, |output| {
            let next = !output.is_active();
            output.set(next)
        })
    }

    /// On, wait the pulse duration, off.
    ///
    /// The lock is released while waiting, so another writer may touch the
    /// pin in between; the pulse always ends with the pin off.
    pub async fn pulse(&self, pin: i64) -> Result<(), PinError> {
        self.resolve(pin)?;
        let on = self.turn_on(pin);
        tokio::time::sleep(self.pulse).await;
        let off = self.turn_off(pin);
        on.and(off)
    }

    /// Logical state of an output (true = on).
    pub fn read_state(&self, pin: i64) -> Result<bool, PinError> {
        self.with_output(pin, |output| Ok(output.is_active()))
    }

    /// Label of any configured pin, inputs included.
    pub fn describe(&self, pin: i64) -> Result<&str, PinError> {
        self.registry
            .find(pin)
            .map(|d| d.description.as_str())
            .ok_or(PinError::NotFound(pin))
    }

    /// Drive every output to the same logical state, logging failures.
    pub fn set_all(&self, active: bool) {
        let mut bank = self.bank();
        for (pin, output) in bank.iter_mut() {
            if let Err(e) = output.set(active) {
                warn!(pin = *pin, "Failed to switch output: {}", e);
            }
        }
    }
}
