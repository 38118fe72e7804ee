//! Configuration schema for the pin-control server

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pin::{is_valid_pin, PinKind, MAX_PIN, MIN_PIN};

/// Errors found while validating a configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("pin {0} is outside the valid range {MIN_PIN}..={MAX_PIN}")]
    PinOutOfRange(u8),
    #[error("pin {0} is configured more than once")]
    DuplicatePin(u8),
    #[error("group {0} has no pins")]
    EmptyGroup(usize),
    #[error("group {group} has more than one triggering input")]
    MultipleTriggers { group: usize },
    #[error("group {group}: triggering input {pin} must be the first pin of the group")]
    TriggerNotFirst { group: usize, pin: u8 },
    #[error("group {0} has a call entry but no triggering input")]
    CallWithoutTrigger(usize),
    #[error("invalid timing: {0}")]
    InvalidTiming(String),
}

/// A single line and what is wired to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinConfig {
    /// BCM line number
    pub pin: u8,
    pub kind: PinKind,
    /// True if logical "on" is electrically high
    #[serde(default = "default_active_high")]
    pub active_high: bool,
    #[serde(default)]
    pub description: String,
}

fn default_active_high() -> bool {
    true
}

/// External action fired by a group's triggering input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallConfig {
    /// Command line to run; `None` disables the action
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub on_falling: bool,
    #[serde(default)]
    pub on_rising: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            action: None,
            on_falling: false,
            on_rising: false,
        }
    }
}

/// Causally linked pins: an optional trigger followed by its outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub pins: Vec<PinConfig>,
    #[serde(default)]
    pub call: Option<CallConfig>,
}

impl GroupConfig {
    /// The triggering input, if this group has one.
    pub fn trigger(&self) -> Option<&PinConfig> {
        self.pins.first().filter(|p| p.kind.is_trigger())
    }
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Protocol version advertised to clients, "X.Y"
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    /// Pause between edge-monitor polling cycles
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    /// How long `pulsar` keeps an output on
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u64,
    #[serde(default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: f64,
    /// How long the lamp test keeps every output on
    #[serde(default = "default_test_ms")]
    pub test_ms: u64,
    #[serde(default = "default_pid_file")]
    pub pid_file: String,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4710
}
fn default_protocol_version() -> String {
    "1.1".to_string()
}
fn default_pause_ms() -> u64 {
    200
}
fn default_pulse_ms() -> u64 {
    2000
}
fn default_pwm_frequency_hz() -> f64 {
    60.0
}
fn default_test_ms() -> u64 {
    2000
}
fn default_pid_file() -> String {
    "/var/lock/domotica_server.lock".to_string()
}

fn pin(pin: u8, kind: PinKind, active_high: bool, description: &str) -> PinConfig {
    PinConfig {
        pin,
        kind,
        active_high,
        description: description.to_string(),
    }
}

impl Default for ServerConfig {
    /// The reference installation: three reset buttons with their relays and
    /// a mains-power probe that drives the router relay and raises an alert.
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            protocol_version: default_protocol_version(),
            pause_ms: default_pause_ms(),
            pulse_ms: default_pulse_ms(),
            pwm_frequency_hz: default_pwm_frequency_hz(),
            test_ms: default_test_ms(),
            pid_file: default_pid_file(),
            groups: vec![
                GroupConfig {
                    pins: vec![
                        pin(22, PinKind::Button, true, "Botón reinicio router"),
                        pin(4, PinKind::Relay, false, "Relé reinicio router"),
                    ],
                    call: None,
                },
                GroupConfig {
                    pins: vec![
                        pin(24, PinKind::Button, true, "Botón reinicio switch"),
                        pin(23, PinKind::Relay, false, "Relé reinicio switch"),
                    ],
                    call: None,
                },
                GroupConfig {
                    pins: vec![
                        pin(17, PinKind::Button, true, "Botón reinicio cámara"),
                        pin(27, PinKind::Relay, false, "Relé reinicio cámara"),
                    ],
                    call: None,
                },
                GroupConfig {
                    pins: vec![
                        pin(14, PinKind::Probe, true, "Indicador electricidad"),
                        pin(15, PinKind::Relay, false, "Relé activación router"),
                    ],
                    call: Some(CallConfig {
                        action: Some("aviso_electricidad".to_string()),
                        on_falling: false,
                        on_rising: true,
                    }),
                },
            ],
        }
    }
}

impl ServerConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }

    pub fn test_duration(&self) -> Duration {
        Duration::from_millis(self.test_ms)
    }

    /// All configured pins in configuration order.
    pub fn pins(&self) -> impl Iterator<Item = &PinConfig> {
        self.groups.iter().flat_map(|g| g.pins.iter())
    }

    /// Check the structural invariants of the pin layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pause_ms == 0 {
            return Err(ConfigError::InvalidTiming("pause_ms must be greater than zero".into()));
        }
        if !(self.pwm_frequency_hz > 0.0) {
            return Err(ConfigError::InvalidTiming(
                "pwm_frequency_hz must be greater than zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for (index, group) in self.groups.iter().enumerate() {
            if group.pins.is_empty() {
                return Err(ConfigError::EmptyGroup(index));
            }

            let triggers: Vec<&PinConfig> =
                group.pins.iter().filter(|p| p.kind.is_trigger()).collect();
            if triggers.len() > 1 {
                return Err(ConfigError::MultipleTriggers { group: index });
            }
            if let Some(trigger) = triggers.first() {
                if group.pins[0].pin != trigger.pin {
                    return Err(ConfigError::TriggerNotFirst {
                        group: index,
                        pin: trigger.pin,
                    });
                }
            } else if group.call.is_some() {
                return Err(ConfigError::CallWithoutTrigger(index));
            }

            for p in &group.pins {
                if !is_valid_pin(p.pin as i64) {
                    return Err(ConfigError::PinOutOfRange(p.pin));
                }
                if !seen.insert(p.pin) {
                    return Err(ConfigError::DuplicatePin(p.pin));
                }
            }
        }
        Ok(())
    }
}
