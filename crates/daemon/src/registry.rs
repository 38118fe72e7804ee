//! Static description of every controllable line, grouped by causal relation.

use std::collections::HashMap;

use domotica_types::{is_valid_pin, CallConfig, ConfigError, PinConfig, PinKind, ServerConfig};

/// One configured line
#[derive(Debug, Clone, PartialEq)]
pub struct PinDescriptor {
    pub pin: u8,
    pub kind: PinKind,
    /// True if logical "on" is electrically high
    pub active_high: bool,
    pub description: String,
}

impl From<&PinConfig> for PinDescriptor {
    fn from(config: &PinConfig) -> Self {
        Self {
            pin: config.pin,
            kind: config.kind,
            active_high: config.active_high,
            description: config.description.clone(),
        }
    }
}

/// External action attached to a port group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallEntry {
    pub action: Option<String>,
    pub on_falling: bool,
    pub on_rising: bool,
}

impl From<&CallConfig> for CallEntry {
    fn from(config: &CallConfig) -> Self {
        Self {
            action: config.action.clone(),
            on_falling: config.on_falling,
            on_rising: config.on_rising,
        }
    }
}

/// A triggering input (first element, optional) and the outputs it affects
#[derive(Debug, Clone, PartialEq)]
pub struct PortGroup {
    pub index: usize,
    pub pins: Vec<PinDescriptor>,
    pub call: CallEntry,
}

impl PortGroup {
    pub fn trigger(&self) -> Option<&PinDescriptor> {
        self.pins.first().filter(|p| p.kind.is_trigger())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &PinDescriptor> {
        self.pins.iter().filter(|p| p.kind.is_output())
    }
}

/// Read-only after construction, so it is shared without locking.
#[derive(Debug, Clone)]
pub struct Registry {
    groups: Vec<PortGroup>,
    /// pin -> (group, position)
    index: HashMap<u8, (usize, usize)>,
}

impl Registry {
    /// Build the registry from a configuration, validating it first.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut groups = Vec::with_capacity(config.groups.len());
        let mut index = HashMap::new();
        for (g, group) in config.groups.iter().enumerate() {
            let pins: Vec<PinDescriptor> = group.pins.iter().map(PinDescriptor::from).collect();
            for (p, descriptor) in pins.iter().enumerate() {
                index.insert(descriptor.pin, (g, p));
            }
            groups.push(PortGroup {
                index: g,
                pins,
                call: group.call.as_ref().map(CallEntry::from).unwrap_or_default(),
            });
        }

        Ok(Self { groups, index })
    }

    /// Look up a pin. Out-of-range and unknown numbers yield `None`.
    pub fn find(&self, pin: i64) -> Option<&PinDescriptor> {
        if !is_valid_pin(pin) {
            return None;
        }
        let (g, p) = self.index.get(&(pin as u8))?;
        self.groups.get(*g).and_then(|group| group.pins.get(*p))
    }

    /// Pin numbers of the given kind, in configuration order.
    pub fn list_outputs(&self, kind: PinKind) -> Vec<u8> {
        self.pins()
            .filter(|p| p.kind == kind)
            .map(|p| p.pin)
            .collect()
    }

    pub fn groups(&self) -> &[PortGroup] {
        &self.groups
    }

    /// Every descriptor in configuration order.
    pub fn pins(&self) -> impl Iterator<Item = &PinDescriptor> {
        self.groups.iter().flat_map(|g| g.pins.iter())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &PinDescriptor> {
        self.pins().filter(|p| p.kind.is_output())
    }
}
