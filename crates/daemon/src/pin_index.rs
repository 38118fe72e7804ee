//! Report of used and free BCM lines for a configuration.

use std::collections::BTreeMap;
use std::fmt;

use domotica_types::{PinKind, ServerConfig};

/// Lines free for general use on every board revision
pub const NORMAL: &[u8] = &[4, 13, 16, 17, 22, 23, 24, 25, 27];
/// Lines only present on the 40-pin header
pub const EXTENDED: &[u8] = &[5, 6, 12, 19, 20, 21, 26];
/// Lines shared with I2C, SPI, UART or the ID EEPROM
pub const SPECIAL: &[u8] = &[0, 1, 2, 3, 7, 8, 9, 10, 11, 14, 15, 18];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Normal,
    Extended,
    Special,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Normal, Category::Extended, Category::Special];

    pub fn lines(self) -> &'static [u8] {
        match self {
            Category::Normal => NORMAL,
            Category::Extended => EXTENDED,
            Category::Special => SPECIAL,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Normal => "normal",
            Category::Extended => "extended",
            Category::Special => "special",
        })
    }
}

/// Which lines of each category the configuration occupies.
#[derive(Debug, Clone)]
pub struct PinIndex {
    used: BTreeMap<u8, (PinKind, String)>,
}

impl PinIndex {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            used: config
                .pins()
                .map(|p| (p.pin, (p.kind, p.description.clone())))
                .collect(),
        }
    }

    pub fn used(&self, category: Category) -> Vec<u8> {
        category
            .lines()
            .iter()
            .copied()
            .filter(|pin| self.used.contains_key(pin))
            .collect()
    }

    pub fn free(&self, category: Category) -> Vec<u8> {
        category
            .lines()
            .iter()
            .copied()
            .filter(|pin| !self.used.contains_key(pin))
            .collect()
    }
}

fn join(pins: &[u8]) -> String {
    if pins.is_empty() {
        return "-".to_string();
    }
    pins.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for PinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for category in Category::ALL {
            writeln!(f, "{} lines", category)?;
            writeln!(f, "  used: {}", join(&self.used(category)))?;
            writeln!(f, "  free: {}", join(&self.free(category)))?;
        }
        writeln!(f, "assignments")?;
        for (pin, (kind, description)) in &self.used {
            writeln!(f, "  GPIO{:<2} {:<8} {}", pin, kind, description)?;
        }
        Ok(())
    }
}
