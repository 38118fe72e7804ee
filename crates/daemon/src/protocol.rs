//! Wire grammar of the pin-control protocol.
//!
//! One command per line, tokens case-insensitive. Every command except
//! `desconectar` gets exactly one reply line of the form `ok: ...`,
//! `info: ...` or `err: ...`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Longest command line accepted, in bytes
pub const MAX_COMMAND_LEN: usize = 1024;

pub const EXECUTED: &str = "ejecutado";
pub const ERR_BAD_PIN: &str = "no ejecutado, puerto incorrecto o no encontrado";
pub const ERR_BAD_COMMAND: &str = "no ejecutado, comando incorrecto";
pub const ERR_UNSUPPORTED: &str = "incorrecto o no implementado";

/// Protocol version, compared numerically as (major, minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    pub const V1_0: ProtocolVersion = ProtocolVersion::new(1, 0);
    pub const V1_1: ProtocolVersion = ProtocolVersion::new(1, 1);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        ProtocolVersion::V1_1
    }
}

impl Ord for ProtocolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl PartialOrd for ProtocolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid protocol version '{0}'")]
pub struct VersionParseError(pub String);

impl FromStr for ProtocolVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError(s.to_string());
        let s = s.trim();
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s, "0"),
        };
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(major) || !digits(minor) {
            return Err(err());
        }
        Ok(Self {
            major: major.parse().map_err(|_| err())?,
            minor: minor.parse().map_err(|_| err())?,
        })
    }
}

/// Verbs known to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Hola,
    Listar,
    Conmutar,
    Encender,
    Apagar,
    Pulsar,
    Estado,
    Describir,
    Desconectar,
}

struct VerbEntry {
    verb: Verb,
    name: &'static str,
    takes_param: bool,
    /// First protocol version that offers the verb
    since: ProtocolVersion,
}

const COMMANDS: &[VerbEntry] = &[
    VerbEntry { verb: Verb::Hola, name: "hola", takes_param: true, since: ProtocolVersion::V1_0 },
    VerbEntry { verb: Verb::Listar, name: "listar", takes_param: false, since: ProtocolVersion::V1_0 },
    VerbEntry { verb: Verb::Conmutar, name: "conmutar", takes_param: true, since: ProtocolVersion::V1_0 },
    VerbEntry { verb: Verb::Encender, name: "encender", takes_param: true, since: ProtocolVersion::V1_0 },
    VerbEntry { verb: Verb::Apagar, name: "apagar", takes_param: true, since: ProtocolVersion::V1_0 },
    VerbEntry { verb: Verb::Pulsar, name: "pulsar", takes_param: true, since: ProtocolVersion::V1_0 },
    VerbEntry { verb: Verb::Estado, name: "estado", takes_param: true, since: ProtocolVersion::V1_0 },
    VerbEntry { verb: Verb::Describir, name: "describir", takes_param: true, since: ProtocolVersion::V1_1 },
    VerbEntry { verb: Verb::Desconectar, name: "desconectar", takes_param: false, since: ProtocolVersion::V1_0 },
];

/// A well-formed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Handshake(ProtocolVersion),
    List,
    Toggle(i64),
    TurnOn(i64),
    TurnOff(i64),
    Pulse(i64),
    State(i64),
    Describe(i64),
    Disconnect,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("malformed command '{0}'")]
    Malformed(String),
    #[error("'{0}' is not a pin number")]
    InvalidPin(String),
    #[error("'{verb}' needs protocol {since}")]
    Unsupported {
        verb: &'static str,
        since: ProtocolVersion,
    },
}

/// Parse one command line. `negotiated` gates verbs newer than the session.
pub fn parse(line: &str, negotiated: ProtocolVersion) -> Result<Command, ProtocolError> {
    let line = line.trim().to_lowercase();
    let mut tokens = line.split_whitespace();
    let word = tokens.next().unwrap_or_default();
    let params: Vec<&str> = tokens.collect();

    let entry = COMMANDS
        .iter()
        .find(|entry| entry.name == word)
        .ok_or_else(|| ProtocolError::Unknown(line.clone()))?;

    if entry.since > negotiated {
        return Err(ProtocolError::Unsupported {
            verb: entry.name,
            since: entry.since,
        });
    }

    let param = match (entry.takes_param, params.as_slice()) {
        (true, [param]) => Some(*param),
        (false, []) => None,
        _ => return Err(ProtocolError::Malformed(line.clone())),
    };

    let pin = || -> Result<i64, ProtocolError> {
        let raw = param.unwrap_or_default();
        raw.parse::<i64>()
            .map_err(|_| ProtocolError::InvalidPin(raw.to_string()))
    };

    Ok(match entry.verb {
        Verb::Hola => Command::Handshake(
            param
                .unwrap_or_default()
                .parse()
                .map_err(|_| ProtocolError::Malformed(line.clone()))?,
        ),
        Verb::Listar => Command::List,
        Verb::Conmutar => Command::Toggle(pin()?),
        Verb::Encender => Command::TurnOn(pin()?),
        Verb::Apagar => Command::TurnOff(pin()?),
        Verb::Pulsar => Command::Pulse(pin()?),
        Verb::Estado => Command::State(pin()?),
        Verb::Describir => Command::Describe(pin()?),
        Verb::Desconectar => Command::Disconnect,
    })
}

/// One reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(String),
    Info(String),
    Err(&'static str),
}

impl Response {
    pub fn executed() -> Self {
        Response::Ok(EXECUTED.to_string())
    }

    pub fn bad_pin() -> Self {
        Response::Err(ERR_BAD_PIN)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok(text) => write!(f, "ok: {}", text),
            Response::Info(text) => write!(f, "info: {}", text),
            Response::Err(text) => write!(f, "err: {}", text),
        }
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Unknown(_) | ProtocolError::Malformed(_) => {
                Response::Err(ERR_BAD_COMMAND)
            }
            ProtocolError::InvalidPin(_) => Response::Err(ERR_BAD_PIN),
            ProtocolError::Unsupported { .. } => Response::Err(ERR_UNSUPPORTED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V: ProtocolVersion = ProtocolVersion::V1_1;

    #[test]
    fn test_version_parse_and_order() {
        assert_eq!("1.1".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V1_1));
        assert_eq!("2".parse::<ProtocolVersion>(), Ok(ProtocolVersion::new(2, 0)));
        assert!("1.x".parse::<ProtocolVersion>().is_err());
        assert!("".parse::<ProtocolVersion>().is_err());
        assert!("-1.0".parse::<ProtocolVersion>().is_err());
        assert!(ProtocolVersion::new(1, 5) > ProtocolVersion::V1_1);
        assert!(ProtocolVersion::V1_0 < ProtocolVersion::V1_1);
        assert_eq!(ProtocolVersion::new(1, 5).to_string(), "1.5");
    }

    #[test]
    fn test_parse_pin_commands() {
        assert_eq!(parse("conmutar 4", V), Ok(Command::Toggle(4)));
        assert_eq!(parse("ENCENDER 15", V), Ok(Command::TurnOn(15)));
        assert_eq!(parse("  apagar 23  ", V), Ok(Command::TurnOff(23)));
        assert_eq!(parse("pulsar 4", V), Ok(Command::Pulse(4)));
        assert_eq!(parse("estado 99", V), Ok(Command::State(99)));
        assert_eq!(parse("describir 4", V), Ok(Command::Describe(4)));
    }

    #[test]
    fn test_parse_plain_commands() {
        assert_eq!(parse("listar", V), Ok(Command::List));
        assert_eq!(parse("Desconectar", V), Ok(Command::Disconnect));
        assert_eq!(
            parse("hola 1.0", V),
            Ok(Command::Handshake(ProtocolVersion::V1_0))
        );
    }

    #[test]
    fn test_missing_parameter_is_malformed() {
        for line in ["estado", "conmutar", "hola", "describir "] {
            assert!(
                matches!(parse(line, V), Err(ProtocolError::Malformed(_))),
                "{}",
                line
            );
        }
        assert!(matches!(parse("listar 4", V), Err(ProtocolError::Malformed(_))));
        assert!(matches!(parse("estado 4 5", V), Err(ProtocolError::Malformed(_))));
        assert!(matches!(parse("hola uno", V), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_unknown_verb() {
        assert!(matches!(parse("borrar 4", V), Err(ProtocolError::Unknown(_))));
        assert!(matches!(parse("", V), Err(ProtocolError::Unknown(_))));
        assert!(matches!(parse("estado4", V), Err(ProtocolError::Unknown(_))));
    }

    #[test]
    fn test_non_numeric_pin() {
        assert_eq!(
            parse("estado abc", V),
            Err(ProtocolError::InvalidPin("abc".to_string()))
        );
    }

    #[test]
    fn test_verb_gated_by_version() {
        assert!(matches!(
            parse("describir 4", ProtocolVersion::V1_0),
            Err(ProtocolError::Unsupported { verb: "describir", .. })
        ));
        assert_eq!(
            parse("estado 4", ProtocolVersion::V1_0),
            Ok(Command::State(4))
        );
    }

    #[test]
    fn test_response_lines() {
        assert_eq!(Response::executed().to_string(), "ok: ejecutado");
        assert_eq!(Response::Info("1".into()).to_string(), "info: 1");
        assert_eq!(
            Response::bad_pin().to_string(),
            "err: no ejecutado, puerto incorrecto o no encontrado"
        );
        assert_eq!(
            Response::from(ProtocolError::Malformed("estado".into())).to_string(),
            "err: no ejecutado, comando incorrecto"
        );
        assert_eq!(
            Response::from(ProtocolError::Unsupported {
                verb: "describir",
                since: ProtocolVersion::V1_1
            })
            .to_string(),
            "err: incorrecto o no implementado"
        );
    }
}
