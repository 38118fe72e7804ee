use std::io;
use std::path::{Path, PathBuf};

use domotica_types::{ConfigError, ServerConfig};
use thiserror::Error;
use tracing::info;

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "domotica.toml";

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("configuration file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("could not read configuration file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse configuration file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Read, parse and validate the server configuration.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigLoadError::NotFound(path.to_path_buf())
        } else {
            ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let config: ServerConfig =
        toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;

    info!(
        path = %path.display(),
        groups = config.groups.len(),
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domotica_types::PinKind;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
port = 5000
pulse_ms = 500

[[groups]]
pins = [
    { pin = 22, kind = "button", description = "Router button" },
    { pin = 4, kind = "relay", active_high = false, description = "Router relay" },
]

[[groups]]
pins = [
    { pin = 14, kind = "probe" },
    { pin = 15, kind = "relay" },
]
call = { action = "aviso_electricidad", on_rising = true }

[[groups]]
pins = [{ pin = 12, kind = "led_pwm" }]
"#;

    #[test]
    fn test_load_valid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("domotica.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.pulse_ms, 500);
        // Unset fields fall back to defaults
        assert_eq!(config.pause_ms, 200);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.groups.len(), 3);
        assert!(!config.groups[0].pins[1].active_high);
        assert!(config.groups[1].pins[1].active_high);
        assert_eq!(config.groups[2].pins[0].kind, PinKind::LedPwm);

        let call = config.groups[1].call.as_ref().unwrap();
        assert_eq!(call.action.as_deref(), Some("aviso_electricidad"));
        assert!(call.on_rising);
        assert!(!call.on_falling);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::NotFound(_)));
    }

    #[test]
    fn test_unparseable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigLoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kind.toml");
        fs::write(&path, "[[groups]]\npins = [{ pin = 4, kind = \"motor\" }]\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigLoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        fs::write(
            &path,
            "[[groups]]\npins = [{ pin = 4, kind = \"relay\" }, { pin = 22, kind = \"button\" }]\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigLoadError::Invalid(ConfigError::TriggerNotFirst { group: 0, pin: 22 }))
        ));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string(&ServerConfig::default()).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("default.toml");
        fs::write(&path, text).unwrap();
        assert_eq!(load_config(&path).unwrap(), ServerConfig::default());
    }
}
