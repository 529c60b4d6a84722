use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::io::serial::{Connector, SerialTransport};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Host-side link configuration. The transport itself never reads files;
/// hosts load this and pass the values in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LinkSettings {
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Directory for timestamped log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_device() -> String {
    if cfg!(target_os = "windows") {
        "COM5".to_string()
    } else {
        "/dev/ttyACM0".to_string() // Nucleo ST-LINK VCP
    }
}
fn default_baud_rate() -> u32 {
    115200
}
fn default_read_timeout_ms() -> u64 {
    50
}
fn default_max_line_length() -> usize {
    256
}

impl Default for LinkSettings {
    fn default() -> Self {
        LinkSettings {
            device: default_device(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            max_line_length: default_max_line_length(),
            log_dir: None,
        }
    }
}

impl LinkSettings {
    /// `<config dir>/uartlink/settings.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("uartlink").join("settings.toml"))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: LinkSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.device.trim().is_empty() {
            return Err(SettingsError::Invalid("device must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(SettingsError::Invalid("baud_rate must be positive".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(SettingsError::Invalid(
                "read_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(SettingsError::Invalid(
                "max_line_length must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Closed transport configured from these settings.
    pub fn transport(&self, connector: Arc<dyn Connector>) -> SerialTransport {
        SerialTransport::with_connector(self.device.clone(), self.baud_rate, connector)
            .with_read_timeout(self.read_timeout())
            .with_max_line_length(self.max_line_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::SimConnector;

    #[test]
    fn test_defaults() {
        let settings = LinkSettings::default();
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.read_timeout(), Duration::from_millis(50));
        assert_eq!(settings.max_line_length, 256);
        assert!(settings.log_dir.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = LinkSettings::from_toml_str("").expect("parse failed");
        assert_eq!(settings, LinkSettings::default());
    }

    #[test]
    fn test_partial_file() {
        let settings = LinkSettings::from_toml_str(
            r#"
            device = "COM7"
            baud_rate = 9600
            log_dir = "/tmp/uartlink"
            "#,
        )
        .expect("parse failed");
        assert_eq!(settings.device, "COM7");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.read_timeout_ms, 50);
        assert_eq!(settings.log_dir, Some(PathBuf::from("/tmp/uartlink")));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            LinkSettings::from_toml_str("baud_rate = 0"),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(
            LinkSettings::from_toml_str("device = \"  \""),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(
            LinkSettings::from_toml_str("baud_rate = \"fast\""),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let settings = LinkSettings {
            device: "/dev/ttyUSB1".to_string(),
            baud_rate: 57600,
            read_timeout_ms: 20,
            max_line_length: 64,
            log_dir: None,
        };
        let text = settings.to_toml_string().expect("serialize failed");
        assert_eq!(LinkSettings::from_toml_str(&text).expect("parse failed"), settings);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("uartlink-no-such-settings.toml");
        let settings = LinkSettings::load_or_default(&path).expect("load failed");
        assert_eq!(settings, LinkSettings::default());
        assert!(matches!(
            LinkSettings::load(&path),
            Err(SettingsError::Read { .. })
        ));
    }

    #[test]
    fn test_transport_from_settings() {
        let settings = LinkSettings {
            device: "sim".to_string(),
            ..LinkSettings::default()
        };
        let mut transport = settings.transport(Arc::new(SimConnector::new()));
        assert_eq!(transport.device(), "sim");
        assert_eq!(transport.baud_rate(), 115200);
        transport.open().expect("open failed");
        assert!(transport.is_open());
        transport.close();
    }
}
