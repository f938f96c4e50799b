use crate::errors::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::info;

/// Root of `session.toml`. Every table is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub hal: HalConfig,
    pub session: SessionSettings,
    pub output: OutputSettings,
}

/// `[hal]`: which backend provides the sensors module
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HalConfig {
    /// `sim`, `i2c` or `iio`
    pub backend: String,
    /// Root of the IIO sysfs tree
    pub iio_root: String,
    /// Directory holding `buses.toml`/`sensors.toml`, filled in at load time
    #[serde(skip)]
    pub config_path: String,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            backend: "sim".to_string(),
            iio_root: "/sys/bus/iio/devices".to_string(),
            config_path: "config".to_string(),
        }
    }
}

/// `[session]`: timing of the poll session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Pause between enumeration and activation
    pub settle_delay_ms: u64,
    /// Sampling interval requested for every activated sensor
    pub sampling_interval_ns: i64,
    /// Number of event slots handed to each poll
    pub buffer_capacity: usize,
    /// Stop polling after this long; unbounded when unset
    pub window_ms: Option<u64>,
    /// Stop polling after this many polls; unbounded when unset
    pub max_polls: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 5000,
            sampling_interval_ns: 10_000_000,
            buffer_capacity: 16,
            window_ms: None,
            max_polls: None,
        }
    }
}

impl SessionSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn window(&self) -> Option<Duration> {
        self.window_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// `[output]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
}

impl SessionConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.session.buffer_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.buffer_capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.session.sampling_interval_ns <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.sampling_interval_ns".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Load `session.toml` from `dir`. A missing file yields the defaults.
pub fn load_session_config(dir: &str) -> ConfigResult<SessionConfig> {
    let path = format!("{}/session.toml", dir);
    let mut config = match fs::read_to_string(&path) {
        Ok(content) => toml::from_str::<SessionConfig>(&content).map_err(|source| {
            ConfigError::FormatError {
                path: path.clone(),
                source,
            }
        })?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("[config] {} not found, using defaults", path);
            SessionConfig::default()
        }
        Err(source) => return Err(ConfigError::LoadError { path, source }),
    };
    config.hal.config_path = dir.to_string();
    config.validate()?;
    Ok(config)
}
