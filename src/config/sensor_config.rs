use crate::errors::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::fs;

/// Root configuration struct expecting `[[sensor]]` TOML array format
#[derive(Debug, Deserialize)]
pub struct SensorConfig {
    #[serde(rename = "sensor")]
    pub sensors: Vec<SensorEntry>,
}

/// One chip on an I2C bus, matching each `[[sensor]]` section
#[derive(Debug, Deserialize)]
pub struct SensorEntry {
    pub id: String,
    pub driver: String,
    pub bus: String,
    pub address: u8,
}

/// Loads config from TOML file
pub fn load_sensor_config(path: &str) -> ConfigResult<SensorConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::FormatError {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor_entries() {
        let cfg: SensorConfig = toml::from_str(
            r#"
            [[sensor]]
            id = "imu0"
            driver = "lsm6dsl"
            bus = "i2c1"
            address = 0x6A

            [[sensor]]
            id = "mag0"
            driver = "lis3mdl"
            bus = "i2c1"
            address = 0x1C
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sensors.len(), 2);
        assert_eq!(cfg.sensors[0].address, 0x6A);
        assert_eq!(cfg.sensors[1].driver, "lis3mdl");
    }

    #[test]
    fn test_bad_toml_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensors.toml");
        std::fs::write(&path, "[[sensor]]\nid = 3\n").unwrap();
        let err = load_sensor_config(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::FormatError { .. }));
    }
}
