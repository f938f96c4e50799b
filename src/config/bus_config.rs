use crate::errors::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::fs;

/// Root structure for loading `[[bus]]` style TOML config
#[derive(Debug, Deserialize)]
pub struct BusConfig {
    #[serde(rename = "bus")]
    pub buses: Vec<BusEntry>,
}

/// One bus entry (only `i2c` is consumed today)
#[derive(Debug, Deserialize)]
pub struct BusEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub r#type: String,
    pub path: String,
}

/// Load bus config file
pub fn load_bus_config(path: &str) -> ConfigResult<BusConfig> {
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
    fn test_parse_bus_entries() {
        let cfg: BusConfig = toml::from_str(
            r#"
            [[bus]]
            id = "i2c1"
            type = "i2c"
            path = "/dev/i2c-1"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.buses.len(), 1);
        assert_eq!(cfg.buses[0].r#type, "i2c");
        assert_eq!(cfg.buses[0].path, "/dev/i2c-1");
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = load_bus_config("/nonexistent/buses.toml").unwrap_err();
        assert!(matches!(err, ConfigError::LoadError { .. }));
    }
}
