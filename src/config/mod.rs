pub mod bus_config;
pub mod sensor_config;
pub mod session_config;

pub use bus_config::{load_bus_config, BusConfig, BusEntry};
pub use sensor_config::{load_sensor_config, SensorConfig, SensorEntry};
pub use session_config::{load_session_config, HalConfig, OutputFormat, SessionConfig, SessionSettings};

/// Configuration directory, from `CONFIG_PATH` or `config`
pub fn config_dir() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string())
}
