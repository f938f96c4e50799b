use thiserror::Error;
use crate::bus::i2c::I2CError;

/// Errors raised by the HAL contract (module discovery, device calls)
#[derive(Error, Debug)]
pub enum HalError {
    #[error("No sensors module '{id}' for backend '{backend}'")]
    ModuleNotFound { id: String, backend: String },

    #[error("Sensors module '{module}' failed to initialize: {reason}")]
    ModuleInitError { module: String, reason: String },

    #[error("sensors_open() failed: {reason}")]
    OpenError { reason: String },

    #[error("Unknown sensor handle {handle}")]
    BadHandle { handle: i32 },

    #[error("Invalid sampling interval {interval_ns}ns for handle {handle}")]
    InvalidDelay { handle: i32, interval_ns: i64 },

    #[error("activate() failed for handle {handle}: {reason}")]
    ActivateError { handle: i32, reason: String },

    #[error("poll() failed: {reason}")]
    PollError { reason: String },

    #[error("sensors_close() failed: {reason}")]
    CloseError { reason: String },

    #[error("Sensor driver error: {0}")]
    Driver(#[from] SensorError),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Chip driver errors for the I2C backend
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("I2C communication failed: {0}")]
    I2cError(#[from] I2CError),

    #[error("Sensor '{sensor}' initialization failed: {reason}")]
    InitError { sensor: String, reason: String },

    #[error("Sensor '{sensor}' read failed: {reason}")]
    ReadError { sensor: String, reason: String },

    #[error("Unsupported sensor driver: '{driver}'")]
    UnsupportedDriver { driver: String },

    #[error("Bus '{bus}' not found or unavailable")]
    BusNotFound { bus: String },

    #[error("Sensor '{sensor}' wrong chip ID: expected {expected:#04x}, got {actual:#04x}")]
    WrongChipId { sensor: String, expected: u8, actual: u8 },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration format in '{path}': {source}")]
    FormatError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<ConfigError> for HalError {
    fn from(error: ConfigError) -> Self {
        HalError::ModuleInitError {
            module: "sensors".to_string(),
            reason: error.to_string(),
        }
    }
}

/// Result type aliases for convenience
pub type HalResult<T> = Result<T, HalError>;
pub type SensorResult<T> = Result<T, SensorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_chip_id_message() {
        let err = SensorError::WrongChipId {
            sensor: "imu0".to_string(),
            expected: 0x6A,
            actual: 0x00,
        };
        assert_eq!(
            err.to_string(),
            "Sensor 'imu0' wrong chip ID: expected 0x6a, got 0x00"
        );
    }

    #[test]
    fn test_driver_error_wraps_into_hal_error() {
        let err: HalError = SensorError::BusNotFound { bus: "i2c1".to_string() }.into();
        assert!(matches!(err, HalError::Driver(SensorError::BusNotFound { .. })));
        assert!(err.to_string().contains("i2c1"));
    }
}
