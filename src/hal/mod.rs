//! Sensor Hardware Abstraction Layer (HAL) contract.
//!
//! A [`SensorsModule`] is discovered by the well-known id [`SENSORS_HARDWARE_MODULE_ID`]
//! and a configured backend. It enumerates immutable [`SensorDescriptor`]s and opens a
//! [`PollDevice`], through which sensors are activated, given a sampling interval and
//! polled for [`SensorEvent`]s into a caller-owned buffer.

pub mod i2c;
pub mod iio;
pub mod sampler;
pub mod sim;

use crate::config::HalConfig;
use crate::errors::{HalError, HalResult};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Well-known identifier of the sensors HAL module
pub const SENSORS_HARDWARE_MODULE_ID: &str = "sensors";

/// Event structure version, which is the in-memory size of [`SensorEvent`].
/// Consumers reject events carrying any other value.
pub const SENSORS_EVENT_VERSION: u32 = std::mem::size_of::<SensorEvent>() as u32;

/// Accuracy reported alongside vector payloads by every backend
pub const SENSOR_STATUS_ACCURACY_HIGH: i8 = 3;

/// Enumerated sensor kind, carrying the HAL's stable integer codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SensorType {
    #[default]
    Accelerometer,
    MagneticField,
    Orientation,
    Gyroscope,
    Light,
    Pressure,
    Temperature,
    Proximity,
    Gravity,
    LinearAcceleration,
    RotationVector,
    RelativeHumidity,
    AmbientTemperature,
    Unknown(i32),
}

impl SensorType {
    pub fn code(self) -> i32 {
        match self {
            SensorType::Accelerometer => 1,
            SensorType::MagneticField => 2,
            SensorType::Orientation => 3,
            SensorType::Gyroscope => 4,
            SensorType::Light => 5,
            SensorType::Pressure => 6,
            SensorType::Temperature => 7,
            SensorType::Proximity => 8,
            SensorType::Gravity => 9,
            SensorType::LinearAcceleration => 10,
            SensorType::RotationVector => 11,
            SensorType::RelativeHumidity => 12,
            SensorType::AmbientTemperature => 13,
            SensorType::Unknown(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => SensorType::Accelerometer,
            2 => SensorType::MagneticField,
            3 => SensorType::Orientation,
            4 => SensorType::Gyroscope,
            5 => SensorType::Light,
            6 => SensorType::Pressure,
            7 => SensorType::Temperature,
            8 => SensorType::Proximity,
            9 => SensorType::Gravity,
            10 => SensorType::LinearAcceleration,
            11 => SensorType::RotationVector,
            12 => SensorType::RelativeHumidity,
            13 => SensorType::AmbientTemperature,
            other => SensorType::Unknown(other),
        }
    }
}

/// Static description of one sensor, as enumerated by the module
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorDescriptor {
    pub name: String,
    pub vendor: String,
    pub version: i32,
    pub handle: i32,
    #[serde(rename = "type", serialize_with = "serialize_type_code")]
    pub sensor_type: SensorType,
    /// Maximum measurable value, in the sensor's SI unit
    pub max_range: f32,
    /// Smallest distinguishable step, in the sensor's SI unit
    pub resolution: f32,
    /// Power draw in mA while active
    pub power: f32,
}

fn serialize_type_code<S: serde::Serializer>(t: &SensorType, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i32(t.code())
}

/// Type-dependent sample data
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EventPayload {
    #[default]
    Empty,
    /// 3-axis vector: m/s^2 (acceleration), µT (magnetic field), rad/s (gyroscope)
    Vector { x: f32, y: f32, z: f32, status: i8 },
    /// Orientation in degrees
    Orientation { azimuth: f32, pitch: f32, roll: f32, status: i8 },
    /// Rotation vector quaternion components (x, y, z, w)
    Rotation { x: f32, y: f32, z: f32, w: f32 },
    /// Single value: cm (proximity), °C (temperature), lux (light), hPa (pressure), % (humidity)
    Scalar(f32),
}

/// One timestamped sample emitted by an active sensor
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorEvent {
    /// Must equal [`SENSORS_EVENT_VERSION`]
    pub version: u32,
    /// Handle of the sensor that produced the event
    pub sensor: i32,
    pub sensor_type: SensorType,
    /// Nanoseconds
    pub timestamp: i64,
    pub payload: EventPayload,
}

impl SensorEvent {
    pub fn new(sensor: i32, sensor_type: SensorType, timestamp: i64, payload: EventPayload) -> Self {
        Self {
            version: SENSORS_EVENT_VERSION,
            sensor,
            sensor_type,
            timestamp,
            payload,
        }
    }
}

/// Wall-clock timestamp in nanoseconds for produced events
pub fn timestamp_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

/// A discovered HAL module
pub trait SensorsModule: Send {
    /// Module name, for diagnostics
    fn name(&self) -> &str;

    /// Sensors exposed by this module. The list never changes once loaded.
    fn sensors_list(&self) -> &[SensorDescriptor];

    /// Open the poll device
    fn open(&mut self) -> HalResult<Box<dyn PollDevice>>;
}

/// An opened sensors device
#[async_trait]
pub trait PollDevice: Send {
    async fn activate(&mut self, handle: i32, enabled: bool) -> HalResult<()>;

    /// Set the sampling interval for `handle`, in nanoseconds
    async fn set_delay(&mut self, handle: i32, interval_ns: i64) -> HalResult<()>;

    /// Block until at least one event is available, write up to `buffer.len()` events
    /// and return how many were written.
    async fn poll(&mut self, buffer: &mut [SensorEvent]) -> HalResult<usize>;

    async fn close(&mut self) -> HalResult<()>;
}

/// Discover the sensors module for the configured backend
pub async fn load_module(config: &HalConfig) -> HalResult<Box<dyn SensorsModule>> {
    info!("[hal] loading module '{}' (backend={})", SENSORS_HARDWARE_MODULE_ID, config.backend);
    let module: Box<dyn SensorsModule> = match config.backend.as_str() {
        "sim" => Box::new(sim::SimModule::new()),
        "i2c" => Box::new(i2c::I2cModule::load(&config.config_path).await?),
        "iio" => Box::new(iio::IioModule::scan(&config.iio_root).await?),
        other => {
            return Err(HalError::ModuleNotFound {
                id: SENSORS_HARDWARE_MODULE_ID.to_string(),
                backend: other.to_string(),
            })
        }
    };
    info!("[hal] module '{}' exposes {} sensor(s)", module.name(), module.sensors_list().len());
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip_unknowns() {
        assert_eq!(SensorType::from_code(1), SensorType::Accelerometer);
        assert_eq!(SensorType::from_code(8).code(), 8);
        assert_eq!(SensorType::from_code(42), SensorType::Unknown(42));
        assert_eq!(SensorType::Unknown(42).code(), 42);
    }

    #[test]
    fn test_new_event_carries_current_version() {
        let ev = SensorEvent::new(3, SensorType::Light, 10, EventPayload::Scalar(120.0));
        assert_eq!(ev.version, SENSORS_EVENT_VERSION);
        assert_eq!(SensorEvent::default().version, 0);
    }

    #[tokio::test]
    async fn test_unknown_backend_is_module_not_found() {
        let config = HalConfig {
            backend: "bogus".to_string(),
            ..HalConfig::default()
        };
        match load_module(&config).await {
            Err(HalError::ModuleNotFound { backend, .. }) => assert_eq!(backend, "bogus"),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_sim_backend_loads() {
        let module = load_module(&HalConfig::default()).await.unwrap();
        assert!(!module.sensors_list().is_empty());
    }
}
