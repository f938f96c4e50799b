#[cfg(feature = "bmp388")]
pub mod bmp388;
#[cfg(feature = "icm42688p")]
pub mod icm42688p;
#[cfg(feature = "lis3mdl")]
pub mod lis3mdl;
#[cfg(feature = "lsm6dsl")]
pub mod lsm6dsl;

use crate::bus::i2c::I2CBus;
use crate::errors::{SensorError, SensorResult};
use crate::hal::{EventPayload, SensorType, SENSOR_STATUS_ACCURACY_HIGH};
use async_trait::async_trait;

/// Standard gravity, m/s^2
pub const GRAVITY_EARTH: f32 = 9.80665;

/// One converted reading from a chip, in HAL units
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SensorDataFrame {
    /// m/s^2
    pub accel: Option<[f32; 3]>,
    /// rad/s
    pub gyro: Option<[f32; 3]>,
    /// µT
    pub mag: Option<[f32; 3]>,
    /// °C
    pub temp: Option<f32>,
    /// hPa
    pub pressure: Option<f32>,
}

impl SensorDataFrame {
    /// Payload for the HAL sensor of `sensor_type`, if this frame measured it
    pub fn payload(&self, sensor_type: SensorType) -> Option<EventPayload> {
        let vector = |[x, y, z]: [f32; 3]| EventPayload::Vector {
            x,
            y,
            z,
            status: SENSOR_STATUS_ACCURACY_HIGH,
        };
        match sensor_type {
            SensorType::Accelerometer => self.accel.map(vector),
            SensorType::Gyroscope => self.gyro.map(vector),
            SensorType::MagneticField => self.mag.map(vector),
            SensorType::Temperature => self.temp.map(EventPayload::Scalar),
            SensorType::Pressure => self.pressure.map(EventPayload::Scalar),
            _ => None,
        }
    }
}

/// Static characteristics of one channel a chip exposes as a HAL sensor
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub sensor_type: SensorType,
    pub label: &'static str,
    pub max_range: f32,
    pub resolution: f32,
    /// mA
    pub power: f32,
}

#[async_trait]
pub trait SensorDriver: Send + Sync {
    async fn init(&mut self, bus: &mut I2CBus) -> SensorResult<()>;
    async fn read(&self, bus: &mut I2CBus) -> SensorResult<SensorDataFrame>;
    fn id(&self) -> &str;
    fn bus(&self) -> &str;

    /// Chip part number, used in sensor names
    fn model(&self) -> &'static str;
    fn vendor(&self) -> &'static str;

    /// HAL sensors this chip provides, one per measured quantity
    fn channels(&self) -> Vec<ChannelInfo>;
}

pub fn create_sensor_driver(
    driver: &str,
    id: String,
    address: u8,
    bus_id: String,
) -> SensorResult<Box<dyn SensorDriver>> {
    match driver {
        #[cfg(feature = "lsm6dsl")]
        "lsm6dsl" => Ok(Box::new(lsm6dsl::Lsm6dsl::new(id, address, bus_id))),
        #[cfg(feature = "lis3mdl")]
        "lis3mdl" => Ok(Box::new(lis3mdl::Lis3mdl::new(id, address, bus_id))),
        #[cfg(feature = "bmp388")]
        "bmp388" => Ok(Box::new(bmp388::Bmp388::new(id, address, bus_id))),
        #[cfg(feature = "icm42688p")]
        "icm42688p" => Ok(Box::new(icm42688p::Icm42688p::new(id, address, bus_id))),
        _ => {
            let _ = (id, address, bus_id);
            Err(SensorError::UnsupportedDriver { driver: driver.to_string() })
        }
    }
}

/// Little-endian i16 triple from six register bytes
pub(crate) fn le_triple(buf: &[u8; 6]) -> [i16; 3] {
    [
        i16::from_le_bytes([buf[0], buf[1]]),
        i16::from_le_bytes([buf[2], buf[3]]),
        i16::from_le_bytes([buf[4], buf[5]]),
    ]
}

/// Big-endian i16 triple from six register bytes
pub(crate) fn be_triple(buf: &[u8; 6]) -> [i16; 3] {
    [
        i16::from_be_bytes([buf[0], buf[1]]),
        i16::from_be_bytes([buf[2], buf[3]]),
        i16::from_be_bytes([buf[4], buf[5]]),
    ]
}

pub(crate) fn scale3(raw: [i16; 3], factor: f32) -> [f32; 3] {
    [raw[0] as f32 * factor, raw[1] as f32 * factor, raw[2] as f32 * factor]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_driver_rejected() {
        let err = create_sensor_driver("mpu6050", "imu9".into(), 0x68, "i2c1".into()).err();
        assert!(matches!(err, Some(SensorError::UnsupportedDriver { driver }) if driver == "mpu6050"));
    }

    #[cfg(feature = "lsm6dsl")]
    #[test]
    fn test_known_driver_created() {
        let driver = create_sensor_driver("lsm6dsl", "imu0".into(), 0x6A, "i2c1".into()).unwrap();
        assert_eq!(driver.id(), "imu0");
        assert_eq!(driver.bus(), "i2c1");
        assert_eq!(driver.model(), "LSM6DSL");
    }

    #[test]
    fn test_frame_payload_by_type() {
        let frame = SensorDataFrame {
            accel: Some([0.0, 0.0, GRAVITY_EARTH]),
            temp: Some(21.5),
            ..Default::default()
        };
        assert!(matches!(
            frame.payload(SensorType::Accelerometer),
            Some(EventPayload::Vector { z, .. }) if z == GRAVITY_EARTH
        ));
        assert_eq!(frame.payload(SensorType::Temperature), Some(EventPayload::Scalar(21.5)));
        assert_eq!(frame.payload(SensorType::Gyroscope), None);
        assert_eq!(frame.payload(SensorType::Light), None);
    }

    #[test]
    fn test_register_byte_order() {
        let buf = [0x01, 0x02, 0xFF, 0xFF, 0x00, 0x80];
        assert_eq!(le_triple(&buf), [0x0201, -1, i16::MIN]);
        assert_eq!(be_triple(&buf), [0x0102, -1, 0x0080]);
        assert_eq!(scale3([2, -4, 0], 0.5), [1.0, -2.0, 0.0]);
    }
}
