use super::{le_triple, scale3, ChannelInfo, SensorDataFrame, SensorDriver, GRAVITY_EARTH};
use crate::bus::i2c::I2CBus;
use crate::errors::{SensorError, SensorResult};
use crate::hal::SensorType;
use async_trait::async_trait;
use std::f32::consts::PI;

// Register addresses for the LSM6DSL
const WHO_AM_I: u8 = 0x0F;
const CTRL1_XL: u8 = 0x10;
const CTRL2_G: u8 = 0x11;
const CTRL3_C: u8 = 0x12;
const OUT_TEMP_L: u8 = 0x20;
const OUTX_L_G: u8 = 0x22;
const OUTX_L_XL: u8 = 0x28;

const WHOAMI_LSM6DSL: u8 = 0x6A;

// ±2 g: 0.061 mg/LSB
const ACCEL_SENSITIVITY_2G: f32 = 0.061 * GRAVITY_EARTH / 1000.0;
// ±250 dps: 8.75 mdps/LSB
const GYRO_SENSITIVITY_250DPS: f32 = 8.75 / 1000.0 * PI / 180.0;
const TEMP_LSB_PER_DEGREE: f32 = 256.0;
const TEMP_OFFSET: f32 = 25.0;

pub struct Lsm6dsl {
    id: String,
    address: u8,
    bus_id: String,
}

impl Lsm6dsl {
    pub fn new(id: String, address: u8, bus_id: String) -> Self {
        Self { id, address, bus_id }
    }

    fn init_err(&self, what: &str, e: impl std::fmt::Display) -> SensorError {
        SensorError::InitError {
            sensor: self.id.clone(),
            reason: format!("Failed to configure {}: {}", what, e),
        }
    }

    fn read_err(&self, what: &str, e: impl std::fmt::Display) -> SensorError {
        SensorError::ReadError {
            sensor: self.id.clone(),
            reason: format!("Failed to read {}: {}", what, e),
        }
    }
}

#[async_trait]
impl SensorDriver for Lsm6dsl {
    async fn init(&mut self, bus: &mut I2CBus) -> SensorResult<()> {
        let mut who_am_i = [0u8; 1];
        bus.read_bytes(self.address, WHO_AM_I, &mut who_am_i).await?;
        if who_am_i[0] != WHOAMI_LSM6DSL {
            return Err(SensorError::WrongChipId {
                sensor: self.id.clone(),
                expected: WHOAMI_LSM6DSL,
                actual: who_am_i[0],
            });
        }

        // CTRL3_C: block data update, register auto-increment
        bus.write_byte(self.address, CTRL3_C, 0b0100_0100)
            .await
            .map_err(|e| self.init_err("CTRL3_C", e))?;
        // Accelerometer: 104 Hz, ±2 g
        bus.write_byte(self.address, CTRL1_XL, 0b0100_0000)
            .await
            .map_err(|e| self.init_err("accelerometer", e))?;
        // Gyroscope: 104 Hz, 250 dps
        bus.write_byte(self.address, CTRL2_G, 0b0100_0000)
            .await
            .map_err(|e| self.init_err("gyroscope", e))?;

        Ok(())
    }

    async fn read(&self, bus: &mut I2CBus) -> SensorResult<SensorDataFrame> {
        let mut accel_buf = [0u8; 6];
        bus.read_bytes(self.address, OUTX_L_XL, &mut accel_buf)
            .await
            .map_err(|e| self.read_err("accelerometer", e))?;

        let mut gyro_buf = [0u8; 6];
        bus.read_bytes(self.address, OUTX_L_G, &mut gyro_buf)
            .await
            .map_err(|e| self.read_err("gyroscope", e))?;

        let mut temp_buf = [0u8; 2];
        bus.read_bytes(self.address, OUT_TEMP_L, &mut temp_buf)
            .await
            .map_err(|e| self.read_err("temperature", e))?;
        let temp_raw = i16::from_le_bytes(temp_buf);

        Ok(SensorDataFrame {
            accel: Some(scale3(le_triple(&accel_buf), ACCEL_SENSITIVITY_2G)),
            gyro: Some(scale3(le_triple(&gyro_buf), GYRO_SENSITIVITY_250DPS)),
            temp: Some(temp_raw as f32 / TEMP_LSB_PER_DEGREE + TEMP_OFFSET),
            ..Default::default()
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn bus(&self) -> &str {
        &self.bus_id
    }

    fn model(&self) -> &'static str {
        "LSM6DSL"
    }

    fn vendor(&self) -> &'static str {
        "STMicroelectronics"
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        vec![
            ChannelInfo {
                sensor_type: SensorType::Accelerometer,
                label: "Accelerometer",
                max_range: 2.0 * GRAVITY_EARTH,
                resolution: ACCEL_SENSITIVITY_2G,
                power: 0.16,
            },
            ChannelInfo {
                sensor_type: SensorType::Gyroscope,
                label: "Gyroscope",
                max_range: 250.0 * PI / 180.0,
                resolution: GYRO_SENSITIVITY_250DPS,
                power: 0.45,
            },
            ChannelInfo {
                sensor_type: SensorType::Temperature,
                label: "Temperature",
                max_range: 85.0,
                resolution: 1.0 / TEMP_LSB_PER_DEGREE,
                power: 0.0,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_cover_imu_and_temperature() {
        let chip = Lsm6dsl::new("imu0".into(), 0x6A, "i2c1".into());
        let types: Vec<_> = chip.channels().iter().map(|c| c.sensor_type).collect();
        assert_eq!(
            types,
            vec![SensorType::Accelerometer, SensorType::Gyroscope, SensorType::Temperature]
        );
    }

    #[test]
    fn test_full_scale_accel_is_two_g() {
        let full = i16::MAX as f32 * ACCEL_SENSITIVITY_2G;
        assert!((full - 2.0 * GRAVITY_EARTH).abs() < 0.05);
    }
}
