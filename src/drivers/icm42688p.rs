use super::{be_triple, scale3, ChannelInfo, SensorDataFrame, SensorDriver, GRAVITY_EARTH};
use crate::bus::i2c::I2CBus;
use crate::errors::{SensorError, SensorResult};
use crate::hal::SensorType;
use async_trait::async_trait;
use std::f32::consts::PI;

// Register addresses for the ICM42688P (bank 0)
const WHO_AM_I: u8 = 0x75;
const DEVICE_CONFIG: u8 = 0x11;
const PWR_MGMT0: u8 = 0x4E;
const GYRO_CONFIG0: u8 = 0x4F;
const ACCEL_CONFIG0: u8 = 0x50;
const TEMP_DATA1: u8 = 0x1D;
const ACCEL_DATA_X1: u8 = 0x1F;
const GYRO_DATA_X1: u8 = 0x25;
const REG_BANK_SEL: u8 = 0x76;

const WHOAMI_ICM42688P: u8 = 0x47;
const WHOAMI_ICM42688: u8 = 0x44;

const ACCEL_LSB_PER_G: f32 = 16384.0; // ±2 g
const GYRO_LSB_PER_DPS: f32 = 131.0; // ±250 dps
const TEMP_SENSITIVITY: f32 = 132.48; // LSB/°C
const TEMP_OFFSET: f32 = 25.0;

const ACCEL_SCALE: f32 = GRAVITY_EARTH / ACCEL_LSB_PER_G;
const GYRO_SCALE: f32 = PI / 180.0 / GYRO_LSB_PER_DPS;

pub struct Icm42688p {
    id: String,
    address: u8,
    bus_id: String,
}

impl Icm42688p {
    pub fn new(id: String, address: u8, bus_id: String) -> Self {
        Self { id, address, bus_id }
    }

    async fn write(&self, bus: &mut I2CBus, reg: u8, value: u8, what: &str) -> SensorResult<()> {
        bus.write_byte(self.address, reg, value)
            .await
            .map_err(|e| SensorError::InitError {
                sensor: self.id.clone(),
                reason: format!("Failed to {}: {}", what, e),
            })
    }

    async fn read_block(&self, bus: &mut I2CBus, reg: u8, buf: &mut [u8], what: &str) -> SensorResult<()> {
        bus.read_bytes(self.address, reg, buf)
            .await
            .map_err(|e| SensorError::ReadError {
                sensor: self.id.clone(),
                reason: format!("Failed to read {}: {}", what, e),
            })
    }
}

#[async_trait]
impl SensorDriver for Icm42688p {
    async fn init(&mut self, bus: &mut I2CBus) -> SensorResult<()> {
        self.write(bus, REG_BANK_SEL, 0x00, "select bank 0").await?;

        let mut who_am_i = [0u8; 1];
        bus.read_bytes(self.address, WHO_AM_I, &mut who_am_i).await?;
        if who_am_i[0] != WHOAMI_ICM42688P && who_am_i[0] != WHOAMI_ICM42688 {
            return Err(SensorError::WrongChipId {
                sensor: self.id.clone(),
                expected: WHOAMI_ICM42688P,
                actual: who_am_i[0],
            });
        }

        self.write(bus, DEVICE_CONFIG, 0x01, "reset device").await?;
        // Wait for soft reset to complete
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;

        // Gyro and accel in low noise mode
        self.write(bus, PWR_MGMT0, 0x0F, "configure power management").await?;
        // ±250 dps, 100 Hz
        self.write(bus, GYRO_CONFIG0, 0x68, "configure gyroscope").await?;
        // ±2 g, 100 Hz
        self.write(bus, ACCEL_CONFIG0, 0x68, "configure accelerometer").await?;

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        Ok(())
    }

    async fn read(&self, bus: &mut I2CBus) -> SensorResult<SensorDataFrame> {
        let mut accel_buf = [0u8; 6];
        self.read_block(bus, ACCEL_DATA_X1, &mut accel_buf, "accelerometer").await?;

        let mut gyro_buf = [0u8; 6];
        self.read_block(bus, GYRO_DATA_X1, &mut gyro_buf, "gyroscope").await?;

        let mut temp_buf = [0u8; 2];
        self.read_block(bus, TEMP_DATA1, &mut temp_buf, "temperature").await?;
        let temp_raw = i16::from_be_bytes(temp_buf);

        Ok(SensorDataFrame {
            accel: Some(scale3(be_triple(&accel_buf), ACCEL_SCALE)),
            gyro: Some(scale3(be_triple(&gyro_buf), GYRO_SCALE)),
            temp: Some(temp_raw as f32 / TEMP_SENSITIVITY + TEMP_OFFSET),
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
        "ICM-42688-P"
    }

    fn vendor(&self) -> &'static str {
        "TDK InvenSense"
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        vec![
            ChannelInfo {
                sensor_type: SensorType::Accelerometer,
                label: "Accelerometer",
                max_range: 2.0 * GRAVITY_EARTH,
                resolution: ACCEL_SCALE,
                power: 0.28,
            },
            ChannelInfo {
                sensor_type: SensorType::Gyroscope,
                label: "Gyroscope",
                max_range: 250.0 * PI / 180.0,
                resolution: GYRO_SCALE,
                power: 0.6,
            },
            ChannelInfo {
                sensor_type: SensorType::Temperature,
                label: "Temperature",
                max_range: 85.0,
                resolution: 1.0 / TEMP_SENSITIVITY,
                power: 0.0,
            },
        ]
    }
}
