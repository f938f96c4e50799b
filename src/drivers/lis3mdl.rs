use super::{le_triple, scale3, ChannelInfo, SensorDataFrame, SensorDriver};
use crate::bus::i2c::I2CBus;
use crate::errors::{SensorError, SensorResult};
use crate::hal::SensorType;
use async_trait::async_trait;

// Register addresses for the LIS3MDL
const WHO_AM_I: u8 = 0x0F;
const CTRL_REG1: u8 = 0x20;
const CTRL_REG2: u8 = 0x21;
const CTRL_REG3: u8 = 0x22;
const CTRL_REG4: u8 = 0x23;
const OUT_X_L: u8 = 0x28;

const WHOAMI_LIS3MDL: u8 = 0x3D;

// ±4 gauss full scale: 6842 LSB/gauss, 1 gauss = 100 µT
const LSB_PER_GAUSS_4: f32 = 6842.0;
const SENSITIVITY_4GAUSS_UT: f32 = 100.0 / LSB_PER_GAUSS_4;

pub struct Lis3mdl {
    id: String,
    address: u8,
    bus_id: String,
}

impl Lis3mdl {
    pub fn new(id: String, address: u8, bus_id: String) -> Self {
        Self {
            id,
            address,
            bus_id,
        }
    }

    async fn configure(&self, bus: &mut I2CBus, reg: u8, value: u8, name: &str) -> SensorResult<()> {
        bus.write_byte(self.address, reg, value)
            .await
            .map_err(|e| SensorError::InitError {
                sensor: self.id.clone(),
                reason: format!("Failed to configure {}: {}", name, e),
            })
    }
}

#[async_trait]
impl SensorDriver for Lis3mdl {
    async fn init(&mut self, bus: &mut I2CBus) -> SensorResult<()> {
        let mut who_am_i = [0u8; 1];
        bus.read_bytes(self.address, WHO_AM_I, &mut who_am_i).await?;
        if who_am_i[0] != WHOAMI_LIS3MDL {
            return Err(SensorError::WrongChipId {
                sensor: self.id.clone(),
                expected: WHOAMI_LIS3MDL,
                actual: who_am_i[0],
            });
        }

        // Temp sensor disabled, medium-performance XY, 80 Hz ODR
        self.configure(bus, CTRL_REG1, 0b0101_1100, "CTRL_REG1").await?;
        // ±4 gauss
        self.configure(bus, CTRL_REG2, 0b0000_0000, "CTRL_REG2").await?;
        // Continuous conversion
        self.configure(bus, CTRL_REG3, 0b0000_0000, "CTRL_REG3").await?;
        // Medium-performance Z
        self.configure(bus, CTRL_REG4, 0b0000_0100, "CTRL_REG4").await?;

        Ok(())
    }

    async fn read(&self, bus: &mut I2CBus) -> SensorResult<SensorDataFrame> {
        let mut mag_buf = [0u8; 6];
        bus.read_bytes(self.address, OUT_X_L, &mut mag_buf)
            .await
            .map_err(|e| SensorError::ReadError {
                sensor: self.id.clone(),
                reason: format!("Failed to read magnetometer data: {}", e),
            })?;

        Ok(SensorDataFrame {
            mag: Some(scale3(le_triple(&mag_buf), SENSITIVITY_4GAUSS_UT)),
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
        "LIS3MDL"
    }

    fn vendor(&self) -> &'static str {
        "STMicroelectronics"
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        vec![ChannelInfo {
            sensor_type: SensorType::MagneticField,
            label: "Magnetic field sensor",
            max_range: 400.0,
            resolution: SENSITIVITY_4GAUSS_UT,
            power: 0.27,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_gauss_is_100_microtesla() {
        let ut = LSB_PER_GAUSS_4 * SENSITIVITY_4GAUSS_UT;
        assert!((ut - 100.0).abs() < 1e-3);
    }
}
