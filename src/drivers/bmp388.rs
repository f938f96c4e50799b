use super::{ChannelInfo, SensorDataFrame, SensorDriver};
use crate::bus::i2c::I2CBus;
use crate::errors::{SensorError, SensorResult};
use crate::hal::SensorType;
use async_trait::async_trait;

const CHIP_ID: u8 = 0x00;
const DATA_0: u8 = 0x04;
const PWR_CTRL: u8 = 0x1B;
const OSR: u8 = 0x1C;
const CALIB_DATA: u8 = 0x31;
const CMD: u8 = 0x7E;

const CHIP_ID_BMP388: u8 = 0x50;
const CMD_SOFT_RESET: u8 = 0xB6;
const CALIB_LEN: usize = 21;

/// Compensation coefficients decoded from the NVM block at 0x31..=0x45
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    t1: f64,
    t2: f64,
    t3: f64,
    p1: f64,
    p2: f64,
    p3: f64,
    p4: f64,
    p5: f64,
    p6: f64,
    p7: f64,
    p8: f64,
    p9: f64,
    p10: f64,
    p11: f64,
}

impl Calibration {
    pub fn from_nvm(b: &[u8; CALIB_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]) as f64;
        let i16_at = |i: usize| i16::from_le_bytes([b[i], b[i + 1]]) as f64;
        let i8_at = |i: usize| b[i] as i8 as f64;
        let pow2 = |e: i32| 2f64.powi(e);

        Self {
            t1: u16_at(0) / pow2(-8),
            t2: u16_at(2) / pow2(30),
            t3: i8_at(4) / pow2(48),
            p1: (i16_at(5) - pow2(14)) / pow2(20),
            p2: (i16_at(7) - pow2(14)) / pow2(29),
            p3: i8_at(9) / pow2(32),
            p4: i8_at(10) / pow2(37),
            p5: u16_at(11) / pow2(-3),
            p6: u16_at(13) / pow2(6),
            p7: i8_at(15) / pow2(8),
            p8: i8_at(16) / pow2(15),
            p9: i16_at(17) / pow2(48),
            p10: i8_at(19) / pow2(48),
            p11: i8_at(20) / pow2(65),
        }
    }

    /// Linearised temperature in °C
    pub fn temperature(&self, uncomp_temp: u32) -> f64 {
        let d1 = uncomp_temp as f64 - self.t1;
        let d2 = d1 * self.t2;
        d2 + d1 * d1 * self.t3
    }

    /// Compensated pressure in Pa, given the linearised temperature
    pub fn pressure(&self, uncomp_press: u32, t_lin: f64) -> f64 {
        let up = uncomp_press as f64;
        let t2 = t_lin * t_lin;
        let t3 = t2 * t_lin;

        let out1 = self.p5 + self.p6 * t_lin + self.p7 * t2 + self.p8 * t3;
        let out2 = up * (self.p1 + self.p2 * t_lin + self.p3 * t2 + self.p4 * t3);
        let out3 = up * up * (self.p9 + self.p10 * t_lin) + up * up * up * self.p11;
        out1 + out2 + out3
    }
}

pub struct Bmp388 {
    id: String,
    address: u8,
    bus_id: String,
    calibration: Option<Calibration>,
}

impl Bmp388 {
    pub fn new(id: String, address: u8, bus_id: String) -> Self {
        Self {
            id,
            address,
            bus_id,
            calibration: None,
        }
    }

    async fn write(&self, bus: &mut I2CBus, reg: u8, value: u8, what: &str) -> SensorResult<()> {
        bus.write_byte(self.address, reg, value)
            .await
            .map_err(|e| SensorError::InitError {
                sensor: self.id.clone(),
                reason: format!("Failed to {}: {}", what, e),
            })
    }
}

fn u24_le(b: &[u8]) -> u32 {
    (b[2] as u32) << 16 | (b[1] as u32) << 8 | b[0] as u32
}

#[async_trait]
impl SensorDriver for Bmp388 {
    async fn init(&mut self, bus: &mut I2CBus) -> SensorResult<()> {
        let mut chip_id = [0u8; 1];
        bus.read_bytes(self.address, CHIP_ID, &mut chip_id).await?;
        if chip_id[0] != CHIP_ID_BMP388 {
            return Err(SensorError::WrongChipId {
                sensor: self.id.clone(),
                expected: CHIP_ID_BMP388,
                actual: chip_id[0],
            });
        }

        self.write(bus, CMD, CMD_SOFT_RESET, "soft reset").await?;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let mut nvm = [0u8; CALIB_LEN];
        bus.read_bytes(self.address, CALIB_DATA, &mut nvm)
            .await
            .map_err(|e| SensorError::InitError {
                sensor: self.id.clone(),
                reason: format!("Failed to read calibration: {}", e),
            })?;
        self.calibration = Some(Calibration::from_nvm(&nvm));

        // Pressure x8, temperature x1 oversampling
        self.write(bus, OSR, 0b0000_0011, "configure oversampling").await?;
        // Normal mode, pressure and temperature enabled
        self.write(bus, PWR_CTRL, 0b0011_0011, "configure power mode").await?;
        Ok(())
    }

    async fn read(&self, bus: &mut I2CBus) -> SensorResult<SensorDataFrame> {
        let calibration = self.calibration.ok_or_else(|| SensorError::ReadError {
            sensor: self.id.clone(),
            reason: "not initialized".to_string(),
        })?;

        // Pressure then temperature, 24-bit little-endian each
        let mut buf = [0u8; 6];
        bus.read_bytes(self.address, DATA_0, &mut buf)
            .await
            .map_err(|e| SensorError::ReadError {
                sensor: self.id.clone(),
                reason: format!("Failed to read data registers: {}", e),
            })?;

        let t_lin = calibration.temperature(u24_le(&buf[3..6]));
        let pressure_pa = calibration.pressure(u24_le(&buf[0..3]), t_lin);

        Ok(SensorDataFrame {
            temp: Some(t_lin as f32),
            pressure: Some((pressure_pa / 100.0) as f32),
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
        "BMP388"
    }

    fn vendor(&self) -> &'static str {
        "Bosch Sensortec"
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        vec![
            ChannelInfo {
                sensor_type: SensorType::Pressure,
                label: "Pressure sensor",
                max_range: 1250.0,
                resolution: 0.0016,
                power: 0.0034,
            },
            ChannelInfo {
                sensor_type: SensorType::Temperature,
                label: "Temperature",
                max_range: 85.0,
                resolution: 0.005,
                power: 0.0034,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nvm(t1: u16, p1: i16, p5: u16) -> [u8; CALIB_LEN] {
        let mut b = [0u8; CALIB_LEN];
        b[0..2].copy_from_slice(&t1.to_le_bytes());
        b[5..7].copy_from_slice(&p1.to_le_bytes());
        // p2 = 2^14 makes its term vanish
        b[7..9].copy_from_slice(&(1i16 << 14).to_le_bytes());
        b[11..13].copy_from_slice(&p5.to_le_bytes());
        b
    }

    #[test]
    fn test_decode_scaling() {
        let cal = Calibration::from_nvm(&nvm(100, 1 << 14, 12_500));
        assert_eq!(cal.t1, 25_600.0);
        assert_eq!(cal.p1, 0.0);
        assert_eq!(cal.p2, 0.0);
        assert_eq!(cal.p5, 100_000.0);
    }

    #[test]
    fn test_compensation_at_reference_point() {
        let cal = Calibration::from_nvm(&nvm(100, 1 << 14, 12_500));
        let t_lin = cal.temperature(25_600);
        assert_eq!(t_lin, 0.0);
        assert_eq!(cal.pressure(0, t_lin), 100_000.0);
        // With p1 == 0 and every higher-order term zero, raw pressure has no effect
        assert_eq!(cal.pressure(123_456, t_lin), 100_000.0);
    }

    #[test]
    fn test_u24_little_endian() {
        assert_eq!(u24_le(&[0x01, 0x02, 0x03]), 0x030201);
    }
}
