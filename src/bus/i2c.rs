#[cfg(target_os = "linux")]
use i2cdev::core::I2CDevice;
#[cfg(target_os = "linux")]
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};

/// I2C bus error type - platform specific
#[cfg(target_os = "linux")]
pub type I2CError = LinuxI2CError;

#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
pub struct I2CError(String);

#[cfg(not(target_os = "linux"))]
impl std::fmt::Display for I2CError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "I2C not supported on this platform: {}", self.0)
    }
}

#[cfg(not(target_os = "linux"))]
impl std::error::Error for I2CError {}

/// One `/dev/i2c-N` adapter, shared by every chip wired to it
#[cfg(target_os = "linux")]
pub struct I2CBus {
    path: String,
    device: LinuxI2CDevice,
}

#[cfg(not(target_os = "linux"))]
pub struct I2CBus {
    path: String,
}

impl I2CBus {
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(target_os = "linux")]
impl I2CBus {
    pub fn new(path: &str) -> Result<Self, I2CError> {
        let device = LinuxI2CDevice::new(path, 0)?;
        Ok(Self {
            path: path.to_string(),
            device,
        })
    }

    /// Read `buf.len()` consecutive registers starting at `reg`
    pub async fn read_bytes(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), I2CError> {
        self.device.set_slave_address(address as u16)?;

        if buf.len() == 1 {
            buf[0] = self.device.smbus_read_byte_data(reg)?;
        } else {
            let block = self.device.smbus_read_i2c_block_data(reg, buf.len() as u8)?;
            if block.len() != buf.len() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("short block read: {} of {} bytes", block.len(), buf.len()),
                )
                .into());
            }
            buf.copy_from_slice(&block);
        }

        Ok(())
    }

    pub async fn write_byte(&mut self, address: u8, reg: u8, byte: u8) -> Result<(), I2CError> {
        self.device.set_slave_address(address as u16)?;
        self.device.smbus_write_byte_data(reg, byte)
    }
}

#[cfg(not(target_os = "linux"))]
impl I2CBus {
    pub fn new(path: &str) -> Result<Self, I2CError> {
        Err(I2CError(format!("cannot open {}: I2C is only supported on Linux", path)))
    }

    pub async fn read_bytes(&mut self, _address: u8, _reg: u8, _buf: &mut [u8]) -> Result<(), I2CError> {
        Err(I2CError(format!("{}: I2C is only supported on Linux", self.path)))
    }

    pub async fn write_byte(&mut self, _address: u8, _reg: u8, _byte: u8) -> Result<(), I2CError> {
        Err(I2CError(format!("{}: I2C is only supported on Linux", self.path)))
    }
}
