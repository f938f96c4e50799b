//! Sensors module backed by I2C chip drivers.
//!
//! Buses come from `buses.toml`, chips from `sensors.toml`. Every chip is
//! initialised at load time and contributes one HAL sensor per channel it measures.

use super::sampler::Sampler;
use super::{timestamp_ns, PollDevice, SensorDescriptor, SensorEvent, SensorsModule};
use crate::bus::i2c::I2CBus;
use crate::config::{load_bus_config, load_sensor_config};
use crate::drivers::{create_sensor_driver, SensorDataFrame, SensorDriver};
use crate::errors::{HalResult, SensorError};
use crate::hal::SensorType;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct Chip {
    driver: Box<dyn SensorDriver>,
    bus: Arc<Mutex<I2CBus>>,
}

/// Maps a HAL handle back to the chip and quantity it reads
#[derive(Debug, Clone, Copy, PartialEq)]
struct Channel {
    handle: i32,
    chip: usize,
    sensor_type: SensorType,
}

pub struct I2cModule {
    descriptors: Vec<SensorDescriptor>,
    channels: Vec<Channel>,
    chips: Arc<Vec<Chip>>,
}

/// Events for the due channels of one chip from a single reading. Channels the
/// frame did not measure produce nothing.
fn frame_events(
    channels: &[Channel],
    chip: usize,
    due: &[i32],
    frame: &SensorDataFrame,
    timestamp: i64,
) -> Vec<SensorEvent> {
    channels
        .iter()
        .filter(|c| c.chip == chip && due.contains(&c.handle))
        .filter_map(|c| {
            frame
                .payload(c.sensor_type)
                .map(|payload| SensorEvent::new(c.handle, c.sensor_type, timestamp, payload))
        })
        .collect()
}

/// Assign sequential handles, starting at 1, to every channel of every chip
fn enumerate_channels(drivers: &[&dyn SensorDriver]) -> (Vec<SensorDescriptor>, Vec<Channel>) {
    let mut descriptors = Vec::new();
    let mut channels = Vec::new();
    let mut handle = 1;
    for (chip, driver) in drivers.iter().enumerate() {
        for info in driver.channels() {
            descriptors.push(SensorDescriptor {
                name: format!("{} {} ({})", driver.model(), info.label, driver.id()),
                vendor: driver.vendor().to_string(),
                version: 1,
                handle,
                sensor_type: info.sensor_type,
                max_range: info.max_range,
                resolution: info.resolution,
                power: info.power,
            });
            channels.push(Channel {
                handle,
                chip,
                sensor_type: info.sensor_type,
            });
            handle += 1;
        }
    }
    (descriptors, channels)
}

impl I2cModule {
    /// Open the configured buses and initialise every configured chip
    pub async fn load(config_path: &str) -> HalResult<Self> {
        let bus_config_path = format!("{}/buses.toml", config_path);
        let sensor_config_path = format!("{}/sensors.toml", config_path);
        let bus_cfg = load_bus_config(&bus_config_path)?;
        let sensor_cfg = load_sensor_config(&sensor_config_path)?;

        let mut bus_map = HashMap::new();
        for b in bus_cfg.buses.iter() {
            if b.r#type != "i2c" {
                warn!("[hal:i2c] ignoring bus '{}' of type '{}'", b.id, b.r#type);
                continue;
            }
            let bus = I2CBus::new(&b.path).map_err(SensorError::from)?;
            debug!("[hal:i2c] opened bus '{}' at {}", b.id, bus.path());
            bus_map.insert(b.id.clone(), Arc::new(Mutex::new(bus)));
        }

        let mut chips = Vec::new();
        info!("[hal:i2c] initializing {} chip(s)...", sensor_cfg.sensors.len());
        for s in sensor_cfg.sensors.iter() {
            let mut driver = create_sensor_driver(&s.driver, s.id.clone(), s.address, s.bus.clone())?;
            let bus = bus_map
                .get(driver.bus())
                .ok_or_else(|| SensorError::BusNotFound {
                    bus: driver.bus().to_string(),
                })?
                .clone();
            driver.init(&mut *bus.lock().await).await?;
            info!(
                "[hal:i2c] registered chip: id={} driver={} bus={} address={:#04x}",
                s.id, s.driver, s.bus, s.address
            );
            chips.push(Chip { driver, bus });
        }

        let drivers: Vec<&dyn SensorDriver> = chips.iter().map(|c| c.driver.as_ref()).collect();
        let (descriptors, channels) = enumerate_channels(&drivers);
        Ok(Self {
            descriptors,
            channels,
            chips: Arc::new(chips),
        })
    }
}

impl SensorsModule for I2cModule {
    fn name(&self) -> &str {
        "i2c"
    }

    fn sensors_list(&self) -> &[SensorDescriptor] {
        &self.descriptors
    }

    fn open(&mut self) -> HalResult<Box<dyn PollDevice>> {
        Ok(Box::new(I2cDevice {
            sampler: Sampler::new(self.channels.iter().map(|c| c.handle)),
            channels: self.channels.clone(),
            chips: self.chips.clone(),
        }))
    }
}

struct I2cDevice {
    sampler: Sampler,
    channels: Vec<Channel>,
    chips: Arc<Vec<Chip>>,
}

#[async_trait]
impl PollDevice for I2cDevice {
    async fn activate(&mut self, handle: i32, enabled: bool) -> HalResult<()> {
        self.sampler.set_enabled(handle, enabled)
    }

    async fn set_delay(&mut self, handle: i32, interval_ns: i64) -> HalResult<()> {
        self.sampler.set_period(handle, interval_ns)
    }

    async fn poll(&mut self, buffer: &mut [SensorEvent]) -> HalResult<usize> {
        loop {
            let due = self.sampler.wait_due(buffer.len()).await;
            let mut n = 0;

            // One bus transaction per chip, shared by all of its due channels
            let mut chip_indices: Vec<usize> = self
                .channels
                .iter()
                .filter(|c| due.contains(&c.handle))
                .map(|c| c.chip)
                .collect();
            chip_indices.dedup();

            for chip_index in chip_indices {
                let chip = &self.chips[chip_index];
                let frame = {
                    let mut bus = chip.bus.lock().await;
                    chip.driver.read(&mut *bus).await?
                };
                for ev in frame_events(&self.channels, chip_index, &due, &frame, timestamp_ns()) {
                    buffer[n] = ev;
                    n += 1;
                }
            }

            if n > 0 {
                return Ok(n);
            }
        }
    }

    async fn close(&mut self) -> HalResult<()> {
        for handle in self.channels.iter().map(|c| c.handle) {
            self.sampler.set_enabled(handle, false)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HalError;
    use crate::hal::EventPayload;

    #[cfg(all(feature = "lsm6dsl", feature = "lis3mdl"))]
    #[test]
    fn test_handles_assigned_per_channel() {
        let imu = create_sensor_driver("lsm6dsl", "imu0".into(), 0x6A, "i2c1".into()).unwrap();
        let mag = create_sensor_driver("lis3mdl", "mag0".into(), 0x1C, "i2c1".into()).unwrap();
        let (descriptors, channels) = enumerate_channels(&[imu.as_ref(), mag.as_ref()]);

        let handles: Vec<i32> = descriptors.iter().map(|d| d.handle).collect();
        assert_eq!(handles, vec![1, 2, 3, 4]);
        assert_eq!(descriptors[0].name, "LSM6DSL Accelerometer (imu0)");
        assert_eq!(descriptors[0].vendor, "STMicroelectronics");
        assert_eq!(descriptors[3].sensor_type, SensorType::MagneticField);
        assert_eq!(channels[3].chip, 1);
        assert_eq!(channels[1].sensor_type, SensorType::Gyroscope);
    }

    fn channel(handle: i32, chip: usize, sensor_type: SensorType) -> Channel {
        Channel { handle, chip, sensor_type }
    }

    #[test]
    fn test_frame_events_for_due_channels_only() {
        let channels = vec![
            channel(1, 0, SensorType::Accelerometer),
            channel(2, 0, SensorType::Gyroscope),
            channel(3, 0, SensorType::Temperature),
            channel(4, 1, SensorType::MagneticField),
        ];
        let frame = SensorDataFrame {
            accel: Some([0.1, 0.2, 9.8]),
            gyro: Some([0.0, 0.0, 0.5]),
            temp: Some(31.5),
            ..Default::default()
        };

        let events = frame_events(&channels, 0, &[1, 3, 4], &frame, 77);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sensor, 1);
        assert_eq!(events[0].timestamp, 77);
        assert!(matches!(events[0].payload, EventPayload::Vector { z, .. } if z == 9.8));
        assert_eq!(events[1].sensor, 3);
        assert_eq!(events[1].payload, EventPayload::Scalar(31.5));
    }

    #[test]
    fn test_frame_without_measurement_yields_nothing() {
        let channels = vec![
            channel(1, 0, SensorType::Accelerometer),
            channel(2, 0, SensorType::Temperature),
        ];
        let frame = SensorDataFrame {
            accel: Some([0.0, 0.0, 9.8]),
            ..Default::default()
        };

        let events = frame_events(&channels, 0, &[1, 2], &frame, 5);
        let handles: Vec<i32> = events.iter().map(|e| e.sensor).collect();
        assert_eq!(handles, vec![1]);
        assert!(frame_events(&channels, 0, &[2], &frame, 5).is_empty());
    }

    #[tokio::test]
    async fn test_load_without_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = I2cModule::load(dir.path().to_str().unwrap()).await.err();
        assert!(matches!(err, Some(HalError::ModuleInitError { .. })));
    }
}
