//! Sensors module over the Linux Industrial I/O sysfs tree.
//!
//! Each `iio:deviceN` directory is inspected for known channel groups. Values are
//! read on demand from sysfs attributes and converted to HAL units.

use super::sampler::Sampler;
use super::{
    timestamp_ns, EventPayload, PollDevice, SensorDescriptor, SensorEvent, SensorType, SensorsModule,
    SENSOR_STATUS_ACCURACY_HIGH,
};
use crate::errors::{HalError, HalResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// IIO channel group, the HAL type it maps to, and the factor from IIO to HAL units
struct Group {
    prefix: &'static str,
    sensor_type: SensorType,
    label: &'static str,
    axes: bool,
    unit: f64,
}

const GROUPS: &[Group] = &[
    Group { prefix: "accel", sensor_type: SensorType::Accelerometer, label: "Accelerometer", axes: true, unit: 1.0 },
    Group { prefix: "anglvel", sensor_type: SensorType::Gyroscope, label: "Gyroscope", axes: true, unit: 1.0 },
    // gauss -> µT
    Group { prefix: "magn", sensor_type: SensorType::MagneticField, label: "Magnetic field sensor", axes: true, unit: 100.0 },
    Group { prefix: "illuminance", sensor_type: SensorType::Light, label: "Light sensor", axes: false, unit: 1.0 },
    Group { prefix: "proximity", sensor_type: SensorType::Proximity, label: "Proximity sensor", axes: false, unit: 1.0 },
    // milli °C -> °C
    Group { prefix: "temp", sensor_type: SensorType::Temperature, label: "Temperature", axes: false, unit: 0.001 },
    // kPa -> hPa
    Group { prefix: "pressure", sensor_type: SensorType::Pressure, label: "Pressure sensor", axes: false, unit: 10.0 },
];

#[derive(Debug, Clone)]
enum Source {
    /// `in_<g>_{x,y,z}_raw`, scaled
    Axes { raw: [PathBuf; 3], scale: f64, offset: f64 },
    /// `in_<g>_raw`, scaled
    Raw { raw: PathBuf, scale: f64, offset: f64 },
    /// `in_<g>_input`, already in IIO units
    Input { input: PathBuf },
}

#[derive(Debug, Clone)]
struct IioChannel {
    handle: i32,
    sensor_type: SensorType,
    unit: f64,
    source: Source,
}

pub struct IioModule {
    descriptors: Vec<SensorDescriptor>,
    channels: Vec<IioChannel>,
}

async fn read_attr(path: &Path) -> HalResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map(|s| s.trim().to_string())
        .map_err(|source| HalError::Io {
            path: path.display().to_string(),
            source,
        })
}

async fn read_number(path: &Path) -> HalResult<f64> {
    let text = read_attr(path).await?;
    text.parse::<f64>().map_err(|e| HalError::PollError {
        reason: format!("{}: '{}' is not a number ({})", path.display(), text, e),
    })
}

/// Read an optional numeric attribute, falling back to `default` when absent
async fn read_number_or(path: &Path, default: f64) -> HalResult<f64> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        read_number(path).await
    } else {
        Ok(default)
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn probe_group(dir: &Path, g: &Group) -> HalResult<Option<Source>> {
    let attr = |suffix: &str| dir.join(format!("in_{}_{}", g.prefix, suffix));

    if g.axes {
        let raw = [attr("x_raw"), attr("y_raw"), attr("z_raw")];
        if !(exists(&raw[0]).await && exists(&raw[1]).await && exists(&raw[2]).await) {
            return Ok(None);
        }
        let scale = if exists(&attr("scale")).await {
            read_number(&attr("scale")).await?
        } else {
            read_number_or(&attr("x_scale"), 1.0).await?
        };
        let offset = read_number_or(&attr("offset"), 0.0).await?;
        return Ok(Some(Source::Axes { raw, scale, offset }));
    }

    if exists(&attr("input")).await {
        return Ok(Some(Source::Input { input: attr("input") }));
    }
    if exists(&attr("raw")).await {
        let scale = read_number_or(&attr("scale"), 1.0).await?;
        let offset = read_number_or(&attr("offset"), 0.0).await?;
        return Ok(Some(Source::Raw { raw: attr("raw"), scale, offset }));
    }
    Ok(None)
}

impl IioModule {
    /// Enumerate every IIO device under `root`
    pub async fn scan(root: &str) -> HalResult<Self> {
        let io_err = |source| HalError::Io {
            path: root.to_string(),
            source,
        };
        let mut entries = tokio::fs::read_dir(root).await.map_err(io_err)?;
        let mut devices = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("iio:device") {
                devices.push((name, entry.path()));
            }
        }
        // iio:device2 before iio:device10
        devices.sort_by_key(|(name, _)| {
            name.trim_start_matches("iio:device").parse::<u32>().unwrap_or(u32::MAX)
        });

        let mut descriptors = Vec::new();
        let mut channels = Vec::new();
        let mut handle = 1;
        for (dev_name, dir) in devices {
            let chip = read_attr(&dir.join("name")).await.unwrap_or_else(|_| dev_name.clone());
            for g in GROUPS {
                let Some(source) = probe_group(&dir, g).await? else {
                    continue;
                };
                let resolution = match &source {
                    Source::Axes { scale, .. } | Source::Raw { scale, .. } => (scale * g.unit) as f32,
                    Source::Input { .. } => 0.0,
                };
                debug!("[hal:iio] {} ({}): {} -> handle {}", dev_name, chip, g.prefix, handle);
                descriptors.push(SensorDescriptor {
                    name: format!("{} {}", chip, g.label),
                    vendor: format!("Linux IIO ({})", dev_name),
                    version: 1,
                    handle,
                    sensor_type: g.sensor_type,
                    max_range: 0.0,
                    resolution,
                    power: 0.0,
                });
                channels.push(IioChannel {
                    handle,
                    sensor_type: g.sensor_type,
                    unit: g.unit,
                    source,
                });
                handle += 1;
            }
        }
        info!("[hal:iio] found {} channel group(s) under {}", channels.len(), root);
        Ok(Self { descriptors, channels })
    }
}

impl SensorsModule for IioModule {
    fn name(&self) -> &str {
        "iio"
    }

    fn sensors_list(&self) -> &[SensorDescriptor] {
        &self.descriptors
    }

    fn open(&mut self) -> HalResult<Box<dyn PollDevice>> {
        Ok(Box::new(IioDevice {
            sampler: Sampler::new(self.channels.iter().map(|c| c.handle)),
            channels: self.channels.clone(),
        }))
    }
}

struct IioDevice {
    sampler: Sampler,
    channels: Vec<IioChannel>,
}

async fn sample(channel: &IioChannel) -> HalResult<EventPayload> {
    let u = channel.unit;
    let payload = match &channel.source {
        Source::Axes { raw, scale, offset } => {
            let mut v = [0f32; 3];
            for (slot, path) in v.iter_mut().zip(raw.iter()) {
                *slot = ((read_number(path).await? + offset) * scale * u) as f32;
            }
            EventPayload::Vector {
                x: v[0],
                y: v[1],
                z: v[2],
                status: SENSOR_STATUS_ACCURACY_HIGH,
            }
        }
        Source::Raw { raw, scale, offset } => {
            EventPayload::Scalar(((read_number(raw).await? + offset) * scale * u) as f32)
        }
        Source::Input { input } => EventPayload::Scalar((read_number(input).await? * u) as f32),
    };
    Ok(payload)
}

#[async_trait]
impl PollDevice for IioDevice {
    async fn activate(&mut self, handle: i32, enabled: bool) -> HalResult<()> {
        self.sampler.set_enabled(handle, enabled)
    }

    async fn set_delay(&mut self, handle: i32, interval_ns: i64) -> HalResult<()> {
        self.sampler.set_period(handle, interval_ns)
    }

    async fn poll(&mut self, buffer: &mut [SensorEvent]) -> HalResult<usize> {
        let due = self.sampler.wait_due(buffer.len()).await;
        let mut n = 0;
        for handle in due {
            let Some(channel) = self.channels.iter().find(|c| c.handle == handle) else {
                continue;
            };
            let payload = sample(channel).await?;
            buffer[n] = SensorEvent::new(handle, channel.sensor_type, timestamp_ns(), payload);
            n += 1;
        }
        Ok(n)
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
    use std::fs;

    fn write(dir: &Path, name: &str, value: &str) {
        fs::write(dir.join(name), format!("{}\n", value)).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();

        let imu = root.path().join("iio:device0");
        fs::create_dir(&imu).unwrap();
        write(&imu, "name", "lsm6dsl");
        write(&imu, "in_accel_x_raw", "100");
        write(&imu, "in_accel_y_raw", "-100");
        write(&imu, "in_accel_z_raw", "16384");
        write(&imu, "in_accel_scale", "0.000598");

        let als = root.path().join("iio:device10");
        fs::create_dir(&als).unwrap();
        write(&als, "name", "vcnl4000");
        write(&als, "in_illuminance_raw", "50");
        write(&als, "in_illuminance_scale", "0.25");
        write(&als, "in_proximity_raw", "7");

        let thermo = root.path().join("iio:device2");
        fs::create_dir(&thermo).unwrap();
        write(&thermo, "name", "tmp108");
        write(&thermo, "in_temp_input", "24500");

        fs::create_dir(root.path().join("trigger0")).unwrap();
        root
    }

    #[tokio::test]
    async fn test_scan_enumerates_groups_in_device_order() {
        let root = fixture();
        let module = IioModule::scan(root.path().to_str().unwrap()).await.unwrap();
        let list = module.sensors_list();

        let summary: Vec<(i32, SensorType)> = list.iter().map(|d| (d.handle, d.sensor_type)).collect();
        assert_eq!(
            summary,
            vec![
                (1, SensorType::Accelerometer),
                (2, SensorType::Temperature),
                (3, SensorType::Light),
                (4, SensorType::Proximity),
            ]
        );
        assert_eq!(list[0].name, "lsm6dsl Accelerometer");
        assert_eq!(list[0].vendor, "Linux IIO (iio:device0)");
        assert!((list[2].resolution - 0.25).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_poll_converts_units() {
        let root = fixture();
        let mut module = IioModule::scan(root.path().to_str().unwrap()).await.unwrap();
        let mut device = module.open().unwrap();
        device.activate(1, true).await.unwrap();
        device.activate(2, true).await.unwrap();
        device.set_delay(1, 1_000_000).await.unwrap();

        let mut buffer = [SensorEvent::default(); 16];
        let n = device.poll(&mut buffer).await.unwrap();
        assert_eq!(n, 2);

        match buffer[0].payload {
            EventPayload::Vector { x, y, z, .. } => {
                assert!((x - 0.0598).abs() < 1e-4);
                assert!((y + 0.0598).abs() < 1e-4);
                assert!((z - 9.797).abs() < 1e-2);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(buffer[1].sensor_type, SensorType::Temperature);
        assert!(matches!(buffer[1].payload, EventPayload::Scalar(t) if (t - 24.5).abs() < 1e-4));
    }

    #[tokio::test]
    async fn test_missing_root_is_io_error() {
        let err = IioModule::scan("/nonexistent/iio").await.err();
        assert!(matches!(err, Some(HalError::Io { .. })));
    }
}
