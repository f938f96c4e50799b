//! Simulated sensors module.
//!
//! Exposes a phone-like sensor list and produces synthetic samples at each handle's
//! interval. A [`SimController`] observes the device calls and can queue scripted
//! event batches or inject failures, which makes the module double as a stub HAL.

use super::sampler::Sampler;
use super::{
    timestamp_ns, EventPayload, PollDevice, SensorDescriptor, SensorEvent, SensorType, SensorsModule,
    SENSOR_STATUS_ACCURACY_HIGH,
};
use crate::errors::{HalError, HalResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, trace};

/// One call observed by the simulated device
#[derive(Clone, Debug, PartialEq)]
pub enum HalCall {
    Open,
    Activate { handle: i32, enabled: bool },
    SetDelay { handle: i32, interval_ns: i64 },
    Poll,
    Close,
}

#[derive(Debug, Default)]
struct SimState {
    calls: Vec<HalCall>,
    batches: VecDeque<Vec<SensorEvent>>,
    fail_open: bool,
    fail_activate: Option<i32>,
    fail_deactivate: Option<i32>,
    fail_poll: bool,
    fail_close: bool,
}

/// Shared handle onto a simulated module's state
#[derive(Clone, Debug, Default)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimController {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A poisoned lock only means a test panicked mid-call; the state is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every device call seen so far, in order
    pub fn calls(&self) -> Vec<HalCall> {
        self.lock().calls.clone()
    }

    /// Handles that received `activate(handle, enabled)`
    pub fn activated(&self, enabled: bool) -> Vec<i32> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                HalCall::Activate { handle, enabled: e } if *e == enabled => Some(*handle),
                _ => None,
            })
            .collect()
    }

    /// Queue a batch returned verbatim by a later poll
    pub fn push_batch(&self, batch: Vec<SensorEvent>) {
        self.lock().batches.push_back(batch);
    }

    pub fn fail_open(&self) {
        self.lock().fail_open = true;
    }

    pub fn fail_activate(&self, handle: i32) {
        self.lock().fail_activate = Some(handle);
    }

    pub fn fail_deactivate(&self, handle: i32) {
        self.lock().fail_deactivate = Some(handle);
    }

    pub fn fail_poll(&self) {
        self.lock().fail_poll = true;
    }

    pub fn fail_close(&self) {
        self.lock().fail_close = true;
    }

    fn record(&self, call: HalCall) {
        trace!("[sim] {:?}", call);
        self.lock().calls.push(call);
    }
}

fn descriptor(name: &str, handle: i32, sensor_type: SensorType, max_range: f32, resolution: f32, power: f32) -> SensorDescriptor {
    SensorDescriptor {
        name: name.to_string(),
        vendor: "nusensors simulator".to_string(),
        version: 1,
        handle,
        sensor_type,
        max_range,
        resolution,
        power,
    }
}

/// The sensor list exposed by [`SimModule::new`]
pub fn default_sensors() -> Vec<SensorDescriptor> {
    vec![
        descriptor("Sim 3-axis Accelerometer", 1, SensorType::Accelerometer, 39.226_6, 0.009_58, 0.23),
        descriptor("Sim 3-axis Magnetic field sensor", 2, SensorType::MagneticField, 2000.0, 0.0625, 6.8),
        descriptor("Sim Orientation sensor", 3, SensorType::Orientation, 360.0, 0.015_625, 7.03),
        descriptor("Sim 3-axis Gyroscope", 4, SensorType::Gyroscope, 34.906_6, 0.001_066, 6.1),
        descriptor("Sim Light sensor", 5, SensorType::Light, 10_000.0, 1.0, 0.13),
        descriptor("Sim Proximity sensor", 6, SensorType::Proximity, 5.0, 5.0, 0.13),
        descriptor("Sim Temperature sensor", 7, SensorType::Temperature, 85.0, 0.1, 0.01),
        descriptor("Sim Pressure sensor", 8, SensorType::Pressure, 1260.0, 0.01, 0.02),
    ]
}

pub struct SimModule {
    descriptors: Vec<SensorDescriptor>,
    controller: SimController,
}

impl SimModule {
    pub fn new() -> Self {
        Self::with_sensors(default_sensors())
    }

    pub fn with_sensors(descriptors: Vec<SensorDescriptor>) -> Self {
        Self {
            descriptors,
            controller: SimController::default(),
        }
    }

    pub fn controller(&self) -> SimController {
        self.controller.clone()
    }
}

impl Default for SimModule {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorsModule for SimModule {
    fn name(&self) -> &str {
        "sim"
    }

    fn sensors_list(&self) -> &[SensorDescriptor] {
        &self.descriptors
    }

    fn open(&mut self) -> HalResult<Box<dyn PollDevice>> {
        self.controller.record(HalCall::Open);
        if self.controller.lock().fail_open {
            return Err(HalError::OpenError {
                reason: "simulated open failure".to_string(),
            });
        }
        Ok(Box::new(SimDevice {
            sampler: Sampler::new(self.descriptors.iter().map(|d| d.handle)),
            descriptors: self.descriptors.clone(),
            controller: self.controller.clone(),
            started: Instant::now(),
        }))
    }
}

struct SimDevice {
    descriptors: Vec<SensorDescriptor>,
    sampler: Sampler,
    controller: SimController,
    started: Instant,
}

impl SimDevice {
    fn synthesize(&self, d: &SensorDescriptor) -> SensorEvent {
        let t = self.started.elapsed().as_secs_f32();
        let payload = match d.sensor_type {
            SensorType::Accelerometer => EventPayload::Vector {
                x: 0.3 * t.sin(),
                y: 0.3 * t.cos(),
                z: 9.81,
                status: SENSOR_STATUS_ACCURACY_HIGH,
            },
            SensorType::MagneticField => EventPayload::Vector {
                x: 22.0 + t.sin(),
                y: -5.0,
                z: -40.0 + t.cos(),
                status: SENSOR_STATUS_ACCURACY_HIGH,
            },
            SensorType::Gyroscope => EventPayload::Vector {
                x: 0.01 * t.sin(),
                y: 0.0,
                z: -0.01 * t.cos(),
                status: SENSOR_STATUS_ACCURACY_HIGH,
            },
            SensorType::Orientation => EventPayload::Orientation {
                azimuth: (t * 10.0) % 360.0,
                pitch: 5.0 * t.sin(),
                roll: 5.0 * t.cos(),
                status: SENSOR_STATUS_ACCURACY_HIGH,
            },
            SensorType::Light => EventPayload::Scalar(120.0 + 20.0 * t.sin()),
            SensorType::Proximity => EventPayload::Scalar(if (t as u64 / 2) % 2 == 0 { d.max_range } else { 0.0 }),
            SensorType::Temperature => EventPayload::Scalar(24.5),
            SensorType::Pressure => EventPayload::Scalar(1013.25),
            _ => EventPayload::Empty,
        };
        SensorEvent::new(d.handle, d.sensor_type, timestamp_ns(), payload)
    }
}

#[async_trait]
impl PollDevice for SimDevice {
    async fn activate(&mut self, handle: i32, enabled: bool) -> HalResult<()> {
        self.controller.record(HalCall::Activate { handle, enabled });
        let failing = {
            let state = self.controller.lock();
            if enabled {
                state.fail_activate
            } else {
                state.fail_deactivate
            }
        };
        if failing == Some(handle) {
            return Err(HalError::ActivateError {
                handle,
                reason: format!("simulated {} failure", if enabled { "activation" } else { "deactivation" }),
            });
        }
        self.sampler.set_enabled(handle, enabled)
    }

    async fn set_delay(&mut self, handle: i32, interval_ns: i64) -> HalResult<()> {
        self.controller.record(HalCall::SetDelay { handle, interval_ns });
        self.sampler.set_period(handle, interval_ns)
    }

    async fn poll(&mut self, buffer: &mut [SensorEvent]) -> HalResult<usize> {
        self.controller.record(HalCall::Poll);
        let scripted = {
            let mut state = self.controller.lock();
            if state.fail_poll {
                return Err(HalError::PollError {
                    reason: "simulated poll failure".to_string(),
                });
            }
            state.batches.pop_front()
        };

        if let Some(mut batch) = scripted {
            let n = batch.len().min(buffer.len());
            buffer[..n].copy_from_slice(&batch[..n]);
            if batch.len() > n {
                let rest = batch.split_off(n);
                self.controller.lock().batches.push_front(rest);
            }
            debug!("[sim] delivered {} scripted event(s)", n);
            return Ok(n);
        }

        let due = self.sampler.wait_due(buffer.len()).await;
        let mut n = 0;
        for handle in due {
            if let Some(d) = self.descriptors.iter().find(|d| d.handle == handle) {
                buffer[n] = self.synthesize(d);
                n += 1;
            }
        }
        Ok(n)
    }

    async fn close(&mut self) -> HalResult<()> {
        self.controller.record(HalCall::Close);
        if self.controller.lock().fail_close {
            return Err(HalError::CloseError {
                reason: "simulated close failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_events_follow_activation() {
        let mut module = SimModule::new();
        let mut device = module.open().unwrap();
        device.activate(1, true).await.unwrap();
        device.set_delay(1, 1_000_000).await.unwrap();

        let mut buffer = [SensorEvent::default(); 16];
        let n = device.poll(&mut buffer).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(buffer[0].sensor, 1);
        assert_eq!(buffer[0].sensor_type, SensorType::Accelerometer);
        assert!(matches!(buffer[0].payload, EventPayload::Vector { z, .. } if z == 9.81));
    }

    #[tokio::test]
    async fn test_scripted_batch_split_by_capacity() {
        let mut module = SimModule::new();
        let controller = module.controller();
        let ev = SensorEvent::new(5, SensorType::Light, 1, EventPayload::Scalar(1.0));
        controller.push_batch(vec![ev; 3]);

        let mut device = module.open().unwrap();
        let mut buffer = [SensorEvent::default(); 2];
        assert_eq!(device.poll(&mut buffer).await.unwrap(), 2);
        assert_eq!(device.poll(&mut buffer).await.unwrap(), 1);
        assert_eq!(
            controller.calls(),
            vec![HalCall::Open, HalCall::Poll, HalCall::Poll]
        );
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mut module = SimModule::new();
        let controller = module.controller();
        controller.fail_activate(2);
        controller.fail_poll();
        let mut device = module.open().unwrap();
        assert!(device.activate(1, true).await.is_ok());
        assert!(matches!(device.activate(2, true).await, Err(HalError::ActivateError { handle: 2, .. })));
        let mut buffer = [SensorEvent::default(); 4];
        assert!(matches!(device.poll(&mut buffer).await, Err(HalError::PollError { .. })));
        assert_eq!(controller.activated(true), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_small_buffer_serves_every_due_sensor() {
        let mut module = SimModule::with_sensors(vec![
            descriptor("accel-a", 1, SensorType::Accelerometer, 1.0, 1.0, 1.0),
            descriptor("accel-b", 2, SensorType::Accelerometer, 1.0, 1.0, 1.0),
        ]);
        let mut device = module.open().unwrap();
        for handle in [1, 2] {
            device.activate(handle, true).await.unwrap();
            device.set_delay(handle, 1_000_000).await.unwrap();
        }

        let mut buffer = [SensorEvent::default(); 1];
        let mut seen = Vec::new();
        for _ in 0..20 {
            assert_eq!(device.poll(&mut buffer).await.unwrap(), 1);
            seen.push(buffer[0].sensor);
        }
        assert!(seen.contains(&1));
        assert!(seen.contains(&2));
    }

    #[tokio::test]
    async fn test_fail_deactivate_only_hits_disable() {
        let mut module = SimModule::new();
        let controller = module.controller();
        controller.fail_deactivate(1);
        let mut device = module.open().unwrap();
        assert!(device.activate(1, true).await.is_ok());
        assert!(matches!(device.activate(1, false).await, Err(HalError::ActivateError { handle: 1, .. })));
        assert!(device.activate(2, false).await.is_ok());
    }

    #[test]
    fn test_fail_open() {
        let mut module = SimModule::new();
        module.controller().fail_open();
        assert!(matches!(module.open(), Err(HalError::OpenError { .. })));
    }
}
