use crate::hal::{EventPayload, SensorDescriptor, SensorEvent, SensorType};
use serde::Serialize;
use std::io::{self, Write};
use tracing::debug;

/// Short label printed in event lines
pub fn sensor_label(sensor_type: SensorType) -> &'static str {
    match sensor_type {
        SensorType::Accelerometer => "Acc",
        SensorType::MagneticField => "Mag",
        SensorType::Orientation => "Ori",
        SensorType::Proximity => "Prx",
        SensorType::Temperature => "Tmp",
        SensorType::Light => "Lux",
        SensorType::Gyroscope => "gyro",
        SensorType::LinearAcceleration => "linear accel",
        SensorType::Gravity => "gravity",
        SensorType::RotationVector => "rotation",
        SensorType::RelativeHumidity => "humidity",
        SensorType::AmbientTemperature => "temp",
        SensorType::Pressure => "pressure",
        SensorType::Unknown(code) => {
            debug!("[report] sensor type {}", code);
            "ukn"
        }
    }
}

/// Dump one descriptor: its name, then one indented line per field
pub fn write_descriptor<W: Write>(out: &mut W, d: &SensorDescriptor) -> io::Result<()> {
    writeln!(out, "{}", d.name)?;
    writeln!(out, "\tvendor: {}", d.vendor)?;
    writeln!(out, "\tversion: {}", d.version)?;
    writeln!(out, "\thandle: {}", d.handle)?;
    writeln!(out, "\ttype: {}", d.sensor_type.code())?;
    writeln!(out, "\tmaxRange: {}", d.max_range)?;
    writeln!(out, "\tresolution: {}", d.resolution)?;
    writeln!(out, "\tpower: {} mA", d.power)
}

/// JSON-lines rendering of a descriptor
pub fn write_descriptor_json<W: Write>(out: &mut W, d: &SensorDescriptor) -> io::Result<()> {
    serde_json::to_writer(&mut *out, d)?;
    writeln!(out)
}

/// Text line for an event, or `None` when its payload has no printable shape.
/// Not-a-number values print as `nan`.
pub fn format_event(ev: &SensorEvent) -> Option<String> {
    let label = sensor_label(ev.sensor_type);
    let line = match ev.payload {
        EventPayload::Vector { x, y, z, status } => Some(format!(
            "sensor={}, time={}, value=<{:5.1},{:5.1},{:5.1}, status={}>",
            label, ev.timestamp, x, y, z, status
        )),
        EventPayload::Orientation { azimuth, pitch, roll, status } => Some(format!(
            "sensor={}, time={}, value=<{:5.1},{:5.1},{:5.1}, status={}>",
            label, ev.timestamp, azimuth, pitch, roll, status
        )),
        EventPayload::Scalar(value) => Some(format!(
            "sensor={}, time={}, value={:.6}",
            label, ev.timestamp, value
        )),
        EventPayload::Rotation { .. } | EventPayload::Empty => None,
    };
    line.map(|l| l.replace("NaN", "nan"))
}

#[derive(Serialize)]
struct EventRecord<'a> {
    sensor: &'a str,
    handle: i32,
    #[serde(rename = "type")]
    type_code: i32,
    time: i64,
    #[serde(flatten)]
    payload: &'a EventPayload,
}

/// JSON-lines rendering of an event
pub fn format_event_json(ev: &SensorEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(&EventRecord {
        sensor: sensor_label(ev.sensor_type),
        handle: ev.sensor,
        type_code: ev.sensor_type.code(),
        time: ev.timestamp,
        payload: &ev.payload,
    })
}
