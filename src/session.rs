//! The sensor session: enumerate, select, activate, poll, deactivate, close.

use crate::cli::parse_selection;
use crate::config::{OutputFormat, SessionConfig};
use crate::errors::{HalError, HalResult};
use crate::hal::{SensorDescriptor, SensorEvent, SensorType, SensorsModule, SENSORS_EVENT_VERSION};
use crate::report::{format_event, format_event_json, write_descriptor, write_descriptor_json};
use std::future::Future;
use std::io::Write;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Why the poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No flag selected a sensor type; nothing was activated
    NothingSelected,
    Shutdown,
    WindowElapsed,
    MaxPolls,
    PollFailed,
    /// Writing events to the output failed
    OutputFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub selected: Option<SensorType>,
    pub activated: Vec<i32>,
    pub polls: u64,
    pub printed: u64,
    pub dropped: u64,
    pub version_mismatches: u64,
    pub stop: StopReason,
}

impl SessionSummary {
    fn new(selected: Option<SensorType>, stop: StopReason) -> Self {
        Self {
            selected,
            activated: Vec::new(),
            polls: 0,
            printed: 0,
            dropped: 0,
            version_mismatches: 0,
            stop,
        }
    }
}

fn output_err(source: std::io::Error) -> HalError {
    HalError::Io {
        path: "<stdout>".to_string(),
        source,
    }
}

async fn window_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn dump_descriptors<W: Write>(out: &mut W, list: &[SensorDescriptor], format: OutputFormat) -> std::io::Result<()> {
    for d in list {
        match format {
            OutputFormat::Text => write_descriptor(out, d)?,
            OutputFormat::Json => write_descriptor_json(out, d)?,
        }
    }
    out.flush()
}

/// Print the events of `selected` from one poll's worth of events.
///
/// Processing of the batch stops at the first event whose version is not
/// [`SENSORS_EVENT_VERSION`].
fn print_batch<W: Write>(
    out: &mut W,
    events: &[SensorEvent],
    selected: SensorType,
    format: OutputFormat,
    summary: &mut SessionSummary,
) -> HalResult<()> {
    for ev in events {
        if ev.version != SENSORS_EVENT_VERSION {
            warn!(
                "[session] incorrect event version (version={}, expected={})",
                ev.version, SENSORS_EVENT_VERSION
            );
            summary.version_mismatches += 1;
            break;
        }
        if ev.sensor_type != selected {
            summary.dropped += 1;
            continue;
        }
        let line = match format {
            OutputFormat::Text => format_event(ev),
            OutputFormat::Json => Some(format_event_json(ev).map_err(|e| output_err(e.into()))?),
        };
        match line {
            Some(line) => {
                writeln!(out, "{}", line).map_err(output_err)?;
                summary.printed += 1;
            }
            None => summary.dropped += 1,
        }
    }
    out.flush().map_err(output_err)
}

/// Run one session against an already discovered module.
///
/// `args` are the command-line arguments after the program name. The poll loop
/// ends when `shutdown` resolves, when the configured window or poll count is
/// reached, or when a poll fails.
pub async fn run_session<I, S, W, F>(
    module: &mut dyn SensorsModule,
    args: I,
    config: &SessionConfig,
    out: &mut W,
    shutdown: F,
) -> HalResult<SessionSummary>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    W: Write,
    F: Future<Output = ()>,
{
    let settings = &config.session;
    let format = config.output.format;

    let mut device = module.open().map_err(|e| {
        error!("[session] sensors_open() failed: {}", e);
        e
    })?;

    let list = module.sensors_list();
    info!("[session] number of sensors found: {}", list.len());
    if let Err(e) = dump_descriptors(out, list, format) {
        error!("[session] failed to write sensor list: {}", e);
        if let Err(close_err) = device.close().await {
            error!("[session] sensors_close() failed: {}", close_err);
        }
        return Err(output_err(e));
    }

    let Some(selected) = parse_selection(args) else {
        warn!("[session] no sensor type selected (-a -m -o -p -t -l -g), nothing to poll");
        if let Err(e) = device.close().await {
            error!("[session] sensors_close() failed: {}", e);
        }
        return Ok(SessionSummary::new(None, StopReason::NothingSelected));
    };

    debug!("[session] settling for {:?}", settings.settle_delay());
    sleep(settings.settle_delay()).await;

    let mut summary = SessionSummary::new(Some(selected), StopReason::Shutdown);
    for d in list.iter().filter(|d| d.sensor_type == selected) {
        if let Err(e) = device.activate(d.handle, true).await {
            error!("[session] activate() failed for {}: {}", d.name, e);
            return Err(e);
        }
        summary.activated.push(d.handle);
        if let Err(e) = device.set_delay(d.handle, settings.sampling_interval_ns).await {
            warn!("[session] setDelay() failed for {}: {}", d.name, e);
        }
    }
    if summary.activated.is_empty() {
        warn!("[session] no sensor of the selected type; poll will wait for a shutdown signal");
    }
    info!(
        "[session] polling {} sensor(s), interval={}ns, capacity={}",
        summary.activated.len(),
        settings.sampling_interval_ns,
        settings.buffer_capacity
    );

    let mut buffer = vec![SensorEvent::default(); settings.buffer_capacity];
    let deadline = settings.window().map(|w| Instant::now() + w);
    tokio::pin!(shutdown);

    summary.stop = loop {
        if settings.max_polls.is_some_and(|max| summary.polls >= max) {
            break StopReason::MaxPolls;
        }
        let n = tokio::select! {
            biased;
            _ = &mut shutdown => break StopReason::Shutdown,
            _ = window_elapsed(deadline) => break StopReason::WindowElapsed,
            res = device.poll(&mut buffer[..]) => match res {
                Ok(n) => n,
                Err(e) => {
                    error!("[session] poll() failed: {}", e);
                    break StopReason::PollFailed;
                }
            },
        };
        summary.polls += 1;
        if let Err(e) = print_batch(out, &buffer[..n], selected, format, &mut summary) {
            error!("[session] failed to write events: {}", e);
            break StopReason::OutputFailed;
        }
    };
    info!(
        "[session] stopped ({:?}) after {} poll(s): printed={} dropped={} bad_version={}",
        summary.stop, summary.polls, summary.printed, summary.dropped, summary.version_mismatches
    );

    for d in list.iter().filter(|d| summary.activated.contains(&d.handle)) {
        if let Err(e) = device.activate(d.handle, false).await {
            error!("[session] deactivate() for '{}' failed: {}", d.name, e);
            return Err(e);
        }
    }

    if let Err(e) = device.close().await {
        error!("[session] sensors_close() failed: {}", e);
    }
    Ok(summary)
}
