pub mod bus;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod errors;
pub mod hal;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use config::{load_session_config, SessionConfig};
pub use errors::{HalError, HalResult};
pub use hal::{load_module, PollDevice, SensorDescriptor, SensorEvent, SensorType, SensorsModule};
pub use session::{run_session, SessionSummary, StopReason};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize tracing on stderr, leaving stdout to sensor output
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("[nusensors] failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("[nusensors] failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("[nusensors] shutdown signal received");
}

/// Load configuration from `config_path`, discover the sensors module and run
/// one session, printing to stdout.
pub async fn run_nusensors(config_path: &str, args: Vec<String>) -> Result<SessionSummary, Box<dyn std::error::Error>> {
    info!("[nusensors] version {}", env!("CARGO_PKG_VERSION"));

    let config = load_session_config(config_path)?;
    let mut module = load_module(&config.hal).await.map_err(|e| {
        error!("[nusensors] hw_get_module() failed: {}", e);
        e
    })?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = run_session(module.as_mut(), args, &config, &mut out, shutdown_signal()).await?;
    Ok(summary)
}
