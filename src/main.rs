use nusensors::{config::config_dir, init_tracing, run_nusensors};
use tracing::error;

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = config_dir();

    // Failures are logged only; the exit status is always 0
    if let Err(e) = run_nusensors(&config_path, args).await {
        error!("[nusensors] {}", e);
    }
}
