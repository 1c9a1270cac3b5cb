/// Entry point for Log Pilot.
///
/// Starts the log-shipping agent selected by `PILOT_TYPE`, restarts it whenever
/// it exits, and removes configs of terminated entities once their logs are
/// shipped. `RUST_LOG` controls the log level (default `info`).
///
/// # Errors
///
/// Returns an error if the backend selection is invalid or the agent cannot be
/// started.
///
/// # Examples
///
/// ```bash
/// PILOT_TYPE=filebeat PILOT_BASE_DIR=/host cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log_pilot::run().await
}
