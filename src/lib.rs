//! Log Pilot: supervises a log-shipping agent and cleans up the collection
//! configs of terminated entities once their logs have been shipped.
//!
//! An external event source reports terminated entities (e.g., containers)
//! through [`pilot::Piloter::on_termination_event`]. A reconciliation watcher
//! periodically compares the agent's offset registry against the files each
//! tracked config collects and deletes configs that no longer guard unread data.
use pilot::{Pilot, Piloter};
use settings::Settings;

pub mod classifier;
pub mod config;
pub mod entity;
pub mod error;
pub mod fsutil;
pub mod pilot;
pub mod reconcile;
pub mod registry;
pub mod settings;
pub mod supervisor;

/// Builds a [`Pilot`] from `settings` and starts it.
///
/// # Errors
///
/// Returns an error if the agent cannot be launched.
pub fn start(settings: &Settings) -> Result<Pilot, pilot::Error> {
    let mut pilot = Pilot::new(
        settings.backend,
        settings.base_dir.clone(),
        settings.scan_interval,
    );
    log::info!(
        "starting {} pilot: base_dir=`{}`, conf_home=`{}`, scan_interval={:?}",
        pilot.name(),
        settings.base_dir.display(),
        pilot.conf_home().display(),
        settings.scan_interval
    );
    pilot.start()?;
    Ok(pilot)
}

/// Runs Log Pilot with settings taken from the environment.
///
/// Returns only when supervision of the agent ends.
///
/// # Errors
///
/// Possible errors include:
/// - Missing or unknown `PILOT_TYPE`.
/// - A missing or unreadable `PILOT_TEMPLATE`.
/// - The agent executable cannot be launched, initially or on restart.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    log::debug!("Config template: {}", settings.template.display());

    let mut pilot = start(&settings)?;
    pilot.wait().await?;

    // supervision only ends through an error
    Err(format!("{} exited unexpectedly", pilot.name()).into())
}
