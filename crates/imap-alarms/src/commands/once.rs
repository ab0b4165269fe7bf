//! `imap-alarms once`: a single reconciliation cycle.

use imap_alarms_config::Settings;
use imap_alarms_core::Bridge;

use crate::error::CliError;

pub async fn handle(settings: &Settings) -> Result<(), CliError> {
    let bridge = Bridge::from_config(settings.to_bridge_config()?)?;
    let report = bridge.run_once().await;
    bridge.shutdown().await;

    let report = report?;
    println!(
        "added {}, updated {}, removed {}, errors {}",
        report.added, report.updated, report.removed, report.errors
    );
    Ok(())
}
