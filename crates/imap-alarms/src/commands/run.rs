//! `imap-alarms run`: keep the mailbox in step until Ctrl-C.

use imap_alarms_config::Settings;
use imap_alarms_core::Bridge;
use tracing::{info, warn};

use crate::error::CliError;

pub async fn handle(settings: &Settings) -> Result<(), CliError> {
    let config = settings.to_bridge_config()?;
    info!(
        url = %config.url,
        delay_secs = config.delay.as_secs(),
        on_fetch_error = %config.on_fetch_error,
        "starting imap-alarms"
    );

    let bridge = Bridge::from_config(config)?;
    bridge.run(shutdown_signal()).await?;
    info!("imap-alarms stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
