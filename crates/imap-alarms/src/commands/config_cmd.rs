//! `imap-alarms config`: print the effective configuration.

use imap_alarms_config::Settings;

use crate::error::CliError;

/// Validates first, so a broken value fails here rather than at `run`.
pub fn handle(settings: &Settings) -> Result<(), CliError> {
    settings.to_bridge_config()?;
    print!("{}", settings.to_redacted_toml()?);
    Ok(())
}
