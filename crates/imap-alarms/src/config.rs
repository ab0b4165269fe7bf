//! CLI glue over `imap_alarms_config`: turns global flags into the top
//! configuration layer and loads the effective settings.

use imap_alarms_config::{Overrides, Settings};
use imap_alarms_core::FetchErrorPolicy;

use crate::cli::{FetchErrorMode, GlobalOpts};
use crate::error::CliError;

/// Only flags actually given on the command line become overrides.
pub fn overrides(global: &GlobalOpts) -> Overrides {
    Overrides {
        url: global.url.clone(),
        username: global.username.clone(),
        password: global.password.clone(),
        insecure: global.insecure.then_some(true),
        imap_port: global.imap_port,
        imap_username: global.imap_username.clone(),
        imap_password: global.imap_password.clone(),
        imap_email: global.imap_email.clone(),
        verbose: (global.verbose > 0).then_some(true),
        delay: global.delay,
        timeout: global.timeout,
        on_fetch_error: global.on_fetch_error.map(|mode| match mode {
            FetchErrorMode::Skip => FetchErrorPolicy::Skip,
            FetchErrorMode::Fatal => FetchErrorPolicy::Fatal,
        }),
    }
}

/// Load settings from file, environment and flags.
pub fn load(global: &GlobalOpts) -> Result<Settings, CliError> {
    let settings = imap_alarms_config::load_settings(global.config.as_deref(), &overrides(global))?;
    tracing::debug!(url = %settings.url, delay = settings.delay, "configuration loaded");
    Ok(settings)
}
