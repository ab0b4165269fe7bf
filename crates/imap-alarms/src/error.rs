//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use imap_alarms_config::ConfigError;
use imap_alarms_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const AUTH: i32 = 3;
    pub const CONFIG: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid configuration value for {field}: {reason}")]
    #[diagnostic(
        code(imap_alarms::invalid_config),
        help("Fix `{field}` in imap-alarms.toml, the IMAP_ALARMS_* environment or the command line.")
    )]
    Validation { field: String, reason: String },

    #[error("Could not load configuration")]
    #[diagnostic(
        code(imap_alarms::config),
        help("Check the config file syntax and the IMAP_ALARMS_* environment variables.")
    )]
    Config(#[source] ConfigError),

    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach OpenNMS at {url}")]
    #[diagnostic(
        code(imap_alarms::connection_failed),
        help(
            "Check that OpenNMS is running and reachable.\n\
             URL: {url}\n\
             Use --insecure (-k) for self-signed certificates."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("OpenNMS rejected the credentials: {message}")]
    #[diagnostic(
        code(imap_alarms::auth_failed),
        help("Set `username` and `password`, or pass --username / --password.")
    )]
    AuthFailed { message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(imap_alarms::timeout),
        help("Increase the timeout with --timeout or check OpenNMS responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Everything else ──────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(imap_alarms::bridge))]
    Bridge(CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Bridge(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "url".into(),
                reason: message,
            },
            other => CliError::Bridge(other),
        }
    }
}
