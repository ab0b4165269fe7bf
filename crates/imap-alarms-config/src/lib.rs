//! Configuration for the imap-alarms bridge.
//!
//! Settings are layered with figment, later layers winning: built-in
//! defaults, the TOML file, `IMAP_ALARMS_*` environment variables, then
//! command-line overrides. The result is translated into
//! `imap_alarms_core::BridgeConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use imap_alarms_core::{
    BridgeConfig, FetchErrorPolicy, MailboxSettings, RemoteCredentials, TlsVerification,
};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "imap-alarms.toml";

/// Prefix of the environment variables read as configuration.
pub const ENV_PREFIX: &str = "IMAP_ALARMS_";

const REDACTED: &str = "********";

/// Free-text keys. `Env` would turn `IMAP_ALARMS_PASSWORD=123456` into an
/// integer, so these are re-read verbatim.
const STRING_ENV_KEYS: &[&str] = &[
    "url",
    "username",
    "password",
    "imap_username",
    "imap_password",
    "imap_email",
];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Flat key set shared by the TOML file, the environment and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Alarm service root URL.
    pub url: String,
    /// Basic-auth user for the alarm service.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Accept invalid TLS certificates from the alarm service.
    pub insecure: bool,

    pub imap_port: u16,
    pub imap_username: String,
    pub imap_password: String,
    pub imap_email: String,

    pub verbose: bool,
    /// Seconds between reconciliation cycles.
    pub delay: u64,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub on_fetch_error: FetchErrorPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8980/opennms".into(),
            username: None,
            password: None,
            insecure: false,
            imap_port: 1993,
            imap_username: "username".into(),
            imap_password: "secret".into(),
            imap_email: "imap-alarms@opennms.org".into(),
            verbose: false,
            delay: 15,
            timeout: 30,
            retries: 2,
            retry_backoff_ms: 500,
            on_fetch_error: FetchErrorPolicy::Skip,
        }
    }
}

impl Settings {
    /// Copy with every secret replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        Self {
            password: self.password.as_ref().map(|_| REDACTED.to_owned()),
            imap_password: REDACTED.to_owned(),
            ..self.clone()
        }
    }

    /// Effective settings as TOML, secrets redacted.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }

    /// Validate and translate into the runtime configuration.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let url: url::Url = self.url.parse().map_err(|e| ConfigError::Validation {
            field: "url".into(),
            reason: format!("{e}: {}", self.url),
        })?;
        if self.delay == 0 {
            return Err(ConfigError::Validation {
                field: "delay".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.imap_port == 0 {
            return Err(ConfigError::Validation {
                field: "imap_port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }

        let credentials = self.username.as_ref().map(|username| RemoteCredentials {
            username: username.clone(),
            password: SecretString::from(self.password.clone().unwrap_or_default()),
        });

        let mut config = BridgeConfig::new(url);
        config.credentials = credentials;
        config.tls = if self.insecure {
            TlsVerification::DangerAcceptInvalid
        } else {
            TlsVerification::SystemDefaults
        };
        config.timeout = Duration::from_secs(self.timeout);
        config.retries = self.retries;
        config.retry_backoff = Duration::from_millis(self.retry_backoff_ms);
        config.delay = Duration::from_secs(self.delay);
        config.on_fetch_error = self.on_fetch_error;
        config.mailbox = MailboxSettings {
            port: self.imap_port,
            login: self.imap_username.clone(),
            password: SecretString::from(self.imap_password.clone()),
            email: self.imap_email.clone(),
        };
        Ok(config)
    }
}

// ── Overrides ───────────────────────────────────────────────────────

/// Values set on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imap_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imap_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imap_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imap_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_fetch_error: Option<FetchErrorPolicy>,
}

// ── Loading ─────────────────────────────────────────────────────────

/// Build the layered figment without extracting it.
///
/// An explicit `path` must exist; the default file may be absent.
pub fn figment(path: Option<&Path>, overrides: &Overrides) -> Result<Figment, ConfigError> {
    let file = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };
    if file.exists() {
        debug!(path = %file.display(), "loading config file");
    } else {
        debug!(path = %file.display(), "no config file, using defaults");
    }

    Ok(Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(&file))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
        .merge(string_env())
        .merge(Serialized::globals(overrides)))
}

fn string_env() -> Serialized<BTreeMap<String, String>> {
    let values = Env::prefixed(ENV_PREFIX)
        .only(STRING_ENV_KEYS)
        .iter()
        .map(|(key, value)| (key.as_str().to_ascii_lowercase(), value))
        .collect();
    Serialized::defaults(values)
}

/// Load the effective settings.
pub fn load_settings(path: Option<&Path>, overrides: &Overrides) -> Result<Settings, ConfigError> {
    let settings: Settings = figment(path, overrides)?.extract()?;
    Ok(settings)
}
