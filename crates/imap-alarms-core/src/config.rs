// ── Runtime bridge configuration ──
//
// These types describe how to reach the alarm service and how the local
// mailbox is set up. They carry credentials and tuning but never touch
// disk: the config crate resolves a `BridgeConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use imap_alarms_api::{Credentials, RetryPolicy, TlsMode, TransportConfig};

/// Basic-auth credentials for the alarm service.
#[derive(Debug, Clone)]
pub struct RemoteCredentials {
    pub username: String,
    pub password: SecretString,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// What a failed alarm fetch does to the periodic task.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Log a warning and try again on the next tick.
    #[default]
    Skip,
    /// Stop the bridge and surface the error.
    Fatal,
}

/// Local mailbox account the alarms are mirrored into.
#[derive(Debug, Clone)]
pub struct MailboxSettings {
    /// Advertised IMAP port. Only logged: no IMAP listener is started.
    pub port: u16,
    pub login: String,
    pub password: SecretString,
    /// Account address; also sender address and recipient of every message.
    pub email: String,
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            port: 1993,
            login: "username".into(),
            password: SecretString::from("secret".to_owned()),
            email: "imap-alarms@opennms.org".into(),
        }
    }
}

/// Everything a `Bridge` needs.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Alarm service root, e.g. `http://localhost:8980/opennms`.
    pub url: Url,
    pub credentials: Option<RemoteCredentials>,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries for transient failures, per request.
    pub retries: u32,
    /// Linear backoff step between retries.
    pub retry_backoff: Duration,
    /// Reconciliation period.
    pub delay: Duration,
    pub on_fetch_error: FetchErrorPolicy,
    pub mailbox: MailboxSettings,
}

impl BridgeConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            credentials: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_backoff: Duration::from_millis(500),
            delay: Duration::from_secs(15),
            on_fetch_error: FetchErrorPolicy::default(),
            mailbox: MailboxSettings::default(),
        }
    }

    /// HTTP transport settings for `imap_alarms_api::AlarmClient`.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
            retry: RetryPolicy {
                attempts: self.retries,
                backoff: self.retry_backoff,
            },
        }
    }

    pub(crate) fn api_credentials(&self) -> Option<Credentials> {
        self.credentials.as_ref().map(|c| Credentials {
            username: c.username.clone(),
            password: c.password.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fetch_policy_parses_case_insensitively() {
        assert_eq!("skip".parse::<FetchErrorPolicy>().unwrap(), FetchErrorPolicy::Skip);
        assert_eq!("FATAL".parse::<FetchErrorPolicy>().unwrap(), FetchErrorPolicy::Fatal);
        assert!("abort".parse::<FetchErrorPolicy>().is_err());
        assert_eq!(FetchErrorPolicy::Fatal.to_string(), "fatal");
    }

    #[test]
    fn transport_carries_timeout_and_retry() {
        let mut config = BridgeConfig::new("http://localhost:8980/opennms".parse().unwrap());
        config.retries = 4;
        config.tls = TlsVerification::DangerAcceptInvalid;

        let transport = config.transport();
        assert_eq!(transport.timeout, Duration::from_secs(30));
        assert_eq!(transport.retry.attempts, 4);
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
    }
}
