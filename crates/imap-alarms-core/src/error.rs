// ── Core error types ──
//
// Errors surfaced by imap-alarms-core. The `From<imap_alarms_api::Error>`
// impl translates transport-layer failures into bridge-level variants so
// callers never match on HTTP details.

use thiserror::Error;

use crate::mailbox::MailboxError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Remote errors ────────────────────────────────────────────────
    #[error("Cannot reach alarm service at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Alarm service timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Mailbox errors ───────────────────────────────────────────────
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Bridge is not running")]
    NotRunning,

    #[error("Bridge is already running")]
    AlreadyRunning,

    #[error("Bridge has been shut down")]
    ShutDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::Api {
                    status: Some(429 | 502 | 503 | 504),
                    ..
                }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<imap_alarms_api::Error> for CoreError {
    fn from(err: imap_alarms_api::Error) -> Self {
        use imap_alarms_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::Status { status: 404, body } => CoreError::NotFound { message: body },
            Api::Status { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
