// ── Alarm domain types ──

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumString;

use super::ids::AlarmId;

/// Alarm severity as reported by the remote side.
///
/// Parsing is case-insensitive; anything unrecognised is kept verbatim
/// in [`Severity::Other`] so the subject line still shows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    Indeterminate,
    Cleared,
    Normal,
    Warning,
    Minor,
    Major,
    Critical,
    #[strum(default)]
    Other(String),
}

impl Severity {
    /// Parse a raw severity string, never failing.
    pub fn parse(raw: &str) -> Self {
        Self::from_str(raw.trim()).unwrap_or_else(|_| Self::Other(raw.trim().to_owned()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Indeterminate => "INDETERMINATE",
            Self::Cleared => "CLEARED",
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Critical => "CRITICAL",
            Self::Other(raw) => raw,
        };
        f.write_str(label)
    }
}

/// Snapshot of one remote alarm, taken during a single fetch.
///
/// Never patched in place: the next fetch supersedes it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub severity: Severity,
    pub log_message: String,
    pub description: String,
    pub acknowledged: bool,
    pub first_event_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub node_label: Option<String>,
    pub ack_user: Option<String>,
}

impl Alarm {
    /// Log message with line breaks and surrounding whitespace removed,
    /// safe to embed in a header or a log line.
    pub fn clean_message(&self) -> String {
        sanitize(&self.log_message)
    }
}

/// Strip CR/LF characters and surrounding whitespace.
pub fn sanitize(raw: &str) -> String {
    raw.replace(['\r', '\n'], "").trim().to_owned()
}
