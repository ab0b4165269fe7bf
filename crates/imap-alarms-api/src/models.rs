// Alarm REST response types
//
// Models for the `/api/v2/alarms` JSON payload. Fields use
// `#[serde(default)]` liberally because the payload differs between
// server versions; anything not modelled lands in `extra`.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Collection envelope returned by `GET /api/v2/alarms`.
///
/// ```json
/// { "alarm": [...], "count": 1, "totalCount": 1, "offset": 0 }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct AlarmCollection {
    #[serde(default)]
    pub alarm: Vec<RemoteAlarm>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default, rename = "totalCount")]
    pub total_count: Option<u32>,
}

/// A single alarm as served by the REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAlarm {
    pub id: u32,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub log_message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ack_user: Option<String>,
    /// Acknowledgment time (epoch millis). Present only when acknowledged.
    #[serde(default)]
    pub ack_time: Option<i64>,
    /// First occurrence (epoch millis).
    #[serde(default)]
    pub first_event_time: Option<i64>,
    #[serde(default)]
    pub last_event_time: Option<i64>,
    #[serde(default)]
    pub node_label: Option<String>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteAlarm {
    /// An alarm counts as acknowledged once it carries an ack time or user.
    pub fn is_acknowledged(&self) -> bool {
        self.ack_time.is_some() || self.ack_user.is_some()
    }

    pub fn first_event_at(&self) -> Option<DateTime<Utc>> {
        self.first_event_time.and_then(millis_to_utc)
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_time.and_then(millis_to_utc)
    }
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
