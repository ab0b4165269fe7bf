// ── API-to-domain type conversions ──
//
// Bridges raw `imap_alarms_api` response types into canonical domain
// types from `crate::model`. Missing text fields become empty strings.

use imap_alarms_api::RemoteAlarm;

use crate::model::{Alarm, AlarmId, Severity};

impl From<RemoteAlarm> for Alarm {
    fn from(raw: RemoteAlarm) -> Self {
        let acknowledged = raw.is_acknowledged();
        let first_event_at = raw.first_event_at();
        let last_event_at = raw.last_event_at();

        Alarm {
            id: AlarmId(raw.id),
            severity: raw
                .severity
                .as_deref()
                .map_or(Severity::Indeterminate, Severity::parse),
            log_message: raw.log_message.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            acknowledged,
            first_event_at,
            last_event_at,
            node_label: raw.node_label,
            ack_user: raw.ack_user,
        }
    }
}
