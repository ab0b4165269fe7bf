// ── Alarm → message composition ──

use chrono::Utc;
use url::Url;

use crate::mailbox::{Flags, MailMessage};
use crate::model::Alarm;

/// Display name used as the sender of every alarm message.
pub const SENDER_NAME: &str = "OpenNMS";

/// Builds the mailbox message that mirrors an alarm.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    base_url: String,
    address: String,
}

impl MessageComposer {
    /// `base_url` is the alarm service root used for detail links;
    /// `address` is both sender address and recipient.
    pub fn new(base_url: &Url, address: impl Into<String>) -> Self {
        Self {
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
            address: address.into(),
        }
    }

    pub fn detail_link(&self, alarm: &Alarm) -> String {
        format!("{}/alarm/detail.htm?id={}", self.base_url, alarm.id)
    }

    pub fn subject(alarm: &Alarm) -> String {
        format!("{}: {}", alarm.severity, alarm.clean_message())
    }

    pub fn body(&self, alarm: &Alarm) -> String {
        let link = self.detail_link(alarm);
        format!(
            "{}<br/><a href='{link}'>{}</a>",
            alarm.description,
            escape_html(&link)
        )
    }

    /// A fresh message: seen mirrors acknowledgment, sent date is the
    /// first occurrence (now, if the alarm carries none).
    pub fn compose(&self, alarm: &Alarm) -> MailMessage {
        MailMessage::new(
            SENDER_NAME,
            self.address.as_str(),
            self.address.as_str(),
            Self::subject(alarm),
            self.body(alarm),
            alarm.first_event_at.unwrap_or_else(Utc::now),
        )
        .with_flags(Flags::seen(alarm.acknowledged))
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{AlarmId, Severity};

    fn node_down() -> Alarm {
        Alarm {
            id: AlarmId(42),
            severity: Severity::Critical,
            log_message: "Node down\r\n".into(),
            description: "The node is down.".into(),
            acknowledged: false,
            first_event_at: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            last_event_at: None,
            node_label: None,
            ack_user: None,
        }
    }

    fn composer() -> MessageComposer {
        let base = Url::parse("http://localhost:8980/opennms/").unwrap();
        MessageComposer::new(&base, "imap-alarms@opennms.org")
    }

    #[test]
    fn subject_is_severity_and_clean_message() {
        assert_eq!(MessageComposer::subject(&node_down()), "CRITICAL: Node down");
    }

    #[test]
    fn body_links_to_alarm_detail() {
        assert_eq!(
            composer().body(&node_down()),
            "The node is down.<br/><a href='http://localhost:8980/opennms/alarm/detail.htm?id=42'>\
             http://localhost:8980/opennms/alarm/detail.htm?id=42</a>"
        );
    }

    #[test]
    fn link_text_is_escaped() {
        let base = Url::parse("http://h/o&m").unwrap();
        let body = MessageComposer::new(&base, "a@b").body(&node_down());
        assert!(body.contains(">http://h/o&amp;m/alarm/detail.htm?id=42</a>"));
    }

    #[test]
    fn compose_fills_envelope_and_flags() {
        let mut alarm = node_down();
        alarm.acknowledged = true;
        let msg = composer().compose(&alarm);

        assert_eq!(msg.sender_name, "OpenNMS");
        assert_eq!(msg.sender_address, "imap-alarms@opennms.org");
        assert_eq!(msg.recipient, "imap-alarms@opennms.org");
        assert_eq!(msg.sent_at.timestamp(), 1_700_000_000);
        assert_eq!(msg.flags, Flags::seen(true));
    }

    #[test]
    fn missing_first_event_uses_now() {
        let mut alarm = node_down();
        alarm.first_event_at = None;
        let before = Utc::now();
        let msg = composer().compose(&alarm);
        assert!(msg.sent_at >= before);
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
