// ── Mailbox event listener ──
//
// Turns mailbox changes made by a mail client into remote alarm
// actions. Reads the alarm index, never writes it. Changes the
// reconciler makes itself are not delivered here.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::action::{ActionDispatcher, AlarmAction};
use crate::mailbox::{Flags, FolderListener, Mailbox};
use crate::model::Uid;
use crate::store::AlarmIndex;

pub struct AlarmFolderListener {
    mailbox: Arc<dyn Mailbox>,
    index: Arc<dyn AlarmIndex>,
    dispatcher: ActionDispatcher,
}

impl AlarmFolderListener {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        index: Arc<dyn AlarmIndex>,
        dispatcher: ActionDispatcher,
    ) -> Self {
        Self {
            mailbox,
            index,
            dispatcher,
        }
    }
}

impl FolderListener for AlarmFolderListener {
    fn added(&self, uid: Uid) {
        debug!(%uid, "message added");
    }

    fn flags_updated(&self, uid: Uid, flags: Flags) {
        let Some(alarm_id) = self.index.alarm_of(uid) else {
            warn!(%uid, "flags changed on a message with no alarm, ignoring");
            return;
        };

        debug!(%uid, %alarm_id, seen = flags.seen, deleted = flags.deleted, "message flags changed");
        if flags.seen {
            self.dispatcher.dispatch(AlarmAction::Acknowledge(alarm_id));
        } else {
            self.dispatcher.dispatch(AlarmAction::Unacknowledge(alarm_id));
        }
        if flags.deleted {
            self.dispatcher.dispatch(AlarmAction::Clear(alarm_id));
        }
    }

    fn expunged(&self, uids: &[Uid]) {
        debug!(count = uids.len(), "messages expunged");
        let live: HashSet<Uid> = self.mailbox.uids().into_iter().collect();
        for (alarm_id, uid) in self.index.entries() {
            if !live.contains(&uid) {
                debug!(%alarm_id, %uid, "message for alarm is gone, clearing");
                self.dispatcher.dispatch(AlarmAction::Clear(alarm_id));
            }
        }
    }

    fn mailbox_deleted(&self) {
        debug!("mailbox deleted");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    use super::*;
    use crate::mailbox::{MailMessage, MemoryMailbox, INBOX};
    use crate::model::{Alarm, AlarmId, Severity};
    use crate::store::MemoryAlarmIndex;

    struct Fixture {
        mailbox: Arc<MemoryMailbox>,
        index: Arc<MemoryAlarmIndex>,
        rx: mpsc::UnboundedReceiver<AlarmAction>,
    }

    impl Fixture {
        fn new() -> Self {
            let mailbox = Arc::new(MemoryMailbox::new(INBOX));
            let index = Arc::new(MemoryAlarmIndex::new());
            let (dispatcher, rx) = ActionDispatcher::channel();
            let listener = AlarmFolderListener::new(
                mailbox.clone() as Arc<dyn Mailbox>,
                index.clone() as Arc<dyn AlarmIndex>,
                dispatcher,
            );
            mailbox.add_listener(Arc::new(listener));
            Self { mailbox, index, rx }
        }

        fn track(&self, id: u32) -> Uid {
            let msg = MailMessage::new("OpenNMS", "a@b", "a@b", "s", "b", Utc::now());
            let message_id = msg.message_id().to_owned();
            self.mailbox.deliver(msg).unwrap();
            let uid = self.mailbox.search_message_id(&message_id)[0];
            self.index.insert(
                Alarm {
                    id: AlarmId(id),
                    severity: Severity::Minor,
                    log_message: String::new(),
                    description: String::new(),
                    acknowledged: false,
                    first_event_at: None,
                    last_event_at: None,
                    node_label: None,
                    ack_user: None,
                },
                uid,
            );
            uid
        }

        fn drain(&mut self) -> Vec<AlarmAction> {
            let mut out = Vec::new();
            while let Ok(action) = self.rx.try_recv() {
                out.push(action);
            }
            out
        }
    }

    #[test]
    fn seen_flag_acknowledges() {
        let mut fx = Fixture::new();
        let uid = fx.track(42);

        fx.mailbox.replace_flags(uid, Flags::seen(true), None, false).unwrap();
        assert_eq!(fx.drain(), vec![AlarmAction::Acknowledge(AlarmId(42))]);
    }

    #[test]
    fn unseen_flag_unacknowledges() {
        let mut fx = Fixture::new();
        let uid = fx.track(42);

        fx.mailbox.replace_flags(uid, Flags::seen(false), None, false).unwrap();
        assert_eq!(fx.drain(), vec![AlarmAction::Unacknowledge(AlarmId(42))]);
    }

    #[test]
    fn deleted_flag_also_clears() {
        let mut fx = Fixture::new();
        let uid = fx.track(7);

        fx.mailbox
            .replace_flags(uid, Flags::seen(true).with_deleted(), None, false)
            .unwrap();
        assert_eq!(
            fx.drain(),
            vec![AlarmAction::Acknowledge(AlarmId(7)), AlarmAction::Clear(AlarmId(7))]
        );
    }

    #[test]
    fn unknown_message_is_ignored() {
        let mut fx = Fixture::new();
        let msg = MailMessage::new("x", "a@b", "a@b", "s", "b", Utc::now());
        let message_id = msg.message_id().to_owned();
        fx.mailbox.deliver(msg).unwrap();
        let uid = fx.mailbox.search_message_id(&message_id)[0];

        fx.mailbox.replace_flags(uid, Flags::seen(true), None, false).unwrap();
        assert!(fx.drain().is_empty());
    }

    #[test]
    fn out_of_band_expunge_clears_once() {
        let mut fx = Fixture::new();
        let gone = fx.track(1);
        let _kept = fx.track(2);

        fx.mailbox
            .replace_flags(gone, Flags::default().with_deleted(), None, false)
            .unwrap();
        fx.drain();

        fx.mailbox.expunge();
        assert_eq!(fx.drain(), vec![AlarmAction::Clear(AlarmId(1))]);
    }

    #[test]
    fn silenced_writes_produce_no_actions() {
        let mailbox = Arc::new(MemoryMailbox::new(INBOX));
        let index = Arc::new(MemoryAlarmIndex::new());
        let (dispatcher, mut rx) = ActionDispatcher::channel();
        let id = mailbox.add_listener(Arc::new(AlarmFolderListener::new(
            mailbox.clone() as Arc<dyn Mailbox>,
            index.clone() as Arc<dyn AlarmIndex>,
            dispatcher,
        )));

        let msg = MailMessage::new("x", "a@b", "a@b", "s", "b", Utc::now());
        let message_id = msg.message_id().to_owned();
        mailbox.deliver(msg).unwrap();
        let uid = mailbox.search_message_id(&message_id)[0];

        mailbox
            .replace_flags(uid, Flags::seen(true).with_deleted(), Some(id), true)
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
