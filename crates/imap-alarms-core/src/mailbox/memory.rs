// ── In-memory mailbox engine ──
//
// One `MailAccount` per configured user, holding named folders. Each
// folder is a `MemoryMailbox`: a UID-ordered map of messages behind a
// `RwLock` plus a listener registry. Listener callbacks always run after
// the state lock is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::{Flags, FolderListener, ListenerId, MailMessage, Mailbox, MailboxError, StoredMessage};
use crate::model::Uid;

/// Name of the folder every account starts with.
pub const INBOX: &str = "INBOX";

// ── MemoryMailbox ────────────────────────────────────────────────

struct FolderState {
    messages: BTreeMap<Uid, StoredMessage>,
    next_uid: u64,
}

type ListenerEntry = (ListenerId, Arc<dyn FolderListener>);

pub struct MemoryMailbox {
    name: String,
    state: RwLock<FolderState>,
    listeners: RwLock<Vec<ListenerEntry>>,
    next_listener: AtomicU64,
}

impl MemoryMailbox {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(FolderState {
                messages: BTreeMap::new(),
                next_uid: 1,
            }),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().messages.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, FolderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FolderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of registered listeners, minus `silent`.
    /// Tell every listener that this folder is gone.
    pub(crate) fn notify_deleted(&self) {
        for listener in self.listeners_except(None) {
            listener.mailbox_deleted();
        }
    }

    fn listeners_except(&self, silent: Option<ListenerId>) -> Vec<Arc<dyn FolderListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| Some(*id) != silent)
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }
}

impl Mailbox for MemoryMailbox {
    fn deliver(&self, message: MailMessage) -> Result<(), MailboxError> {
        let raw: Arc<[u8]> = message.to_rfc822()?.into();

        let uid = {
            let mut state = self.write();
            let uid = Uid(state.next_uid);
            state.next_uid += 1;
            state.messages.insert(
                uid,
                StoredMessage {
                    uid,
                    flags: message.flags,
                    internal_date: Utc::now(),
                    message: Arc::new(message),
                    raw,
                },
            );
            uid
        };

        debug!(folder = %self.name, %uid, "message delivered");
        for listener in self.listeners_except(None) {
            listener.added(uid);
        }
        Ok(())
    }

    fn search_message_id(&self, message_id: &str) -> Vec<Uid> {
        let wanted = message_id.trim_start_matches('<').trim_end_matches('>');
        self.read()
            .messages
            .values()
            .filter(|m| m.message_id() == wanted)
            .map(|m| m.uid)
            .collect()
    }

    fn get(&self, uid: Uid) -> Option<StoredMessage> {
        self.read().messages.get(&uid).cloned()
    }

    fn replace_flags(
        &self,
        uid: Uid,
        flags: Flags,
        silent: Option<ListenerId>,
        expunge: bool,
    ) -> Result<(), MailboxError> {
        let expunged = {
            let mut state = self.write();
            let entry = state
                .messages
                .get_mut(&uid)
                .ok_or(MailboxError::NoSuchMessage(uid))?;
            entry.flags = flags;

            let remove = expunge && flags.deleted;
            if remove {
                state.messages.remove(&uid);
            }
            remove
        };

        debug!(folder = %self.name, %uid, ?flags, expunged, "flags replaced");

        let listeners = self.listeners_except(silent);
        for listener in &listeners {
            listener.flags_updated(uid, flags);
        }
        if expunged {
            for listener in &listeners {
                listener.expunged(&[uid]);
            }
        }
        Ok(())
    }

    fn uids(&self) -> Vec<Uid> {
        self.read().messages.keys().copied().collect()
    }

    fn expunge(&self) -> Vec<Uid> {
        let removed: Vec<Uid> = {
            let mut state = self.write();
            let doomed: Vec<Uid> = state
                .messages
                .values()
                .filter(|m| m.flags.deleted)
                .map(|m| m.uid)
                .collect();
            for uid in &doomed {
                state.messages.remove(uid);
            }
            doomed
        };

        if !removed.is_empty() {
            debug!(folder = %self.name, count = removed.len(), "messages expunged");
            for listener in self.listeners_except(None) {
                listener.expunged(&removed);
            }
        }
        removed
    }

    fn add_listener(&self, listener: Arc<dyn FolderListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(lid, _)| *lid != id);
    }
}

// ── MailAccount ──────────────────────────────────────────────────

/// Login identity of the mailbox user.
#[derive(Debug, Clone)]
pub struct MailUser {
    pub email: String,
    pub login: String,
    pub password: SecretString,
}

/// A user's set of folders. Created with an empty `INBOX`.
pub struct MailAccount {
    user: MailUser,
    folders: RwLock<BTreeMap<String, Arc<MemoryMailbox>>>,
}

impl MailAccount {
    pub fn create(user: MailUser) -> Self {
        let mut folders = BTreeMap::new();
        folders.insert(INBOX.to_owned(), Arc::new(MemoryMailbox::new(INBOX)));
        debug!(email = %user.email, login = %user.login, "mail account created");
        Self {
            user,
            folders: RwLock::new(folders),
        }
    }

    pub fn user(&self) -> &MailUser {
        &self.user
    }

    /// Open `INBOX` as `login`. Fails unless the credentials match the
    /// account's.
    pub fn login(&self, login: &str, password: &str) -> Result<Arc<MemoryMailbox>, MailboxError> {
        if login != self.user.login || password != self.user.password.expose_secret() {
            return Err(MailboxError::LoginRejected(login.to_owned()));
        }
        self.folder(INBOX)
            .ok_or_else(|| MailboxError::FolderNotFound(INBOX.to_owned()))
    }

    pub fn folder(&self, name: &str) -> Option<Arc<MemoryMailbox>> {
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_folder(name))
            .cloned()
    }

    pub fn folder_names(&self) -> Vec<String> {
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn create_folder(&self, name: &str) -> Result<Arc<MemoryMailbox>, MailboxError> {
        let name = normalize_folder(name);
        let mut folders = self.folders.write().unwrap_or_else(PoisonError::into_inner);
        if folders.contains_key(&name) {
            return Err(MailboxError::FolderExists(name));
        }
        let folder = Arc::new(MemoryMailbox::new(name.clone()));
        folders.insert(name, Arc::clone(&folder));
        Ok(folder)
    }

    /// Remove a folder and tell its listeners. `INBOX` is permanent.
    pub fn delete_folder(&self, name: &str) -> Result<(), MailboxError> {
        let name = normalize_folder(name);
        if name == INBOX {
            return Err(MailboxError::FolderProtected(name));
        }
        let removed = self
            .folders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name)
            .ok_or(MailboxError::FolderNotFound(name))?;
        debug!(folder = %removed.name(), "folder deleted");
        removed.notify_deleted();
        Ok(())
    }
}

/// `INBOX` is case-insensitive; every other name is kept as given.
fn normalize_folder(name: &str) -> String {
    if name.eq_ignore_ascii_case(INBOX) {
        INBOX.to_owned()
    } else {
        name.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Seen {
        Added(Uid),
        Flags(Uid, Flags),
        Expunged(Vec<Uid>),
        Deleted,
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Seen>>);

    impl Recorder {
        fn take(&self) -> Vec<Seen> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl FolderListener for Recorder {
        fn added(&self, uid: Uid) {
            self.0.lock().unwrap().push(Seen::Added(uid));
        }
        fn flags_updated(&self, uid: Uid, flags: Flags) {
            self.0.lock().unwrap().push(Seen::Flags(uid, flags));
        }
        fn expunged(&self, uids: &[Uid]) {
            self.0.lock().unwrap().push(Seen::Expunged(uids.to_vec()));
        }
        fn mailbox_deleted(&self) {
            self.0.lock().unwrap().push(Seen::Deleted);
        }
    }

    fn message(subject: &str) -> MailMessage {
        MailMessage::new("OpenNMS", "a@example.org", "b@example.org", subject, "body", Utc::now())
    }

    fn deliver(mailbox: &MemoryMailbox, subject: &str) -> Uid {
        let msg = message(subject);
        let id = msg.message_id().to_owned();
        mailbox.deliver(msg).unwrap();
        mailbox.search_message_id(&id)[0]
    }

    #[test]
    fn deliver_assigns_increasing_uids() {
        let mailbox = MemoryMailbox::new(INBOX);
        let a = deliver(&mailbox, "a");
        let b = deliver(&mailbox, "b");
        assert!(b > a);
        assert_eq!(mailbox.uids(), vec![a, b]);
    }

    #[test]
    fn search_accepts_bracketed_ids() {
        let mailbox = MemoryMailbox::new(INBOX);
        let msg = message("x");
        let id = msg.message_id().to_owned();
        mailbox.deliver(msg).unwrap();

        assert_eq!(mailbox.search_message_id(&format!("<{id}>")).len(), 1);
        assert!(mailbox.search_message_id("nope@nowhere").is_empty());
    }

    #[test]
    fn delivered_flags_are_kept() {
        let mailbox = MemoryMailbox::new(INBOX);
        let msg = message("x").with_flags(Flags::seen(true));
        let id = msg.message_id().to_owned();
        mailbox.deliver(msg).unwrap();

        let uid = mailbox.search_message_id(&id)[0];
        assert!(mailbox.get(uid).unwrap().flags.seen);
    }

    #[test]
    fn silent_listener_is_skipped() {
        let mailbox = MemoryMailbox::new(INBOX);
        let quiet = Arc::new(Recorder::default());
        let loud = Arc::new(Recorder::default());
        let quiet_id = mailbox.add_listener(quiet.clone());
        mailbox.add_listener(loud.clone());

        let uid = deliver(&mailbox, "x");
        quiet.take();
        loud.take();

        mailbox
            .replace_flags(uid, Flags::seen(true), Some(quiet_id), false)
            .unwrap();

        assert!(quiet.take().is_empty());
        assert_eq!(loud.take(), vec![Seen::Flags(uid, Flags::seen(true))]);
    }

    #[test]
    fn replace_with_expunge_removes_deleted_message() {
        let mailbox = MemoryMailbox::new(INBOX);
        let loud = Arc::new(Recorder::default());
        mailbox.add_listener(loud.clone());
        let uid = deliver(&mailbox, "x");
        loud.take();

        let flags = Flags::seen(false).with_deleted();
        mailbox.replace_flags(uid, flags, None, true).unwrap();

        assert!(mailbox.get(uid).is_none());
        assert_eq!(
            loud.take(),
            vec![Seen::Flags(uid, flags), Seen::Expunged(vec![uid])]
        );
    }

    #[test]
    fn expunge_flag_without_deleted_keeps_message() {
        let mailbox = MemoryMailbox::new(INBOX);
        let uid = deliver(&mailbox, "x");

        mailbox.replace_flags(uid, Flags::seen(true), None, true).unwrap();
        assert!(mailbox.get(uid).is_some());
    }

    #[test]
    fn replace_flags_on_missing_message_fails() {
        let mailbox = MemoryMailbox::new(INBOX);
        let err = mailbox
            .replace_flags(Uid(99), Flags::default(), None, false)
            .unwrap_err();
        assert!(matches!(err, MailboxError::NoSuchMessage(Uid(99))));
    }

    #[test]
    fn expunge_removes_only_deleted_and_notifies_once() {
        let mailbox = MemoryMailbox::new(INBOX);
        let rec = Arc::new(Recorder::default());
        mailbox.add_listener(rec.clone());

        let keep = deliver(&mailbox, "keep");
        let drop_a = deliver(&mailbox, "a");
        let drop_b = deliver(&mailbox, "b");
        for uid in [drop_a, drop_b] {
            mailbox
                .replace_flags(uid, Flags::default().with_deleted(), None, false)
                .unwrap();
        }
        rec.take();

        assert_eq!(mailbox.expunge(), vec![drop_a, drop_b]);
        assert_eq!(mailbox.uids(), vec![keep]);
        assert_eq!(rec.take(), vec![Seen::Expunged(vec![drop_a, drop_b])]);

        assert!(mailbox.expunge().is_empty());
        assert!(rec.take().is_empty());
    }

    #[test]
    fn removed_listener_hears_nothing() {
        let mailbox = MemoryMailbox::new(INBOX);
        let rec = Arc::new(Recorder::default());
        let id = mailbox.add_listener(rec.clone());
        mailbox.remove_listener(id);

        deliver(&mailbox, "x");
        assert!(rec.take().is_empty());
    }

    #[test]
    fn listener_may_reenter_mailbox() {
        struct Reentrant(Arc<MemoryMailbox>, Mutex<usize>);
        impl FolderListener for Reentrant {
            fn added(&self, _: Uid) {
                *self.1.lock().unwrap() = self.0.uids().len();
            }
            fn flags_updated(&self, _: Uid, _: Flags) {}
            fn expunged(&self, _: &[Uid]) {}
            fn mailbox_deleted(&self) {}
        }

        let mailbox = Arc::new(MemoryMailbox::new(INBOX));
        let listener = Arc::new(Reentrant(Arc::clone(&mailbox), Mutex::new(0)));
        mailbox.add_listener(listener.clone());

        deliver(&mailbox, "x");
        assert_eq!(*listener.1.lock().unwrap(), 1);
    }

    // ── Account ──────────────────────────────────────────────────────

    fn account() -> MailAccount {
        MailAccount::create(MailUser {
            email: "imap-alarms@opennms.org".into(),
            login: "username".into(),
            password: SecretString::from("secret".to_owned()),
        })
    }

    #[test]
    fn account_starts_with_inbox() {
        let acct = account();
        assert_eq!(acct.folder_names(), vec![INBOX.to_owned()]);
        assert!(acct.folder("inbox").is_some());
        let inbox = acct.login("username", "secret").unwrap();
        assert!(Arc::ptr_eq(&inbox, &acct.folder(INBOX).unwrap()));
    }

    #[test]
    fn create_folder_rejects_duplicates() {
        let acct = account();
        acct.create_folder("TRASH").unwrap();
        assert!(matches!(
            acct.create_folder("TRASH"),
            Err(MailboxError::FolderExists(_))
        ));
        assert!(matches!(
            acct.create_folder("Inbox"),
            Err(MailboxError::FolderExists(_))
        ));
    }

    #[test]
    fn login_checks_login_and_password() {
        let acct = account();
        assert!(acct.login("username", "secret").is_ok());
        assert!(matches!(
            acct.login("username", "wrong"),
            Err(MailboxError::LoginRejected(_))
        ));
        assert!(acct.login("other", "secret").is_err());
    }

    #[test]
    fn delete_folder_notifies_listeners() {
        let acct = account();
        let trash = acct.create_folder("TRASH").unwrap();
        let rec = Arc::new(Recorder::default());
        trash.add_listener(rec.clone());

        acct.delete_folder("TRASH").unwrap();
        assert_eq!(rec.take(), vec![Seen::Deleted]);
        assert!(acct.folder("TRASH").is_none());
        assert!(matches!(
            acct.delete_folder("TRASH"),
            Err(MailboxError::FolderNotFound(_))
        ));
    }

    #[test]
    fn inbox_cannot_be_deleted() {
        let acct = account();
        assert!(matches!(
            acct.delete_folder("inbox"),
            Err(MailboxError::FolderProtected(_))
        ));
        assert!(acct.login("username", "secret").is_ok());
    }
}
