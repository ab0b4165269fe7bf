// imap-alarms-core: keeps a mailbox in step with the non-cleared alarm set.
//
// Alarms flow from `AlarmSource` through the `Reconciler` into the
// `Mailbox`; flag changes and expunges flow back through the
// `AlarmFolderListener` and the action task into `AlarmActions`.

pub mod action;
pub mod bridge;
pub mod compose;
pub mod config;
pub mod convert;
pub mod error;
pub mod listener;
pub mod mailbox;
pub mod model;
pub mod reconcile;
pub mod source;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{ActionDispatcher, AlarmAction};
pub use bridge::{Bridge, BridgeState, TRASH};
pub use compose::MessageComposer;
pub use config::{
    BridgeConfig, FetchErrorPolicy, MailboxSettings, RemoteCredentials, TlsVerification,
};
pub use error::CoreError;
pub use listener::AlarmFolderListener;
pub use mailbox::{
    Flags, FolderListener, ListenerId, MailAccount, MailMessage, MailUser, Mailbox,
    MailboxError, MemoryMailbox, StoredMessage, INBOX,
};
pub use reconcile::{CycleReport, Reconciler};
pub use source::{AlarmActions, AlarmSource};
pub use store::{AlarmIndex, MemoryAlarmIndex};

// Re-export model types at the crate root for ergonomics.
pub use model::{sanitize, Alarm, AlarmId, Severity, Uid};
