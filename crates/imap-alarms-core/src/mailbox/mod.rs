// ── Message store adapter ──
//
// The narrow surface the reconciliation engine and the folder listener
// need from a mailbox engine: deliver, search by Message-ID, read and
// replace flags, expunge, enumerate UIDs, and listener registration.
// `MemoryMailbox` is the in-process engine used by the daemon and tests.

mod memory;
mod message;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Uid;

pub use memory::{MailAccount, MailUser, MemoryMailbox, INBOX};
pub use message::{MailMessage, StoredMessage};

/// The two message flags that carry alarm state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flags {
    /// `\Seen` mirrors alarm acknowledgment.
    pub seen: bool,
    /// `\Deleted` requests the alarm be cleared.
    pub deleted: bool,
}

impl Flags {
    pub const fn seen(seen: bool) -> Self {
        Self {
            seen,
            deleted: false,
        }
    }

    pub const fn with_deleted(self) -> Self {
        Self {
            deleted: true,
            ..self
        }
    }
}

/// Handle returned by [`Mailbox::add_listener`], used to silence that
/// listener for a single mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("No message with UID {0}")]
    NoSuchMessage(Uid),

    #[error("Folder '{0}' already exists")]
    FolderExists(String),

    #[error("Folder '{0}' not found")]
    FolderNotFound(String),

    #[error("Folder '{0}' cannot be deleted")]
    FolderProtected(String),

    #[error("Login rejected for '{0}'")]
    LoginRejected(String),

    #[error("Failed to render message: {0}")]
    Render(#[from] std::io::Error),
}

/// Callbacks fired by a mailbox after a mutation has been committed.
///
/// Invoked synchronously on the mutating thread, after the mailbox has
/// released its own locks, so implementations may call back into it.
pub trait FolderListener: Send + Sync {
    /// A message was appended.
    fn added(&self, uid: Uid);

    /// The flags of `uid` were replaced with `flags`.
    fn flags_updated(&self, uid: Uid, flags: Flags);

    /// One or more messages were permanently removed.
    fn expunged(&self, uids: &[Uid]);

    /// The folder itself was deleted.
    fn mailbox_deleted(&self);
}

/// Mailbox engine operations used by the bridge.
pub trait Mailbox: Send + Sync {
    /// Append a message; listeners see `added` with the new UID.
    fn deliver(&self, message: MailMessage) -> Result<(), MailboxError>;

    /// UIDs of every live message whose Message-ID equals `message_id`.
    fn search_message_id(&self, message_id: &str) -> Vec<Uid>;

    /// Current state of one message.
    fn get(&self, uid: Uid) -> Option<StoredMessage>;

    /// Replace the flags of `uid`.
    ///
    /// `silent` names a listener that must not be notified of this
    /// mutation. With `expunge` set and `flags.deleted` true, the message
    /// is removed right after the flag change; the silent listener is
    /// skipped for that expunge as well.
    fn replace_flags(
        &self,
        uid: Uid,
        flags: Flags,
        silent: Option<ListenerId>,
        expunge: bool,
    ) -> Result<(), MailboxError>;

    /// UIDs of every live message, ascending.
    fn uids(&self) -> Vec<Uid>;

    /// Remove every message flagged `\Deleted`, returning their UIDs.
    fn expunge(&self) -> Vec<Uid>;

    fn add_listener(&self, listener: Arc<dyn FolderListener>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);
}
