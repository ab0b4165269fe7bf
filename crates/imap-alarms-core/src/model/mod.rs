// ── Domain model ──
//
// Canonical types shared by the reconciliation engine, the mailbox
// listener and the bridge. Remote payloads are converted into these in
// `convert.rs`; nothing downstream sees `imap_alarms_api` types.

pub mod alarm;
pub mod ids;

// ── Re-exports ──────────────────────────────────────────────────────

pub use alarm::{Alarm, Severity, sanitize};
pub use ids::{AlarmId, Uid};
