// ── Alarm ↔ mailbox bookkeeping ──
//
// The mapping the reconciliation engine owns and the folder listener
// reads. `MemoryAlarmIndex` is the in-process implementation.

mod alarm_index;

pub use alarm_index::{AlarmIndex, MemoryAlarmIndex};
