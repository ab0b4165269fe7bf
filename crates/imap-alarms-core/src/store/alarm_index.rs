// ── Alarm index ──
//
// Three tables kept in lockstep under one lock:
//   alarm id -> UID, alarm id -> last snapshot, UID -> alarm id.
// An id is present in both forward tables or in neither; a UID maps to
// at most one alarm.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{Alarm, AlarmId, Uid};

/// Alarm-id ↔ UID mapping shared by the engine and the listener.
pub trait AlarmIndex: Send + Sync {
    /// UID of the entry mirroring `id`.
    fn uid_of(&self, id: AlarmId) -> Option<Uid>;

    /// Reverse lookup: alarm mirrored by `uid`.
    fn alarm_of(&self, uid: Uid) -> Option<AlarmId>;

    /// Last snapshot stored for `id`.
    fn snapshot(&self, id: AlarmId) -> Option<Alarm>;

    /// Every tracked alarm id, ascending.
    fn tracked(&self) -> Vec<AlarmId>;

    /// Every `(alarm id, UID)` pair, ascending by alarm id.
    fn entries(&self) -> Vec<(AlarmId, Uid)>;

    /// Track `alarm` as mirrored by `uid`, replacing any previous mapping
    /// of either side.
    fn insert(&self, alarm: Alarm, uid: Uid);

    /// Replace the stored snapshot of an already tracked alarm. Returns
    /// `false` (and stores nothing) when the id is not tracked.
    fn refresh(&self, alarm: Alarm) -> bool;

    /// Stop tracking `id`, returning the UID it was mapped to.
    fn remove(&self, id: AlarmId) -> Option<Uid>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Tables {
    uids: BTreeMap<AlarmId, Uid>,
    alarms: BTreeMap<AlarmId, Alarm>,
    by_uid: HashMap<Uid, AlarmId>,
}

impl Tables {
    fn drop_id(&mut self, id: AlarmId) -> Option<Uid> {
        self.alarms.remove(&id);
        let uid = self.uids.remove(&id)?;
        if self.by_uid.get(&uid) == Some(&id) {
            self.by_uid.remove(&uid);
        }
        Some(uid)
    }
}

/// `RwLock`-backed [`AlarmIndex`].
#[derive(Default)]
pub struct MemoryAlarmIndex {
    tables: RwLock<Tables>,
}

impl MemoryAlarmIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AlarmIndex for MemoryAlarmIndex {
    fn uid_of(&self, id: AlarmId) -> Option<Uid> {
        self.read().uids.get(&id).copied()
    }

    fn alarm_of(&self, uid: Uid) -> Option<AlarmId> {
        self.read().by_uid.get(&uid).copied()
    }

    fn snapshot(&self, id: AlarmId) -> Option<Alarm> {
        self.read().alarms.get(&id).cloned()
    }

    fn tracked(&self) -> Vec<AlarmId> {
        self.read().alarms.keys().copied().collect()
    }

    fn entries(&self) -> Vec<(AlarmId, Uid)> {
        self.read().uids.iter().map(|(id, uid)| (*id, *uid)).collect()
    }

    fn insert(&self, alarm: Alarm, uid: Uid) {
        let id = alarm.id;
        let mut tables = self.write();

        tables.drop_id(id);
        // A UID belongs to one alarm only.
        if let Some(previous) = tables.by_uid.get(&uid).copied() {
            tables.drop_id(previous);
        }

        tables.uids.insert(id, uid);
        tables.alarms.insert(id, alarm);
        tables.by_uid.insert(uid, id);
    }

    fn refresh(&self, alarm: Alarm) -> bool {
        let mut tables = self.write();
        match tables.alarms.get_mut(&alarm.id) {
            Some(slot) => {
                *slot = alarm;
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: AlarmId) -> Option<Uid> {
        self.write().drop_id(id)
    }

    fn len(&self) -> usize {
        self.read().alarms.len()
    }
}
