// ── Reconciliation engine ──
//
// One cycle: fetch the non-cleared alarms, retire entries whose alarm
// left the set, sync the seen flag of the rest, and create entries for
// new alarms. Every mailbox write the engine makes skips its own
// listener, so none of them comes back as an alarm action.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::compose::MessageComposer;
use crate::error::CoreError;
use crate::mailbox::{Flags, ListenerId, Mailbox};
use crate::model::{Alarm, AlarmId};
use crate::source::AlarmSource;
use crate::store::AlarmIndex;

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Alarms that left the snapshot. A failed delete is counted here
    /// and in `errors`.
    pub removed: usize,
    /// Entries whose seen flag was rewritten.
    pub updated: usize,
    /// Entries created for newly observed alarms.
    pub added: usize,
    /// Mailbox failures and inconsistencies.
    pub errors: usize,
    pub at: DateTime<Utc>,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            removed: 0,
            updated: 0,
            added: 0,
            errors: 0,
            at: Utc::now(),
        }
    }

    /// `true` when the cycle changed nothing.
    pub fn is_quiet(&self) -> bool {
        self.removed == 0 && self.updated == 0 && self.added == 0 && self.errors == 0
    }
}

pub struct Reconciler<S> {
    source: Arc<S>,
    mailbox: Arc<dyn Mailbox>,
    index: Arc<dyn AlarmIndex>,
    composer: MessageComposer,
    echo_guard: Option<ListenerId>,
    last_cycle: watch::Sender<Option<CycleReport>>,
    /// Held for a whole cycle: two overlapping cycles would both see a
    /// new alarm as untracked and deliver it twice.
    cycle: Mutex<()>,
}

impl<S: AlarmSource> Reconciler<S> {
    pub fn new(
        source: Arc<S>,
        mailbox: Arc<dyn Mailbox>,
        index: Arc<dyn AlarmIndex>,
        composer: MessageComposer,
    ) -> Self {
        let (last_cycle, _) = watch::channel(None);
        Self {
            source,
            mailbox,
            index,
            composer,
            echo_guard: None,
            last_cycle,
            cycle: Mutex::new(()),
        }
    }

    /// Listener that must not hear about the engine's own writes.
    pub fn with_echo_guard(mut self, listener: ListenerId) -> Self {
        self.echo_guard = Some(listener);
        self
    }

    pub fn index(&self) -> &Arc<dyn AlarmIndex> {
        &self.index
    }

    /// Subscribe to the report of every completed cycle.
    pub fn last_cycle(&self) -> watch::Receiver<Option<CycleReport>> {
        self.last_cycle.subscribe()
    }

    /// Fetch the current alarms and apply them.
    ///
    /// A fetch failure leaves the mailbox and the index untouched.
    pub async fn run_cycle(&self) -> Result<CycleReport, CoreError> {
        let alarms = self.source.fetch_alarms().await?;
        Ok(self.apply(alarms))
    }

    /// Apply one snapshot of the alarm set. Concurrent calls run one
    /// after the other.
    pub fn apply(&self, alarms: Vec<Alarm>) -> CycleReport {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let target: BTreeMap<AlarmId, Alarm> = alarms.into_iter().map(|a| (a.id, a)).collect();
        let mut report = CycleReport::new();

        for id in self.index.tracked() {
            if !target.contains_key(&id) {
                self.retire(id, &mut report);
            }
        }

        for alarm in target.into_values() {
            if self.index.uid_of(alarm.id).is_some() {
                self.update(alarm, &mut report);
            } else {
                self.create(alarm, &mut report);
            }
        }

        report.at = Utc::now();
        if report.is_quiet() {
            debug!(tracked = self.index.len(), "reconciliation cycle, no changes");
        } else {
            info!(
                removed = report.removed,
                updated = report.updated,
                added = report.added,
                errors = report.errors,
                tracked = self.index.len(),
                "reconciliation cycle complete"
            );
        }
        self.last_cycle.send_replace(Some(report));
        report
    }

    // ── Cycle steps ──────────────────────────────────────────────────

    fn retire(&self, id: AlarmId, report: &mut CycleReport) {
        report.removed += 1;
        let message = self
            .index
            .snapshot(id)
            .map(|a| a.clean_message())
            .unwrap_or_default();

        let Some(uid) = self.index.uid_of(id) else {
            error!(alarm_id = %id, %message, "no message tracked for alarm");
            self.index.remove(id);
            report.errors += 1;
            return;
        };

        match self.mailbox.get(uid) {
            None => {
                warn!(alarm_id = %id, %uid, %message, "message already gone, dropping alarm");
            }
            Some(stored) => {
                let flags = stored.flags.with_deleted();
                match self.mailbox.replace_flags(uid, flags, self.echo_guard, true) {
                    Ok(()) => {
                        info!(
                            alarm_id = %id,
                            %uid,
                            %message,
                            delivered_at = %stored.internal_date,
                            size = stored.size(),
                            "deleted message for alarm"
                        );
                    }
                    Err(e) => {
                        error!(alarm_id = %id, %uid, %message, error = %e, "failed to delete message");
                        report.errors += 1;
                    }
                }
            }
        }
        self.index.remove(id);
    }

    fn update(&self, alarm: Alarm, report: &mut CycleReport) {
        let id = alarm.id;
        let Some(uid) = self.index.uid_of(id) else {
            return;
        };

        let Some(stored) = self.mailbox.get(uid) else {
            warn!(alarm_id = %id, %uid, message = %alarm.clean_message(), "message for alarm is gone, dropping mapping");
            self.index.remove(id);
            return;
        };

        if stored.flags.seen != alarm.acknowledged {
            let flags = Flags {
                seen: alarm.acknowledged,
                ..stored.flags
            };
            match self.mailbox.replace_flags(uid, flags, self.echo_guard, false) {
                Ok(()) => {
                    info!(
                        alarm_id = %id,
                        %uid,
                        seen = flags.seen,
                        ack_user = alarm.ack_user.as_deref().unwrap_or_default(),
                        message = %alarm.clean_message(),
                        "updated message flags"
                    );
                    report.updated += 1;
                }
                Err(e) => {
                    error!(alarm_id = %id, %uid, message = %alarm.clean_message(), error = %e, "failed to update message flags");
                    report.errors += 1;
                }
            }
        }
        self.index.refresh(alarm);
    }

    fn create(&self, alarm: Alarm, report: &mut CycleReport) {
        let id = alarm.id;
        let message = self.composer.compose(&alarm);
        let message_id = message.message_id().to_owned();

        if let Err(e) = self.mailbox.deliver(message) {
            error!(alarm_id = %id, message = %alarm.clean_message(), error = %e, "failed to add message");
            report.errors += 1;
            return;
        }

        match self.mailbox.search_message_id(&message_id).as_slice() {
            [uid] => {
                info!(
                    alarm_id = %id,
                    %uid,
                    severity = %alarm.severity,
                    node = alarm.node_label.as_deref().unwrap_or_default(),
                    last_event_at = ?alarm.last_event_at,
                    message = %alarm.clean_message(),
                    "added message for alarm"
                );
                self.index.insert(alarm, *uid);
                report.added += 1;
            }
            hits => {
                error!(
                    alarm_id = %id,
                    %message_id,
                    hits = hits.len(),
                    "expected exactly one message after delivery"
                );
                report.errors += 1;
            }
        }
    }
}
