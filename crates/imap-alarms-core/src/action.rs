// ── Alarm action dispatch ──
//
// Listener callbacks run synchronously inside mailbox mutations, so they
// never talk to the network themselves. They enqueue an `AlarmAction`
// and the action task performs it against the remote service, logging
// the outcome. Nothing waits on the result.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::AlarmId;
use crate::source::AlarmActions;

/// A state change to push to the remote alarm service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmAction {
    Clear(AlarmId),
    Acknowledge(AlarmId),
    Unacknowledge(AlarmId),
}

impl AlarmAction {
    pub fn id(self) -> AlarmId {
        match self {
            Self::Clear(id) | Self::Acknowledge(id) | Self::Unacknowledge(id) => id,
        }
    }

    /// Issue the matching remote call.
    pub async fn perform<A: AlarmActions>(self, remote: &A) -> Result<(), CoreError> {
        match self {
            Self::Clear(id) => remote.clear(id).await,
            Self::Acknowledge(id) => remote.acknowledge(id).await,
            Self::Unacknowledge(id) => remote.unacknowledge(id).await,
        }
    }
}

impl fmt::Display for AlarmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear(id) => write!(f, "clear alarm {id}"),
            Self::Acknowledge(id) => write!(f, "acknowledge alarm {id}"),
            Self::Unacknowledge(id) => write!(f, "unacknowledge alarm {id}"),
        }
    }
}

// ── ActionDispatcher ─────────────────────────────────────────────

/// Non-blocking sender half, safe to call from mailbox callbacks.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    tx: mpsc::UnboundedSender<AlarmAction>,
}

impl ActionDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AlarmAction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `action`. Returns `false` once the action task is gone.
    pub fn dispatch(&self, action: AlarmAction) -> bool {
        debug!(alarm_id = %action.id(), %action, "queueing alarm action");
        if self.tx.send(action).is_err() {
            warn!(%action, "action task stopped, dropping alarm action");
            return false;
        }
        true
    }
}

// ── Background task ──────────────────────────────────────────────

/// Perform queued actions until cancelled or every sender is dropped.
/// Actions already queued at cancellation are still performed.
pub(crate) async fn action_task<A: AlarmActions>(
    remote: Arc<A>,
    mut rx: mpsc::UnboundedReceiver<AlarmAction>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            action = rx.recv() => {
                let Some(action) = action else { return };
                run_action(remote.as_ref(), action).await;
            }
        }
    }

    rx.close();
    while let Ok(action) = rx.try_recv() {
        run_action(remote.as_ref(), action).await;
    }
}

async fn run_action<A: AlarmActions>(remote: &A, action: AlarmAction) {
    match action.perform(remote).await {
        Ok(()) => info!(alarm_id = %action.id(), %action, "alarm action done"),
        Err(e) => warn!(alarm_id = %action.id(), %action, error = %e, "alarm action failed"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<AlarmAction>>,
        fail: bool,
    }

    impl Recorder {
        fn record(&self, action: AlarmAction) -> Result<(), CoreError> {
            self.calls.lock().unwrap().push(action);
            if self.fail {
                Err(CoreError::Internal("nope".into()))
            } else {
                Ok(())
            }
        }
    }

    impl AlarmActions for Recorder {
        async fn clear(&self, id: AlarmId) -> Result<(), CoreError> {
            self.record(AlarmAction::Clear(id))
        }
        async fn acknowledge(&self, id: AlarmId) -> Result<(), CoreError> {
            self.record(AlarmAction::Acknowledge(id))
        }
        async fn unacknowledge(&self, id: AlarmId) -> Result<(), CoreError> {
            self.record(AlarmAction::Unacknowledge(id))
        }
    }

    #[tokio::test]
    async fn perform_routes_to_matching_call() {
        let remote = Recorder::default();
        for action in [
            AlarmAction::Clear(AlarmId(1)),
            AlarmAction::Acknowledge(AlarmId(2)),
            AlarmAction::Unacknowledge(AlarmId(3)),
        ] {
            action.perform(&remote).await.unwrap();
        }
        assert_eq!(
            *remote.calls.lock().unwrap(),
            vec![
                AlarmAction::Clear(AlarmId(1)),
                AlarmAction::Acknowledge(AlarmId(2)),
                AlarmAction::Unacknowledge(AlarmId(3)),
            ]
        );
    }

    #[tokio::test]
    async fn task_drains_in_order_and_survives_failures() {
        let remote = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let (dispatcher, rx) = ActionDispatcher::channel();
        assert!(dispatcher.dispatch(AlarmAction::Acknowledge(AlarmId(5))));
        assert!(dispatcher.dispatch(AlarmAction::Clear(AlarmId(5))));
        drop(dispatcher);

        action_task(Arc::clone(&remote), rx, CancellationToken::new()).await;

        assert_eq!(
            *remote.calls.lock().unwrap(),
            vec![AlarmAction::Acknowledge(AlarmId(5)), AlarmAction::Clear(AlarmId(5))]
        );
    }

    #[tokio::test]
    async fn pending_actions_flush_on_cancel() {
        let remote = Arc::new(Recorder::default());
        let (dispatcher, rx) = ActionDispatcher::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        dispatcher.dispatch(AlarmAction::Clear(AlarmId(9)));

        action_task(Arc::clone(&remote), rx, cancel).await;

        assert_eq!(*remote.calls.lock().unwrap(), vec![AlarmAction::Clear(AlarmId(9))]);
        assert!(!dispatcher.dispatch(AlarmAction::Clear(AlarmId(10))));
    }

    #[test]
    fn display_names_the_alarm() {
        assert_eq!(AlarmAction::Acknowledge(AlarmId(4)).to_string(), "acknowledge alarm 4");
    }
}
