// ── Remote alarm service seams ──
//
// The reconciler reads through `AlarmSource`; the action task writes
// through `AlarmActions`. `AlarmClient` implements both; tests supply
// in-process fakes.

use std::future::Future;

use imap_alarms_api::AlarmClient;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Alarm, AlarmId};

/// Read side: the current set of non-cleared alarms.
pub trait AlarmSource: Send + Sync + 'static {
    fn fetch_alarms(&self) -> impl Future<Output = Result<Vec<Alarm>, CoreError>> + Send;
}

/// Write side: per-alarm state changes.
pub trait AlarmActions: Send + Sync + 'static {
    fn clear(&self, id: AlarmId) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn acknowledge(&self, id: AlarmId) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn unacknowledge(&self, id: AlarmId) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl AlarmSource for AlarmClient {
    async fn fetch_alarms(&self) -> Result<Vec<Alarm>, CoreError> {
        let raw = self.list_uncleared_alarms().await?;
        debug!(count = raw.len(), "fetched alarms");
        Ok(raw.into_iter().map(Alarm::from).collect())
    }
}

impl AlarmActions for AlarmClient {
    async fn clear(&self, id: AlarmId) -> Result<(), CoreError> {
        Ok(self.clear_alarm(id.get()).await?)
    }

    async fn acknowledge(&self, id: AlarmId) -> Result<(), CoreError> {
        Ok(self.acknowledge_alarm(id.get()).await?)
    }

    async fn unacknowledge(&self, id: AlarmId) -> Result<(), CoreError> {
        Ok(self.unacknowledge_alarm(id.get()).await?)
    }
}
