// Alarm endpoints
//
// Read of the non-cleared alarm set (v2 API) and the per-alarm
// clear / ack / unack mutations (v1 REST API).

use tracing::debug;

use crate::client::AlarmClient;
use crate::error::Error;
use crate::models::{AlarmCollection, RemoteAlarm};

/// FIQL filter selecting every alarm that is not cleared.
const UNCLEARED_FILTER: &str = "alarm.severity!=CLEARED";

impl AlarmClient {
    /// List all alarms whose severity is not `CLEARED`.
    ///
    /// `GET /api/v2/alarms?limit=0&_s=alarm.severity!=CLEARED`
    ///
    /// `limit=0` disables paging so the whole set comes back in one call.
    pub async fn list_uncleared_alarms(&self) -> Result<Vec<RemoteAlarm>, Error> {
        let url = self.url("api/v2/alarms")?;
        debug!("listing uncleared alarms");
        let coll: AlarmCollection = self
            .get_json(url, &[("limit", "0"), ("_s", UNCLEARED_FILTER)])
            .await?;
        Ok(coll.alarm)
    }

    /// Clear an alarm.
    ///
    /// `PUT /rest/alarms/{id}` with `clear=true`
    pub async fn clear_alarm(&self, id: u32) -> Result<(), Error> {
        debug!(id, "clearing alarm");
        self.put_alarm(id, ("clear", "true")).await
    }

    /// Acknowledge an alarm.
    ///
    /// `PUT /rest/alarms/{id}` with `ack=true`
    pub async fn acknowledge_alarm(&self, id: u32) -> Result<(), Error> {
        debug!(id, "acknowledging alarm");
        self.put_alarm(id, ("ack", "true")).await
    }

    /// Remove the acknowledgment from an alarm.
    ///
    /// `PUT /rest/alarms/{id}` with `ack=false`
    pub async fn unacknowledge_alarm(&self, id: u32) -> Result<(), Error> {
        debug!(id, "unacknowledging alarm");
        self.put_alarm(id, ("ack", "false")).await
    }

    async fn put_alarm(&self, id: u32, param: (&str, &str)) -> Result<(), Error> {
        let url = self.url(&format!("rest/alarms/{id}"))?;
        self.put_form(url, &[param]).await
    }
}
