// ── Bridge lifecycle ──
//
// Wires the alarm service, the mailbox account, the alarm index, the
// reconciler and the folder listener together, and runs the two
// background tasks: periodic reconciliation and action dispatch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use imap_alarms_api::AlarmClient;
use secrecy::ExposeSecret;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::action::{action_task, ActionDispatcher, AlarmAction};
use crate::compose::MessageComposer;
use crate::config::{BridgeConfig, FetchErrorPolicy};
use crate::error::CoreError;
use crate::listener::AlarmFolderListener;
use crate::mailbox::{ListenerId, MailAccount, MailUser, Mailbox, MemoryMailbox};
use crate::reconcile::{CycleReport, Reconciler};
use crate::source::{AlarmActions, AlarmSource};
use crate::store::{AlarmIndex, MemoryAlarmIndex};

/// Extra folder created next to `INBOX` for mail clients that move
/// deleted messages instead of flagging them.
pub const TRASH: &str = "TRASH";

// ── BridgeState ──────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Running,
    Stopped,
}

// ── Bridge ───────────────────────────────────────────────────────

/// Cheaply cloneable handle to a running (or startable) bridge.
///
/// The folder listener is registered on construction and removed by
/// [`shutdown()`](Self::shutdown); dropping every handle without a
/// shutdown leaves it registered on the inbox.
pub struct Bridge<C> {
    inner: Arc<BridgeInner<C>>,
}

impl<C> Clone for Bridge<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct BridgeInner<C> {
    config: BridgeConfig,
    remote: Arc<C>,
    account: Arc<MailAccount>,
    inbox: Arc<MemoryMailbox>,
    index: Arc<dyn AlarmIndex>,
    reconciler: Arc<Reconciler<C>>,
    listener_id: ListenerId,
    action_rx: Mutex<Option<mpsc::UnboundedReceiver<AlarmAction>>>,
    state: watch::Sender<BridgeState>,
    cancel: CancellationToken,
    reconcile_handle: Mutex<Option<JoinHandle<Result<(), CoreError>>>>,
    action_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge<AlarmClient> {
    /// Build a bridge talking to the alarm service over HTTP.
    pub fn from_config(config: BridgeConfig) -> Result<Self, CoreError> {
        let client = AlarmClient::new(
            config.url.clone(),
            config.api_credentials(),
            &config.transport(),
        )?;
        Self::new(config, Arc::new(client))
    }
}

impl<C> Bridge<C>
where
    C: AlarmSource + AlarmActions,
{
    /// Create the mailbox account and wire every component. Does not
    /// touch the remote side: call [`start()`](Self::start) or
    /// [`run_once()`](Self::run_once).
    pub fn new(config: BridgeConfig, remote: Arc<C>) -> Result<Self, CoreError> {
        let account = Arc::new(MailAccount::create(MailUser {
            email: config.mailbox.email.clone(),
            login: config.mailbox.login.clone(),
            password: config.mailbox.password.clone(),
        }));
        account.create_folder(TRASH)?;
        let inbox = account.login(&config.mailbox.login, config.mailbox.password.expose_secret())?;

        let index: Arc<dyn AlarmIndex> = Arc::new(MemoryAlarmIndex::new());
        let (dispatcher, action_rx) = ActionDispatcher::channel();

        let listener = AlarmFolderListener::new(
            inbox.clone() as Arc<dyn Mailbox>,
            Arc::clone(&index),
            dispatcher,
        );
        let listener_id = inbox.add_listener(Arc::new(listener));

        let composer = MessageComposer::new(&config.url, config.mailbox.email.clone());
        let reconciler = Reconciler::new(
            Arc::clone(&remote),
            inbox.clone() as Arc<dyn Mailbox>,
            Arc::clone(&index),
            composer,
        )
        .with_echo_guard(listener_id);

        info!(
            email = %config.mailbox.email,
            login = %config.mailbox.login,
            imap_port = config.mailbox.port,
            folders = ?account.folder_names(),
            "mailbox ready"
        );

        let (state, _) = watch::channel(BridgeState::Idle);

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                remote,
                account,
                inbox,
                index,
                reconciler: Arc::new(reconciler),
                listener_id,
                action_rx: Mutex::new(Some(action_rx)),
                state,
                cancel: CancellationToken::new(),
                reconcile_handle: Mutex::new(None),
                action_handle: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn account(&self) -> &Arc<MailAccount> {
        &self.inner.account
    }

    /// The folder alarms are mirrored into.
    pub fn inbox(&self) -> &Arc<MemoryMailbox> {
        &self.inner.inbox
    }

    pub fn index(&self) -> &Arc<dyn AlarmIndex> {
        &self.inner.index
    }

    pub fn state(&self) -> watch::Receiver<BridgeState> {
        self.inner.state.subscribe()
    }

    /// Report of the most recent reconciliation cycle.
    pub fn last_cycle(&self) -> watch::Receiver<Option<CycleReport>> {
        self.inner.reconciler.last_cycle()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the initial cycle and spawn the background tasks.
    ///
    /// A failed initial fetch follows the configured
    /// [`FetchErrorPolicy`].
    pub async fn start(&self) -> Result<(), CoreError> {
        let state = *self.inner.state.borrow();
        match state {
            BridgeState::Running => return Err(CoreError::AlreadyRunning),
            BridgeState::Stopped => return Err(CoreError::ShutDown),
            BridgeState::Idle => {}
        }

        let policy = self.inner.config.on_fetch_error;
        if let Err(e) = self.inner.reconciler.run_cycle().await {
            match policy {
                FetchErrorPolicy::Skip => {
                    warn!(error = %e, "initial alarm fetch failed, retrying next cycle");
                }
                FetchErrorPolicy::Fatal => return Err(e),
            }
        }

        if let Some(rx) = self.inner.action_rx.lock().await.take() {
            let remote = Arc::clone(&self.inner.remote);
            let cancel = self.inner.cancel.clone();
            *self.inner.action_handle.lock().await =
                Some(tokio::spawn(action_task(remote, rx, cancel)));
        }

        let reconciler = Arc::clone(&self.inner.reconciler);
        let cancel = self.inner.cancel.clone();
        *self.inner.reconcile_handle.lock().await = Some(tokio::spawn(reconcile_task(
            reconciler,
            self.inner.config.delay,
            policy,
            cancel,
        )));

        self.inner.state.send_replace(BridgeState::Running);
        info!(
            url = %self.inner.config.url,
            delay_secs = self.inner.config.delay.as_secs(),
            "bridge started"
        );
        Ok(())
    }

    /// Start, then run until `shutdown` resolves or the reconciliation
    /// task stops on its own (fatal fetch error).
    pub async fn run<F>(&self, shutdown: F) -> Result<(), CoreError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        let mut handle = self
            .inner
            .reconcile_handle
            .lock()
            .await
            .take()
            .ok_or(CoreError::NotRunning)?;

        let finished = tokio::select! {
            () = shutdown => None,
            joined = &mut handle => Some(joined),
        };

        match finished {
            None => {
                info!("shutdown requested");
                *self.inner.reconcile_handle.lock().await = Some(handle);
                self.shutdown().await;
                Ok(())
            }
            Some(joined) => {
                self.shutdown().await;
                joined.map_err(|e| CoreError::Internal(format!("reconciliation task: {e}")))?
            }
        }
    }

    /// Single reconciliation cycle without background tasks.
    pub async fn run_once(&self) -> Result<CycleReport, CoreError> {
        self.inner.reconciler.run_cycle().await
    }

    /// Stop the background tasks and detach the listener. Queued
    /// actions are performed before the action task exits.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.reconcile_handle.lock().await.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "reconciliation task ended with error"),
                Err(e) => warn!(error = %e, "reconciliation task panicked"),
            }
        }
        if let Some(handle) = self.inner.action_handle.lock().await.take() {
            let _ = handle.await;
        }

        self.inner.inbox.remove_listener(self.inner.listener_id);
        self.inner.state.send_replace(BridgeState::Stopped);
        debug!("bridge stopped");
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Run a reconciliation cycle every `period`.
async fn reconcile_task<S: AlarmSource>(
    reconciler: Arc<Reconciler<S>>,
    period: Duration,
    policy: FetchErrorPolicy,
    cancel: CancellationToken,
) -> Result<(), CoreError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            _ = interval.tick() => {
                if let Err(e) = reconciler.run_cycle().await {
                    match policy {
                        FetchErrorPolicy::Skip => {
                            warn!(error = %e, "alarm fetch failed, retrying next cycle");
                        }
                        FetchErrorPolicy::Fatal => {
                            error!(error = %e, "alarm fetch failed, stopping");
                            return Err(e);
                        }
                    }
                }
                debug!(delay_secs = period.as_secs(), "sleeping until next cycle");
            }
        }
    }
}
