// ── Auto-connect controller ──
//
// Reconnects without user action. Two triggers: the selected account
// changes to a hardware account, or the host reports that a matching
// device was plugged in. Each account selection bumps an epoch; any
// result computed for an older epoch is thrown away.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::AutoConnectConfig;
use crate::connection::{ConnectOutcome, ConnectionController};
use crate::model::{AccountSelection, HardwareWalletType, NativeDeviceEvent, PermissionState};
use crate::permission::PermissionController;
use crate::sync::lock;
use crate::transport::{self, DeviceEventSubscription, DeviceTransport};

/// What started an auto-connect evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    AccountChanged,
    DeviceAttached(String),
}

struct Listener {
    wallet_type: HardwareWalletType,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Tracking {
    account: AccountSelection,
    epoch: u64,
    /// Account the last successful auto-connect ran for.
    completed_for: Option<AccountSelection>,
    retries: u32,
    listener: Option<Listener>,
}

#[derive(Clone)]
pub struct AutoConnectController {
    inner: Arc<AutoConnectInner>,
}

struct AutoConnectInner {
    config: AutoConnectConfig,
    connection: ConnectionController,
    permission: PermissionController,
    transport: Arc<dyn DeviceTransport>,
    tracking: Mutex<Tracking>,
    /// Listener and retry-timer tasks, joined on shutdown.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl AutoConnectController {
    pub fn new(
        config: AutoConnectConfig,
        connection: ConnectionController,
        permission: PermissionController,
        transport: Arc<dyn DeviceTransport>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(AutoConnectInner {
                config,
                connection,
                permission,
                transport,
                tracking: Mutex::new(Tracking::default()),
                tasks: Mutex::new(Vec::new()),
                cancel,
            }),
        }
    }

    pub fn account(&self) -> AccountSelection {
        self.tracking().account.clone()
    }

    pub fn completed_for(&self) -> Option<AccountSelection> {
        self.tracking().completed_for.clone()
    }

    /// Whether native plug/unplug events are being watched.
    pub fn is_listening(&self) -> bool {
        self.tracking()
            .listener
            .as_ref()
            .is_some_and(|l| !l.cancel.is_cancelled())
    }

    // ── Account changes ──────────────────────────────────────────

    /// React to a new account selection. Identical selections are ignored.
    pub async fn on_account_changed(&self, selection: AccountSelection) {
        if self.inner.cancel.is_cancelled() {
            return;
        }

        let epoch = {
            let mut tracking = self.tracking();
            if tracking.account == selection {
                debug!("account selection unchanged");
                return;
            }
            tracking.account = selection.clone();
            tracking.epoch += 1;
            tracking.retries = 0;
            tracking.epoch
        };

        let Some(wallet_type) = selection.wallet_type() else {
            info!("software account selected, releasing hardware wallet");
            self.stop_listening();
            self.tracking().completed_for = None;
            self.inner.connection.reset();
            self.inner.permission.reset();
            return;
        };

        if self
            .inner
            .connection
            .wallet_type()
            .is_some_and(|current| current != wallet_type)
        {
            debug!(%wallet_type, "hardware wallet type changed, resetting connection");
            self.inner.connection.reset();
        }
        self.listen(wallet_type);

        let permission = self.inner.permission.check_permission(wallet_type).await;
        if !self.is_current(epoch) {
            debug!(epoch, "account changed during permission check");
            return;
        }
        debug!(%wallet_type, %permission, "hardware account selected");
        self.evaluate(epoch, Trigger::AccountChanged).await;
    }

    // ── Native device events ─────────────────────────────────────

    /// React to a host plug/unplug notification for this wallet type.
    pub async fn handle_native_event(&self, event: NativeDeviceEvent) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let (epoch, wallet_type) = {
            let tracking = self.tracking();
            match tracking.account.wallet_type() {
                Some(wallet_type) => (tracking.epoch, wallet_type),
                None => return,
            }
        };

        match event {
            NativeDeviceEvent::Connected(device) => {
                let device_id = device.device_id();
                debug!(%wallet_type, %device_id, "native connect event");
                if self.inner.connection.is_busy() {
                    debug!("already connected or connecting, ignoring attach");
                    return;
                }

                let permission = self.inner.permission.check_permission(wallet_type).await;
                if !self.is_current(epoch) {
                    return;
                }
                if permission != PermissionState::Granted {
                    debug!(%permission, "attached device not permitted");
                    return;
                }
                self.tracking().retries = 0;
                self.evaluate(epoch, Trigger::DeviceAttached(device_id)).await;
            }
            NativeDeviceEvent::Disconnected(device) => {
                let device_id = device.device_id();
                let tracked = self.inner.connection.device_id();
                if tracked.as_deref() == Some(device_id.as_str()) {
                    info!(%device_id, "tracked hardware wallet unplugged");
                    self.inner.connection.handle_disconnect(None);
                } else {
                    debug!(%device_id, tracked = tracked.as_deref(), "ignoring unplug of untracked device");
                }
            }
        }
    }

    /// Background tasks that have not finished yet.
    pub fn pending_tasks(&self) -> usize {
        lock(&self.inner.tasks)
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Hand over every task handle so the owner can await them.
    pub(crate) fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        lock(&self.inner.tasks).drain(..).collect()
    }

    /// Stop watching native events.
    pub fn stop_listening(&self) {
        if let Some(listener) = self.tracking().listener.take() {
            debug!(wallet_type = %listener.wallet_type, "stopped watching native device events");
            listener.cancel.cancel();
        }
    }

    // ── Evaluation ───────────────────────────────────────────────

    async fn evaluate(&self, epoch: u64, trigger: Trigger) -> bool {
        let require_new_account = trigger == Trigger::AccountChanged;
        let Some((wallet_type, _)) = self.eligible(epoch, require_new_account) else {
            return false;
        };

        let device_id = match &trigger {
            Trigger::DeviceAttached(id) => id.clone(),
            Trigger::AccountChanged => {
                let discovered =
                    transport::discover_device_id(self.inner.transport.as_ref(), wallet_type).await;
                if !self.is_current(epoch) {
                    debug!(epoch, "discarding discovery result for a previous account");
                    return false;
                }
                match discovered {
                    Ok(Some(id)) => id,
                    Ok(None) => {
                        debug!(%wallet_type, "no paired device to auto-connect");
                        return false;
                    }
                    Err(e) => {
                        debug!(%wallet_type, error = %e, "auto-connect discovery failed");
                        return false;
                    }
                }
            }
        };

        // Conditions may have changed while discovering.
        let Some((wallet_type, account)) = self.eligible(epoch, require_new_account) else {
            return false;
        };

        info!(%wallet_type, %device_id, "auto-connecting hardware wallet");
        let outcome = self
            .inner
            .connection
            .connect(wallet_type, Some(device_id))
            .await;
        self.settle(epoch, account, trigger, outcome)
    }

    fn settle(
        &self,
        epoch: u64,
        account: AccountSelection,
        trigger: Trigger,
        outcome: ConnectOutcome,
    ) -> bool {
        let mut tracking = self.tracking();
        if tracking.epoch != epoch {
            return false;
        }

        match outcome {
            ConnectOutcome::Connected => {
                tracking.completed_for = Some(account);
                tracking.retries = 0;
                true
            }
            ConnectOutcome::Failed(error) if !error.is_user_rejection() => {
                let attempt = tracking.retries;
                if attempt >= self.inner.config.max_retries {
                    debug!(attempt, code = %error.code, "auto-connect retries exhausted");
                    return false;
                }
                tracking.retries += 1;
                drop(tracking);
                self.schedule_retry(epoch, attempt, trigger);
                false
            }
            ConnectOutcome::Failed(_) | ConnectOutcome::Superseded | ConnectOutcome::Aborted => {
                false
            }
        }
    }

    /// Re-run the evaluation after a delay. The timer only wakes the
    /// evaluation up; every condition is checked again when it fires.
    fn schedule_retry(&self, epoch: u64, attempt: u32, trigger: Trigger) {
        let delay = self.inner.config.retry_delay(attempt);
        debug!(attempt = attempt + 1, ?delay, "scheduling auto-connect retry");

        let controller = self.clone();
        let cancel = self.inner.cancel.clone();
        self.track(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    controller.evaluate(epoch, trigger).await;
                }
            }
        }));
    }

    /// Wallet type and account if an auto-connect may start now.
    fn eligible(
        &self,
        epoch: u64,
        require_new_account: bool,
    ) -> Option<(HardwareWalletType, AccountSelection)> {
        if !self.inner.config.enabled || self.inner.cancel.is_cancelled() {
            return None;
        }

        let tracking = self.tracking();
        if tracking.epoch != epoch {
            return None;
        }
        let wallet_type = tracking.account.wallet_type()?;
        if require_new_account && tracking.completed_for.as_ref() == Some(&tracking.account) {
            debug!("auto-connect already completed for this account");
            return None;
        }
        if self.inner.permission.state() != PermissionState::Granted {
            debug!(%wallet_type, "permission not granted, skipping auto-connect");
            return None;
        }
        if self.inner.connection.is_busy() {
            debug!(%wallet_type, "connection busy, skipping auto-connect");
            return None;
        }
        Some((wallet_type, tracking.account.clone()))
    }

    // ── Internals ────────────────────────────────────────────────

    fn listen(&self, wallet_type: HardwareWalletType) {
        let mut tracking = self.tracking();
        if tracking
            .listener
            .as_ref()
            .is_some_and(|l| l.wallet_type == wallet_type && !l.cancel.is_cancelled())
        {
            return;
        }
        if let Some(old) = tracking.listener.take() {
            old.cancel.cancel();
        }

        let subscription =
            transport::subscribe_device_events(self.inner.transport.as_ref(), wallet_type);
        if !subscription.is_active() {
            debug!(%wallet_type, "native device events unavailable");
            return;
        }

        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(native_event_task(self.clone(), subscription, cancel.clone()));
        tracking.listener = Some(Listener {
            wallet_type,
            cancel,
        });
        drop(tracking);
        self.track(handle);
        debug!(%wallet_type, "watching native device events");
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    fn is_current(&self, epoch: u64) -> bool {
        !self.inner.cancel.is_cancelled() && self.tracking().epoch == epoch
    }

    fn tracking(&self) -> MutexGuard<'_, Tracking> {
        lock(&self.inner.tracking)
    }
}

// ── Background task ─────────────────────────────────────────────────

async fn native_event_task(
    controller: AutoConnectController,
    mut subscription: DeviceEventSubscription,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = subscription.recv() => match event {
                Some(event) => controller.handle_native_event(event).await,
                None => break,
            },
        }
    }
    subscription.unsubscribe();
}
