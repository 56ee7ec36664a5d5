// ── Connection controller ──
//
// Owns the single adapter of a session and the "latest attempt wins"
// protocol. Every connect allocates a fresh attempt token before its
// first suspension; after each `.await` the attempt re-checks that its
// token is still current (and that the session is still alive) before
// touching shared state. Superseded attempts resolve quietly.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{
    AdapterError, AdapterFactory, AttemptToken, DeviceEventMessage, DeviceEventSender,
    HardwareWalletAdapter,
};
use crate::error::{ErrorCode, HardwareWalletError};
use crate::model::{DeviceEvent, DeviceEventPayload, HardwareWalletType};
use crate::state::{ConnectionState, ErrorReason, StateEvent, transition};
use crate::sync::lock;
use crate::transport::{self, DeviceTransport};

/// How a `connect` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    Connected,
    /// A newer attempt (or a disconnect) took over.
    Superseded,
    /// The session was torn down.
    Aborted,
    Failed(HardwareWalletError),
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Session {
    token: Option<AttemptToken>,
    adapter: Option<Arc<dyn HardwareWalletAdapter>>,
    connecting: bool,
    wallet_type: Option<HardwareWalletType>,
    device_id: Option<String>,
    current_app_name: Option<String>,
}

impl Session {
    fn take_adapter(&mut self) -> Option<Arc<dyn HardwareWalletAdapter>> {
        self.adapter.take()
    }

    fn holds(&self, adapter: &Arc<dyn HardwareWalletAdapter>) -> bool {
        self.adapter
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, adapter))
    }
}

// ── ConnectionController ────────────────────────────────────────────

/// Cheaply cloneable handle to one session's connection.
#[derive(Clone)]
pub struct ConnectionController {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    transport: Arc<dyn DeviceTransport>,
    factory: Arc<dyn AdapterFactory>,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Session>,
    next_token: AtomicU64,
    events_tx: mpsc::UnboundedSender<DeviceEventMessage>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<DeviceEventMessage>>>,
    cancel: CancellationToken,
}

impl ConnectionController {
    /// Create a controller. Device events are not processed until
    /// [`start()`](Self::start) spawns the event pump.
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        factory: Arc<dyn AdapterFactory>,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(ConnectionInner {
                transport,
                factory,
                state,
                session: Mutex::new(Session::default()),
                next_token: AtomicU64::new(0),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                cancel,
            }),
        }
    }

    /// Spawn the device-event pump. Returns `None` if already started.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let rx = lock(&self.inner.events_rx).take()?;
        let cancel = self.inner.cancel.clone();
        Some(tokio::spawn(device_event_task(self.clone(), rx, cancel)))
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn device_id(&self) -> Option<String> {
        self.session().device_id.clone()
    }

    pub fn wallet_type(&self) -> Option<HardwareWalletType> {
        self.session().wallet_type
    }

    pub fn current_app_name(&self) -> Option<String> {
        self.session().current_app_name.clone()
    }

    pub fn is_connecting(&self) -> bool {
        self.session().connecting
    }

    /// Whether an installed adapter reports a live device.
    pub fn is_adapter_connected(&self) -> bool {
        self.session()
            .adapter
            .as_ref()
            .is_some_and(|a| a.is_connected())
    }

    /// Connected or connecting: nothing for auto-connect to do.
    pub fn is_busy(&self) -> bool {
        let session = self.session();
        session.connecting || session.adapter.as_ref().is_some_and(|a| a.is_connected())
    }

    pub fn current_token(&self) -> Option<AttemptToken> {
        self.session().token
    }

    // ── Connect ──────────────────────────────────────────────────

    /// Connect to a device of `wallet_type`, discovering one when
    /// `device_id` is `None`.
    ///
    /// The most recent call wins: an earlier call still in flight
    /// resolves with [`ConnectOutcome::Superseded`] and leaves state alone.
    pub async fn connect(
        &self,
        wallet_type: HardwareWalletType,
        device_id: Option<String>,
    ) -> ConnectOutcome {
        if self.inner.cancel.is_cancelled() {
            debug!(%wallet_type, "connect after teardown ignored");
            return ConnectOutcome::Aborted;
        }

        let token = self.begin_attempt(wallet_type, device_id.as_deref());
        match self.run_attempt(token, wallet_type, device_id).await {
            Ok(outcome) => outcome,
            Err(error) => self.fail_attempt(token, error),
        }
    }

    fn begin_attempt(&self, wallet_type: HardwareWalletType, device_id: Option<&str>) -> AttemptToken {
        let token = self.allocate_token();
        let mut session = self.session();

        if let Some(old) = session.take_adapter() {
            debug!(token, "destroying previous adapter");
            old.destroy();
        }
        session.token = Some(token);
        session.connecting = true;
        session.wallet_type = Some(wallet_type);
        session.current_app_name = None;
        session.device_id = device_id.map(str::to_owned);

        info!(token, %wallet_type, device_id, "connecting to hardware wallet");
        self.publish(&session, StateEvent::Connecting);
        token
    }

    async fn run_attempt(
        &self,
        token: AttemptToken,
        wallet_type: HardwareWalletType,
        device_id: Option<String>,
    ) -> Result<ConnectOutcome, HardwareWalletError> {
        let device_id = match device_id {
            Some(id) => id,
            None => {
                let discovered =
                    transport::discover_device_id(self.inner.transport.as_ref(), wallet_type).await;
                if let Some(outcome) = self.interrupted(&self.session(), token) {
                    debug!(token, "discarding stale discovery result");
                    return Ok(outcome);
                }
                match discovered {
                    Ok(Some(id)) => id,
                    Ok(None) => {
                        return Err(HardwareWalletError::new(ErrorCode::DeviceDisconnected)
                            .with_message("No paired hardware wallet device found")
                            .with_wallet_type(Some(wallet_type)));
                    }
                    Err(e) => return Err(e.into_wallet_error(wallet_type)),
                }
            }
        };

        let adapter = {
            let mut session = self.session();
            if let Some(outcome) = self.interrupted(&session, token) {
                return Ok(outcome);
            }
            session.device_id = Some(device_id.clone());
            let events = DeviceEventSender::new(token, self.inner.events_tx.clone());
            let adapter = self.inner.factory.create(wallet_type, events)?;
            session.adapter = Some(Arc::clone(&adapter));
            adapter
        };

        let result = adapter.connect(&device_id).await;

        let mut session = self.session();
        if let Some(outcome) = self.interrupted(&session, token) {
            debug!(token, %device_id, "connection attempt superseded");
            if session.holds(&adapter) {
                session.adapter = None;
            }
            adapter.destroy();
            return Ok(outcome);
        }

        match result {
            Ok(()) => {
                session.connecting = false;
                info!(token, %wallet_type, %device_id, "hardware wallet connected");
                self.publish(&session, StateEvent::Connected);
                Ok(ConnectOutcome::Connected)
            }
            Err(e) => Err(e.classify(wallet_type)),
        }
    }

    fn fail_attempt(&self, token: AttemptToken, error: HardwareWalletError) -> ConnectOutcome {
        let mut session = self.session();
        if let Some(outcome) = self.interrupted(&session, token) {
            return outcome;
        }

        if let Some(adapter) = session.take_adapter() {
            adapter.destroy();
        }
        session.token = None;
        session.connecting = false;

        warn!(token, code = %error.code, error = %error, "hardware wallet connection failed");
        self.publish(&session, StateEvent::from_error(&error));
        ConnectOutcome::Failed(error)
    }

    // ── Disconnect / reset ───────────────────────────────────────

    /// Tear down the adapter and finish `Disconnected`. Supersedes any
    /// attempt in flight. Adapter disconnect failures are logged only.
    pub async fn disconnect(&self) {
        let (token, adapter) = {
            let mut session = self.session();
            let token = self.allocate_token();
            session.token = Some(token);
            (token, session.adapter.clone())
        };

        if let Some(adapter) = &adapter {
            if let Err(e) = adapter.disconnect().await {
                warn!(token, error = %e, "adapter disconnect failed (non-fatal)");
            }
            adapter.destroy();
        }

        let mut session = self.session();
        if adapter.as_ref().is_some_and(|a| session.holds(a)) {
            session.adapter = None;
        }
        if session.token != Some(token) {
            debug!(token, "disconnect superseded by a newer attempt");
            return;
        }

        session.token = None;
        session.connecting = false;
        session.wallet_type = None;
        session.device_id = None;
        session.current_app_name = None;

        if self.inner.cancel.is_cancelled() {
            return;
        }
        info!("hardware wallet disconnected");
        self.publish(&session, StateEvent::Disconnected);
    }

    /// Drop everything without talking to the device. Used when the
    /// active account stops being a hardware account.
    pub fn reset(&self) {
        let mut session = self.session();
        if let Some(adapter) = session.take_adapter() {
            adapter.destroy();
        }
        *session = Session::default();
        debug!("connection session reset");
        self.publish(&session, StateEvent::Disconnected);
    }

    /// Destroy the adapter on session teardown. Publishes nothing.
    pub(crate) fn teardown(&self) {
        let mut session = self.session();
        if let Some(adapter) = session.take_adapter() {
            adapter.destroy();
        }
        session.token = None;
        session.connecting = false;
    }

    /// Leave an error state: `Connected` if the adapter is still live,
    /// otherwise `Disconnected`.
    pub fn clear_error(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let session = self.session();
        let live = session.adapter.as_ref().is_some_and(|a| a.is_connected());
        let event = if live {
            StateEvent::Connected
        } else {
            StateEvent::Disconnected
        };
        self.publish(&session, event);
    }

    // ── Readiness / operations ───────────────────────────────────

    /// Connect if needed, then verify the device is unlocked with the
    /// right app open. `true` only on verified success.
    pub async fn ensure_device_ready(
        &self,
        wallet_type: HardwareWalletType,
        device_id: Option<String>,
    ) -> bool {
        if self.inner.cancel.is_cancelled() {
            return false;
        }

        let live = {
            let session = self.session();
            match (&session.adapter, session.token, &session.device_id) {
                (Some(adapter), Some(token), Some(id))
                    if adapter.is_connected()
                        && session.wallet_type == Some(wallet_type)
                        && device_id.as_ref().is_none_or(|want| want == id) =>
                {
                    Some((Arc::clone(adapter), token, id.clone()))
                }
                _ => None,
            }
        };

        let (adapter, token, device_id) = match live {
            Some(live) => live,
            None => {
                let target = device_id.or_else(|| self.device_id());
                let outcome = self.connect(wallet_type, target).await;
                if !outcome.is_connected() {
                    debug!(?outcome, "device not ready: connection did not complete");
                    return false;
                }
                let session = self.session();
                match (&session.adapter, session.token, &session.device_id) {
                    (Some(adapter), Some(token), Some(id)) => {
                        (Arc::clone(adapter), token, id.clone())
                    }
                    _ => return false,
                }
            }
        };

        let result = adapter.verify_device_ready(&device_id).await;

        let session = self.session();
        if self.interrupted(&session, token).is_some() {
            debug!(token, "discarding stale readiness result");
            return false;
        }

        match result {
            Ok(true) => {
                debug!(token, %device_id, "device ready");
                self.publish(&session, StateEvent::Ready);
                true
            }
            Ok(false) => {
                let error = HardwareWalletError::new(ErrorCode::Unknown)
                    .with_message("Device is not ready")
                    .with_wallet_type(Some(wallet_type));
                self.publish(
                    &session,
                    StateEvent::Failed {
                        reason: ErrorReason::DeviceNotReady,
                        error,
                    },
                );
                false
            }
            Err(e) => {
                let error = e.classify(wallet_type);
                debug!(token, code = %error.code, "device not ready");
                self.publish(&session, StateEvent::from_error(&error));
                false
            }
        }
    }

    /// Run the last known readiness check again.
    pub async fn retry(&self) -> bool {
        let (wallet_type, device_id) = {
            let session = self.session();
            (session.wallet_type, session.device_id.clone())
        };
        let Some(wallet_type) = wallet_type else {
            debug!("nothing to retry: no wallet type recorded");
            return false;
        };
        self.ensure_device_ready(wallet_type, device_id).await
    }

    /// Run `operation` against the live adapter, showing
    /// `AwaitingConfirmation` while it runs.
    pub async fn execute_with_wallet<T, F, Fut>(&self, operation: F) -> Result<T, HardwareWalletError>
    where
        F: FnOnce(Arc<dyn HardwareWalletAdapter>) -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let (adapter, token, wallet_type) = {
            let session = self.session();
            let (Some(adapter), Some(token)) = (session.adapter.clone(), session.token) else {
                return Err(HardwareWalletError::new(ErrorCode::DeviceDisconnected)
                    .with_message("No hardware wallet connected")
                    .with_wallet_type(session.wallet_type));
            };
            let wallet_type = session.wallet_type.unwrap_or_else(|| adapter.wallet_type());
            if !self.inner.cancel.is_cancelled() {
                self.publish(&session, StateEvent::AwaitingConfirmation);
            }
            (adapter, token, wallet_type)
        };

        let result = operation(adapter).await;

        let session = self.session();
        let stale = self.interrupted(&session, token).is_some();
        match result {
            Ok(value) => {
                if !stale {
                    self.publish(&session, StateEvent::Ready);
                }
                Ok(value)
            }
            Err(e) => {
                let error = e.classify(wallet_type);
                if !stale {
                    self.publish(&session, StateEvent::from_error(&error));
                }
                Err(error)
            }
        }
    }

    // ── Events ───────────────────────────────────────────────────

    /// Apply an adapter event. Events stamped with a superseded token,
    /// or arriving after teardown, are dropped.
    pub fn handle_device_event(&self, token: AttemptToken, payload: &DeviceEventPayload) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let mut session = self.session();
        if session.token != Some(token) {
            debug!(token, event = %payload.event, "dropping event from superseded adapter");
            return;
        }

        debug!(token, event = %payload.event, "device event");
        if payload.event == DeviceEvent::AppChanged {
            session.current_app_name.clone_from(&payload.current_app_name);
        }
        let event = StateEvent::from_device_event(payload, session.wallet_type);
        self.publish(&session, event);
    }

    /// The device went away underneath the session. Ignored while an
    /// attempt is in flight.
    pub fn handle_disconnect(&self, error: Option<HardwareWalletError>) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let mut session = self.session();
        if session.connecting {
            debug!("ignoring disconnect while connecting");
            return;
        }

        if let Some(adapter) = session.take_adapter() {
            adapter.destroy();
        }
        session.token = None;
        session.current_app_name = None;

        let event = error.map_or(StateEvent::Disconnected, |e| StateEvent::from_error(&e));
        info!(device_id = session.device_id.as_deref(), "hardware wallet lost");
        self.publish(&session, event);
    }

    // ── Internals ────────────────────────────────────────────────

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.inner.session)
    }

    fn allocate_token(&self) -> AttemptToken {
        self.inner.next_token.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn interrupted(&self, session: &Session, token: AttemptToken) -> Option<ConnectOutcome> {
        if self.inner.cancel.is_cancelled() {
            Some(ConnectOutcome::Aborted)
        } else if session.token != Some(token) {
            Some(ConnectOutcome::Superseded)
        } else {
            None
        }
    }

    /// Feed an event through the state machine and notify subscribers if
    /// the state changed. Called with the session lock held so that the
    /// token check and the publish are one step.
    fn publish(&self, session: &Session, event: StateEvent) {
        let connecting = session.connecting;
        self.inner.state.send_if_modified(|current| {
            match transition(current, event, connecting) {
                Some(next) => {
                    debug!(from = %current.status(), to = %next.status(), "connection state");
                    *current = next;
                    true
                }
                None => false,
            }
        });
    }
}

// ── Background task ─────────────────────────────────────────────────

async fn device_event_task(
    controller: ConnectionController,
    mut rx: mpsc::UnboundedReceiver<DeviceEventMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Some((token, payload)) => controller.handle_device_event(token, &payload),
                None => break,
            },
        }
    }
    debug!("device event pump stopped");
}
