// ── Simulated adapter ──
//
// Software device plus adapter pair. The device is shared state a test
// or the CLI simulator pokes at (lock it, switch apps, pull the cable);
// connected adapters hear about those changes as device events.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{AdapterError, AdapterFactory, DeviceEventSender, HardwareWalletAdapter};
use crate::error::{ErrorCode, HardwareWalletError};
use crate::model::{DeviceEvent, DeviceEventPayload, HardwareWalletType};
use crate::sync::lock;

// ── SimulatedDevice ─────────────────────────────────────────────────

#[derive(Debug)]
struct DeviceState {
    present: bool,
    locked: bool,
    open_app: Option<String>,
    latency: Duration,
    fail_next_connect: Option<AdapterError>,
    listeners: Vec<(u64, DeviceEventSender)>,
}

/// A pretend hardware wallet.
#[derive(Debug)]
pub struct SimulatedDevice {
    state: Mutex<DeviceState>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    /// Plugged in, unlocked, sitting on the dashboard.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState {
                present: true,
                locked: false,
                open_app: None,
                latency: Duration::ZERO,
                fail_next_connect: None,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn with_app(app: impl Into<String>) -> Self {
        let device = Self::new();
        lock(&device.state).open_app = Some(app.into());
        device
    }

    pub fn lock(&self) {
        let err = HardwareWalletError::new(ErrorCode::AuthenticationDeviceLocked);
        self.update(|s| s.locked = true);
        self.broadcast(&DeviceEventPayload::new(DeviceEvent::DeviceLocked).with_error(err));
    }

    pub fn unlock(&self) {
        self.update(|s| s.locked = false);
    }

    pub fn open_app(&self, app: impl Into<String>) {
        let app = app.into();
        self.update(|s| s.open_app = Some(app.clone()));
        self.broadcast(&DeviceEventPayload::app_changed(app));
    }

    pub fn close_app(&self) {
        self.update(|s| s.open_app = None);
        self.broadcast(&DeviceEventPayload::new(DeviceEvent::AppNotOpen));
    }

    /// Pull or reinsert the cable. Pulling it notifies connected adapters.
    pub fn set_present(&self, present: bool) {
        self.update(|s| s.present = present);
        if !present {
            self.broadcast(&DeviceEventPayload::new(DeviceEvent::Disconnected));
        }
    }

    /// Delay applied to every adapter `connect`.
    pub fn set_latency(&self, latency: Duration) {
        self.update(|s| s.latency = latency);
    }

    /// Make the next adapter `connect` fail with `error`.
    pub fn fail_next_connect(&self, error: AdapterError) {
        self.update(|s| s.fail_next_connect = Some(error));
    }

    pub fn is_locked(&self) -> bool {
        lock(&self.state).locked
    }

    pub fn open_app_name(&self) -> Option<String> {
        lock(&self.state).open_app.clone()
    }

    fn update(&self, f: impl FnOnce(&mut DeviceState)) {
        f(&mut lock(&self.state));
    }

    fn broadcast(&self, payload: &DeviceEventPayload) {
        let listeners: Vec<_> = lock(&self.state)
            .listeners
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in listeners {
            tx.emit(payload.clone());
        }
    }

    fn listen(&self, id: u64, events: DeviceEventSender) {
        lock(&self.state).listeners.push((id, events));
    }

    fn forget(&self, id: u64) {
        lock(&self.state).listeners.retain(|(i, _)| *i != id);
    }
}

// ── SimulatedAdapter ────────────────────────────────────────────────

static NEXT_ADAPTER_ID: AtomicU64 = AtomicU64::new(1);

pub struct SimulatedAdapter {
    id: u64,
    wallet_type: HardwareWalletType,
    device: Arc<SimulatedDevice>,
    events: DeviceEventSender,
    connected: AtomicBool,
    destroyed: AtomicBool,
    live: Option<Arc<AtomicUsize>>,
}

impl SimulatedAdapter {
    pub fn new(
        wallet_type: HardwareWalletType,
        device: Arc<SimulatedDevice>,
        events: DeviceEventSender,
    ) -> Self {
        Self {
            id: NEXT_ADAPTER_ID.fetch_add(1, Ordering::Relaxed),
            wallet_type,
            device,
            events,
            connected: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            live: None,
        }
    }

    fn error(&self, code: ErrorCode) -> AdapterError {
        AdapterError::Wallet(HardwareWalletError::new(code).with_wallet_type(Some(self.wallet_type)))
    }
}

#[async_trait]
impl HardwareWalletAdapter for SimulatedAdapter {
    fn wallet_type(&self) -> HardwareWalletType {
        self.wallet_type
    }

    async fn connect(&self, device_id: &str) -> Result<(), AdapterError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(AdapterError::Other("adapter has been destroyed".into()));
        }

        let latency = lock(&self.device.state).latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let (present, injected) = {
            let mut state = lock(&self.device.state);
            (state.present, state.fail_next_connect.take())
        };
        if let Some(error) = injected {
            debug!(device_id, error = %error, "simulated connect failure");
            return Err(error);
        }
        if !present {
            return Err(self.error(ErrorCode::DeviceDisconnected));
        }
        if self.destroyed.load(Ordering::Acquire) {
            return Err(AdapterError::Other("adapter has been destroyed".into()));
        }

        self.connected.store(true, Ordering::Release);
        self.device.listen(self.id, self.events.clone());
        debug!(device_id, adapter = self.id, "simulated device connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.connected.store(false, Ordering::Release);
        self.device.forget(self.id);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.destroyed.load(Ordering::Acquire)
    }

    async fn verify_device_ready(&self, device_id: &str) -> Result<bool, AdapterError> {
        if !self.is_connected() {
            self.connect(device_id).await?;
        }

        let (present, locked, app) = {
            let state = lock(&self.device.state);
            (state.present, state.locked, state.open_app.clone())
        };
        if !present {
            return Err(self.error(ErrorCode::DeviceDisconnected));
        }
        if locked {
            return Err(self.error(ErrorCode::AuthenticationDeviceLocked));
        }

        let Some(expected) = self.wallet_type.expected_app_name() else {
            return Ok(true);
        };
        match app {
            Some(app) if app == expected => Ok(true),
            Some(app) => Err(AdapterError::Wallet(
                HardwareWalletError::new(ErrorCode::DeviceStateWrongApp)
                    .with_wallet_type(Some(self.wallet_type))
                    .with_metadata("appName", app),
            )),
            None => Err(self.error(ErrorCode::DeviceStateEthAppClosed)),
        }
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.connected.store(false, Ordering::Release);
        self.device.forget(self.id);
        if let Some(live) = &self.live {
            live.fetch_sub(1, Ordering::AcqRel);
        }
        debug!(adapter = self.id, "simulated adapter destroyed");
    }
}

// ── Factory ─────────────────────────────────────────────────────────

/// Builds `SimulatedAdapter`s bound to one device and counts how many
/// are alive at once.
pub struct SimulatedAdapterFactory {
    device: Arc<SimulatedDevice>,
    created: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: AtomicUsize,
}

impl SimulatedAdapterFactory {
    pub fn new(device: Arc<SimulatedDevice>) -> Self {
        Self {
            device,
            created: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: AtomicUsize::new(0),
        }
    }

    pub fn device(&self) -> &Arc<SimulatedDevice> {
        &self.device
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    /// Adapters created and not yet destroyed.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Highest `live_count` ever observed.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::Acquire)
    }
}

impl AdapterFactory for SimulatedAdapterFactory {
    fn create(
        &self,
        wallet_type: HardwareWalletType,
        events: DeviceEventSender,
    ) -> Result<Arc<dyn HardwareWalletAdapter>, HardwareWalletError> {
        if wallet_type.transport_channel().is_none() {
            return Err(HardwareWalletError::new(ErrorCode::ConnectionTransportMissing)
                .with_wallet_type(Some(wallet_type)));
        }

        self.created.fetch_add(1, Ordering::AcqRel);
        let live = self.live.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_live.fetch_max(live, Ordering::AcqRel);

        let mut adapter = SimulatedAdapter::new(wallet_type, Arc::clone(&self.device), events);
        adapter.live = Some(Arc::clone(&self.live));
        Ok(Arc::new(adapter))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ledger(device: &Arc<SimulatedDevice>) -> SimulatedAdapter {
        SimulatedAdapter::new(
            HardwareWalletType::Ledger,
            Arc::clone(device),
            DeviceEventSender::detached(),
        )
    }

    #[tokio::test]
    async fn verify_reports_device_conditions() {
        let device = Arc::new(SimulatedDevice::new());
        let adapter = ledger(&device);
        adapter.connect("1").await.unwrap();

        let err = adapter.verify_device_ready("1").await.unwrap_err();
        assert_eq!(err.classify(HardwareWalletType::Ledger).code, ErrorCode::DeviceStateEthAppClosed);

        device.open_app("Bitcoin");
        let err = adapter.verify_device_ready("1").await.unwrap_err();
        assert_eq!(err.classify(HardwareWalletType::Ledger).code, ErrorCode::DeviceStateWrongApp);

        device.open_app("Ethereum");
        device.lock();
        let err = adapter.verify_device_ready("1").await.unwrap_err();
        assert_eq!(
            err.classify(HardwareWalletType::Ledger).code,
            ErrorCode::AuthenticationDeviceLocked
        );

        device.unlock();
        assert!(adapter.verify_device_ready("1").await.unwrap());
    }

    #[tokio::test]
    async fn trezor_needs_no_app() {
        let device = Arc::new(SimulatedDevice::new());
        let adapter = SimulatedAdapter::new(
            HardwareWalletType::Trezor,
            device,
            DeviceEventSender::detached(),
        );
        assert!(adapter.verify_device_ready("1").await.unwrap());
        assert!(adapter.is_connected());
    }

    #[tokio::test]
    async fn destroy_is_idempotent_and_counted() {
        let factory = SimulatedAdapterFactory::new(Arc::new(SimulatedDevice::new()));
        let adapter = factory
            .create(HardwareWalletType::Ledger, DeviceEventSender::detached())
            .unwrap();
        assert_eq!(factory.live_count(), 1);

        adapter.destroy();
        adapter.destroy();
        assert_eq!(factory.live_count(), 0);
        assert!(adapter.connect("1").await.is_err());
    }

    #[test]
    fn factory_rejects_channelless_wallets() {
        let factory = SimulatedAdapterFactory::new(Arc::new(SimulatedDevice::new()));
        let err = factory
            .create(HardwareWalletType::Qr, DeviceEventSender::detached())
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::ConnectionTransportMissing);
        assert_eq!(factory.created_count(), 0);
    }
}
