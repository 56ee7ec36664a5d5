// Integration tests for `HardwareWalletProvider`: auto-connect on account
// changes, native plug/unplug handling, retries and shutdown.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::watch;

use hwlink_core::model::LEDGER_VENDOR_ID;
use hwlink_core::{
    AccountSelection, AdapterError, AutoConnectConfig, ConnectOutcome, ConnectionState,
    DeviceDescriptor, HardwareWalletProvider, HardwareWalletType, InMemoryTransport,
    NativeDeviceEvent, PermissionState, ProviderConfig, SimulatedAdapterFactory, SimulatedDevice,
    TransportChannel,
};

const LEDGER: HardwareWalletType = HardwareWalletType::Ledger;
const TIMEOUT: Duration = Duration::from_secs(5);

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    provider: HardwareWalletProvider,
    transport: Arc<InMemoryTransport>,
    factory: Arc<SimulatedAdapterFactory>,
}

fn harness(config: ProviderConfig) -> Harness {
    let transport = Arc::new(InMemoryTransport::new());
    let device = Arc::new(SimulatedDevice::with_app("Ethereum"));
    let factory = Arc::new(SimulatedAdapterFactory::new(device));
    let provider = HardwareWalletProvider::new(config, transport.clone(), factory.clone());
    Harness {
        provider,
        transport,
        factory,
    }
}

fn ledger_device(product_id: u16) -> DeviceDescriptor {
    DeviceDescriptor::new(LEDGER_VENDOR_ID, product_id)
}

fn ledger_account() -> AccountSelection {
    AccountSelection::hardware(LEDGER, "0x5aeda56215b167893e80b4fe645ba6d5bab767de")
}

fn software_account() -> AccountSelection {
    AccountSelection::new("HD Key Tree", "0x8617e340b3d01fa5f11f306f4090fd50e238070d")
}

async fn wait_for_state(
    provider: &HardwareWalletProvider,
    predicate: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    let mut states = provider.subscribe();
    tokio::time::timeout(TIMEOUT, states.wait_for(predicate))
        .await
        .unwrap()
        .unwrap()
}

// ── Account changes ─────────────────────────────────────────────────

#[tokio::test]
async fn test_hardware_account_auto_connects() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(123));

    h.provider.set_account(ledger_account()).await;

    assert_eq!(h.provider.connection_state(), ConnectionState::Connected);
    assert_eq!(h.provider.device_id().as_deref(), Some("123"));
    assert_eq!(h.provider.permission_state(), PermissionState::Granted);
    assert_eq!(h.provider.auto_connect().completed_for(), Some(ledger_account()));
    assert!(h.provider.is_hardware_wallet_account());
    assert!(h.provider.is_transport_available());
}

#[tokio::test]
async fn test_same_account_does_not_reconnect() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(123));

    h.provider.set_account(ledger_account()).await;
    h.provider.set_account(ledger_account()).await;

    assert_eq!(h.factory.created_count(), 1);
}

#[tokio::test]
async fn test_disabled_auto_connect_only_checks_permission() {
    let config = ProviderConfig {
        auto_connect: AutoConnectConfig {
            enabled: false,
            ..AutoConnectConfig::default()
        },
    };
    let h = harness(config);
    h.transport.pair(TransportChannel::WebHid, ledger_device(123));

    h.provider.set_account(ledger_account()).await;

    assert_eq!(h.provider.permission_state(), PermissionState::Granted);
    assert_eq!(h.provider.connection_state(), ConnectionState::Disconnected);
    assert_eq!(h.factory.created_count(), 0);
}

#[tokio::test]
async fn test_software_account_releases_hardware_wallet() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(123));
    h.provider.set_account(ledger_account()).await;
    assert!(h.provider.auto_connect().is_listening());

    h.provider.set_account(software_account()).await;

    assert_eq!(h.provider.connection_state(), ConnectionState::Disconnected);
    assert_eq!(h.provider.permission_state(), PermissionState::Unknown);
    assert_eq!(h.provider.device_id(), None);
    assert_eq!(h.provider.auto_connect().completed_for(), None);
    assert!(!h.provider.auto_connect().is_listening());
    assert_eq!(h.factory.live_count(), 0);
    assert!(!h.provider.is_hardware_wallet_account());

    assert!(h.provider.ensure_device_ready(None).await);
    assert_eq!(h.provider.check_permission().await, PermissionState::Denied);
    assert!(!h.provider.request_permission().await);
}

#[tokio::test]
async fn test_watch_accounts_follows_store() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(9));
    let (accounts, rx) = watch::channel(software_account());

    h.provider.watch_accounts(rx);
    accounts.send(ledger_account()).unwrap();

    wait_for_state(&h.provider, ConnectionState::is_connected).await;
    assert_eq!(h.provider.device_id().as_deref(), Some("9"));

    accounts.send(software_account()).unwrap();
    wait_for_state(&h.provider, |s| *s == ConnectionState::Disconnected).await;
}

#[tokio::test(start_paused = true)]
async fn test_rapid_account_switch_discards_stale_discovery() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(123));
    h.transport.set_latency(Duration::from_millis(100));
    let first = AccountSelection::hardware(LEDGER, "0xA");
    let second = AccountSelection::hardware(LEDGER, "0xB");

    let pending = tokio::spawn({
        let provider = h.provider.clone();
        let first = first.clone();
        async move { provider.set_account(first).await }
    });
    // Permission check done, discovery for the first account in flight.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.factory.created_count(), 0);

    h.provider.set_account(second.clone()).await;
    pending.await.unwrap();

    assert_eq!(h.provider.connection_state(), ConnectionState::Connected);
    assert_eq!(h.provider.auto_connect().completed_for(), Some(second));
    assert_eq!(h.factory.created_count(), 1);
}

// ── Native device events ────────────────────────────────────────────

#[tokio::test]
async fn test_plugging_in_device_connects() {
    let h = harness(ProviderConfig::default());

    h.provider.set_account(ledger_account()).await;
    assert_eq!(h.provider.permission_state(), PermissionState::Prompt);
    assert_eq!(h.provider.connection_state(), ConnectionState::Disconnected);

    h.transport.plug_in(TransportChannel::WebHid, ledger_device(77));

    wait_for_state(&h.provider, ConnectionState::is_connected).await;
    assert_eq!(h.provider.device_id().as_deref(), Some("77"));
    assert_eq!(h.provider.permission_state(), PermissionState::Granted);
}

#[tokio::test]
async fn test_unplugging_untracked_device_is_ignored() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(123));
    h.provider.set_account(ledger_account()).await;

    h.provider
        .auto_connect()
        .handle_native_event(NativeDeviceEvent::Disconnected(ledger_device(999)))
        .await;
    assert_eq!(h.provider.connection_state(), ConnectionState::Connected);

    h.provider
        .auto_connect()
        .handle_native_event(NativeDeviceEvent::Disconnected(ledger_device(123)))
        .await;
    assert_eq!(h.provider.connection_state(), ConnectionState::Disconnected);
    assert_eq!(h.provider.device_id().as_deref(), Some("123"));
    assert_eq!(h.factory.live_count(), 0);
}

#[tokio::test]
async fn test_attach_while_connected_is_ignored() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(1));
    h.provider.set_account(ledger_account()).await;

    h.provider
        .auto_connect()
        .handle_native_event(NativeDeviceEvent::Connected(ledger_device(2)))
        .await;

    assert_eq!(h.factory.created_count(), 1);
    assert_eq!(h.provider.device_id().as_deref(), Some("1"));
}

#[tokio::test]
async fn test_device_lock_surfaces_as_error_state() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(1));
    h.provider.set_account(ledger_account()).await;
    assert!(h.provider.ensure_device_ready(None).await);

    h.factory.device().lock();
    let state = wait_for_state(&h.provider, ConnectionState::is_error).await;
    assert!(matches!(
        state,
        ConnectionState::Error {
            reason: hwlink_core::ErrorReason::Locked,
            ..
        }
    ));

    h.factory.device().unlock();
    assert!(h.provider.retry().await);
    assert_eq!(h.provider.connection_state(), ConnectionState::Ready);
}

// ── Retries ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_failed_auto_connect_retries_with_backoff() {
    let config = ProviderConfig {
        auto_connect: AutoConnectConfig {
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(4),
            max_retries: 2,
            ..AutoConnectConfig::default()
        },
    };
    let h = harness(config);
    h.transport.pair(TransportChannel::WebHid, ledger_device(5));
    h.factory
        .device()
        .fail_next_connect(AdapterError::Other("USB transfer stalled".into()));

    let started = tokio::time::Instant::now();
    h.provider.set_account(ledger_account()).await;
    assert!(h.provider.connection_state().is_error());
    assert_eq!(h.factory.live_count(), 0);

    wait_for_state(&h.provider, ConnectionState::is_connected).await;
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(h.factory.created_count(), 2);
    assert_eq!(h.provider.auto_connect().completed_for(), Some(ledger_account()));
}

#[tokio::test(start_paused = true)]
async fn test_user_rejection_is_not_retried() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(5));
    h.factory.device().fail_next_connect(AdapterError::Status {
        status: 0x6985,
        message: "Condition of use not satisfied".into(),
    });

    h.provider.set_account(ledger_account()).await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.factory.created_count(), 1);
    assert!(h.provider.connection_state().is_error());
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_shutdown_stops_everything() {
    let h = harness(ProviderConfig::default());
    h.transport.pair(TransportChannel::WebHid, ledger_device(3));
    h.provider.set_account(ledger_account()).await;
    assert_eq!(h.factory.live_count(), 1);

    h.provider.shutdown().await;

    assert!(h.provider.is_shut_down());
    assert_eq!(h.factory.live_count(), 0);
    assert!(!h.provider.auto_connect().is_listening());
    assert_eq!(h.provider.connect(LEDGER, None).await, ConnectOutcome::Aborted);
    assert!(!h.provider.ensure_device_ready(None).await);

    // Idempotent.
    h.provider.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_joins_retry_timers() {
    let config = ProviderConfig {
        auto_connect: AutoConnectConfig {
            initial_retry_delay: Duration::from_secs(10),
            ..AutoConnectConfig::default()
        },
    };
    let h = harness(config);
    h.transport.pair(TransportChannel::WebHid, ledger_device(5));
    h.factory
        .device()
        .fail_next_connect(AdapterError::Other("USB transfer stalled".into()));

    h.provider.set_account(ledger_account()).await;
    assert!(h.provider.connection_state().is_error());
    // Native event listener plus the pending retry timer.
    assert_eq!(h.provider.auto_connect().pending_tasks(), 2);

    h.provider.shutdown().await;
    assert_eq!(h.provider.auto_connect().pending_tasks(), 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.factory.created_count(), 1);
}
