// ── Hardware wallet provider ──
//
// Session-scoped facade. Wires the connection, permission and
// auto-connect controllers together, owns the lifetime cancellation
// token, and runs the background tasks (device-event pump, account
// watcher) until shut down or dropped.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapter::{AdapterError, AdapterFactory, HardwareWalletAdapter};
use crate::auto_connect::AutoConnectController;
use crate::config::ProviderConfig;
use crate::connection::{ConnectOutcome, ConnectionController};
use crate::error::HardwareWalletError;
use crate::model::{AccountSelection, HardwareWalletType, PermissionState};
use crate::permission::PermissionController;
use crate::state::ConnectionState;
use crate::stream::ConnectionStateStream;
use crate::sync::lock;
use crate::transport::{self, DeviceTransport};

/// The entry point for hosts.
///
/// Cheaply cloneable. Must be created inside a Tokio runtime: `new`
/// spawns the device-event pump.
#[derive(Clone)]
pub struct HardwareWalletProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    config: ProviderConfig,
    transport: Arc<dyn DeviceTransport>,
    connection: ConnectionController,
    permission: PermissionController,
    auto_connect: AutoConnectController,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.connection.teardown();
    }
}

impl HardwareWalletProvider {
    pub fn new(
        config: ProviderConfig,
        transport: Arc<dyn DeviceTransport>,
        factory: Arc<dyn AdapterFactory>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let connection =
            ConnectionController::new(Arc::clone(&transport), factory, cancel.child_token());
        let permission = PermissionController::new(Arc::clone(&transport), cancel.child_token());
        let auto_connect = AutoConnectController::new(
            config.auto_connect.clone(),
            connection.clone(),
            permission.clone(),
            Arc::clone(&transport),
            cancel.child_token(),
        );

        let handles = connection.start().into_iter().collect();

        Self {
            inner: Arc::new(ProviderInner {
                config,
                transport,
                connection,
                permission,
                auto_connect,
                cancel,
                task_handles: Mutex::new(handles),
            }),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.inner.config
    }

    pub fn connection(&self) -> &ConnectionController {
        &self.inner.connection
    }

    pub fn permission(&self) -> &PermissionController {
        &self.inner.permission
    }

    pub fn auto_connect(&self) -> &AutoConnectController {
        &self.inner.auto_connect
    }

    // ── Account ──────────────────────────────────────────────────

    /// Feed the current account selection.
    pub async fn set_account(&self, selection: AccountSelection) {
        self.inner.auto_connect.on_account_changed(selection).await;
    }

    /// Follow an account store: every published selection is fed to
    /// [`set_account()`](Self::set_account) until shutdown.
    pub fn watch_accounts(&self, mut accounts: watch::Receiver<AccountSelection>) {
        let auto_connect = self.inner.auto_connect.clone();
        let cancel = self.inner.cancel.clone();

        let handle = tokio::spawn(async move {
            let initial = accounts.borrow_and_update().clone();
            auto_connect.on_account_changed(initial).await;
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    changed = accounts.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let selection = accounts.borrow_and_update().clone();
                        auto_connect.on_account_changed(selection).await;
                    }
                }
            }
            debug!("account watcher stopped");
        });
        lock(&self.inner.task_handles).push(handle);
    }

    pub fn account(&self) -> AccountSelection {
        self.inner.auto_connect.account()
    }

    pub fn wallet_type(&self) -> Option<HardwareWalletType> {
        self.account().wallet_type()
    }

    pub fn is_hardware_wallet_account(&self) -> bool {
        self.wallet_type().is_some()
    }

    /// Whether the host can reach the selected wallet at all.
    pub fn is_transport_available(&self) -> bool {
        self.wallet_type().is_some_and(|wallet_type| {
            transport::is_transport_available(self.inner.transport.as_ref(), wallet_type)
        })
    }

    // ── State ────────────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn subscribe(&self) -> ConnectionStateStream {
        ConnectionStateStream::new(self.inner.connection.subscribe())
    }

    pub fn device_id(&self) -> Option<String> {
        self.inner.connection.device_id()
    }

    pub fn current_app_name(&self) -> Option<String> {
        self.inner.connection.current_app_name()
    }

    pub fn permission_state(&self) -> PermissionState {
        self.inner.permission.state()
    }

    // ── Actions ──────────────────────────────────────────────────

    pub async fn connect(
        &self,
        wallet_type: HardwareWalletType,
        device_id: Option<String>,
    ) -> ConnectOutcome {
        self.inner.connection.connect(wallet_type, device_id).await
    }

    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await;
    }

    pub fn clear_error(&self) {
        self.inner.connection.clear_error();
    }

    pub async fn retry(&self) -> bool {
        self.inner.connection.retry().await
    }

    /// Make sure the selected hardware wallet is ready to sign. Software
    /// accounts have nothing to prepare and report ready.
    pub async fn ensure_device_ready(&self, device_id: Option<String>) -> bool {
        let Some(wallet_type) = self.wallet_type() else {
            return true;
        };
        self.inner
            .connection
            .ensure_device_ready(wallet_type, device_id)
            .await
    }

    /// `Denied` for software accounts.
    pub async fn check_permission(&self) -> PermissionState {
        match self.wallet_type() {
            Some(wallet_type) => self.inner.permission.check_permission(wallet_type).await,
            None => PermissionState::Denied,
        }
    }

    pub async fn request_permission(&self) -> bool {
        match self.wallet_type() {
            Some(wallet_type) => self.inner.permission.request_permission(wallet_type).await,
            None => false,
        }
    }

    pub async fn execute_with_wallet<T, F, Fut>(&self, operation: F) -> Result<T, HardwareWalletError>
    where
        F: FnOnce(Arc<dyn HardwareWalletAdapter>) -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        self.inner.connection.execute_with_wallet(operation).await
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Stop every background task and destroy the adapter. Later calls
    /// to any action are no-ops.
    pub async fn shutdown(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        info!("shutting down hardware wallet provider");
        self.inner.cancel.cancel();
        self.inner.auto_connect.stop_listening();
        self.inner.connection.teardown();

        let mut handles: Vec<_> = lock(&self.inner.task_handles).drain(..).collect();
        handles.extend(self.inner.auto_connect.take_tasks());
        for handle in handles {
            let _ = handle.await;
        }
    }
}
