// ── Permission controller ──
//
// Wraps the transport permission helpers with an observable state and a
// last-call-wins guard: results from a check or request that has since
// been overtaken by a newer call are discarded.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::{HardwareWalletType, PermissionState};
use crate::sync::lock;
use crate::transport::{self, DeviceTransport};

#[derive(Clone)]
pub struct PermissionController {
    inner: Arc<PermissionInner>,
}

struct PermissionInner {
    transport: Arc<dyn DeviceTransport>,
    state: watch::Sender<PermissionState>,
    /// Token of the most recent call. Shared by checks and requests.
    latest: Mutex<u64>,
    cancel: CancellationToken,
}

impl PermissionController {
    pub fn new(transport: Arc<dyn DeviceTransport>, cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(PermissionState::Unknown);
        Self {
            inner: Arc::new(PermissionInner {
                transport,
                state,
                latest: Mutex::new(0),
                cancel,
            }),
        }
    }

    pub fn state(&self) -> PermissionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PermissionState> {
        self.inner.state.subscribe()
    }

    /// Query the current permission without prompting.
    pub async fn check_permission(&self, wallet_type: HardwareWalletType) -> PermissionState {
        let token = self.begin();
        let permission = transport::check_permission(self.inner.transport.as_ref(), wallet_type).await;
        self.commit(token, permission);
        permission
    }

    /// Prompt the user to grant access to a device.
    pub async fn request_permission(&self, wallet_type: HardwareWalletType) -> bool {
        let token = self.begin();
        let granted = transport::request_permission(self.inner.transport.as_ref(), wallet_type).await;
        let permission = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        self.commit(token, permission);
        granted
    }

    /// Forget the last result and invalidate calls in flight.
    pub fn reset(&self) {
        let token = self.begin();
        self.commit(token, PermissionState::Unknown);
    }

    fn begin(&self) -> u64 {
        let mut latest = lock(&self.inner.latest);
        *latest += 1;
        *latest
    }

    fn commit(&self, token: u64, permission: PermissionState) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let latest = lock(&self.inner.latest);
        if *latest != token {
            debug!(token, latest = *latest, %permission, "discarding superseded permission result");
            return;
        }
        self.inner.state.send_if_modified(|current| {
            let changed = *current != permission;
            *current = permission;
            changed
        });
    }
}
