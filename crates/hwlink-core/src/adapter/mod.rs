// ── Adapter abstraction ──
//
// An adapter owns one physical device session and speaks the vendor
// protocol. The connection controller only sees this trait; device
// events flow back over a typed channel stamped with the attempt token
// the adapter was created for.

pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::{HardwareWalletError, RawError, classify};
use crate::model::{DeviceEventPayload, HardwareWalletType};

/// Identifies one connection attempt. Strictly increasing per controller.
pub type AttemptToken = u64;

pub(crate) type DeviceEventMessage = (AttemptToken, DeviceEventPayload);

// ── Errors ──────────────────────────────────────────────────────────

/// Failure reported by an adapter operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// Already classified by the adapter.
    #[error(transparent)]
    Wallet(#[from] HardwareWalletError),

    /// Vendor status word returned by the device.
    #[error("{message} (0x{status:04x})")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    /// Route through the error taxonomy. Typed errors pass unchanged.
    pub fn classify(&self, wallet_type: HardwareWalletType) -> HardwareWalletError {
        match self {
            Self::Wallet(error) => error.clone(),
            Self::Status { status, message } => classify(
                &RawError::new(message.clone()).with_status(*status),
                Some(wallet_type),
            ),
            Self::Other(message) => classify(&RawError::new(message.clone()), Some(wallet_type)),
        }
    }
}

// ── Device event channel ────────────────────────────────────────────

/// Handle an adapter uses to report device events.
#[derive(Debug, Clone)]
pub struct DeviceEventSender {
    token: AttemptToken,
    tx: Option<mpsc::UnboundedSender<DeviceEventMessage>>,
}

impl DeviceEventSender {
    pub(crate) fn new(token: AttemptToken, tx: mpsc::UnboundedSender<DeviceEventMessage>) -> Self {
        Self { token, tx: Some(tx) }
    }

    /// A sender whose events go nowhere, for adapters used standalone.
    pub fn detached() -> Self {
        Self { token: 0, tx: None }
    }

    pub fn token(&self) -> AttemptToken {
        self.token
    }

    /// Queue an event. Returns `false` once the controller is gone.
    pub fn emit(&self, payload: DeviceEventPayload) -> bool {
        self.tx
            .as_ref()
            .is_some_and(|tx| tx.send((self.token, payload)).is_ok())
    }
}

// ── Traits ──────────────────────────────────────────────────────────

#[async_trait]
pub trait HardwareWalletAdapter: Send + Sync {
    fn wallet_type(&self) -> HardwareWalletType;

    async fn connect(&self, device_id: &str) -> Result<(), AdapterError>;

    async fn disconnect(&self) -> Result<(), AdapterError>;

    fn is_connected(&self) -> bool;

    /// Check that the device is unlocked with the expected app open.
    ///
    /// `Ok(false)` means reachable but not ready.
    async fn verify_device_ready(&self, device_id: &str) -> Result<bool, AdapterError>;

    /// Release every resource. Must be idempotent.
    fn destroy(&self);
}

/// Builds adapters for a wallet type.
pub trait AdapterFactory: Send + Sync {
    fn create(
        &self,
        wallet_type: HardwareWalletType,
        events: DeviceEventSender,
    ) -> Result<Arc<dyn HardwareWalletAdapter>, HardwareWalletError>;
}

impl<F> AdapterFactory for F
where
    F: Fn(
            HardwareWalletType,
            DeviceEventSender,
        ) -> Result<Arc<dyn HardwareWalletAdapter>, HardwareWalletError>
        + Send
        + Sync,
{
    fn create(
        &self,
        wallet_type: HardwareWalletType,
        events: DeviceEventSender,
    ) -> Result<Arc<dyn HardwareWalletAdapter>, HardwareWalletError> {
        self(wallet_type, events)
    }
}
