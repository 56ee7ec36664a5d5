// ── Adapter device events ──

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::HardwareWalletError;

/// Asynchronous notifications an adapter raises while it owns a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceEvent {
    Disconnected,
    DeviceLocked,
    AppNotOpen,
    AppChanged,
    ConnectionFailed,
    OperationTimeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEventPayload {
    pub event: DeviceEvent,
    pub error: Option<HardwareWalletError>,
    /// Application reported by the device, set on `AppChanged`.
    pub current_app_name: Option<String>,
}

impl DeviceEventPayload {
    pub fn new(event: DeviceEvent) -> Self {
        Self {
            event,
            error: None,
            current_app_name: None,
        }
    }

    pub fn app_changed(app_name: impl Into<String>) -> Self {
        Self::new(DeviceEvent::AppChanged).with_app_name(app_name)
    }

    pub fn with_error(mut self, error: HardwareWalletError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.current_app_name = Some(app_name.into());
        self
    }
}
