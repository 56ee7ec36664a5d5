// ── Device transport ──
//
// The host's USB/HID access (WebHID, WebUSB, or a native equivalent) sits
// behind `DeviceTransport`. Everything above this module works on wallet
// types; the helpers here translate those into channels and filters.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ErrorCode, HardwareWalletError, classify_message};
use crate::model::{
    DeviceDescriptor, DeviceFilter, HardwareWalletType, NativeDeviceEvent, PermissionState,
    TransportChannel,
};

/// Phrases hosts use when the user dismisses the device chooser.
const CANCELLATION_MESSAGES: &[&str] = &[
    "user cancelled the requestdevice() chooser",
    "the user cancelled the dialog",
    "request cancelled",
    "permission request was denied by user",
    "no device selected",
    "cancelled",
];

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{channel} is not available in this environment")]
    Unavailable { channel: TransportChannel },

    #[error("{wallet_type} devices have no supported transport")]
    Unsupported { wallet_type: HardwareWalletType },

    #[error("device selection was cancelled")]
    Cancelled,

    #[error("access to the device was denied: {0}")]
    Denied(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the failure is the user dismissing or refusing the chooser.
    pub fn is_user_cancellation(&self) -> bool {
        match self {
            Self::Cancelled | Self::Denied(_) => true,
            Self::Other(message) => {
                let lower = message.to_ascii_lowercase();
                CANCELLATION_MESSAGES.iter().any(|m| lower.contains(m))
            }
            Self::Unavailable { .. } | Self::Unsupported { .. } => false,
        }
    }

    /// Lift into the domain taxonomy.
    pub fn into_wallet_error(self, wallet_type: HardwareWalletType) -> HardwareWalletError {
        let wallet = Some(wallet_type);
        match self {
            Self::Unavailable { .. } | Self::Unsupported { .. } => {
                HardwareWalletError::new(ErrorCode::ConnectionTransportMissing)
                    .with_wallet_type(wallet)
                    .with_cause(&self)
            }
            Self::Cancelled => HardwareWalletError::new(ErrorCode::UserCancelled)
                .with_wallet_type(wallet)
                .with_cause(&self),
            Self::Denied(_) => HardwareWalletError::new(ErrorCode::PermissionDenied)
                .with_wallet_type(wallet)
                .with_cause(&self),
            Self::Other(ref message) => classify_message(message, wallet).with_cause(&self),
        }
    }
}

// ── Transport trait ─────────────────────────────────────────────────

/// Host capability for enumerating, requesting, and watching devices.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Whether the channel exists at all in this environment.
    fn is_available(&self, channel: TransportChannel) -> bool;

    /// Devices the user has already granted access to.
    async fn paired_devices(
        &self,
        channel: TransportChannel,
    ) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Open the host's device chooser.
    async fn request_device(
        &self,
        channel: TransportChannel,
        filters: &[DeviceFilter],
    ) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Plug/unplug notifications for the channel, unfiltered.
    ///
    /// Returns `None` when the channel is unavailable.
    fn subscribe(&self, channel: TransportChannel) -> Option<broadcast::Receiver<NativeDeviceEvent>>;
}

// ── Capability and permission helpers ───────────────────────────────

fn available_channel(
    transport: &dyn DeviceTransport,
    wallet_type: HardwareWalletType,
) -> Option<TransportChannel> {
    wallet_type
        .transport_channel()
        .filter(|&channel| transport.is_available(channel))
}

pub fn is_transport_available(transport: &dyn DeviceTransport, wallet_type: HardwareWalletType) -> bool {
    available_channel(transport, wallet_type).is_some()
}

/// Current permission for a wallet's devices.
///
/// `Denied` without enumerating when the channel is unavailable;
/// `Unknown` when enumeration itself fails.
pub async fn check_permission(
    transport: &dyn DeviceTransport,
    wallet_type: HardwareWalletType,
) -> PermissionState {
    let Some(channel) = available_channel(transport, wallet_type) else {
        debug!(%wallet_type, "transport unavailable, permission denied");
        return PermissionState::Denied;
    };

    match transport.paired_devices(channel).await {
        Ok(devices) => {
            let filters = wallet_type.device_filters();
            if devices.iter().any(|d| DeviceFilter::any_matches(filters, d)) {
                PermissionState::Granted
            } else {
                PermissionState::Prompt
            }
        }
        Err(e) => {
            warn!(%wallet_type, error = %e, "failed to enumerate paired devices");
            PermissionState::Unknown
        }
    }
}

/// Ask the user to pick a device. Never fails: cancellation, denial,
/// unavailability and a non-matching selection all yield `false`.
pub async fn request_permission(
    transport: &dyn DeviceTransport,
    wallet_type: HardwareWalletType,
) -> bool {
    let Some(channel) = available_channel(transport, wallet_type) else {
        debug!(%wallet_type, "transport unavailable, cannot request permission");
        return false;
    };

    let filters = wallet_type.device_filters();
    match transport.request_device(channel, filters).await {
        Ok(devices) => {
            let Some(selected) = devices.first() else {
                debug!(%wallet_type, "chooser returned no device");
                return false;
            };
            let matched = DeviceFilter::any_matches(filters, selected);
            if !matched {
                warn!(
                    %wallet_type,
                    vendor_id = selected.vendor_id,
                    product_id = selected.product_id,
                    "selected device does not belong to this wallet"
                );
            }
            matched
        }
        Err(e) if e.is_user_cancellation() => {
            debug!(%wallet_type, "user dismissed the device chooser");
            false
        }
        Err(e) => {
            warn!(%wallet_type, error = %e, "device request failed");
            false
        }
    }
}

/// Paired devices belonging to the wallet. Enumeration errors yield an
/// empty list.
pub async fn matching_devices(
    transport: &dyn DeviceTransport,
    wallet_type: HardwareWalletType,
) -> Vec<DeviceDescriptor> {
    match discover_devices(transport, wallet_type).await {
        Ok(devices) => devices,
        Err(e) => {
            debug!(%wallet_type, error = %e, "device enumeration failed");
            Vec::new()
        }
    }
}

async fn discover_devices(
    transport: &dyn DeviceTransport,
    wallet_type: HardwareWalletType,
) -> Result<Vec<DeviceDescriptor>, TransportError> {
    let channel = wallet_type
        .transport_channel()
        .ok_or(TransportError::Unsupported { wallet_type })?;
    if !transport.is_available(channel) {
        return Err(TransportError::Unavailable { channel });
    }

    let filters = wallet_type.device_filters();
    let devices = transport.paired_devices(channel).await?;
    Ok(devices
        .into_iter()
        .filter(|d| DeviceFilter::any_matches(filters, d))
        .collect())
}

/// Id of the first paired device for the wallet, if any.
pub async fn discover_device_id(
    transport: &dyn DeviceTransport,
    wallet_type: HardwareWalletType,
) -> Result<Option<String>, TransportError> {
    let devices = discover_devices(transport, wallet_type).await?;
    Ok(devices.first().map(DeviceDescriptor::device_id))
}

/// Whether a paired device of this wallet is currently attached. With a
/// `device_id`, that specific device must be present.
pub async fn is_device_connected(
    transport: &dyn DeviceTransport,
    wallet_type: HardwareWalletType,
    device_id: Option<&str>,
) -> bool {
    let devices = matching_devices(transport, wallet_type).await;
    match device_id {
        Some(id) => devices.iter().any(|d| d.device_id() == id),
        None => !devices.is_empty(),
    }
}

// ── Native event subscription ───────────────────────────────────────

/// Filtered stream of plug/unplug events for one wallet type.
///
/// Dropping the subscription stops forwarding.
pub struct DeviceEventSubscription {
    rx: mpsc::UnboundedReceiver<NativeDeviceEvent>,
    cancel: CancellationToken,
}

impl DeviceEventSubscription {
    fn inactive() -> Self {
        let (_, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        Self { rx, cancel }
    }

    /// Next matching event, or `None` once unsubscribed or the transport
    /// stops publishing.
    pub async fn recv(&mut self) -> Option<NativeDeviceEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for DeviceEventSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Subscribe to native connect/disconnect events for the wallet's devices.
///
/// Spawns a forwarding task on the current Tokio runtime. An unavailable
/// channel yields an inactive subscription.
pub fn subscribe_device_events(
    transport: &dyn DeviceTransport,
    wallet_type: HardwareWalletType,
) -> DeviceEventSubscription {
    let Some(mut source) =
        available_channel(transport, wallet_type).and_then(|channel| transport.subscribe(channel))
    else {
        debug!(%wallet_type, "no native event source for wallet");
        return DeviceEventSubscription::inactive();
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let filters = wallet_type.device_filters();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = task_cancel.cancelled() => break,
                event = source.recv() => match event {
                    Ok(event) => {
                        if DeviceFilter::any_matches(filters, event.device())
                            && tx.send(event).is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%wallet_type, skipped, "native device events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        debug!(%wallet_type, "native device event forwarding stopped");
    });

    DeviceEventSubscription { rx, cancel }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn chooser_cancellation_messages() {
        for message in [
            "User cancelled the requestDevice() chooser.",
            "The user cancelled the dialog",
            "Request cancelled",
            "cancelled",
            "Permission request was denied by user",
        ] {
            assert!(
                TransportError::Other(message.into()).is_user_cancellation(),
                "{message}"
            );
        }
        assert!(!TransportError::Other("device busy".into()).is_user_cancellation());
        assert!(
            !TransportError::Unavailable {
                channel: TransportChannel::WebHid
            }
            .is_user_cancellation()
        );
    }

    #[test]
    fn unavailable_lifts_to_transport_missing() {
        let error = TransportError::Unavailable {
            channel: TransportChannel::WebUsb,
        }
        .into_wallet_error(HardwareWalletType::Trezor);
        assert_eq!(error.code, ErrorCode::ConnectionTransportMissing);
        assert_eq!(error.metadata.wallet_type, Some(HardwareWalletType::Trezor));
        assert!(error.cause.unwrap().contains("WebUSB"));
    }
}
