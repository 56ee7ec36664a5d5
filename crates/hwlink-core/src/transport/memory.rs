// ── In-memory transport ──
//
// Scriptable `DeviceTransport` used by tests and the simulator. Devices
// are paired, plugged and unplugged by hand; chooser outcomes are queued
// ahead of time.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::{DeviceTransport, TransportError};
use crate::model::{DeviceDescriptor, DeviceFilter, NativeDeviceEvent, TransportChannel};
use crate::sync::lock;

const EVENT_CHANNEL_SIZE: usize = 64;

/// Scripted outcome of the next `request_device` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChooserResponse {
    Select(DeviceDescriptor),
    Cancel,
    Deny,
    Fail(String),
}

#[derive(Default)]
struct MemoryState {
    unavailable: HashSet<TransportChannel>,
    paired: Vec<(TransportChannel, DeviceDescriptor)>,
    chooser: VecDeque<ChooserResponse>,
    enumeration_error: Option<String>,
    enumeration_calls: usize,
    chooser_calls: usize,
    latency: Duration,
}

pub struct InMemoryTransport {
    state: Mutex<MemoryState>,
    events: HashMap<TransportChannel, broadcast::Sender<NativeDeviceEvent>>,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    /// Both channels available, nothing paired.
    pub fn new() -> Self {
        let events = [TransportChannel::WebHid, TransportChannel::WebUsb]
            .into_iter()
            .map(|channel| (channel, broadcast::channel(EVENT_CHANNEL_SIZE).0))
            .collect();
        Self {
            state: Mutex::new(MemoryState::default()),
            events,
        }
    }

    pub fn set_available(&self, channel: TransportChannel, available: bool) {
        let mut state = lock(&self.state);
        if available {
            state.unavailable.remove(&channel);
        } else {
            state.unavailable.insert(channel);
        }
    }

    /// Grant access to a device without raising a connect event.
    pub fn pair(&self, channel: TransportChannel, device: DeviceDescriptor) {
        let mut state = lock(&self.state);
        if !state.paired.iter().any(|(c, d)| *c == channel && *d == device) {
            state.paired.push((channel, device));
        }
    }

    pub fn unpair(&self, channel: TransportChannel, device: &DeviceDescriptor) {
        lock(&self.state)
            .paired
            .retain(|(c, d)| !(*c == channel && d == device));
    }

    /// Attach a paired device and announce it.
    pub fn plug_in(&self, channel: TransportChannel, device: DeviceDescriptor) {
        self.pair(channel, device.clone());
        self.emit(channel, NativeDeviceEvent::Connected(device));
    }

    /// Detach a device and announce it.
    pub fn unplug(&self, channel: TransportChannel, device: DeviceDescriptor) {
        self.unpair(channel, &device);
        self.emit(channel, NativeDeviceEvent::Disconnected(device));
    }

    /// Publish a raw native event. Returns the number of listeners reached.
    pub fn emit(&self, channel: TransportChannel, event: NativeDeviceEvent) -> usize {
        self.events
            .get(&channel)
            .and_then(|tx| tx.send(event).ok())
            .unwrap_or(0)
    }

    pub fn queue_chooser_response(&self, response: ChooserResponse) {
        lock(&self.state).chooser.push_back(response);
    }

    /// Make every enumeration fail with `message` until cleared with `None`.
    pub fn fail_enumeration(&self, message: Option<String>) {
        lock(&self.state).enumeration_error = message;
    }

    /// Delay applied to every enumeration and chooser call. The paired
    /// list is read before the delay.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    pub fn enumeration_count(&self) -> usize {
        lock(&self.state).enumeration_calls
    }

    pub fn chooser_count(&self) -> usize {
        lock(&self.state).chooser_calls
    }

    fn check_available(&self, channel: TransportChannel) -> Result<(), TransportError> {
        if lock(&self.state).unavailable.contains(&channel) {
            Err(TransportError::Unavailable { channel })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceTransport for InMemoryTransport {
    fn is_available(&self, channel: TransportChannel) -> bool {
        !lock(&self.state).unavailable.contains(&channel)
    }

    async fn paired_devices(
        &self,
        channel: TransportChannel,
    ) -> Result<Vec<DeviceDescriptor>, TransportError> {
        self.check_available(channel)?;

        let (snapshot, latency) = {
            let mut state = lock(&self.state);
            state.enumeration_calls += 1;
            let snapshot = match &state.enumeration_error {
                Some(message) => Err(TransportError::Other(message.clone())),
                None => Ok(state
                    .paired
                    .iter()
                    .filter(|(c, _)| *c == channel)
                    .map(|(_, d)| d.clone())
                    .collect::<Vec<_>>()),
            };
            (snapshot, state.latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        snapshot
    }

    async fn request_device(
        &self,
        channel: TransportChannel,
        filters: &[DeviceFilter],
    ) -> Result<Vec<DeviceDescriptor>, TransportError> {
        self.check_available(channel)?;

        let (response, latency) = {
            let mut state = lock(&self.state);
            state.chooser_calls += 1;
            let response = state
                .chooser
                .pop_front()
                .unwrap_or(ChooserResponse::Cancel);
            (response, state.latency)
        };
        debug!(%channel, filters = filters.len(), ?response, "device chooser");

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match response {
            ChooserResponse::Select(device) => {
                self.pair(channel, device.clone());
                Ok(vec![device])
            }
            ChooserResponse::Cancel => Err(TransportError::Other(
                "User cancelled the requestDevice() chooser.".into(),
            )),
            ChooserResponse::Deny => Err(TransportError::Denied(
                "Permission request was denied by user".into(),
            )),
            ChooserResponse::Fail(message) => Err(TransportError::Other(message)),
        }
    }

    fn subscribe(&self, channel: TransportChannel) -> Option<broadcast::Receiver<NativeDeviceEvent>> {
        if !self.is_available(channel) {
            return None;
        }
        self.events.get(&channel).map(broadcast::Sender::subscribe)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::LEDGER_VENDOR_ID;

    #[tokio::test]
    async fn unavailable_channel_rejects_enumeration() {
        let transport = InMemoryTransport::new();
        transport.set_available(TransportChannel::WebHid, false);
        assert!(matches!(
            transport.paired_devices(TransportChannel::WebHid).await,
            Err(TransportError::Unavailable { .. })
        ));
        assert_eq!(transport.enumeration_count(), 0);
        assert!(transport.subscribe(TransportChannel::WebHid).is_none());
    }

    #[tokio::test]
    async fn chooser_selection_pairs_device() {
        let transport = InMemoryTransport::new();
        let nano = DeviceDescriptor::new(LEDGER_VENDOR_ID, 0x4015);
        transport.queue_chooser_response(ChooserResponse::Select(nano.clone()));

        let selected = transport
            .request_device(TransportChannel::WebHid, &[])
            .await
            .unwrap();
        assert_eq!(selected, vec![nano.clone()]);
        assert_eq!(
            transport.paired_devices(TransportChannel::WebHid).await.unwrap(),
            vec![nano]
        );
        assert!(
            transport
                .paired_devices(TransportChannel::WebUsb)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn plug_events_reach_subscribers() {
        let transport = InMemoryTransport::new();
        let mut rx = transport.subscribe(TransportChannel::WebHid).unwrap();
        let nano = DeviceDescriptor::new(LEDGER_VENDOR_ID, 1);

        transport.plug_in(TransportChannel::WebHid, nano.clone());
        assert_eq!(rx.recv().await.unwrap(), NativeDeviceEvent::Connected(nano.clone()));

        transport.unplug(TransportChannel::WebHid, nano.clone());
        assert_eq!(rx.recv().await.unwrap(), NativeDeviceEvent::Disconnected(nano));
    }
}
