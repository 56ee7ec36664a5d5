// ── Physical devices ──

use serde::{Deserialize, Serialize};
use strum::Display;

/// USB vendor id assigned to Ledger SAS.
pub const LEDGER_VENDOR_ID: u16 = 0x2c97;

pub(crate) const LEDGER_FILTERS: &[DeviceFilter] = &[DeviceFilter::vendor(LEDGER_VENDOR_ID)];

pub(crate) const TREZOR_FILTERS: &[DeviceFilter] = &[
    DeviceFilter::product(0x534c, 0x0001),
    DeviceFilter::product(0x1209, 0x53c0),
    DeviceFilter::product(0x1209, 0x53c1),
];

/// A device as reported by the host transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            product_name: None,
        }
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    /// Stable identifier used to track a device across events: the
    /// product id rendered in decimal.
    pub fn device_id(&self) -> String {
        self.product_id.to_string()
    }
}

/// Vendor filter. A `None` product id matches every product of the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    pub const fn vendor(vendor_id: u16) -> Self {
        Self {
            vendor_id,
            product_id: None,
        }
    }

    pub const fn product(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id: Some(product_id),
        }
    }

    pub fn matches(&self, device: &DeviceDescriptor) -> bool {
        self.vendor_id == device.vendor_id
            && self.product_id.is_none_or(|pid| pid == device.product_id)
    }

    /// `true` when any filter in the set accepts the device.
    pub fn any_matches(filters: &[Self], device: &DeviceDescriptor) -> bool {
        filters.iter().any(|f| f.matches(device))
    }
}

/// Plug/unplug notification from the host transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeDeviceEvent {
    Connected(DeviceDescriptor),
    Disconnected(DeviceDescriptor),
}

impl NativeDeviceEvent {
    pub fn device(&self) -> &DeviceDescriptor {
        match self {
            Self::Connected(d) | Self::Disconnected(d) => d,
        }
    }
}

/// Whether the host has granted access to a wallet's devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Prompt,
    Denied,
    #[default]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_filter_accepts_any_product() {
        let nano_x = DeviceDescriptor::new(LEDGER_VENDOR_ID, 0x4015);
        let stax = DeviceDescriptor::new(LEDGER_VENDOR_ID, 0x6011);
        assert!(DeviceFilter::any_matches(LEDGER_FILTERS, &nano_x));
        assert!(DeviceFilter::any_matches(LEDGER_FILTERS, &stax));
        assert!(!DeviceFilter::any_matches(
            LEDGER_FILTERS,
            &DeviceDescriptor::new(0x1209, 0x53c1)
        ));
    }

    #[test]
    fn trezor_filter_requires_vendor_and_product() {
        assert!(DeviceFilter::any_matches(
            TREZOR_FILTERS,
            &DeviceDescriptor::new(0x1209, 0x53c1)
        ));
        assert!(DeviceFilter::any_matches(
            TREZOR_FILTERS,
            &DeviceDescriptor::new(0x534c, 0x0001)
        ));
        assert!(!DeviceFilter::any_matches(
            TREZOR_FILTERS,
            &DeviceDescriptor::new(0x1209, 0x0001)
        ));
    }

    #[test]
    fn device_id_is_decimal_product_id() {
        assert_eq!(DeviceDescriptor::new(LEDGER_VENDOR_ID, 123).device_id(), "123");
        assert_eq!(DeviceDescriptor::new(0x534c, 0x0001).device_id(), "1");
    }
}
