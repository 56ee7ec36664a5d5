// ── Wallet kinds ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::device::{DeviceFilter, LEDGER_FILTERS, TREZOR_FILTERS};

/// Browser-style transport API a wallet is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum TransportChannel {
    #[strum(serialize = "WebHID")]
    #[serde(rename = "webhid")]
    WebHid,
    #[strum(serialize = "WebUSB")]
    #[serde(rename = "webusb")]
    WebUsb,
}

/// Hardware wallet families recognized from the account keyring.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HardwareWalletType {
    Ledger,
    Trezor,
    OneKey,
    Lattice,
    Qr,
}

impl HardwareWalletType {
    /// Map an account's keyring type onto a wallet kind.
    ///
    /// Returns `None` for software keyrings (HD, imported, snaps).
    pub fn from_keyring_type(keyring_type: &str) -> Option<Self> {
        match keyring_type {
            "Ledger Hardware" => Some(Self::Ledger),
            "Trezor Hardware" => Some(Self::Trezor),
            "OneKey Hardware" => Some(Self::OneKey),
            "Lattice Hardware" => Some(Self::Lattice),
            "QR Hardware Wallet Device" => Some(Self::Qr),
            _ => None,
        }
    }

    pub fn keyring_type(self) -> &'static str {
        match self {
            Self::Ledger => "Ledger Hardware",
            Self::Trezor => "Trezor Hardware",
            Self::OneKey => "OneKey Hardware",
            Self::Lattice => "Lattice Hardware",
            Self::Qr => "QR Hardware Wallet Device",
        }
    }

    /// The transport channel used to reach the device, if any.
    pub fn transport_channel(self) -> Option<TransportChannel> {
        match self {
            Self::Ledger => Some(TransportChannel::WebHid),
            Self::Trezor => Some(TransportChannel::WebUsb),
            Self::OneKey | Self::Lattice | Self::Qr => None,
        }
    }

    /// Vendor/product filters identifying this wallet's devices.
    pub fn device_filters(self) -> &'static [DeviceFilter] {
        match self {
            Self::Ledger => LEDGER_FILTERS,
            Self::Trezor => TREZOR_FILTERS,
            Self::OneKey | Self::Lattice | Self::Qr => &[],
        }
    }

    /// Name of the on-device application that must be open for signing.
    pub fn expected_app_name(self) -> Option<&'static str> {
        match self {
            Self::Ledger => Some("Ethereum"),
            _ => None,
        }
    }

    /// Human-facing product name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ledger => "Ledger",
            Self::Trezor => "Trezor",
            Self::OneKey => "OneKey",
            Self::Lattice => "Lattice",
            Self::Qr => "QR-based hardware wallet",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn keyring_mapping_is_bijective() {
        for wallet in HardwareWalletType::iter() {
            assert_eq!(
                HardwareWalletType::from_keyring_type(wallet.keyring_type()),
                Some(wallet)
            );
        }
        assert_eq!(HardwareWalletType::from_keyring_type("HD Key Tree"), None);
    }

    #[test]
    fn only_ledger_and_trezor_have_channels() {
        assert_eq!(
            HardwareWalletType::Ledger.transport_channel(),
            Some(TransportChannel::WebHid)
        );
        assert_eq!(
            HardwareWalletType::Trezor.transport_channel(),
            Some(TransportChannel::WebUsb)
        );
        assert!(HardwareWalletType::Qr.transport_channel().is_none());
        assert!(HardwareWalletType::Lattice.device_filters().is_empty());
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "Ledger".parse::<HardwareWalletType>().ok(),
            Some(HardwareWalletType::Ledger)
        );
        assert_eq!(
            "onekey".parse::<HardwareWalletType>().ok(),
            Some(HardwareWalletType::OneKey)
        );
        assert_eq!(HardwareWalletType::Qr.to_string(), "qr");
    }
}
