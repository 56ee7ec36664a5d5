use serde::{Deserialize, Serialize};

use super::wallet::HardwareWalletType;

/// The account currently selected by the host application.
///
/// Consumed read-only; two selections are the same account when both
/// fields compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSelection {
    pub keyring_type: Option<String>,
    pub address: Option<String>,
}

impl AccountSelection {
    pub fn new(keyring_type: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            keyring_type: Some(keyring_type.into()),
            address: Some(address.into()),
        }
    }

    /// Convenience constructor for a hardware account of the given kind.
    pub fn hardware(wallet_type: HardwareWalletType, address: impl Into<String>) -> Self {
        Self::new(wallet_type.keyring_type(), address)
    }

    pub fn wallet_type(&self) -> Option<HardwareWalletType> {
        self.keyring_type
            .as_deref()
            .and_then(HardwareWalletType::from_keyring_type)
    }

    pub fn is_hardware_wallet(&self) -> bool {
        self.wallet_type().is_some()
    }
}
