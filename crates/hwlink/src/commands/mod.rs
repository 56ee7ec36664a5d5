//! Command handlers.

pub mod classify;
pub mod config_cmd;
pub mod decode;
pub mod simulate;

use serde::Serialize;

use hwlink_core::error::{device_event_for_error, map_to_connection_state};
use hwlink_core::{ConnectionState, DeviceEvent, HardwareWalletError};

use crate::output;

/// Classified error plus what it means for a connection. Shared by
/// `classify` and `decode`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error: HardwareWalletError,
    pub kind: String,
    pub retryable: bool,
    pub user_rejection: bool,
    pub connection_state: ConnectionState,
    pub device_event: DeviceEvent,
}

impl From<HardwareWalletError> for ErrorReport {
    fn from(error: HardwareWalletError) -> Self {
        Self {
            kind: error.kind().to_string(),
            retryable: error.is_retryable(),
            user_rejection: error.is_user_rejection(),
            connection_state: map_to_connection_state(&error),
            device_event: device_event_for_error(error.code),
            error,
        }
    }
}

impl ErrorReport {
    pub fn detail(&self, color: bool) -> String {
        let e = &self.error;
        let yes_no = |b: bool| if b { "yes" } else { "no" }.to_owned();
        let mut pairs = vec![
            ("code", e.code.to_string()),
            ("kind", self.kind.clone()),
            ("message", e.message.clone()),
            ("user message", e.user_message.clone()),
            ("severity", e.severity.to_string()),
            ("category", e.category.to_string()),
            ("retry", e.retry_strategy.to_string()),
            ("actionable", yes_no(e.user_actionable)),
            ("retryable", yes_no(self.retryable)),
            ("state", output::state_label(&self.connection_state, color)),
            ("device event", self.device_event.to_string()),
        ];
        if let Some(wallet) = e.metadata.wallet_type {
            pairs.push(("wallet", wallet.display_name().to_owned()));
        }
        if let Some(cause) = &e.cause {
            pairs.push(("cause", cause.clone()));
        }
        output::render_detail(&pairs)
    }
}
