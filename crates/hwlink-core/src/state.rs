// ── Connection state machine ──
//
// Pure transition logic. Nothing in here performs I/O or looks at a
// clock: the controllers feed events in and publish whatever comes out.

use std::fmt;
use std::mem;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{Category, ErrorCode, HardwareWalletError, map_to_connection_state};
use crate::model::{DeviceEvent, DeviceEventPayload, HardwareWalletType};

/// App shown by a Ledger sitting on its dashboard.
pub const DASHBOARD_APP_NAME: &str = "BOLOS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AwaitingAppReason {
    NotOpen,
    WrongApp,
}

/// Short machine tag carried by `ConnectionState::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorReason {
    Locked,
    TransportUnavailable,
    PermissionDenied,
    ConnectionClosed,
    DeviceDisconnected,
    UserRejected,
    Timeout,
    ConnectionFailed,
    DeviceNotReady,
    Unknown,
}

// ── ConnectionState ─────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Ready,
    AwaitingConfirmation,
    AwaitingApp {
        reason: AwaitingAppReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app_name: Option<String>,
    },
    Error {
        reason: ErrorReason,
        error: HardwareWalletError,
    },
}

impl ConnectionState {
    /// Machine-readable variant name, matching the serialized `status` tag.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Ready => "ready",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::AwaitingApp { .. } => "awaiting_app",
            Self::Error { .. } => "error",
        }
    }

    /// A session with a live adapter: anything past `Connecting` that is
    /// not an error.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::Connected | Self::Ready | Self::AwaitingConfirmation | Self::AwaitingApp { .. }
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn error(&self) -> Option<&HardwareWalletError> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingApp {
                reason,
                app_name: Some(app),
            } => write!(f, "awaiting_app({reason}, {app})"),
            Self::AwaitingApp { reason, .. } => write!(f, "awaiting_app({reason})"),
            Self::Error { reason, error } => write!(f, "error({reason}): {error}"),
            other => f.write_str(other.status()),
        }
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Inputs to the state machine. Each maps to exactly one target state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    Disconnected,
    Connecting,
    Connected,
    Ready,
    AwaitingConfirmation,
    AwaitingApp {
        reason: AwaitingAppReason,
        app_name: Option<String>,
    },
    Failed {
        reason: ErrorReason,
        error: HardwareWalletError,
    },
}

impl StateEvent {
    pub fn into_target(self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Connecting => ConnectionState::Connecting,
            Self::Connected => ConnectionState::Connected,
            Self::Ready => ConnectionState::Ready,
            Self::AwaitingConfirmation => ConnectionState::AwaitingConfirmation,
            Self::AwaitingApp { reason, app_name } => {
                ConnectionState::AwaitingApp { reason, app_name }
            }
            Self::Failed { reason, error } => ConnectionState::Error { reason, error },
        }
    }

    /// The event a classified failure produces.
    pub fn from_error(error: &HardwareWalletError) -> Self {
        map_to_connection_state(error).into()
    }

    /// Translate an adapter event into a state machine input.
    pub fn from_device_event(
        payload: &DeviceEventPayload,
        wallet_type: Option<HardwareWalletType>,
    ) -> Self {
        let fallback = |code: ErrorCode| {
            payload.error.clone().unwrap_or_else(|| {
                HardwareWalletError::new(code).with_wallet_type(wallet_type)
            })
        };

        match payload.event {
            DeviceEvent::Disconnected => Self::Disconnected,
            DeviceEvent::DeviceLocked => Self::Failed {
                reason: ErrorReason::Locked,
                error: fallback(ErrorCode::AuthenticationDeviceLocked),
            },
            DeviceEvent::AppNotOpen => Self::AwaitingApp {
                reason: AwaitingAppReason::NotOpen,
                app_name: None,
            },
            DeviceEvent::AppChanged => {
                let expected = wallet_type.and_then(HardwareWalletType::expected_app_name);
                match (&payload.current_app_name, expected) {
                    (Some(app), Some(expected)) if app == expected => Self::Ready,
                    (app, _) => Self::AwaitingApp {
                        reason: AwaitingAppReason::WrongApp,
                        app_name: Some(
                            app.clone()
                                .unwrap_or_else(|| DASHBOARD_APP_NAME.to_owned()),
                        ),
                    },
                }
            }
            DeviceEvent::ConnectionFailed => Self::Failed {
                reason: ErrorReason::ConnectionFailed,
                error: payload.error.clone().unwrap_or_else(|| {
                    HardwareWalletError::new(ErrorCode::ConnectionTransportMissing)
                        .with_message("Hardware wallet connection failed")
                        .with_category(Category::Connection)
                        .with_wallet_type(wallet_type)
                }),
            },
            DeviceEvent::OperationTimeout => Self::Failed {
                reason: ErrorReason::Timeout,
                error: payload.error.clone().unwrap_or_else(|| {
                    HardwareWalletError::new(ErrorCode::ConnectionTimeout)
                        .with_message("Operation timed out")
                        .with_category(Category::Protocol)
                        .with_wallet_type(wallet_type)
                }),
            },
        }
    }
}

impl From<ConnectionState> for StateEvent {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => Self::Disconnected,
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::Connected => Self::Connected,
            ConnectionState::Ready => Self::Ready,
            ConnectionState::AwaitingConfirmation => Self::AwaitingConfirmation,
            ConnectionState::AwaitingApp { reason, app_name } => {
                Self::AwaitingApp { reason, app_name }
            }
            ConnectionState::Error { reason, error } => Self::Failed { reason, error },
        }
    }
}

// ── Transition ──────────────────────────────────────────────────────

/// Compute the next state.
///
/// Returns `None` when the current state must be kept as is, so that
/// subscribers are not notified of a change that did not happen.
pub fn transition(
    prev: &ConnectionState,
    event: StateEvent,
    is_connecting: bool,
) -> Option<ConnectionState> {
    if is_connecting && event == StateEvent::Disconnected {
        return None;
    }

    let next = event.into_target();
    let changed = match (prev, &next) {
        (
            ConnectionState::Error {
                reason: prev_reason,
                error: prev_error,
            },
            ConnectionState::Error { reason, error },
        ) => prev_reason != reason || prev_error.message != error.message,
        (
            ConnectionState::AwaitingApp {
                reason: prev_reason,
                app_name: prev_app,
            },
            ConnectionState::AwaitingApp { reason, app_name },
        ) => prev_reason != reason || prev_app != app_name,
        (prev, next) => mem::discriminant(prev) != mem::discriminant(next),
    };

    changed.then_some(next)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn locked(message: &str) -> StateEvent {
        StateEvent::Failed {
            reason: ErrorReason::Locked,
            error: HardwareWalletError::new(ErrorCode::AuthenticationDeviceLocked)
                .with_message(message),
        }
    }

    #[test]
    fn events_map_to_target_states() {
        assert_eq!(
            transition(&ConnectionState::Disconnected, StateEvent::Connecting, false),
            Some(ConnectionState::Connecting)
        );
        assert_eq!(
            transition(&ConnectionState::Connecting, StateEvent::Connected, true),
            Some(ConnectionState::Connected)
        );
        assert_eq!(
            transition(&ConnectionState::Connected, StateEvent::Ready, false),
            Some(ConnectionState::Ready)
        );
    }

    #[test]
    fn same_variant_is_identity() {
        assert_eq!(
            transition(&ConnectionState::Ready, StateEvent::Ready, false),
            None
        );
        assert_eq!(
            transition(&ConnectionState::Disconnected, StateEvent::Disconnected, false),
            None
        );
    }

    #[test]
    fn error_to_error_only_when_reason_or_message_differs() {
        let prev = locked("locked").into_target();
        assert_eq!(transition(&prev, locked("locked"), false), None);
        assert!(transition(&prev, locked("still locked"), false).is_some());

        let timeout = StateEvent::Failed {
            reason: ErrorReason::Timeout,
            error: HardwareWalletError::new(ErrorCode::AuthenticationDeviceLocked)
                .with_message("locked"),
        };
        assert!(transition(&prev, timeout, false).is_some());
    }

    #[test]
    fn awaiting_app_only_when_reason_or_name_differs() {
        let wrong = |name: &str| StateEvent::AwaitingApp {
            reason: AwaitingAppReason::WrongApp,
            app_name: Some(name.into()),
        };
        let prev = wrong("Bitcoin").into_target();
        assert_eq!(transition(&prev, wrong("Bitcoin"), false), None);
        assert!(transition(&prev, wrong("Solana"), false).is_some());
        assert!(
            transition(
                &prev,
                StateEvent::AwaitingApp {
                    reason: AwaitingAppReason::NotOpen,
                    app_name: Some("Bitcoin".into())
                },
                false
            )
            .is_some()
        );
    }

    #[test]
    fn disconnect_suppressed_while_connecting() {
        assert_eq!(
            transition(&ConnectionState::Connecting, StateEvent::Disconnected, true),
            None
        );
        assert_eq!(
            transition(&ConnectionState::Ready, StateEvent::Disconnected, true),
            None
        );
        assert_eq!(
            transition(&ConnectionState::Ready, StateEvent::Disconnected, false),
            Some(ConnectionState::Disconnected)
        );
    }

    #[test]
    fn app_changed_to_expected_app_is_ready() {
        let payload = DeviceEventPayload::app_changed("Ethereum");
        assert_eq!(
            StateEvent::from_device_event(&payload, Some(HardwareWalletType::Ledger)),
            StateEvent::Ready
        );
    }

    #[test]
    fn app_changed_elsewhere_awaits_app() {
        let payload = DeviceEventPayload::app_changed("Bitcoin");
        assert_eq!(
            StateEvent::from_device_event(&payload, Some(HardwareWalletType::Ledger)),
            StateEvent::AwaitingApp {
                reason: AwaitingAppReason::WrongApp,
                app_name: Some("Bitcoin".into())
            }
        );

        let dashboard = DeviceEventPayload::new(DeviceEvent::AppChanged);
        assert_eq!(
            StateEvent::from_device_event(&dashboard, Some(HardwareWalletType::Ledger)),
            StateEvent::AwaitingApp {
                reason: AwaitingAppReason::WrongApp,
                app_name: Some(DASHBOARD_APP_NAME.into())
            }
        );
    }

    #[test]
    fn failure_events_get_default_errors() {
        let failed = StateEvent::from_device_event(
            &DeviceEventPayload::new(DeviceEvent::ConnectionFailed),
            Some(HardwareWalletType::Trezor),
        );
        let StateEvent::Failed { reason, error } = failed else {
            panic!("expected failure event");
        };
        assert_eq!(reason, ErrorReason::ConnectionFailed);
        assert_eq!(error.code, ErrorCode::ConnectionTransportMissing);
        assert_eq!(error.message, "Hardware wallet connection failed");
        assert_eq!(error.category, Category::Connection);

        let timeout = StateEvent::from_device_event(
            &DeviceEventPayload::new(DeviceEvent::OperationTimeout),
            None,
        );
        let StateEvent::Failed { reason, error } = timeout else {
            panic!("expected failure event");
        };
        assert_eq!(reason, ErrorReason::Timeout);
        assert_eq!(error.message, "Operation timed out");
        assert_eq!(error.category, Category::Protocol);
    }

    #[test]
    fn payload_error_is_preserved() {
        let error = HardwareWalletError::new(ErrorCode::AuthenticationDeviceBlocked);
        let payload =
            DeviceEventPayload::new(DeviceEvent::DeviceLocked).with_error(error.clone());
        assert_eq!(
            StateEvent::from_device_event(&payload, None),
            StateEvent::Failed {
                reason: ErrorReason::Locked,
                error
            }
        );
    }

    #[test]
    fn serializes_with_status_tag() {
        let state = ConnectionState::AwaitingApp {
            reason: AwaitingAppReason::NotOpen,
            app_name: None,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "awaiting_app", "reason": "not_open" }));
        assert_eq!(state.to_string(), "awaiting_app(not_open)");
    }
}
