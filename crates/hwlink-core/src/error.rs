// ── Hardware wallet error taxonomy ──
//
// Every failure raised by a transport, an adapter, or a device is
// normalized into a `HardwareWalletError`: a stable code plus severity,
// category, retry strategy and a user-facing message. Errors survive a
// trip through JSON (and a JSON-RPC envelope) with their code intact.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use crate::model::{DeviceEvent, HardwareWalletType};
use crate::state::{AwaitingAppReason, ConnectionState, ErrorReason};

/// JSON-RPC "internal error" code used for the error envelope.
pub const RPC_INTERNAL_ERROR: i64 = -32603;

// ── Codes and their properties ──────────────────────────────────────

/// Stable error codes. The wire form is the variant name.
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
pub enum ErrorCode {
    Unknown,
    AuthenticationDeviceLocked,
    AuthenticationDeviceBlocked,
    AuthenticationSecurityCondition,
    DeviceStateEthAppClosed,
    DeviceStateWrongApp,
    DeviceStateBlindSignNotSupported,
    ConnectionTransportMissing,
    PermissionDenied,
    UserRejected,
    UserCancelled,
    ConnectionTimeout,
    ConnectionClosed,
    DeviceDisconnected,
    ConnectionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Authentication,
    DeviceState,
    Connection,
    Configuration,
    UserAction,
    Protocol,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RetryStrategy {
    NoRetry,
    Retry,
    RetryAfterUserAction,
}

/// Coarse error families used by callers deciding how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    AuthLock,
    DeviceState,
    ConnTransport,
    ConfigPerm,
    /// Resolved locally: never shown as an error modal.
    UserCancel,
    ConnTimeout,
    ConnClosed,
    Unknown,
}

/// Static properties attached to every code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorProperties {
    pub severity: Severity,
    pub category: Category,
    pub retry_strategy: RetryStrategy,
    pub user_actionable: bool,
    pub user_message: &'static str,
}

const fn props(
    severity: Severity,
    category: Category,
    retry_strategy: RetryStrategy,
    user_actionable: bool,
    user_message: &'static str,
) -> ErrorProperties {
    ErrorProperties {
        severity,
        category,
        retry_strategy,
        user_actionable,
        user_message,
    }
}

impl ErrorCode {
    pub const fn properties(self) -> ErrorProperties {
        use Category as C;
        use RetryStrategy as R;
        use Severity as S;

        match self {
            Self::Unknown => props(
                S::Error,
                C::Unknown,
                R::Retry,
                true,
                "An unexpected error occurred with your hardware wallet.",
            ),
            Self::AuthenticationDeviceLocked => props(
                S::Error,
                C::Authentication,
                R::RetryAfterUserAction,
                true,
                "Your hardware wallet is locked. Unlock it to continue.",
            ),
            Self::AuthenticationDeviceBlocked => props(
                S::Critical,
                C::Authentication,
                R::RetryAfterUserAction,
                true,
                "Your hardware wallet is blocked. Follow the device instructions to recover it.",
            ),
            Self::AuthenticationSecurityCondition => props(
                S::Error,
                C::Authentication,
                R::RetryAfterUserAction,
                true,
                "Unlock your hardware wallet and try again.",
            ),
            Self::DeviceStateEthAppClosed => props(
                S::Warning,
                C::DeviceState,
                R::RetryAfterUserAction,
                true,
                "Open the Ethereum app on your hardware wallet to continue.",
            ),
            Self::DeviceStateWrongApp => props(
                S::Warning,
                C::DeviceState,
                R::RetryAfterUserAction,
                true,
                "A different app is open on your hardware wallet. Open the Ethereum app to continue.",
            ),
            Self::DeviceStateBlindSignNotSupported => props(
                S::Warning,
                C::DeviceState,
                R::RetryAfterUserAction,
                true,
                "Enable blind signing in the Ethereum app settings on your device.",
            ),
            Self::ConnectionTransportMissing => props(
                S::Error,
                C::Connection,
                R::NoRetry,
                true,
                "This environment cannot reach your hardware wallet. Try a supported browser.",
            ),
            Self::PermissionDenied => props(
                S::Error,
                C::Configuration,
                R::RetryAfterUserAction,
                true,
                "Permission to access your hardware wallet was denied.",
            ),
            Self::UserRejected => props(
                S::Info,
                C::UserAction,
                R::NoRetry,
                false,
                "The request was rejected on your hardware wallet.",
            ),
            Self::UserCancelled => props(
                S::Info,
                C::UserAction,
                R::NoRetry,
                false,
                "The request was cancelled.",
            ),
            Self::ConnectionTimeout => props(
                S::Error,
                C::Connection,
                R::Retry,
                true,
                "Your hardware wallet did not respond in time.",
            ),
            Self::ConnectionClosed => props(
                S::Error,
                C::Connection,
                R::Retry,
                true,
                "The connection to your hardware wallet was closed.",
            ),
            Self::DeviceDisconnected => props(
                S::Error,
                C::Connection,
                R::Retry,
                true,
                "Hardware wallet not found. Connect it and try again.",
            ),
            Self::ConnectionFailed => props(
                S::Error,
                C::Connection,
                R::Retry,
                true,
                "Hardware wallet connection failed.",
            ),
        }
    }

    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::AuthenticationDeviceLocked
            | Self::AuthenticationDeviceBlocked
            | Self::AuthenticationSecurityCondition => ErrorKind::AuthLock,
            Self::DeviceStateEthAppClosed
            | Self::DeviceStateWrongApp
            | Self::DeviceStateBlindSignNotSupported => ErrorKind::DeviceState,
            Self::ConnectionTransportMissing | Self::ConnectionFailed => ErrorKind::ConnTransport,
            Self::PermissionDenied => ErrorKind::ConfigPerm,
            Self::UserRejected | Self::UserCancelled => ErrorKind::UserCancel,
            Self::ConnectionTimeout => ErrorKind::ConnTimeout,
            Self::ConnectionClosed | Self::DeviceDisconnected => ErrorKind::ConnClosed,
            Self::Unknown => ErrorKind::Unknown,
        }
    }
}

/// Ledger APDU status words with a known meaning.
pub fn ledger_status_code(status: u16) -> Option<ErrorCode> {
    match status {
        0x5515 => Some(ErrorCode::AuthenticationDeviceLocked),
        0x6982 => Some(ErrorCode::AuthenticationSecurityCondition),
        0x6985 | 0x5501 => Some(ErrorCode::UserRejected),
        0x650f | 0x6511 | 0x6d00 | 0x6e00 => Some(ErrorCode::DeviceStateEthAppClosed),
        0x6a80 => Some(ErrorCode::DeviceStateBlindSignNotSupported),
        _ => None,
    }
}

// ── HardwareWalletError ─────────────────────────────────────────────

/// Free-form context carried alongside an error.
///
/// A `walletType` this build does not know stays in `extra` verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_type: Option<HardwareWalletType>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorMetadata {
    fn is_empty(&self) -> bool {
        self.wallet_type.is_none() && self.extra.is_empty()
    }
}

impl<'de> Deserialize<'de> for ErrorMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut extra = Map::<String, Value>::deserialize(deserializer)?;
        let wallet_type = match extra.remove("walletType") {
            Some(raw) => match serde_json::from_value::<HardwareWalletType>(raw.clone()) {
                Ok(wallet_type) => Some(wallet_type),
                Err(_) => {
                    extra.insert("walletType".into(), raw);
                    None
                }
            },
            None => None,
        };
        Ok(Self { wallet_type, extra })
    }
}

/// Decode an optional wire field, treating unrecognized values as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

/// A classified hardware wallet failure.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(into = "WireError", from = "WireError")]
#[error("{message}")]
pub struct HardwareWalletError {
    pub code: ErrorCode,
    pub message: String,
    pub severity: Severity,
    pub category: Category,
    pub retry_strategy: RetryStrategy,
    pub user_actionable: bool,
    pub user_message: String,
    /// Text of the underlying error, when one was wrapped.
    pub cause: Option<String>,
    pub metadata: ErrorMetadata,
}

impl HardwareWalletError {
    /// Build an error carrying the default properties of `code`.
    pub fn new(code: ErrorCode) -> Self {
        let p = code.properties();
        Self {
            code,
            message: p.user_message.to_owned(),
            severity: p.severity,
            category: p.category,
            retry_strategy: p.retry_strategy,
            user_actionable: p.user_actionable,
            user_message: p.user_message.to_owned(),
            cause: None,
            metadata: ErrorMetadata::default(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn with_wallet_type(mut self, wallet_type: Option<HardwareWalletType>) -> Self {
        if wallet_type.is_some() {
            self.metadata.wallet_type = wallet_type;
        }
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.extra.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Whether the same operation can succeed after the user fixes
    /// something on the device.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::AuthenticationDeviceLocked
                | ErrorCode::AuthenticationDeviceBlocked
                | ErrorCode::DeviceStateEthAppClosed
                | ErrorCode::DeviceStateBlindSignNotSupported
                | ErrorCode::ConnectionClosed
        )
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self.code, ErrorCode::UserRejected | ErrorCode::UserCancelled)
    }

    // ── Wire format ──────────────────────────────────────────────────

    pub fn to_wire(&self) -> WireError {
        WireError::from(self.clone())
    }

    /// Rebuild an error from its wire form.
    ///
    /// Unrecognized codes degrade to `Unknown`, keeping the original code
    /// under `metadata.originalCode`.
    pub fn from_wire(wire: WireError) -> Self {
        let parsed = ErrorCode::from_str(&wire.code).ok();
        let code = parsed.unwrap_or(ErrorCode::Unknown);
        let p = code.properties();
        let user_message = wire
            .user_message
            .unwrap_or_else(|| p.user_message.to_owned());
        let mut metadata = wire.metadata.unwrap_or_default();
        if parsed.is_none() {
            metadata
                .extra
                .insert("originalCode".into(), Value::String(wire.code));
        }

        Self {
            code,
            message: wire.message.unwrap_or_else(|| user_message.clone()),
            severity: wire.severity.unwrap_or(Severity::Error),
            category: wire.category.unwrap_or(Category::Unknown),
            retry_strategy: p.retry_strategy,
            user_actionable: p.user_actionable,
            user_message,
            cause: wire.cause,
            metadata,
        }
    }

    /// Best-effort reconstruction from an arbitrary JSON value.
    ///
    /// Only a payload without a string `code` becomes an `Unknown` error
    /// whose message is the stringified input. Optional fields holding
    /// unrecognized values fall back to their defaults.
    pub fn reconstruct(value: &Value) -> Self {
        match serde_json::from_value::<WireError>(value.clone()) {
            Ok(wire) => Self::from_wire(wire),
            Err(_) => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Self::new(ErrorCode::Unknown).with_message(text)
            }
        }
    }

    pub fn to_rpc_error(&self) -> RpcErrorEnvelope {
        RpcErrorEnvelope {
            code: RPC_INTERNAL_ERROR,
            message: self.message.clone(),
            data: serde_json::to_value(self.to_wire()).ok(),
        }
    }

    pub fn from_rpc_error(envelope: &RpcErrorEnvelope) -> Self {
        match &envelope.data {
            Some(data) if !data.is_null() => {
                let mut error = Self::reconstruct(data);
                if error.message.is_empty() {
                    error.message.clone_from(&envelope.message);
                }
                error
            }
            _ => classify_message(&envelope.message, None),
        }
    }
}

/// Serialized form of a `HardwareWalletError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireError {
    pub code: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(
        default,
        alias = "user_message",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_message: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ErrorMetadata>,
}

impl From<HardwareWalletError> for WireError {
    fn from(e: HardwareWalletError) -> Self {
        let metadata = (!e.metadata.is_empty()).then_some(e.metadata);
        Self {
            code: e.code.to_string(),
            message: Some(e.message),
            severity: Some(e.severity),
            category: Some(e.category),
            user_message: Some(e.user_message),
            cause: e.cause,
            metadata,
        }
    }
}

impl From<WireError> for HardwareWalletError {
    fn from(wire: WireError) -> Self {
        Self::from_wire(wire)
    }
}

/// JSON-RPC error object carrying a serialized `HardwareWalletError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorEnvelope {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ── Classification ──────────────────────────────────────────────────

/// An unclassified failure as reported by a transport or vendor library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawError {
    /// Exception class name, e.g. `LockedDeviceError` or `NotAllowedError`.
    pub name: Option<String>,
    pub message: String,
    /// Vendor status word, when the library exposes one.
    pub status_code: Option<u16>,
}

impl RawError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// Classify a raw failure.
///
/// Status words win over exception names, which win over message text.
pub fn classify(raw: &RawError, wallet_type: Option<HardwareWalletType>) -> HardwareWalletError {
    let code = raw
        .status_code
        .and_then(ledger_status_code)
        .or_else(|| {
            if wallet_type == Some(HardwareWalletType::Ledger) {
                status_words_in(&raw.message).find_map(ledger_status_code)
            } else {
                None
            }
        })
        .or_else(|| raw.name.as_deref().and_then(code_from_error_name))
        .unwrap_or_else(|| code_from_message(&raw.message));

    let mut error = HardwareWalletError::new(code).with_wallet_type(wallet_type);
    if !raw.message.is_empty() {
        error.message.clone_from(&raw.message);
    }
    if let Some(status) = raw.status_code {
        error = error.with_metadata("statusCode", status);
    }
    error
}

/// Classify a bare message string.
pub fn classify_message(
    message: &str,
    wallet_type: Option<HardwareWalletType>,
) -> HardwareWalletError {
    classify(&RawError::new(message), wallet_type)
}

/// Classify a JSON payload that crossed a process boundary.
///
/// Recognized shapes, in order: a serialized `HardwareWalletError`
/// (`name == "HardwareWalletError"`), a wrapped cause under
/// `data.cause`, a bare `statusCode`, `data.statusCode`, then the
/// message text.
pub fn classify_value(value: &Value, wallet_type: Option<HardwareWalletType>) -> HardwareWalletError {
    if let Some(error) = typed_error(value) {
        return error.with_wallet_type(wallet_type);
    }

    let cause = value.pointer("/data/cause");
    if let Some(error) = cause.and_then(typed_error) {
        return error.with_wallet_type(wallet_type);
    }

    let status = [
        cause.and_then(|c| c.get("statusCode")),
        value.get("statusCode"),
        value.pointer("/data/statusCode"),
    ]
    .into_iter()
    .flatten()
    .find_map(|v| v.as_u64().and_then(|n| u16::try_from(n).ok()));

    let message = [cause, Some(value)]
        .into_iter()
        .flatten()
        .find_map(|v| v.get("message").and_then(Value::as_str))
        .map_or_else(
            || match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            str::to_owned,
        );

    let name = [cause, Some(value)]
        .into_iter()
        .flatten()
        .find_map(|v| v.get("name").and_then(Value::as_str))
        .map(str::to_owned);

    classify(
        &RawError {
            name,
            message,
            status_code: status,
        },
        wallet_type,
    )
}

fn typed_error(value: &Value) -> Option<HardwareWalletError> {
    let named = value.get("name").and_then(Value::as_str) == Some("HardwareWalletError");
    let code = value.get("code").and_then(Value::as_str)?;
    let known = ErrorCode::from_str(code).is_ok();
    if !named && !(known && value.get("category").is_some()) {
        return None;
    }
    Some(HardwareWalletError::reconstruct(value))
}

fn code_from_error_name(name: &str) -> Option<ErrorCode> {
    match name {
        "LockedDeviceError" => Some(ErrorCode::AuthenticationDeviceLocked),
        "TransportOpenUserCancelled" | "AbortError" => Some(ErrorCode::UserCancelled),
        "DisconnectedDevice" | "DisconnectedDeviceDuringOperation" | "NotFoundError" => {
            Some(ErrorCode::DeviceDisconnected)
        }
        "NotAllowedError" | "SecurityError" => Some(ErrorCode::PermissionDenied),
        "TimeoutError" => Some(ErrorCode::ConnectionTimeout),
        "TransportInterfaceNotAvailable" => Some(ErrorCode::ConnectionTransportMissing),
        _ => None,
    }
}

fn code_from_message(message: &str) -> ErrorCode {
    let lower = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&[
        "permission denied",
        "permission was denied",
        "access denied",
        "not allowed to access",
    ]) {
        ErrorCode::PermissionDenied
    } else if has(&["denied", "rejected", "reject"]) {
        ErrorCode::UserRejected
    } else if has(&["cancel"]) {
        ErrorCode::UserCancelled
    } else if has(&["blocked"]) {
        ErrorCode::AuthenticationDeviceBlocked
    } else if has(&["locked", "unlock"]) {
        ErrorCode::AuthenticationDeviceLocked
    } else if has(&["blind sign", "blind-sign", "contract data"]) {
        ErrorCode::DeviceStateBlindSignNotSupported
    } else if mentions_app(&lower) {
        if has(&["wrong", "another app", "different app"]) {
            ErrorCode::DeviceStateWrongApp
        } else {
            ErrorCode::DeviceStateEthAppClosed
        }
    } else if has(&["timeout", "timed out", "time out"]) {
        ErrorCode::ConnectionTimeout
    } else if has(&["webhid", "webusb", "navigator.hid", "navigator.usb", "transport"])
        && has(&["not supported", "unsupported", "not available", "unavailable", "missing"])
    {
        ErrorCode::ConnectionTransportMissing
    } else if has(&["permission", "not allowed", "securityerror"]) {
        ErrorCode::PermissionDenied
    } else if has(&["disconnected", "not found", "no device", "unplugged", "device lost"]) {
        ErrorCode::DeviceDisconnected
    } else if has(&["closed"]) {
        ErrorCode::ConnectionClosed
    } else if has(&["connection", "connect", "transport"]) {
        ErrorCode::ConnectionFailed
    } else {
        ErrorCode::Unknown
    }
}

fn mentions_app(lower: &str) -> bool {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| matches!(word, "app" | "apps" | "application"))
}

/// Four-digit hex status words embedded in text, e.g. `"... (0x6985)"`.
fn status_words_in(message: &str) -> impl Iterator<Item = u16> + '_ {
    message.match_indices("0x").filter_map(move |(at, _)| {
        let digits = message.get(at + 2..at + 6)?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u16::from_str_radix(digits, 16).ok()
    })
}

// ── Mapping to state and events ─────────────────────────────────────

/// The connection state a failure leaves the session in.
pub fn map_to_connection_state(error: &HardwareWalletError) -> ConnectionState {
    let failed = |reason| ConnectionState::Error {
        reason,
        error: error.clone(),
    };

    match error.code {
        ErrorCode::AuthenticationDeviceLocked
        | ErrorCode::AuthenticationDeviceBlocked
        | ErrorCode::AuthenticationSecurityCondition => failed(ErrorReason::Locked),
        ErrorCode::DeviceStateEthAppClosed => ConnectionState::AwaitingApp {
            reason: AwaitingAppReason::NotOpen,
            app_name: None,
        },
        ErrorCode::DeviceStateWrongApp => ConnectionState::AwaitingApp {
            reason: AwaitingAppReason::WrongApp,
            app_name: error
                .metadata
                .extra
                .get("appName")
                .and_then(Value::as_str)
                .map(str::to_owned),
        },
        ErrorCode::ConnectionTransportMissing => failed(ErrorReason::TransportUnavailable),
        ErrorCode::PermissionDenied => failed(ErrorReason::PermissionDenied),
        ErrorCode::ConnectionClosed => failed(ErrorReason::ConnectionClosed),
        ErrorCode::DeviceDisconnected => failed(ErrorReason::DeviceDisconnected),
        ErrorCode::UserRejected | ErrorCode::UserCancelled => failed(ErrorReason::UserRejected),
        ErrorCode::ConnectionTimeout => failed(ErrorReason::Timeout),
        ErrorCode::ConnectionFailed => failed(ErrorReason::ConnectionFailed),
        ErrorCode::Unknown | ErrorCode::DeviceStateBlindSignNotSupported => {
            failed(ErrorReason::Unknown)
        }
    }
}

/// The device event an adapter should raise for a failure.
pub fn device_event_for_error(code: ErrorCode) -> DeviceEvent {
    match code {
        ErrorCode::AuthenticationDeviceLocked | ErrorCode::AuthenticationDeviceBlocked => {
            DeviceEvent::DeviceLocked
        }
        ErrorCode::DeviceStateEthAppClosed => DeviceEvent::AppNotOpen,
        ErrorCode::DeviceDisconnected | ErrorCode::ConnectionClosed => DeviceEvent::Disconnected,
        ErrorCode::ConnectionTimeout => DeviceEvent::OperationTimeout,
        _ => DeviceEvent::ConnectionFailed,
    }
}
