//! Connection lifecycle for hardware signing devices (Ledger, Trezor).
//!
//! This crate reconciles three independently-moving inputs into one
//! race-free connection state per session:
//!
//! - **[`HardwareWalletProvider`]**: session facade. Feed it account
//!   selections ([`set_account()`](HardwareWalletProvider::set_account) or
//!   [`watch_accounts()`](HardwareWalletProvider::watch_accounts)) and call
//!   its actions; observe [`ConnectionState`] through
//!   [`subscribe()`](HardwareWalletProvider::subscribe).
//!
//! - **[`ConnectionController`]**: owns the single adapter and the
//!   "latest attempt wins" token protocol for `connect`, `disconnect`,
//!   `ensure_device_ready` and `execute_with_wallet`.
//!
//! - **[`PermissionController`]** / **[`AutoConnectController`]**:
//!   permission checks with last-call-wins guarding, and reconnection on
//!   account changes or device plug-in.
//!
//! - **Error taxonomy** ([`error`]): classifies raw device and transport
//!   failures into [`HardwareWalletError`] values that survive JSON and
//!   JSON-RPC round trips.
//!
//! - **Seams**: [`DeviceTransport`] abstracts host USB/HID access and
//!   [`HardwareWalletAdapter`] the vendor protocol. In-memory and simulated
//!   implementations ship for tests and demos.

pub mod adapter;
pub mod auto_connect;
pub mod config;
pub mod connection;
pub mod error;
pub mod model;
pub mod permission;
pub mod provider;
pub mod state;
pub mod stream;
pub mod transport;

mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::simulated::{SimulatedAdapter, SimulatedAdapterFactory, SimulatedDevice};
pub use adapter::{AdapterError, AdapterFactory, AttemptToken, DeviceEventSender, HardwareWalletAdapter};
pub use auto_connect::AutoConnectController;
pub use config::{AutoConnectConfig, ProviderConfig};
pub use connection::{ConnectOutcome, ConnectionController};
pub use error::{
    Category, ErrorCode, ErrorKind, HardwareWalletError, RawError, RetryStrategy,
    RpcErrorEnvelope, Severity, WireError,
};
pub use model::{
    AccountSelection, DeviceDescriptor, DeviceEvent, DeviceEventPayload, DeviceFilter,
    HardwareWalletType, NativeDeviceEvent, PermissionState, TransportChannel,
};
pub use permission::PermissionController;
pub use provider::HardwareWalletProvider;
pub use state::{AwaitingAppReason, ConnectionState, ErrorReason, StateEvent};
pub use stream::ConnectionStateStream;
pub use transport::memory::{ChooserResponse, InMemoryTransport};
pub use transport::{DeviceEventSubscription, DeviceTransport, TransportError};
