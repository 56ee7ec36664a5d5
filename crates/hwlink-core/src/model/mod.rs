// ── Domain model ──
//
// Plain data types shared by every controller: wallet kinds and their
// transport channels, USB/HID device descriptors, account selections,
// and the events adapters emit while a session is live.

pub mod account;
pub mod device;
pub mod event;
pub mod wallet;

pub use account::AccountSelection;
pub use device::{
    DeviceDescriptor, DeviceFilter, LEDGER_VENDOR_ID, NativeDeviceEvent, PermissionState,
};
pub use event::{DeviceEvent, DeviceEventPayload};
pub use wallet::{HardwareWalletType, TransportChannel};
