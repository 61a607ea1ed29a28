//! CH341 USB serial adapter driver core
//!
//! Bridges a CH341/CH340 adapter to a serial-port abstraction: the
//! [`SerialDevice`] lifecycle state machine drives configuration,
//! chip bring-up and teardown in response to bus events, the line
//! managers translate serial configuration into the chip's vendor
//! requests, and the transfer pipeline moves payload bytes over the
//! bulk endpoints.
//!
//! The driver talks to hardware only through the [`Bus`] trait; the
//! `hostbus` crate provides the rusb-backed implementation and
//! [`testing::ScriptedBus`] a scripted one for tests.

pub mod bringup;
pub mod bus;
pub mod control;
pub mod device;
pub mod enumerate;
pub mod error;
pub mod line;
pub mod registry;
pub mod settings;
pub mod testing;
pub mod transfer;
pub mod vendor;

pub use bringup::ChipVariant;
pub use bus::{Bus, CompletionHandler, TransferRequest};
pub use control::{handle_serial_request, SerialReply, SerialRequest};
pub use device::{LifecycleEvent, PnpState, SerialDevice};
pub use enumerate::Endpoints;
pub use error::{Error, Result};
pub use line::{HandFlow, LineControl, LineState, SerialChars};
pub use registry::DeviceRegistry;
pub use settings::PortSettings;
pub use transfer::{IoHandler, IoOutcome};
