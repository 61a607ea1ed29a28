//! Host-side bus for the CH341 driver
//!
//! Implements [`driver::Bus`] over rusb and carries the logging setup
//! for the `ch34x-bridge` binary.

pub mod logging;
pub mod worker;

pub use logging::setup_logging;
pub use worker::{list_adapters, UsbHostBus};
