//! Wire-level definitions for the CH34x USB-serial adapter
//!
//! This crate defines everything that crosses the USB cable: the chip's
//! vendor and class request codes, control-transfer construction, the
//! standard descriptor formats needed to configure the device, and the
//! transfer/completion types exchanged with a bus implementation.
//!
//! No I/O happens here; the `driver` crate submits these requests through
//! its `Bus` abstraction.
//!
//! # Example
//!
//! ```
//! use protocol::requests::{vendor_read, vendor_write};
//! use protocol::TransferKind;
//!
//! // The first bring-up probe of the chip.
//! let probe = vendor_read(0x8484, 0);
//! match probe {
//!     TransferKind::Control { request, value, .. } => {
//!         assert_eq!(request, 0x95);
//!         assert_eq!(value, 0x8484);
//!     }
//!     _ => unreachable!(),
//! }
//!
//! let init = vendor_write(0x0404, 0);
//! assert!(matches!(init, TransferKind::Control { request: 0x9A, .. }));
//! ```

pub mod descriptor;
pub mod error;
pub mod requests;
pub mod transfer;

pub use descriptor::{
    ConfigurationDescriptor, DescriptorWalker, DeviceDescriptor, EndpointDescriptor,
    EndpointDirection, EndpointType, InterfaceDescriptor,
};
pub use error::{ProtocolError, Result};
pub use requests::{
    CH341_PRODUCT_ID, CH341_VENDOR_ID, DTR_STATE, RTS_STATE, SET_CONTROL_REQUEST,
    SET_LINE_REQUEST, VENDOR_READ_REQUEST, VENDOR_WRITE_REQUEST,
};
pub use transfer::{BusError, Completion, TransferKind, UsbStatus};
