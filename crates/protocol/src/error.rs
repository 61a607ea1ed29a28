//! Protocol error types

use thiserror::Error;

/// Errors produced while decoding descriptor data from the device
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Descriptor buffer shorter than the fixed-size header requires
    #[error("Truncated {what} descriptor: needed {needed} bytes, got {got}")]
    Truncated {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    /// bDescriptorType did not match the requested descriptor
    #[error("Unexpected descriptor type: expected {expected:#04x}, got {got:#04x}")]
    UnexpectedType { expected: u8, got: u8 },

    /// bLength points outside the buffer or is shorter than the header
    #[error("Invalid descriptor length {length} at offset {offset}")]
    InvalidLength { length: u8, offset: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
