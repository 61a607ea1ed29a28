//! Driver error types

use protocol::{BusError, ProtocolError, UsbStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The device reached its terminal lifecycle state; nothing can be
    /// submitted to it anymore.
    #[error("No such device")]
    NoSuchDevice,

    /// The USB interface has not been configured (or was unconfigured),
    /// so no data endpoints are bound.
    #[error("Device is not configured")]
    NotConfigured,

    /// The device's descriptors do not describe the expected adapter
    /// (interface count or endpoint set is wrong).
    #[error("Configuration mismatch: {reason}")]
    ConfigurationMismatch { reason: String },

    /// The bus failed to carry the request.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// The bus carried the request but the device stack reported a
    /// protocol-level failure.
    #[error("Device stack error: {0:?}")]
    Protocol(UsbStatus),

    /// A descriptor returned by the device could not be decoded.
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] ProtocolError),

    /// The request is outside the supported serial surface.
    #[error("Request not supported")]
    NotSupported,

    /// The port settings file exists but could not be read or parsed.
    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_conversion() {
        let err: Error = BusError::NoDevice.into();
        assert!(matches!(err, Error::Bus(BusError::NoDevice)));
    }

    #[test]
    fn test_display() {
        let err = Error::ConfigurationMismatch {
            reason: "configuration declares 2 interfaces, expected one".into(),
        };
        assert!(format!("{}", err).contains("expected one"));
    }
}
