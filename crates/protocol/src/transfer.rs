//! Transfer and completion types
//!
//! A [`TransferKind`] describes one request to move bytes across the
//! bus; a [`Completion`] reports its outcome. The outcome carries two
//! independent status layers, mirroring what a USB host stack reports:
//! the submission itself can fail at the bus level ([`BusError`]), or
//! the bus can complete the request while the device stack flags a
//! protocol-level problem ([`UsbStatus`]). Bus failure takes precedence
//! when the two are folded into a single result.

use thiserror::Error;

/// One transfer to be moved across the bus
///
/// For IN transfers the `data` vector is a pre-sized receive buffer;
/// for OUT transfers it is the payload. Direction comes from bit 7 of
/// `request_type` (control) or of the endpoint address (bulk,
/// interrupt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    /// Control transfer on the default endpoint
    Control {
        /// Request type byte (bmRequestType)
        request_type: u8,
        /// Request byte (bRequest)
        request: u8,
        /// Value parameter (wValue)
        value: u16,
        /// Index parameter (wIndex)
        index: u16,
        /// OUT payload, or IN buffer sized to the expected length
        data: Vec<u8>,
    },
    /// Bulk transfer on a data endpoint
    Bulk {
        /// Endpoint address (includes direction bit)
        endpoint: u8,
        /// OUT payload, or IN buffer sized to the requested length
        data: Vec<u8>,
    },
    /// Interrupt transfer on a status endpoint
    Interrupt {
        /// Endpoint address (includes direction bit)
        endpoint: u8,
        /// OUT payload, or IN buffer sized to the requested length
        data: Vec<u8>,
    },
}

impl TransferKind {
    /// Whether this transfer moves data from the device to the host.
    pub fn is_in(&self) -> bool {
        match self {
            TransferKind::Control { request_type, .. } => request_type & 0x80 != 0,
            TransferKind::Bulk { endpoint, .. } | TransferKind::Interrupt { endpoint, .. } => {
                endpoint & 0x80 != 0
            }
        }
    }

    /// Requested transfer length (IN buffer size or OUT payload size).
    pub fn len(&self) -> usize {
        match self {
            TransferKind::Control { data, .. }
            | TransferKind::Bulk { data, .. }
            | TransferKind::Interrupt { data, .. } => data.len(),
        }
    }

    /// Whether the transfer carries or requests no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bus-level submission failure
///
/// Mirrors the failures a USB host stack can report for the request
/// itself, before any protocol-level status applies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Transfer timed out")]
    Timeout,
    #[error("Endpoint stalled")]
    Pipe,
    #[error("Device is gone")]
    NoDevice,
    #[error("Device or endpoint not found")]
    NotFound,
    #[error("Device is busy")]
    Busy,
    #[error("Buffer overflow")]
    Overflow,
    #[error("I/O error")]
    Io,
    #[error("Invalid parameter")]
    InvalidParam,
    #[error("Access denied")]
    Access,
    #[error("Out of resources")]
    NoResources,
    #[error("Bus error: {message}")]
    Other { message: String },
}

/// Protocol-level status reported by the device stack alongside a
/// completed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbStatus {
    /// Request completed normally
    Success,
    /// Endpoint returned a STALL handshake
    Stalled,
    /// Device did not respond
    DeviceNotResponding,
    /// Request was canceled by the stack
    Canceled,
    /// Unspecified device-stack error
    Error,
}

impl UsbStatus {
    /// Whether the device stack reported success.
    pub fn is_success(&self) -> bool {
        matches!(self, UsbStatus::Success)
    }
}

/// Outcome of one submitted transfer
///
/// Exactly one completion is delivered per submitted transfer; the
/// transfer object itself is consumed by whichever path delivers it.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Outcome of the submission at the bus level
    pub status: Result<(), BusError>,
    /// Protocol-level status from the device stack; only meaningful
    /// when `status` is `Ok`
    pub usb_status: UsbStatus,
    /// Bytes actually moved
    pub transferred: usize,
    /// Received bytes for IN transfers, truncated to `transferred`
    pub data: Vec<u8>,
}

impl Completion {
    /// A fully successful completion carrying `data`.
    pub fn success(data: Vec<u8>) -> Self {
        Self {
            status: Ok(()),
            usb_status: UsbStatus::Success,
            transferred: data.len(),
            data,
        }
    }

    /// A successful OUT completion that moved `transferred` bytes.
    pub fn sent(transferred: usize) -> Self {
        Self {
            status: Ok(()),
            usb_status: UsbStatus::Success,
            transferred,
            data: Vec::new(),
        }
    }

    /// A completion that failed at the bus level.
    pub fn bus_failed(error: BusError) -> Self {
        Self {
            status: Err(error),
            usb_status: UsbStatus::Error,
            transferred: 0,
            data: Vec::new(),
        }
    }

    /// A completion the bus delivered but the device stack rejected.
    pub fn protocol_failed(usb_status: UsbStatus) -> Self {
        Self {
            status: Ok(()),
            usb_status,
            transferred: 0,
            data: Vec::new(),
        }
    }

    /// Whether both status layers report success.
    pub fn is_success(&self) -> bool {
        self.status.is_ok() && self.usb_status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_request_type() {
        let read = TransferKind::Control {
            request_type: 0xC0,
            request: 0x95,
            value: 0,
            index: 0,
            data: vec![0],
        };
        assert!(read.is_in());

        let write = TransferKind::Control {
            request_type: 0x40,
            request: 0x9A,
            value: 0,
            index: 0,
            data: Vec::new(),
        };
        assert!(!write.is_in());
    }

    #[test]
    fn test_direction_from_endpoint_address() {
        let bulk_in = TransferKind::Bulk {
            endpoint: 0x82,
            data: vec![0; 32],
        };
        assert!(bulk_in.is_in());
        assert_eq!(bulk_in.len(), 32);

        let bulk_out = TransferKind::Bulk {
            endpoint: 0x02,
            data: vec![1, 2, 3],
        };
        assert!(!bulk_out.is_in());
        assert_eq!(bulk_out.len(), 3);
    }

    #[test]
    fn test_completion_success_layers() {
        let completion = Completion::success(vec![0x02]);
        assert!(completion.is_success());
        assert_eq!(completion.transferred, 1);

        let completion = Completion::bus_failed(BusError::NoDevice);
        assert!(!completion.is_success());
        assert_eq!(completion.transferred, 0);

        let completion = Completion::protocol_failed(UsbStatus::Stalled);
        assert!(completion.status.is_ok());
        assert!(!completion.is_success());
    }
}
