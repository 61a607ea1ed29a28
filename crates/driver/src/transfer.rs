//! Transfer submission
//!
//! Two paths to the bus live here. [`submit_control`] is the
//! synchronous one: it parks the calling thread on a local channel
//! until the bus delivers the completion, then folds the two status
//! layers into one result. The bulk path is asynchronous: the caller
//! hands over a completion continuation and gets control back
//! immediately, with the outcome translated inside the bus's
//! completion context.

use crate::bus::{Bus, TransferRequest};
use crate::error::{Error, Result};
use protocol::{BusError, Completion, TransferKind};
use std::sync::mpsc;
use tracing::{error, warn};

/// Outcome of one pipelined read or write, as seen by the caller.
#[derive(Debug)]
pub struct IoOutcome {
    /// Status of the request as reported by the bus layer.
    pub status: Result<()>,
    /// Bytes actually moved; zero whenever either status layer failed.
    pub bytes_transferred: usize,
    /// Received payload for reads, truncated to `bytes_transferred`.
    pub data: Vec<u8>,
}

impl IoOutcome {
    /// The outcome of a zero-length operation: immediate success,
    /// nothing moved.
    pub fn empty_success() -> Self {
        Self {
            status: Ok(()),
            bytes_transferred: 0,
            data: Vec::new(),
        }
    }
}

/// Completion continuation for a pipelined read or write.
///
/// Runs in the bus's completion context; must not block and must not
/// call [`submit_control`].
pub type IoHandler = Box<dyn FnOnce(IoOutcome) + Send + 'static>;

/// Submit a control transfer and wait for its completion.
///
/// Blocks the calling thread on a local channel until the bus signals
/// completion, so it must only be called from a context allowed to
/// block; never from inside a completion handler. Bus-level failure
/// takes precedence over protocol-level failure in the returned error.
pub fn submit_control(bus: &dyn Bus, kind: TransferKind) -> Result<Vec<u8>> {
    debug_assert!(matches!(kind, TransferKind::Control { .. }));
    let (tx, rx) = mpsc::channel();
    bus.submit(TransferRequest::new(kind, move |completion| {
        // The submitter may have given up; a dead receiver is fine.
        let _ = tx.send(completion);
    }));
    let completion = rx.recv().map_err(|_| {
        Error::Bus(BusError::Other {
            message: "bus dropped the completion".into(),
        })
    })?;
    fold_completion(completion)
}

/// Fold the two status layers of a control completion into one result.
fn fold_completion(completion: Completion) -> Result<Vec<u8>> {
    if !completion.usb_status.is_success() {
        error!(
            usb_status = ?completion.usb_status,
            "device stack reported failure"
        );
    }
    if let Err(bus_error) = completion.status {
        error!(%bus_error, "control submission failed");
        return Err(Error::Bus(bus_error));
    }
    if !completion.usb_status.is_success() {
        return Err(Error::Protocol(completion.usb_status));
    }
    let mut data = completion.data;
    data.truncate(completion.transferred);
    Ok(data)
}

/// Submit a bulk transfer and return immediately.
///
/// `complete` runs when the bus finishes the transfer. A short IN
/// transfer is a success and reports the bytes actually received; a
/// protocol-level failure with a successful bus submission is logged
/// and reported as success with zero bytes, while a bus-level failure
/// carries through as the outcome's status.
pub fn submit_bulk(bus: &dyn Bus, endpoint: u8, data: Vec<u8>, complete: IoHandler) {
    let kind = TransferKind::Bulk { endpoint, data };
    bus.submit(TransferRequest::new(kind, move |completion| {
        complete(translate_bulk(endpoint, completion));
    }));
}

fn translate_bulk(endpoint: u8, completion: Completion) -> IoOutcome {
    match completion.status {
        Ok(()) => {
            if completion.usb_status.is_success() {
                let mut data = completion.data;
                data.truncate(completion.transferred);
                IoOutcome {
                    status: Ok(()),
                    bytes_transferred: completion.transferred,
                    data,
                }
            } else {
                warn!(
                    endpoint = format_args!("{:#04x}", endpoint),
                    usb_status = ?completion.usb_status,
                    "bulk transfer failed at the device stack"
                );
                IoOutcome {
                    status: Ok(()),
                    bytes_transferred: 0,
                    data: Vec::new(),
                }
            }
        }
        Err(bus_error) => {
            warn!(
                endpoint = format_args!("{:#04x}", endpoint),
                %bus_error,
                "bulk transfer failed at the bus"
            );
            IoOutcome {
                status: Err(Error::Bus(bus_error)),
                bytes_transferred: 0,
                data: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::UsbStatus;

    #[test]
    fn test_fold_prefers_bus_failure() {
        let completion = Completion {
            status: Err(BusError::Timeout),
            usb_status: UsbStatus::Stalled,
            transferred: 0,
            data: Vec::new(),
        };
        match fold_completion(completion) {
            Err(Error::Bus(BusError::Timeout)) => {}
            other => panic!("expected bus error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_fold_surfaces_protocol_failure() {
        let completion = Completion::protocol_failed(UsbStatus::Stalled);
        assert!(matches!(
            fold_completion(completion),
            Err(Error::Protocol(UsbStatus::Stalled))
        ));
    }

    #[test]
    fn test_fold_truncates_to_transferred() {
        let completion = Completion {
            status: Ok(()),
            usb_status: UsbStatus::Success,
            transferred: 1,
            data: vec![0x02, 0xFF, 0xFF],
        };
        assert_eq!(fold_completion(completion).unwrap(), vec![0x02]);
    }

    #[test]
    fn test_translate_short_read_is_success() {
        let outcome = translate_bulk(
            0x82,
            Completion {
                status: Ok(()),
                usb_status: UsbStatus::Success,
                transferred: 2,
                data: vec![0xAA, 0xBB],
            },
        );
        assert!(outcome.status.is_ok());
        assert_eq!(outcome.bytes_transferred, 2);
        assert_eq!(outcome.data, vec![0xAA, 0xBB]);
    }

    #[test]
    fn test_translate_protocol_failure_zeroes_count() {
        let outcome = translate_bulk(0x82, Completion::protocol_failed(UsbStatus::Stalled));
        assert!(outcome.status.is_ok());
        assert_eq!(outcome.bytes_transferred, 0);
    }

    #[test]
    fn test_translate_bus_failure_carries_status() {
        let outcome = translate_bulk(0x02, Completion::bus_failed(BusError::NoDevice));
        assert!(matches!(
            outcome.status,
            Err(Error::Bus(BusError::NoDevice))
        ));
        assert_eq!(outcome.bytes_transferred, 0);
    }
}
