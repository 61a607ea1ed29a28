//! rusb-backed bus
//!
//! [`UsbHostBus`] carries the driver's transfers to a real adapter.
//! All libusb calls run on one dedicated worker thread; submissions
//! cross over on a channel and complete on that thread, so completion
//! handlers must stay non-blocking. Standard SET_CONFIGURATION
//! requests are intercepted and turned into the libusb configuration
//! and interface-claim calls instead of going out as raw transfers.

use anyhow::{Context as _, Result};
use async_channel::{Receiver, Sender};
use driver::{Bus, LifecycleEvent, TransferRequest};
use protocol::requests::{
    CH341_PRODUCT_ID, CH341_VENDOR_ID, REQUEST_TYPE_STANDARD_OUT, SET_CONFIGURATION_REQUEST,
};
use protocol::{BusError, Completion, TransferKind, UsbStatus};
use rusb::{Context, DeviceHandle, UsbContext};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// The interface a CH341 exposes its endpoints on.
const SERIAL_INTERFACE: u8 = 0;

/// A [`Bus`] implementation backed by a rusb device handle.
pub struct UsbHostBus {
    tx: Sender<TransferRequest>,
    worker: Option<JoinHandle<()>>,
}

impl UsbHostBus {
    /// Open the first attached CH341 adapter and spawn the worker
    /// thread for it.
    pub fn open() -> Result<Self> {
        let context = Context::new().context("initializing libusb")?;
        let mut handle = context
            .open_device_with_vid_pid(CH341_VENDOR_ID, CH341_PRODUCT_ID)
            .context("no CH341 adapter attached")?;
        if let Err(error) = handle.set_auto_detach_kernel_driver(true) {
            debug!(%error, "kernel driver auto-detach unavailable");
        }
        Ok(Self::spawn(handle))
    }

    fn spawn(handle: DeviceHandle<Context>) -> Self {
        let (tx, rx) = async_channel::unbounded();
        let worker = thread::spawn(move || worker_loop(handle, rx));
        Self {
            tx,
            worker: Some(worker),
        }
    }
}

impl Bus for UsbHostBus {
    fn submit(&self, request: TransferRequest) {
        if let Err(error) = self.tx.send_blocking(request) {
            // Worker is gone; the request still owes its completion.
            error.into_inner().complete(Completion::bus_failed(BusError::NoDevice));
        }
    }

    fn forward_event(&self, event: &LifecycleEvent) -> std::result::Result<(), BusError> {
        // The host stack has no downstream driver to consult.
        debug!(%event, "lifecycle event accepted");
        Ok(())
    }
}

impl Drop for UsbHostBus {
    fn drop(&mut self) {
        self.tx.close();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("USB worker thread panicked");
        }
    }
}

fn worker_loop(mut handle: DeviceHandle<Context>, rx: Receiver<TransferRequest>) {
    info!("USB worker thread started");
    while let Ok(request) = rx.recv_blocking() {
        let (kind, complete) = request.into_parts();
        complete(execute_transfer(&mut handle, kind));
    }
    info!("USB worker thread stopped");
}

fn execute_transfer(handle: &mut DeviceHandle<Context>, kind: TransferKind) -> Completion {
    match kind {
        TransferKind::Control {
            request_type,
            request,
            value,
            index,
            data,
        } => {
            if request_type == REQUEST_TYPE_STANDARD_OUT && request == SET_CONFIGURATION_REQUEST {
                return apply_configuration(handle, value as u8);
            }
            execute_control(handle, request_type, request, value, index, data)
        }
        TransferKind::Bulk { endpoint, data } => {
            if endpoint & 0x80 != 0 {
                let mut buffer = data;
                match handle.read_bulk(endpoint, &mut buffer, TRANSFER_TIMEOUT) {
                    Ok(len) => {
                        buffer.truncate(len);
                        Completion::success(buffer)
                    }
                    Err(error) => completion_from(error),
                }
            } else {
                match handle.write_bulk(endpoint, &data, TRANSFER_TIMEOUT) {
                    Ok(len) => Completion::sent(len),
                    Err(error) => completion_from(error),
                }
            }
        }
        TransferKind::Interrupt { endpoint, data } => {
            if endpoint & 0x80 != 0 {
                let mut buffer = data;
                match handle.read_interrupt(endpoint, &mut buffer, TRANSFER_TIMEOUT) {
                    Ok(len) => {
                        buffer.truncate(len);
                        Completion::success(buffer)
                    }
                    Err(error) => completion_from(error),
                }
            } else {
                match handle.write_interrupt(endpoint, &data, TRANSFER_TIMEOUT) {
                    Ok(len) => Completion::sent(len),
                    Err(error) => completion_from(error),
                }
            }
        }
    }
}

fn execute_control(
    handle: &mut DeviceHandle<Context>,
    request_type: u8,
    request: u8,
    value: u16,
    index: u16,
    data: Vec<u8>,
) -> Completion {
    debug!(
        request_type = format_args!("{request_type:#04x}"),
        request = format_args!("{request:#04x}"),
        value = format_args!("{value:#06x}"),
        index = format_args!("{index:#06x}"),
        len = data.len(),
        "control transfer"
    );
    if request_type & 0x80 != 0 {
        let mut buffer = data;
        match handle.read_control(request_type, request, value, index, &mut buffer, TRANSFER_TIMEOUT)
        {
            Ok(len) => {
                buffer.truncate(len);
                Completion::success(buffer)
            }
            Err(error) => completion_from(error),
        }
    } else {
        match handle.write_control(request_type, request, value, index, &data, TRANSFER_TIMEOUT) {
            Ok(len) => Completion::sent(len),
            Err(error) => completion_from(error),
        }
    }
}

/// Select or drop the device configuration through libusb, claiming
/// the serial interface alongside.
fn apply_configuration(handle: &mut DeviceHandle<Context>, value: u8) -> Completion {
    let result = if value == 0 {
        if let Err(error) = handle.release_interface(SERIAL_INTERFACE) {
            debug!(%error, "interface release failed");
        }
        handle.set_active_configuration(0)
    } else {
        handle
            .set_active_configuration(value)
            .and_then(|()| handle.claim_interface(SERIAL_INTERFACE))
    };
    match result {
        Ok(()) => Completion::sent(0),
        Err(error) => {
            warn!(%error, value, "configuration change failed");
            completion_from(error)
        }
    }
}

fn completion_from(error: rusb::Error) -> Completion {
    if error == rusb::Error::Pipe {
        // A stall is the device answering, not the bus failing.
        return Completion::protocol_failed(UsbStatus::Stalled);
    }
    Completion::bus_failed(map_rusb_error(error))
}

fn map_rusb_error(error: rusb::Error) -> BusError {
    match error {
        rusb::Error::Timeout => BusError::Timeout,
        rusb::Error::Pipe => BusError::Pipe,
        rusb::Error::NoDevice => BusError::NoDevice,
        rusb::Error::NotFound => BusError::NotFound,
        rusb::Error::Busy => BusError::Busy,
        rusb::Error::Overflow => BusError::Overflow,
        rusb::Error::Io => BusError::Io,
        rusb::Error::InvalidParam => BusError::InvalidParam,
        rusb::Error::Access => BusError::Access,
        rusb::Error::NoMem => BusError::NoResources,
        _ => BusError::Other {
            message: error.to_string(),
        },
    }
}

/// List the CH341 adapters currently attached, as `(bus, address)`
/// pairs.
pub fn list_adapters() -> Result<Vec<(u8, u8)>> {
    let context = Context::new().context("initializing libusb")?;
    let mut adapters = Vec::new();
    for device in context.devices().context("enumerating devices")?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(error) => {
                debug!(%error, "skipping unreadable device");
                continue;
            }
        };
        if descriptor.vendor_id() == CH341_VENDOR_ID
            && descriptor.product_id() == CH341_PRODUCT_ID
        {
            adapters.push((device.bus_number(), device.address()));
        }
    }
    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rusb_error_mapping() {
        assert_eq!(map_rusb_error(rusb::Error::Timeout), BusError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), BusError::NoDevice);
        assert!(matches!(
            map_rusb_error(rusb::Error::Interrupted),
            BusError::Other { .. }
        ));
    }

    #[test]
    fn test_stall_is_a_protocol_failure() {
        let completion = completion_from(rusb::Error::Pipe);
        assert!(completion.status.is_ok());
        assert!(!completion.usb_status.is_success());
    }
}
