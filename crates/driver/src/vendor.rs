//! CH341 vendor operations
//!
//! Thin wrappers that build the chip's control requests and push them
//! through the synchronous submitter. Everything here blocks until the
//! device answers.

use crate::bus::Bus;
use crate::error::Result;
use crate::transfer::submit_control;
use protocol::requests;
use tracing::debug;

/// Fetch a descriptor from the device.
///
/// `length` is the number of bytes requested; the device may answer
/// with fewer, which the returned buffer reflects.
pub fn get_descriptor(bus: &dyn Bus, descriptor_type: u8, length: usize) -> Result<Vec<u8>> {
    submit_control(bus, requests::get_descriptor(descriptor_type, length))
}

/// Select a device configuration, or deconfigure with value zero.
pub fn set_configuration(bus: &dyn Bus, value: u8) -> Result<()> {
    debug!(value, "setting configuration");
    submit_control(bus, requests::set_configuration(value))?;
    Ok(())
}

/// Read a chip register pair. The answered value is informational;
/// callers decide what, if anything, to make of it.
pub fn read_register(bus: &dyn Bus, value: u16, index: u16) -> Result<u8> {
    let data = submit_control(bus, requests::vendor_read(value, index))?;
    let byte = data.first().copied().unwrap_or(0);
    debug!(
        value = format_args!("{:#06x}", value),
        index = format_args!("{:#06x}", index),
        byte = format_args!("{:#04x}", byte),
        "vendor read"
    );
    Ok(byte)
}

/// Write a chip register pair.
pub fn write_register(bus: &dyn Bus, value: u16, index: u16) -> Result<()> {
    debug!(
        value = format_args!("{:#06x}", value),
        index = format_args!("{:#06x}", index),
        "vendor write"
    );
    submit_control(bus, requests::vendor_write(value, index))?;
    Ok(())
}

/// Push baud rate and framing to the chip in one request.
pub fn set_line(bus: &dyn Bus, baud_rate: u32, stop_bits: u8, parity: u8, data_bits: u8) -> Result<()> {
    debug!(baud_rate, stop_bits, parity, data_bits, "setting line");
    submit_control(bus, requests::set_line(baud_rate, stop_bits, parity, data_bits))?;
    Ok(())
}

/// Push the DTR/RTS modem control lines to the chip.
pub fn set_control_lines(bus: &dyn Bus, dtr_rts: u16) -> Result<()> {
    debug!(
        dtr_rts = format_args!("{:#06x}", dtr_rts),
        "setting control lines"
    );
    submit_control(bus, requests::set_control_lines(dtr_rts))?;
    Ok(())
}
