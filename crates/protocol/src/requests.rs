//! CH34x request codes and control-transfer construction
//!
//! The chip speaks a private register protocol over control transfers:
//! a vendor read returns a single register byte, a vendor write carries
//! both register and value in the setup packet, and the two class
//! requests program the line coding and the modem-control outputs.
//! The numeric codes here are the chip's documented contract and must
//! not be changed.

use crate::transfer::TransferKind;
use byteorder::{ByteOrder, LittleEndian};

/// QinHeng Electronics vendor ID
pub const CH341_VENDOR_ID: u16 = 0x1a86;
/// CH340/CH341 serial adapter product ID
pub const CH341_PRODUCT_ID: u16 = 0x7523;

/// Vendor register read (1-byte IN)
pub const VENDOR_READ_REQUEST: u8 = 0x95;
/// Vendor register write (no data stage)
pub const VENDOR_WRITE_REQUEST: u8 = 0x9A;
/// Class request carrying the 7-byte line-coding payload
pub const SET_LINE_REQUEST: u8 = 0xA1;
/// Class request carrying the DTR/RTS pair in wValue
pub const SET_CONTROL_REQUEST: u8 = 0x10;

/// bmRequestType: device-to-host, vendor, device recipient
pub const REQUEST_TYPE_VENDOR_IN: u8 = 0xC0;
/// bmRequestType: host-to-device, vendor, device recipient
pub const REQUEST_TYPE_VENDOR_OUT: u8 = 0x40;
/// bmRequestType: host-to-device, class, device recipient
pub const REQUEST_TYPE_CLASS_OUT: u8 = 0x20;
/// bmRequestType: device-to-host, standard, device recipient
pub const REQUEST_TYPE_STANDARD_IN: u8 = 0x80;
/// bmRequestType: host-to-device, standard, device recipient
pub const REQUEST_TYPE_STANDARD_OUT: u8 = 0x00;

/// Standard GET_DESCRIPTOR request code
pub const GET_DESCRIPTOR_REQUEST: u8 = 0x06;
/// Standard SET_CONFIGURATION request code
pub const SET_CONFIGURATION_REQUEST: u8 = 0x09;

/// DTR output bit in the modem-control pair
pub const DTR_STATE: u16 = 0x0001;
/// RTS output bit in the modem-control pair
pub const RTS_STATE: u16 = 0x0002;

/// Length of the line-coding payload sent with [`SET_LINE_REQUEST`]
pub const LINE_PAYLOAD_LEN: usize = 7;

/// Build a vendor register read.
///
/// The chip answers with exactly one byte; the IN buffer is sized
/// accordingly.
pub fn vendor_read(value: u16, index: u16) -> TransferKind {
    TransferKind::Control {
        request_type: REQUEST_TYPE_VENDOR_IN,
        request: VENDOR_READ_REQUEST,
        value,
        index,
        data: vec![0u8; 1],
    }
}

/// Build a vendor register write. Both operands travel in the setup
/// packet; there is no data stage.
pub fn vendor_write(value: u16, index: u16) -> TransferKind {
    TransferKind::Control {
        request_type: REQUEST_TYPE_VENDOR_OUT,
        request: VENDOR_WRITE_REQUEST,
        value,
        index,
        data: Vec::new(),
    }
}

/// Build the set-line class request from the four line-coding fields.
pub fn set_line(baud_rate: u32, stop_bits: u8, parity: u8, data_bits: u8) -> TransferKind {
    TransferKind::Control {
        request_type: REQUEST_TYPE_CLASS_OUT,
        request: SET_LINE_REQUEST,
        value: 0,
        index: 0,
        data: line_payload(baud_rate, stop_bits, parity, data_bits).to_vec(),
    }
}

/// Build the set-control class request.
///
/// `dtr_rts` may only carry [`DTR_STATE`] and [`RTS_STATE`] bits; the
/// driver enforces that invariant before calling here.
pub fn set_control_lines(dtr_rts: u16) -> TransferKind {
    debug_assert_eq!(dtr_rts & !(DTR_STATE | RTS_STATE), 0);
    TransferKind::Control {
        request_type: REQUEST_TYPE_CLASS_OUT,
        request: SET_CONTROL_REQUEST,
        value: dtr_rts,
        index: 0,
        data: Vec::new(),
    }
}

/// Build a standard GET_DESCRIPTOR request for descriptor type
/// `descriptor_type`, index 0, reading up to `length` bytes.
pub fn get_descriptor(descriptor_type: u8, length: usize) -> TransferKind {
    TransferKind::Control {
        request_type: REQUEST_TYPE_STANDARD_IN,
        request: GET_DESCRIPTOR_REQUEST,
        value: (descriptor_type as u16) << 8,
        index: 0,
        data: vec![0u8; length],
    }
}

/// Build a standard SET_CONFIGURATION request. Configuration value 0
/// returns the device to the unconfigured state.
pub fn set_configuration(value: u8) -> TransferKind {
    TransferKind::Control {
        request_type: REQUEST_TYPE_STANDARD_OUT,
        request: SET_CONFIGURATION_REQUEST,
        value: value as u16,
        index: 0,
        data: Vec::new(),
    }
}

/// Encode the line-coding payload: little-endian baud rate followed by
/// the stop-bits, parity, and data-bits codes.
pub fn line_payload(baud_rate: u32, stop_bits: u8, parity: u8, data_bits: u8) -> [u8; LINE_PAYLOAD_LEN] {
    let mut payload = [0u8; LINE_PAYLOAD_LEN];
    LittleEndian::write_u32(&mut payload[..4], baud_rate);
    payload[4] = stop_bits;
    payload[5] = parity;
    payload[6] = data_bits;
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_read_shape() {
        match vendor_read(0x8484, 0) {
            TransferKind::Control {
                request_type,
                request,
                value,
                index,
                data,
            } => {
                assert_eq!(request_type, 0xC0);
                assert_eq!(request, 0x95);
                assert_eq!(value, 0x8484);
                assert_eq!(index, 0);
                assert_eq!(data.len(), 1);
            }
            _ => panic!("expected control transfer"),
        }
    }

    #[test]
    fn test_vendor_write_has_no_data_stage() {
        match vendor_write(0x0404, 0) {
            TransferKind::Control {
                request_type,
                request,
                data,
                ..
            } => {
                assert_eq!(request_type, 0x40);
                assert_eq!(request, 0x9A);
                assert!(data.is_empty());
            }
            _ => panic!("expected control transfer"),
        }
    }

    #[test]
    fn test_line_payload_encoding() {
        let payload = line_payload(115200, 0, 0, 0);
        assert_eq!(&payload[..4], &115200u32.to_le_bytes());
        assert_eq!(&payload[4..], &[0, 0, 0]);

        let payload = line_payload(9600, 2, 1, 8);
        assert_eq!(&payload[..4], &9600u32.to_le_bytes());
        assert_eq!(&payload[4..], &[2, 1, 8]);
    }

    #[test]
    fn test_set_control_lines_value() {
        match set_control_lines(DTR_STATE | RTS_STATE) {
            TransferKind::Control {
                request, value, data, ..
            } => {
                assert_eq!(request, SET_CONTROL_REQUEST);
                assert_eq!(value, 0x0003);
                assert!(data.is_empty());
            }
            _ => panic!("expected control transfer"),
        }
    }

    #[test]
    fn test_get_descriptor_value_encodes_type() {
        match get_descriptor(0x02, 9) {
            TransferKind::Control {
                request_type,
                request,
                value,
                data,
                ..
            } => {
                assert_eq!(request_type, 0x80);
                assert_eq!(request, GET_DESCRIPTOR_REQUEST);
                assert_eq!(value, 0x0200);
                assert_eq!(data.len(), 9);
            }
            _ => panic!("expected control transfer"),
        }
    }
}
