//! Serial configuration surface
//!
//! The typed equivalent of a serial port's configuration requests.
//! The host side decodes whatever request framing it speaks into a
//! [`SerialRequest`] and hands it to [`handle_serial_request`]; the
//! bulk data path stays on [`crate::device::SerialDevice`] directly.

use crate::device::{PnpState, SerialDevice};
use crate::error::{Error, Result};
use crate::line::{HandFlow, LineControl, SerialChars};
use tracing::debug;

/// One serial configuration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialRequest {
    GetBaudRate,
    SetBaudRate(u32),
    GetLineControl,
    SetLineControl(LineControl),
    GetChars,
    SetChars(SerialChars),
    GetHandFlow,
    SetHandFlow(HandFlow),
    SetDtr,
    ClearDtr,
    SetRts,
    ClearRts,
    GetDtrRts,
    /// A request code outside the supported surface, carried for the
    /// refusal log.
    Unsupported(u32),
}

/// The answer to a [`SerialRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialReply {
    None,
    BaudRate(u32),
    LineControl(LineControl),
    Chars(SerialChars),
    HandFlow(HandFlow),
    DtrRts(u16),
}

/// Dispatch one configuration request against `device`.
///
/// Anything outside the line/control surface fails with
/// [`Error::NotSupported`]; a deleted device fails everything with
/// [`Error::NoSuchDevice`] before any hardware access.
pub fn handle_serial_request(device: &SerialDevice, request: SerialRequest) -> Result<SerialReply> {
    if device.state() == PnpState::Deleted {
        return Err(Error::NoSuchDevice);
    }
    match request {
        SerialRequest::GetBaudRate => device.get_baud_rate().map(SerialReply::BaudRate),
        SerialRequest::SetBaudRate(baud_rate) => {
            device.set_baud_rate(baud_rate).map(|()| SerialReply::None)
        }
        SerialRequest::GetLineControl => device.get_line_control().map(SerialReply::LineControl),
        SerialRequest::SetLineControl(line_control) => device
            .set_line_control(line_control)
            .map(|()| SerialReply::None),
        SerialRequest::GetChars => device.get_chars().map(SerialReply::Chars),
        SerialRequest::SetChars(chars) => device.set_chars(chars).map(|()| SerialReply::None),
        SerialRequest::GetHandFlow => device.get_hand_flow().map(SerialReply::HandFlow),
        SerialRequest::SetHandFlow(hand_flow) => {
            device.set_hand_flow(hand_flow).map(|()| SerialReply::None)
        }
        SerialRequest::SetDtr => device.set_dtr(true).map(|()| SerialReply::None),
        SerialRequest::ClearDtr => device.set_dtr(false).map(|()| SerialReply::None),
        SerialRequest::SetRts => device.set_rts(true).map(|()| SerialReply::None),
        SerialRequest::ClearRts => device.set_rts(false).map(|()| SerialReply::None),
        SerialRequest::GetDtrRts => device.get_control_lines().map(SerialReply::DtrRts),
        SerialRequest::Unsupported(code) => {
            debug!(
                device = %device.name(),
                code = format_args!("{code:#010x}"),
                "unsupported serial request"
            );
            Err(Error::NotSupported)
        }
    }
}
