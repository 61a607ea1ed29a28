//! Serial line state
//!
//! The cached picture of what the chip's serial side is set to: baud
//! rate, framing, special characters, flow control and the modem
//! control lines. [`crate::device::SerialDevice`] keeps one of these
//! behind a mutex and pushes pieces of it to the chip as they change.

use protocol::requests::{DTR_STATE, RTS_STATE};

/// DTR follows the handshake logic
pub const DTR_CONTROL_HANDSHAKE: u32 = 0x0000_0001;
/// RTS is driven by the flow-replacement logic
pub const RTS_CONTROL_FLOW: u32 = 0x0000_0040;

/// Framing parameters, as the host configures them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineControl {
    pub stop_bits: u8,
    pub parity: u8,
    pub word_length: u8,
}

/// The special characters the serial engine recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerialChars {
    pub eof_char: u8,
    pub error_char: u8,
    pub break_char: u8,
    pub event_char: u8,
    pub xon_char: u8,
    pub xoff_char: u8,
}

/// Hardware and software flow-control configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandFlow {
    pub control_handshake: u32,
    pub flow_replace: u32,
    pub xon_limit: i32,
    pub xoff_limit: i32,
}

/// Everything the driver remembers about the serial line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineState {
    pub baud_rate: u32,
    pub line_control: LineControl,
    pub chars: SerialChars,
    pub hand_flow: HandFlow,
    /// Current DTR/RTS bits, in the chip's encoding.
    pub dtr_rts: u16,
}

impl LineState {
    /// The state a freshly started device is put into.
    pub fn startup_defaults() -> Self {
        Self {
            baud_rate: 115_200,
            line_control: LineControl {
                stop_bits: 0,
                parity: 0,
                word_length: 0,
            },
            chars: SerialChars {
                xon_char: 0x11,
                xoff_char: 0x13,
                ..SerialChars::default()
            },
            hand_flow: HandFlow {
                control_handshake: DTR_CONTROL_HANDSHAKE,
                flow_replace: RTS_CONTROL_FLOW,
                xon_limit: 2048,
                xoff_limit: 512,
            },
            dtr_rts: 0,
        }
    }

    /// Raise or drop DTR, leaving RTS alone.
    pub fn set_dtr(&mut self, asserted: bool) {
        if asserted {
            self.dtr_rts |= DTR_STATE;
        } else {
            self.dtr_rts &= !DTR_STATE;
        }
    }

    /// Raise or drop RTS, leaving DTR alone.
    pub fn set_rts(&mut self, asserted: bool) {
        if asserted {
            self.dtr_rts |= RTS_STATE;
        } else {
            self.dtr_rts &= !RTS_STATE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_defaults() {
        let state = LineState::startup_defaults();
        assert_eq!(state.baud_rate, 115_200);
        assert_eq!(state.line_control.stop_bits, 0);
        assert_eq!(state.chars.xon_char, 0x11);
        assert_eq!(state.chars.xoff_char, 0x13);
        assert_eq!(state.hand_flow.xon_limit, 2048);
        assert_eq!(state.hand_flow.xoff_limit, 512);
        assert_eq!(state.dtr_rts, 0);
    }

    #[test]
    fn test_control_lines_are_independent() {
        let mut state = LineState::startup_defaults();
        state.set_dtr(true);
        state.set_rts(true);
        assert_eq!(state.dtr_rts, DTR_STATE | RTS_STATE);
        state.set_dtr(false);
        assert_eq!(state.dtr_rts, RTS_STATE);
        state.set_rts(false);
        assert_eq!(state.dtr_rts, 0);
    }
}
