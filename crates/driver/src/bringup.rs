//! Chip bring-up
//!
//! The CH341 needs a fixed sequence of vendor register accesses before
//! its serial engine behaves. The sequence below reproduces the one the
//! chip vendor uses: reads probe chip status, writes reset and arm the
//! engine, and the final write picks the mode for the chip variant.
//! Probed values are logged but never gate progress; only a failed
//! submission aborts the sequence.

use crate::bus::Bus;
use crate::error::Result;
use crate::vendor;
use tracing::debug;

/// Which CH341 silicon the device carries.
///
/// The HX parts take a different mode byte in the final bring-up write
/// than the original silicon does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChipVariant {
    #[default]
    Hx,
    Legacy,
}

enum Step {
    /// Vendor read; `expect` is the value healthy chips answer with.
    Read { value: u16, index: u16, expect: u8 },
    /// Vendor write.
    Write { value: u16, index: u16 },
}

const SEQUENCE: [Step; 10] = [
    Step::Read { value: 0x8484, index: 0, expect: 2 },
    Step::Write { value: 0x0404, index: 0 },
    Step::Read { value: 0x8484, index: 0, expect: 2 },
    Step::Read { value: 0x8383, index: 0, expect: 0 },
    Step::Read { value: 0x8484, index: 0, expect: 2 },
    Step::Write { value: 0x0404, index: 0 },
    Step::Read { value: 0x8484, index: 0, expect: 2 },
    Step::Read { value: 0x8383, index: 0, expect: 0 },
    Step::Write { value: 0, index: 1 },
    Step::Write { value: 1, index: 0 },
];

/// Run the bring-up sequence for `variant`.
///
/// Steps run strictly in order; the first submission failure aborts the
/// sequence with that step's error, leaving the chip wherever the
/// failing step left it.
pub fn bring_up(bus: &dyn Bus, variant: ChipVariant) -> Result<()> {
    for step in &SEQUENCE {
        match *step {
            Step::Read { value, index, expect } => {
                let byte = vendor::read_register(bus, value, index)?;
                if byte != expect {
                    debug!(
                        value = format_args!("{:#06x}", value),
                        byte = format_args!("{:#04x}", byte),
                        expect = format_args!("{:#04x}", expect),
                        "bring-up probe answered off-nominal"
                    );
                }
            }
            Step::Write { value, index } => {
                vendor::write_register(bus, value, index)?;
            }
        }
    }
    let mode = match variant {
        ChipVariant::Hx => 0x44,
        ChipVariant::Legacy => 0x24,
    };
    vendor::write_register(bus, 2, mode)?;
    debug!(?variant, "bring-up complete");
    Ok(())
}
