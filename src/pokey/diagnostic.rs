//! Unresolved pitch reports

use super::{poly, ChipState, CHANNELS};
use serde::Serialize;
use std::fmt;

/// Full chip state captured when an audible channel maps outside the
/// supported key range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitchDiagnostic {
    /// Chip index
    pub chip: usize,
    /// Offending channel (0-based)
    pub channel: usize,
    /// Key the channel resolved to
    pub key: i32,
    pub dividers: [u8; CHANNELS],
    pub frequencies: [f64; CHANNELS],
    pub volumes: [u8; CHANNELS],
    pub volume_only: [bool; CHANNELS],
    pub polys: [u8; CHANNELS],
    pub use_15khz: bool,
    pub highpass_2_with_4: bool,
    pub highpass_1_with_3: bool,
    pub join_4_and_3: bool,
    pub join_2_and_1: bool,
    pub clock_3_fast: bool,
    pub clock_1_fast: bool,
    pub poly9: bool,
}

impl PitchDiagnostic {
    pub(super) fn new(chip: &ChipState, channel: usize, key: i32) -> Self {
        let regs = chip.channels();
        let audctl = chip.audctl();
        Self {
            chip: chip.index(),
            channel,
            key,
            dividers: regs.map(|r| r.divider),
            frequencies: std::array::from_fn(|ch| chip.frequency(ch)),
            volumes: regs.map(|r| r.volume),
            volume_only: regs.map(|r| r.volume_only),
            polys: regs.map(|r| r.poly),
            use_15khz: audctl.use_15khz(),
            highpass_2_with_4: audctl.highpass_2_with_4(),
            highpass_1_with_3: audctl.highpass_1_with_3(),
            join_4_and_3: audctl.join_4_and_3(),
            join_2_and_1: audctl.join_2_and_1(),
            clock_3_fast: audctl.clock_3_fast(),
            clock_1_fast: audctl.clock_1_fast(),
            poly9: audctl.poly9(),
        }
    }
}

impl fmt::Display for PitchDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "couldn't handle audible key {} on POKEY {}, channel {} ({}): ",
            self.key,
            self.chip,
            self.channel + 1,
            poly::describe(self.polys[self.channel]),
        )?;
        write!(
            f,
            "audf={:?} freqs={:.3?} vol={:?} volctrl={:?} poly={:?} ",
            self.dividers, self.frequencies, self.volumes, self.volume_only, self.polys
        )?;
        write!(
            f,
            "15khz={} highpass2w4={} highpass1w3={} join4and3={} join2and1={} clock3mhz={} clock1mhz={} poly17as9={}",
            self.use_15khz,
            self.highpass_2_with_4,
            self.highpass_1_with_3,
            self.join_4_and_3,
            self.join_2_and_1,
            self.clock_3_fast,
            self.clock_1_fast,
            self.poly9,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::VideoStandard;
    use super::*;

    #[test]
    fn test_display_names_chip_and_channel() {
        let chip = ChipState::new(1, VideoStandard::Pal)
            .apply(&[0xFF, 0xC0, 0xFF, 0xCF, 0, 0, 0, 0, 0x11]);
        let diag = chip.pitch(1).unwrap_err();
        let text = diag.to_string();
        assert!(text.contains("POKEY 1, channel 2"));
        assert!(text.contains("4-bit buzz"));
        assert!(text.contains("join2and1=true"));
    }
}
