//! POKEY (Atari) channel model
//!
//! Derives per-channel frequency and pitch from one chip's register block.
//! A register block is the 9 bytes
//! `AUDF1 AUDC1 AUDF2 AUDC2 AUDF3 AUDC3 AUDF4 AUDC4 AUDCTL`.
//!
//! `ChipState` is a plain value: applying a block returns a new state and
//! leaves the previous one untouched.

pub mod diagnostic;
pub mod note;
pub mod poly;

pub use diagnostic::PitchDiagnostic;
pub use note::Pitch;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channels per chip
pub const CHANNELS: usize = 4;

/// Bytes per register block
pub const BLOCK_SIZE: usize = 9;

/// One chip's raw registers for a frame
pub type RegisterBlock = [u8; BLOCK_SIZE];

/// Video standard of the host machine, which fixes the chip clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStandard {
    #[default]
    Ntsc,
    Pal,
}

impl VideoStandard {
    pub fn clocks(self) -> Clocks {
        match self {
            VideoStandard::Ntsc => NTSC_CLOCKS,
            VideoStandard::Pal => PAL_CLOCKS,
        }
    }

    /// Duration of one video frame in seconds
    pub fn frame_period(self) -> f64 {
        match self {
            VideoStandard::Ntsc => 1.0 / 60.0,
            VideoStandard::Pal => 1.0 / 50.0,
        }
    }
}

impl fmt::Display for VideoStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoStandard::Ntsc => write!(f, "NTSC"),
            VideoStandard::Pal => write!(f, "PAL"),
        }
    }
}

/// Chip clock frequencies in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Clocks {
    /// Direct 1.79 MHz clock
    pub fast: f64,
    /// Default base clock
    pub base_64khz: f64,
    /// Base clock when AUDCTL bit 0 is set
    pub base_15khz: f64,
}

pub const NTSC_CLOCKS: Clocks = Clocks {
    fast: 1_789_789.0,
    base_64khz: 63_921.0,
    base_15khz: 15_699.9,
};

// The PAL base clocks are unverified.
pub const PAL_CLOCKS: Clocks = Clocks {
    fast: 1_773_447.0,
    base_64khz: 63_921.0,
    base_15khz: 15_699.0,
};

/// Decoded AUDF/AUDC pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChannelRegisters {
    /// AUDF frequency divider
    pub divider: u8,
    /// 4-bit volume
    pub volume: u8,
    /// Volume-only (DC) mode, used for sample playback
    pub volume_only: bool,
    /// 3-bit distortion selector
    pub poly: u8,
}

impl ChannelRegisters {
    pub fn new(audf: u8, audc: u8) -> Self {
        Self {
            divider: audf,
            volume: audc & 0x0F,
            volume_only: (audc >> 4) & 1 != 0,
            poly: audc >> 5,
        }
    }
}

/// Chip-wide AUDCTL register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AudCtl(u8);

impl AudCtl {
    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    fn bit(self, n: u8) -> bool {
        (self.0 >> n) & 1 != 0
    }

    pub fn use_15khz(self) -> bool {
        self.bit(0)
    }

    pub fn highpass_2_with_4(self) -> bool {
        self.bit(1)
    }

    pub fn highpass_1_with_3(self) -> bool {
        self.bit(2)
    }

    pub fn join_4_and_3(self) -> bool {
        self.bit(3)
    }

    pub fn join_2_and_1(self) -> bool {
        self.bit(4)
    }

    pub fn clock_3_fast(self) -> bool {
        self.bit(5)
    }

    pub fn clock_1_fast(self) -> bool {
        self.bit(6)
    }

    pub fn poly9(self) -> bool {
        self.bit(7)
    }

    /// Features enabled in this register, in bit order
    pub fn features(self) -> impl Iterator<Item = AudctlFeature> {
        AudctlFeature::ALL
            .into_iter()
            .enumerate()
            .filter(move |&(bit, _)| self.bit(bit as u8))
            .map(|(_, feature)| feature)
    }
}

/// A single AUDCTL feature flag, ordered by bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AudctlFeature {
    #[serde(rename = "15khz")]
    Clock15Khz,
    #[serde(rename = "highpass2w4")]
    Highpass2With4,
    #[serde(rename = "highpass1w3")]
    Highpass1With3,
    #[serde(rename = "join4and3")]
    Join4And3,
    #[serde(rename = "join2and1")]
    Join2And1,
    #[serde(rename = "clock3mhz")]
    Clock3Fast,
    #[serde(rename = "clock1mhz")]
    Clock1Fast,
    #[serde(rename = "poly17as9")]
    Poly9,
}

impl AudctlFeature {
    /// All features, indexed by AUDCTL bit
    pub const ALL: [AudctlFeature; 8] = [
        AudctlFeature::Clock15Khz,
        AudctlFeature::Highpass2With4,
        AudctlFeature::Highpass1With3,
        AudctlFeature::Join4And3,
        AudctlFeature::Join2And1,
        AudctlFeature::Clock3Fast,
        AudctlFeature::Clock1Fast,
        AudctlFeature::Poly9,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AudctlFeature::Clock15Khz => "15khz",
            AudctlFeature::Highpass2With4 => "highpass2w4",
            AudctlFeature::Highpass1With3 => "highpass1w3",
            AudctlFeature::Join4And3 => "join4and3",
            AudctlFeature::Join2And1 => "join2and1",
            AudctlFeature::Clock3Fast => "clock3mhz",
            AudctlFeature::Clock1Fast => "clock1mhz",
            AudctlFeature::Poly9 => "poly17as9",
        }
    }
}

impl fmt::Display for AudctlFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register state of one POKEY
#[derive(Debug, Clone, PartialEq)]
pub struct ChipState {
    index: usize,
    clocks: Clocks,
    channels: [ChannelRegisters; CHANNELS],
    audctl: AudCtl,
    debug_noise: bool,
}

impl ChipState {
    /// Chip with all registers cleared
    pub fn new(index: usize, standard: VideoStandard) -> Self {
        Self::with_clocks(index, standard.clocks())
    }

    pub fn with_clocks(index: usize, clocks: Clocks) -> Self {
        Self {
            index,
            clocks,
            channels: [ChannelRegisters::default(); CHANNELS],
            audctl: AudCtl::default(),
            debug_noise: false,
        }
    }

    /// Give noise selectors a pseudo-pitch taken straight from the divider,
    /// so they stay visible when inspecting a dump.
    pub fn with_debug_noise(mut self, enabled: bool) -> Self {
        self.debug_noise = enabled;
        self
    }

    /// State after writing a full register block
    pub fn apply(&self, block: &RegisterBlock) -> Self {
        let mut next = self.clone();
        for (ch, regs) in next.channels.iter_mut().enumerate() {
            *regs = ChannelRegisters::new(block[ch * 2], block[ch * 2 + 1]);
        }
        next.audctl = AudCtl::new(block[8]);
        next
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn audctl(&self) -> AudCtl {
        self.audctl
    }

    pub fn channel(&self, ch: usize) -> &ChannelRegisters {
        &self.channels[ch]
    }

    pub fn channels(&self) -> &[ChannelRegisters; CHANNELS] {
        &self.channels
    }

    /// Effective clock and divide ratio N for a channel.
    ///
    /// Returns `None` for the lower channel of a joined 16-bit pair, which
    /// only serves as the low byte of its partner.
    fn divide_ratio(&self, ch: usize) -> Option<(f64, u32)> {
        let audctl = self.audctl;
        let mut clock = if audctl.use_15khz() {
            self.clocks.base_15khz
        } else {
            self.clocks.base_64khz
        };
        let mut divider = self.channels[ch].divider as u32;
        let mut modifier = 1;

        let (joined, fast) = if ch < 2 {
            (audctl.join_2_and_1(), audctl.clock_1_fast())
        } else {
            (audctl.join_4_and_3(), audctl.clock_3_fast())
        };

        if ch % 2 == 0 {
            if joined {
                return None;
            }
            if fast {
                clock = self.clocks.fast;
                modifier = 7;
            }
        } else if joined {
            divider = (divider << 8) | self.channels[ch - 1].divider as u32;
            if fast {
                clock = self.clocks.fast;
                modifier = 4;
            }
        }

        Some((clock, divider + modifier))
    }

    /// Output frequency of a channel in Hz, 0 when it carries no note
    pub fn frequency(&self, ch: usize) -> f64 {
        let regs = &self.channels[ch];
        if regs.volume_only {
            return 0.0;
        }

        let tonal = poly::is_tonal(regs.poly);
        if !tonal && !self.debug_noise {
            return 0.0;
        }

        let Some((clock, n)) = self.divide_ratio(ch) else {
            return 0.0;
        };

        let period = if tonal {
            poly::period(regs.poly, self.audctl.poly9())
        } else {
            poly::PURE
        };

        clock / (n as f64 * period as f64)
    }

    /// Nearest pitch of a channel.
    ///
    /// An audible channel whose key falls outside [`note::KEY_RANGE`] is an
    /// unhandled register combination and is reported as a diagnostic.
    pub fn pitch(&self, ch: usize) -> std::result::Result<Option<Pitch>, PitchDiagnostic> {
        let frequency = self.frequency(ch);
        if frequency <= 0.0 {
            return Ok(None);
        }

        let key = note::nearest_key(frequency);
        if !note::KEY_RANGE.contains(&key) {
            if self.channels[ch].volume > 0 {
                return Err(PitchDiagnostic::new(self, ch, key));
            }
            return Ok(None);
        }

        Ok(Some(Pitch { key, frequency }))
    }
}
