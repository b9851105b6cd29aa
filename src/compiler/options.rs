//! Conversion options

use crate::error::{Error, Result};
use crate::midi::writer::{DEFAULT_TEMPO, DEFAULT_TIMEBASE};
use crate::pokey::VideoStandard;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest quarter note a Set Tempo event can hold, in microseconds
const MAX_TEMPO_MICROS: f64 = 0xFF_FFFF as f64;

/// General MIDI programs per distortion selector
pub const DEFAULT_INSTRUMENTS: [u8; 8] = [0, 0, 0, 0, 0, 80, 87, 80];

/// What to do when only the distortion selector changes under a held note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimbreChangePolicy {
    /// Keep the note sounding
    #[default]
    Merge,
    /// End the note and start a new one
    Retrigger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Close and reopen notes on every state change
    pub always_retrigger: bool,
    /// Let decaying volume continue a note; rising volume retriggers it
    pub merge_decays: bool,
    /// Loudness multiplier
    pub boost: f64,
    /// One track per distortion selector of each channel
    pub split_timbre: bool,
    /// Start the file at the first audible note
    pub trim_silence: bool,
    /// Tempo in BPM the dump is known to follow
    pub force_tempo: Option<f64>,
    /// Ticks per quarter note
    pub force_timebase: Option<u32>,
    /// Express loudness with channel volume instead of note velocity
    pub channel_volume: bool,
    /// Emit program changes from the instrument table
    pub use_instruments: bool,
    /// Program per distortion selector
    pub instruments: [u8; 8],
    pub timbre_change: TimbreChangePolicy,
    /// Pseudo-pitch noise channels from their raw dividers
    pub debug_noise: bool,
    /// Video standard; detected from the dump when unset
    pub standard: Option<VideoStandard>,
    /// Estimate the tempo when none is forced
    pub guess_tempo: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            always_retrigger: false,
            merge_decays: true,
            boost: 1.0,
            split_timbre: true,
            trim_silence: true,
            force_tempo: None,
            force_timebase: None,
            channel_volume: false,
            use_instruments: false,
            instruments: DEFAULT_INSTRUMENTS,
            timbre_change: TimbreChangePolicy::Merge,
            debug_noise: false,
            standard: None,
            guess_tempo: false,
        }
    }
}

impl ConvertOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.boost.is_finite() && self.boost > 0.0) {
            return Err(Error::Config(format!("boost must be positive, got {}", self.boost)));
        }
        if let Some(bpm) = self.force_tempo {
            if !(bpm.is_finite() && bpm > 0.0) {
                return Err(Error::Config(format!("tempo must be positive, got {}", bpm)));
            }
            let micros = (60e6 / bpm).trunc();
            if !(1.0..=MAX_TEMPO_MICROS).contains(&micros) {
                return Err(Error::Config(format!("tempo {} BPM cannot be stored in a MIDI file", bpm)));
            }
        }
        if self.force_timebase == Some(0) {
            return Err(Error::Config("timebase must be positive".to_string()));
        }
        if let Some(program) = self.instruments.iter().find(|&&p| p > 127) {
            return Err(Error::Config(format!("instrument {} out of range", program)));
        }
        Ok(())
    }

    pub fn timebase(&self) -> u32 {
        self.force_timebase.unwrap_or(DEFAULT_TIMEBASE)
    }

    /// Tempo written to the file; `guessed` is used when nothing is forced
    pub fn tempo(&self, guessed: Option<f64>) -> f64 {
        self.force_tempo.or(guessed).unwrap_or(DEFAULT_TEMPO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::default();
        assert!(options.merge_decays);
        assert!(options.split_timbre);
        assert!(options.trim_silence);
        assert!(!options.use_instruments);
        assert_eq!(options.instruments, DEFAULT_INSTRUMENTS);
        assert_eq!(options.timebase(), 480);
        assert_eq!(options.tempo(None), 60.0);
        assert_eq!(options.tempo(Some(128.0)), 128.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = ConvertOptions::from_json_str(
            r#"{ "channel_volume": true, "force_tempo": 150.0, "standard": "pal", "timbre_change": "retrigger" }"#,
        )
        .unwrap();
        assert!(options.channel_volume);
        assert!(options.merge_decays);
        assert_eq!(options.force_tempo, Some(150.0));
        assert_eq!(options.tempo(Some(90.0)), 150.0);
        assert_eq!(options.standard, Some(VideoStandard::Pal));
        assert_eq!(options.timbre_change, TimbreChangePolicy::Retrigger);
    }

    #[test]
    fn test_tempo_limits() {
        // 60e6 / 0xFFFFFF is just under 3.5763 BPM
        let slowest = ConvertOptions {
            force_tempo: Some(3.58),
            ..Default::default()
        };
        assert!(slowest.validate().is_ok());
        let too_slow = ConvertOptions {
            force_tempo: Some(3.5),
            ..Default::default()
        };
        assert!(matches!(too_slow.validate(), Err(Error::Config(_))));
        let fastest = ConvertOptions {
            force_tempo: Some(60e6),
            ..Default::default()
        };
        assert!(fastest.validate().is_ok());
    }

    #[test]
    fn test_huge_timebase_is_clamped() {
        let options = ConvertOptions {
            force_timebase: Some(u32::MAX),
            ..Default::default()
        };
        assert!(options.validate().is_ok());
        assert_eq!(crate::midi::writer::round_timebase(options.timebase()), 32_760);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ConvertOptions::from_json_str(r#"{ "boost": 0.0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConvertOptions::from_json_str(r#"{ "force_timebase": 0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConvertOptions::from_json_str(r#"{ "instruments": [0, 0, 0, 0, 0, 200, 0, 0] }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConvertOptions::from_json_str(r#"{ "force_tempo": 1.0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConvertOptions::from_json_str(r#"{ "force_tempo": 1e9 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConvertOptions::from_json_str("{ not json"),
            Err(Error::Json(_))
        ));
    }
}
