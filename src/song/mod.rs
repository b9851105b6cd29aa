//! Song: the ordered chip states of a dump, compiled into music frames

use crate::error::{Error, Result};
use crate::pokey::{AudctlFeature, ChipState, PitchDiagnostic, RegisterBlock, VideoStandard, CHANNELS};
use serde::Serialize;
use std::collections::BTreeSet;

/// Raw register state of every chip at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Time in seconds
    pub timestamp: f64,
    /// One register block per chip, in chip order
    pub blocks: Vec<RegisterBlock>,
}

impl Snapshot {
    pub fn new(timestamp: f64, blocks: Vec<RegisterBlock>) -> Self {
        Self { timestamp, blocks }
    }
}

/// Output track identity
///
/// Ordering is chip, then channel, then timbre, which fixes track order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Voice {
    pub chip: usize,
    pub channel: usize,
    /// Distortion selector, only when splitting voices by timbre
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poly: Option<u8>,
}

impl Voice {
    pub fn new(chip: usize, channel: usize, poly: u8, split_timbre: bool) -> Self {
        Self {
            chip,
            channel,
            poly: split_timbre.then_some(poly),
        }
    }
}

/// Musical content of one channel in one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelFrame {
    /// Piano key, if the channel is pitched
    pub key: Option<i32>,
    pub poly: u8,
    pub volume: u8,
}

/// All channels of all chips at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MusicFrame {
    pub timestamp: f64,
    pub chips: Vec<[ChannelFrame; CHANNELS]>,
}

/// Settings of the channel model used while compiling
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub standard: VideoStandard,
    pub split_timbre: bool,
    pub debug_noise: bool,
}

/// Result of replaying a song through the channel model
#[derive(Debug, Clone, Serialize)]
pub struct CompiledSong {
    pub num_chips: usize,
    pub frames: Vec<MusicFrame>,
    /// Distinct voices, sorted
    pub voices: Vec<Voice>,
    /// AUDCTL features seen anywhere in the song
    pub features: BTreeSet<AudctlFeature>,
    /// First time any channel is pitched and audible
    pub earliest_sound: Option<f64>,
    pub diagnostics: Vec<PitchDiagnostic>,
}

impl CompiledSong {
    /// 1-based MIDI track of a voice; track 0 is the conductor track
    pub fn voice_track(&self, voice: &Voice) -> Option<usize> {
        self.voices.binary_search(voice).ok().map(|i| i + 1)
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.frames.last().map(|f| f.timestamp)
    }
}

/// Distinct chip states in time order
#[derive(Debug, Default)]
pub struct Song {
    states: Vec<Snapshot>,
    /// Last blocks seen, recorded or not
    last_blocks: Vec<RegisterBlock>,
    last_timestamp: Option<f64>,
}

impl Song {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_chips(&self) -> usize {
        self.last_blocks.len()
    }

    pub fn states(&self) -> &[Snapshot] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Record a state if it differs from the previous one.
    ///
    /// Registers start out cleared, so an all-zero first state is redundant.
    /// Returns whether the state was recorded.
    pub fn add_state(&mut self, timestamp: f64, blocks: Vec<RegisterBlock>) -> Result<bool> {
        if self.last_timestamp.is_none() {
            self.last_blocks = vec![[0; 9]; blocks.len()];
        } else if blocks.len() != self.last_blocks.len() {
            return Err(Error::ChipCountMismatch {
                expected: self.last_blocks.len(),
                found: blocks.len(),
            });
        }

        if let Some(previous) = self.last_timestamp {
            if timestamp <= previous {
                return Err(Error::NonMonotonicTimestamp {
                    timestamp,
                    previous,
                });
            }
        }
        self.last_timestamp = Some(timestamp);

        if blocks == self.last_blocks {
            return Ok(false);
        }
        self.last_blocks.clone_from(&blocks);
        self.states.push(Snapshot::new(timestamp, blocks));
        Ok(true)
    }

    /// Replay every state through the channel model
    pub fn compile(&self, options: &CompileOptions) -> CompiledSong {
        let num_chips = self.num_chips();
        let mut chips: Vec<ChipState> = (0..num_chips)
            .map(|n| ChipState::new(n, options.standard).with_debug_noise(options.debug_noise))
            .collect();

        let mut frames = Vec::with_capacity(self.states.len());
        let mut voices = BTreeSet::new();
        let mut features = BTreeSet::new();
        let mut earliest_sound: Option<f64> = None;
        let mut diagnostics = Vec::new();

        let total = self.states.len();
        let mut last_percent = None;

        for (n, snapshot) in self.states.iter().enumerate() {
            let t = snapshot.timestamp;
            let mut frame = MusicFrame {
                timestamp: t,
                chips: Vec::with_capacity(num_chips),
            };

            for (pn, block) in snapshot.blocks.iter().enumerate() {
                let chip = chips[pn].apply(block);
                features.extend(chip.audctl().features());

                let channels: [ChannelFrame; CHANNELS] = std::array::from_fn(|ch| {
                    let regs = chip.channel(ch);
                    let key = match chip.pitch(ch) {
                        Ok(pitch) => pitch.map(|p| p.key),
                        Err(diag) => {
                            log::warn!("{}", diag);
                            diagnostics.push(diag);
                            None
                        }
                    };
                    ChannelFrame {
                        key,
                        poly: regs.poly,
                        volume: regs.volume,
                    }
                });

                for (ch, cf) in channels.iter().enumerate() {
                    voices.insert(Voice::new(pn, ch, cf.poly, options.split_timbre));
                    let sounding = !chip.channel(ch).volume_only && cf.key.is_some() && cf.volume > 0;
                    if sounding && earliest_sound.map_or(true, |e| t < e) {
                        earliest_sound = Some(t);
                    }
                }

                frame.chips.push(channels);
                chips[pn] = chip;
            }

            frames.push(frame);

            let percent = (n + 1) * 100 / total;
            if percent % 10 == 0 && last_percent != Some(percent) {
                log::debug!("Compiling song... {}%", percent);
                last_percent = Some(percent);
            }
        }

        if features.is_empty() {
            log::info!("AUDCTL features used: None");
        } else {
            let names: Vec<&str> = features.iter().map(|f: &AudctlFeature| f.name()).collect();
            log::info!("AUDCTL features used: {}", names.join(", "));
        }

        CompiledSong {
            num_chips,
            frames,
            voices: voices.into_iter().collect(),
            features,
            earliest_sound,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A4_TONE: RegisterBlock = [0x48, 0xAF, 0, 0, 0, 0, 0, 0, 0];

    fn tone(divider: u8, volume: u8) -> RegisterBlock {
        [divider, 0xA0 | volume, 0, 0, 0, 0, 0, 0, 0]
    }

    #[test]
    fn test_identical_states_are_collapsed() {
        let mut song = Song::new();
        assert!(song.add_state(0.0, vec![A4_TONE]).unwrap());
        assert!(!song.add_state(0.02, vec![A4_TONE]).unwrap());
        assert!(!song.add_state(0.04, vec![A4_TONE]).unwrap());
        assert!(song.add_state(0.06, vec![tone(0x48, 8)]).unwrap());
        assert!(!song.add_state(0.08, vec![tone(0x48, 8)]).unwrap());
        assert!(song.add_state(0.10, vec![A4_TONE]).unwrap());

        let compiled = song.compile(&CompileOptions::default());
        assert_eq!(compiled.frames.len(), 3);
        let times: Vec<f64> = compiled.frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(times, vec![0.0, 0.06, 0.10]);
    }

    #[test]
    fn test_leading_silence_is_not_recorded() {
        let mut song = Song::new();
        assert!(!song.add_state(0.0, vec![[0; 9], [0; 9]]).unwrap());
        assert!(song.add_state(0.02, vec![A4_TONE, [0; 9]]).unwrap());
        assert_eq!(song.len(), 1);
        assert_eq!(song.num_chips(), 2);
    }

    #[test]
    fn test_chip_count_must_not_change() {
        let mut song = Song::new();
        song.add_state(0.0, vec![A4_TONE]).unwrap();
        let err = song.add_state(0.02, vec![A4_TONE, A4_TONE]).unwrap_err();
        assert!(matches!(err, Error::ChipCountMismatch { expected: 1, found: 2 }));
    }

    #[test]
    fn test_timestamps_must_increase() {
        let mut song = Song::new();
        song.add_state(1.0, vec![A4_TONE]).unwrap();
        let err = song.add_state(1.0, vec![tone(0x10, 3)]).unwrap_err();
        assert!(matches!(err, Error::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn test_earliest_sound() {
        let mut song = Song::new();
        // Audible noise is not a sound, nor is a silent tone
        song.add_state(0.5, vec![[0x48, 0x0F, 0, 0, 0, 0, 0, 0, 0]]).unwrap();
        song.add_state(1.0, vec![tone(0x48, 0)]).unwrap();
        song.add_state(1.5, vec![tone(0x48, 4)]).unwrap();
        song.add_state(2.0, vec![tone(0x40, 4)]).unwrap();
        let compiled = song.compile(&CompileOptions::default());
        assert_eq!(compiled.earliest_sound, Some(1.5));
    }

    #[test]
    fn test_no_sound_at_all() {
        let mut song = Song::new();
        song.add_state(0.5, vec![[0x48, 0x1F, 0, 0, 0, 0, 0, 0, 0]]).unwrap();
        let compiled = song.compile(&CompileOptions::default());
        assert_eq!(compiled.earliest_sound, None);
        assert_eq!(compiled.frames[0].chips[0][0].key, None);
    }

    #[test]
    fn test_voices_split_by_timbre() {
        let mut song = Song::new();
        song.add_state(0.0, vec![A4_TONE]).unwrap();
        song.add_state(0.1, vec![[0x48, 0xCF, 0, 0, 0, 0, 0, 0, 0]]).unwrap();

        let split = song.compile(&CompileOptions {
            split_timbre: true,
            ..Default::default()
        });
        // Channels 2-4 sit at selector 0 throughout
        assert_eq!(
            split.voices,
            vec![
                Voice { chip: 0, channel: 0, poly: Some(5) },
                Voice { chip: 0, channel: 0, poly: Some(6) },
                Voice { chip: 0, channel: 1, poly: Some(0) },
                Voice { chip: 0, channel: 2, poly: Some(0) },
                Voice { chip: 0, channel: 3, poly: Some(0) },
            ]
        );
        assert_eq!(split.voice_track(&Voice::new(0, 0, 6, true)), Some(2));

        let merged = song.compile(&CompileOptions::default());
        assert_eq!(merged.voices.len(), 4);
        assert_eq!(merged.voice_track(&Voice::new(0, 3, 5, false)), Some(4));
    }

    #[test]
    fn test_features_and_diagnostics_collected() {
        let mut song = Song::new();
        song.add_state(0.0, vec![A4_TONE]).unwrap();
        song.add_state(0.1, vec![[0xFF, 0xC0, 0xFF, 0xCF, 0, 0, 0, 0, 0x11]]).unwrap();
        let compiled = song.compile(&CompileOptions::default());
        assert_eq!(
            compiled.features.iter().copied().collect::<Vec<_>>(),
            vec![AudctlFeature::Clock15Khz, AudctlFeature::Join2And1]
        );
        assert_eq!(compiled.diagnostics.len(), 1);
        assert_eq!(compiled.frames[1].chips[0][1].key, None);
    }
}
