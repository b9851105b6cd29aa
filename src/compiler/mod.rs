//! POKEY dump compiler - turns recorded chip states into a MIDI sequence
//!
//! Pipeline: snapshots -> [`Song`] (distinct states) -> [`CompiledSong`]
//! (music frames and voices) -> [`NoteSynthesizer`] (timed note events) ->
//! [`MidiWriter`].

pub mod options;
pub mod synth;
pub mod tempo;

pub use options::{ConvertOptions, TimbreChangePolicy};
pub use synth::{NoteSynthesizer, TimedEvent};

use crate::dump;
use crate::error::{Error, Result};
use crate::midi::{MidiEvent, MidiWriter};
use crate::pokey::VideoStandard;
use crate::song::{CompileOptions, CompiledSong, Snapshot, Song};
use serde::Serialize;
use std::path::Path;

/// Name written on the conductor track
pub fn watermark() -> String {
    format!("Converted with pokey2midi v{}", env!("CARGO_PKG_VERSION"))
}

/// Summary of a conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub num_chips: usize,
    pub standard: VideoStandard,
    /// Frames read from the dump
    pub frames_read: usize,
    /// Distinct states kept
    pub states: usize,
    /// Tracks written, conductor included
    pub tracks: usize,
    /// Note-on events written
    pub notes: usize,
    pub earliest_sound: Option<f64>,
    pub diagnostics: usize,
    pub tempo: f64,
    pub timebase: u16,
}

/// Everything produced by a conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    pub song: CompiledSong,
    pub midi: MidiWriter,
    pub report: ConversionReport,
}

/// Main converter
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: ConvertOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert a dump file and write the MIDI file
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<Conversion> {
        log::info!("Opening \"{}\"", input.display());
        let snapshots = dump::open_dump(input)?;
        let conversion = self.convert(&snapshots)?;
        log::info!("Saving MIDI file at \"{}\"", output.display());
        conversion.midi.save(output)?;
        Ok(conversion)
    }

    /// Convert snapshots in memory
    pub fn convert(&self, snapshots: &[Snapshot]) -> Result<Conversion> {
        self.options.validate()?;

        let standard = self
            .options
            .standard
            .unwrap_or_else(|| dump::detect_standard(snapshots));
        log::info!("Video standard: {}", standard);

        let song = self.build_song(snapshots)?;
        log::info!("{} POKEY chip(s), {} distinct states", song.num_chips(), song.len());

        let compiled = song.compile(&CompileOptions {
            standard,
            split_timbre: self.options.split_timbre,
            debug_noise: self.options.debug_noise,
        });
        if !compiled.diagnostics.is_empty() {
            log::warn!("{} unresolved pitch(es)", compiled.diagnostics.len());
        }

        let events = NoteSynthesizer::new(&self.options, standard.frame_period()).synthesize(&compiled)?;

        let guessed = if self.options.guess_tempo && self.options.force_tempo.is_none() {
            let guess = tempo::estimate_tempo(&low_note_onsets(&events));
            match guess {
                Some(bpm) => log::info!("Estimated tempo: {:.2} BPM", bpm),
                None => log::info!("Not enough low notes to estimate a tempo"),
            }
            guess
        } else {
            None
        };

        let midi = self.render(&compiled, &events, guessed)?;
        let tracks = 1 + (1..midi.track_count())
            .filter_map(|t| midi.track(t))
            .filter(|t| t.note_count() > 0)
            .count();
        let notes = events
            .iter()
            .filter(|e| matches!(e.event, MidiEvent::NoteOn { velocity, .. } if velocity > 0))
            .count();
        log::info!("Assembled {} notes on {} tracks", notes, tracks);

        let report = ConversionReport {
            num_chips: compiled.num_chips,
            standard,
            frames_read: snapshots.len(),
            states: compiled.frames.len(),
            tracks,
            notes,
            earliest_sound: compiled.earliest_sound,
            diagnostics: compiled.diagnostics.len(),
            tempo: midi.tempo(),
            timebase: midi.timebase(),
        };

        Ok(Conversion {
            song: compiled,
            midi,
            report,
        })
    }

    /// Collect distinct states, dropping repeated frames
    pub fn build_song(&self, snapshots: &[Snapshot]) -> Result<Song> {
        if snapshots.is_empty() {
            return Err(Error::UnsupportedInput("no POKEY data found".to_string()));
        }
        let mut song = Song::new();
        for snapshot in snapshots {
            song.add_state(snapshot.timestamp, snapshot.blocks.clone())?;
        }
        Ok(song)
    }

    /// Lay the synthesized events out as a MIDI file
    pub fn render(&self, song: &CompiledSong, events: &[TimedEvent], guessed_tempo: Option<f64>) -> Result<MidiWriter> {
        let opts = &self.options;
        let mut midi = MidiWriter::new(opts.timebase(), opts.tempo(guessed_tempo));
        midi.set_sequence_name(&watermark());

        if opts.trim_silence {
            if let Some(earliest) = song.earliest_sound {
                midi.set_time_offset(earliest);
            }
        }

        // Times stay in seconds at 60 BPM; any other tempo rescales them onto its beats
        midi.set_scale_factor(midi.tempo() / 60.0);

        for voice in &song.voices {
            let track = midi.new_track();
            midi.set_track_name(track, &format!("POKEY {}, Channel {}", voice.chip, voice.channel + 1))?;
            if let Some(poly) = voice.poly {
                midi.set_instrument_name(track, &format!("Poly {}", poly))?;
            }
        }

        for e in events {
            match e.event {
                MidiEvent::NoteOn {
                    channel,
                    key,
                    velocity,
                } => midi.note_on(e.track, e.time, channel, key, velocity)?,
                MidiEvent::Controller {
                    channel,
                    controller,
                    value,
                } => midi.control_change(e.track, e.time, channel, controller, value)?,
                MidiEvent::Program { channel, program } => midi.program_change(e.track, e.time, channel, program)?,
                MidiEvent::Raw(_) => midi.add_event(e.track, e.time, e.event.clone())?,
            }
        }

        Ok(midi)
    }
}

/// Onset times of low notes, for tempo estimation
fn low_note_onsets(events: &[TimedEvent]) -> Vec<f64> {
    let mut onsets: Vec<f64> = events
        .iter()
        .filter(|e| {
            matches!(e.event, MidiEvent::NoteOn { key, velocity, .. }
                if velocity > 0 && key < tempo::LOW_NOTE_LIMIT)
        })
        .map(|e| e.time)
        .collect();
    onsets.dedup();
    onsets
}
