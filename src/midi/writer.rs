//! Standard MIDI file writer
//!
//! Collects events on tracks with times given in seconds and writes a
//! format 1 file. Track 0 is the conductor track and receives the tempo and
//! sequence name when the file is written.

use super::event::{MidiEvent, Track};
use super::vlq;
use crate::error::{Error, Result};
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::Path;

/// Default ticks per quarter note
pub const DEFAULT_TIMEBASE: u32 = 480;

/// Default tempo; at 60 BPM one quarter note lasts one second
pub const DEFAULT_TEMPO: f64 = 60.0;

/// Header chunk
const MTHD: &[u8; 4] = b"MThd";
/// Track chunk
const MTRK: &[u8; 4] = b"MTrk";
/// Multiple tracks, single sequence
const FORMAT_1: u16 = 1;

/// Lock a timebase to the nearest multiple of 24
pub fn round_timebase(timebase: u32) -> u16 {
    let rounded = (timebase as f64 / 24.0).round() * 24.0;
    rounded.clamp(24.0, 32_760.0) as u16
}

/// MIDI file under construction
#[derive(Debug, Clone)]
pub struct MidiWriter {
    timebase: u16,
    tempo: f64,
    tracks: Vec<Track>,
    /// Subtracted from the time of every sound event
    time_offset: f64,
    /// Scales times, to line ticks up with a known tempo
    scale_factor: f64,
    sequence_name: Option<String>,
}

impl MidiWriter {
    /// New writer holding only the conductor track
    pub fn new(timebase: u32, tempo: f64) -> Self {
        Self {
            timebase: round_timebase(timebase),
            tempo,
            tracks: vec![Track::new()],
            time_offset: 0.0,
            scale_factor: 1.0,
            sequence_name: None,
        }
    }

    pub fn timebase(&self) -> u16 {
        self.timebase
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn set_time_offset(&mut self, seconds: f64) {
        self.time_offset = seconds;
    }

    pub fn set_scale_factor(&mut self, factor: f64) {
        self.scale_factor = factor;
    }

    /// Name written on the conductor track
    pub fn set_sequence_name(&mut self, name: &str) {
        self.sequence_name = Some(name.to_string());
    }

    /// Append a track and return its index
    pub fn new_track(&mut self) -> usize {
        self.tracks.push(Track::new());
        self.tracks.len() - 1
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, track: usize) -> Option<&Track> {
        self.tracks.get(track)
    }

    pub fn time_to_ticks(&self, seconds: f64) -> i64 {
        (seconds * self.timebase as f64 * self.scale_factor).round() as i64
    }

    /// Add an event at an absolute time in seconds
    pub fn add_event(&mut self, track: usize, seconds: f64, event: MidiEvent) -> Result<()> {
        let count = self.tracks.len();
        if track >= count {
            return Err(Error::InvalidTrack { track, count });
        }
        if let Some(channel) = event.channel() {
            if channel > 15 {
                return Err(Error::InvalidChannel(channel));
            }
        }

        let ticks = self.time_to_ticks(seconds);
        if ticks < 0 {
            return Err(Error::NegativeTick(ticks));
        }
        let ticks = ticks as u64;
        if ticks > vlq::MAX as u64 {
            return Err(Error::TickOverflow(ticks));
        }

        self.tracks[track].insert(ticks, event);
        Ok(())
    }

    /// Sound events are shifted by the time offset; anything that would land
    /// before it is pinned to the start.
    fn add_sound_event(&mut self, track: usize, seconds: f64, event: MidiEvent) -> Result<()> {
        let seconds = (seconds - self.time_offset).max(0.0);
        self.add_event(track, seconds, event)
    }

    pub fn set_track_name(&mut self, track: usize, name: &str) -> Result<()> {
        self.add_event(track, 0.0, MidiEvent::track_name(name))
    }

    pub fn set_instrument_name(&mut self, track: usize, name: &str) -> Result<()> {
        self.add_event(track, 0.0, MidiEvent::instrument_name(name))
    }

    pub fn note_on(&mut self, track: usize, seconds: f64, channel: u8, key: u8, velocity: u8) -> Result<()> {
        if key > 127 {
            return Err(Error::InvalidKey(key));
        }
        let event = MidiEvent::NoteOn {
            channel,
            key,
            velocity: velocity.min(127),
        };
        self.add_sound_event(track, seconds, event)
    }

    /// Note off, written as a note on with zero velocity
    pub fn note_off(&mut self, track: usize, seconds: f64, channel: u8, key: u8) -> Result<()> {
        self.note_on(track, seconds, channel, key, 0)
    }

    pub fn control_change(&mut self, track: usize, seconds: f64, channel: u8, controller: u8, value: u8) -> Result<()> {
        let event = MidiEvent::Controller {
            channel,
            controller: controller.min(127),
            value: value.min(127),
        };
        self.add_sound_event(track, seconds, event)
    }

    pub fn program_change(&mut self, track: usize, seconds: f64, channel: u8, program: u8) -> Result<()> {
        let event = MidiEvent::Program {
            channel,
            program: program.min(127),
        };
        self.add_sound_event(track, seconds, event)
    }

    /// Conductor track as written: tempo, name, then anything added to track 0
    fn conductor(&self) -> Track {
        let mut conductor = Track::new();
        conductor.insert(0, MidiEvent::tempo(self.tempo));
        if let Some(name) = &self.sequence_name {
            conductor.insert(0, MidiEvent::track_name(name));
        }
        for (tick, event) in self.tracks[0].iter() {
            conductor.insert(tick, event.clone());
        }
        conductor
    }

    /// Tracks to write: the conductor track, then every track with notes
    fn output_tracks(&self) -> Vec<Track> {
        std::iter::once(self.conductor())
            .chain(
                self.tracks
                    .iter()
                    .skip(1)
                    .filter(|t| t.note_count() > 0)
                    .cloned(),
            )
            .collect()
    }

    /// Write the complete file.
    ///
    /// Each track length is patched in after its body has been written.
    pub fn write_to<W: Write + Seek>(&self, out: &mut W) -> Result<()> {
        let tracks = self.output_tracks();

        out.write_all(MTHD)?;
        out.write_all(&6u32.to_be_bytes())?;
        out.write_all(&FORMAT_1.to_be_bytes())?;
        out.write_all(&(tracks.len() as u16).to_be_bytes())?;
        out.write_all(&self.timebase.to_be_bytes())?;

        let mut body = Vec::new();
        for track in &tracks {
            out.write_all(MTRK)?;
            out.write_all(&0u32.to_be_bytes())?;
            let start = out.stream_position()?;

            body.clear();
            track.encode(&mut body);
            out.write_all(&body)?;

            let end = out.stream_position()?;
            out.seek(SeekFrom::Start(start - 4))?;
            out.write_all(&((end - start) as u32).to_be_bytes())?;
            out.seek(SeekFrom::Start(end))?;
        }

        out.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Write to a file in one go, so a failure leaves no partial file
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl Default for MidiWriter {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEBASE, DEFAULT_TEMPO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timebase_rounds_to_multiple_of_24() {
        assert_eq!(round_timebase(480), 480);
        assert_eq!(round_timebase(500), 504);
        assert_eq!(round_timebase(100), 96);
        assert_eq!(round_timebase(1000), 1008);
        assert_eq!(round_timebase(5), 24);
        assert_eq!(round_timebase(40_000), 32_760);
        assert_eq!(round_timebase(u32::MAX), 32_760);
    }

    #[test]
    fn test_time_to_ticks() {
        let mut midi = MidiWriter::default();
        assert_eq!(midi.time_to_ticks(1.0), 480);
        assert_eq!(midi.time_to_ticks(0.02), 10);
        midi.set_scale_factor(2.0);
        assert_eq!(midi.time_to_ticks(1.0), 960);
    }

    #[test]
    fn test_contract_violations() {
        let mut midi = MidiWriter::default();
        let track = midi.new_track();
        assert!(matches!(
            midi.note_on(5, 0.0, 0, 60, 100),
            Err(Error::InvalidTrack { track: 5, count: 2 })
        ));
        assert!(matches!(
            midi.note_on(track, 0.0, 16, 60, 100),
            Err(Error::InvalidChannel(16))
        ));
        assert!(matches!(
            midi.add_event(track, -1.0, MidiEvent::track_name("x")),
            Err(Error::NegativeTick(-480))
        ));
        assert!(matches!(midi.note_on(track, 0.0, 0, 128, 1), Err(Error::InvalidKey(128))));
    }

    #[test]
    fn test_time_offset_applies_to_sound_events_only() {
        let mut midi = MidiWriter::default();
        let track = midi.new_track();
        midi.set_time_offset(2.0);
        midi.set_track_name(track, "T").unwrap();
        midi.note_on(track, 1.0, 0, 60, 100).unwrap();
        midi.note_on(track, 3.0, 0, 60, 0).unwrap();

        let ticks: Vec<u64> = midi.track(track).unwrap().iter().map(|(t, _)| t).collect();
        assert_eq!(ticks, vec![0, 0, 480]);
    }

    #[test]
    fn test_velocity_clamped() {
        let mut midi = MidiWriter::default();
        let track = midi.new_track();
        midi.note_on(track, 0.0, 0, 60, 200).unwrap();
        let (_, event) = midi.track(track).unwrap().iter().next().unwrap();
        assert_eq!(
            event,
            &MidiEvent::NoteOn {
                channel: 0,
                key: 60,
                velocity: 127
            }
        );
    }

    #[test]
    fn test_file_layout() {
        let mut midi = MidiWriter::new(96, 120.0);
        midi.set_sequence_name("S");
        let empty = midi.new_track();
        midi.set_track_name(empty, "unused").unwrap();
        let track = midi.new_track();
        midi.note_on(track, 0.0, 2, 69, 100).unwrap();
        midi.note_off(track, 1.0, 2, 69).unwrap();

        let bytes = midi.to_bytes().unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(b"MThd");
        expected.extend_from_slice(&[0, 0, 0, 6, 0, 1, 0, 2, 0, 96]);
        // Conductor: tempo 500000 us, name, end of track
        expected.extend_from_slice(b"MTrk");
        expected.extend_from_slice(&[0, 0, 0, 16]);
        expected.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        expected.extend_from_slice(&[0x00, 0xFF, 0x03, 0x01, b'S']);
        expected.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        // Note track; the unnamed-only track is dropped
        expected.extend_from_slice(b"MTrk");
        expected.extend_from_slice(&[0, 0, 0, 12]);
        expected.extend_from_slice(&[0x00, 0x92, 69, 100]);
        expected.extend_from_slice(&[0x60, 0x92, 69, 0]);
        expected.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");
        MidiWriter::default().save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"MThd");
        assert_eq!(u16::from_be_bytes([bytes[10], bytes[11]]), 1);
    }
}
