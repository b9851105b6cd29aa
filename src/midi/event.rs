//! MIDI events and per-track timelines

use super::vlq;
use std::collections::BTreeMap;

/// Channel message status bytes (channel in the low nibble)
pub mod status {
    pub const NOTE_ON: u8 = 0x90;
    pub const CONTROLLER: u8 = 0xB0;
    pub const PROGRAM: u8 = 0xC0;
    pub const META: u8 = 0xFF;
}

/// Meta event types
pub mod meta {
    pub const TRACK_NAME: u8 = 0x03;
    pub const INSTRUMENT_NAME: u8 = 0x04;
    pub const END_OF_TRACK: u8 = 0x2F;
    pub const TEMPO: u8 = 0x51;
}

/// Controller numbers
pub mod controller {
    pub const CHANNEL_VOLUME: u8 = 0x07;
}

/// A single track event, without its delta time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    /// Pre-encoded bytes, used for meta events
    Raw(Vec<u8>),
    /// Note on; a velocity of 0 is a note off
    NoteOn { channel: u8, key: u8, velocity: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
    Program { channel: u8, program: u8 },
}

impl MidiEvent {
    /// Meta event `FF type len data`
    pub fn meta(kind: u8, data: &[u8]) -> Self {
        let mut bytes = vec![status::META, kind];
        vlq::write(&mut bytes, data.len() as u32);
        bytes.extend_from_slice(data);
        MidiEvent::Raw(bytes)
    }

    pub fn track_name(name: &str) -> Self {
        Self::meta(meta::TRACK_NAME, name.as_bytes())
    }

    pub fn instrument_name(name: &str) -> Self {
        Self::meta(meta::INSTRUMENT_NAME, name.as_bytes())
    }

    /// Set Tempo, in microseconds per quarter note
    pub fn tempo(bpm: f64) -> Self {
        let micros = ((60e6 / bpm) as u32).min(0xFF_FFFF);
        Self::meta(meta::TEMPO, &micros.to_be_bytes()[1..])
    }

    pub fn end_of_track() -> Self {
        Self::meta(meta::END_OF_TRACK, &[])
    }

    pub fn channel(&self) -> Option<u8> {
        match self {
            MidiEvent::Raw(_) => None,
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::Controller { channel, .. }
            | MidiEvent::Program { channel, .. } => Some(*channel),
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self, MidiEvent::NoteOn { .. })
    }

    /// Append the event bytes (no delta time)
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            MidiEvent::Raw(bytes) => out.extend_from_slice(bytes),
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => out.extend_from_slice(&[status::NOTE_ON | channel, *key, *velocity]),
            MidiEvent::Controller {
                channel,
                controller,
                value,
            } => out.extend_from_slice(&[status::CONTROLLER | channel, *controller, *value]),
            MidiEvent::Program { channel, program } => {
                out.extend_from_slice(&[status::PROGRAM | channel, *program])
            }
        }
    }
}

/// Events of one track, grouped by tick.
///
/// Events sharing a tick keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct Track {
    events: BTreeMap<u64, Vec<MidiEvent>>,
    notes: usize,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tick: u64, event: MidiEvent) {
        if event.is_note() {
            self.notes += 1;
        }
        self.events.entry(tick).or_default().push(event);
    }

    /// All events in tick order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &MidiEvent)> {
        self.events
            .iter()
            .flat_map(|(&tick, events)| events.iter().map(move |e| (tick, e)))
    }

    /// Number of note on/off events
    pub fn note_count(&self) -> usize {
        self.notes
    }

    /// Encode the track body: delta-timed events and the end-of-track marker
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut last_tick = 0;
        for (tick, event) in self.iter() {
            vlq::write(out, (tick - last_tick) as u32);
            event.encode(out);
            last_tick = tick;
        }
        vlq::write(out, 0);
        MidiEvent::end_of_track().encode(out);
    }
}
