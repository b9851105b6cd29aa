//! Piano key resolution
//!
//! Keys are numbered like piano keys: key 0 is A0 at 27.5 Hz, which is MIDI
//! note 21.

use serde::Serialize;
use std::ops::RangeInclusive;

/// Frequency of key 0 (A0)
pub const BASE_FREQUENCY: f64 = 27.5;

/// Keys accepted from an audible channel
pub const KEY_RANGE: RangeInclusive<i32> = -21..=234;

/// MIDI note number of key 0
pub const MIDI_KEY_OFFSET: i32 = 21;

const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// A resolved channel pitch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pitch {
    /// Piano key number
    pub key: i32,
    /// Channel frequency the key was resolved from (Hz)
    pub frequency: f64,
}

impl Pitch {
    /// Note name with octave, e.g. "A4" or "C#2"
    pub fn name(&self) -> String {
        key_name(self.key)
    }

    /// MIDI note number, if representable
    pub fn midi_key(&self) -> Option<u8> {
        midi_key(self.key)
    }
}

/// Frequency of an equal-tempered key
pub fn key_frequency(key: i32) -> f64 {
    BASE_FREQUENCY * 2.0_f64.powf(key as f64 / 12.0)
}

/// Nearest key to `frequency` (must be > 0).
///
/// Both neighbours of the fractional key are tried and the one whose
/// frequency is closer wins; ties go to the lower key.
pub fn nearest_key(frequency: f64) -> i32 {
    let n = 12.0 * (frequency / BASE_FREQUENCY).log2();
    let low = n.floor() as i32;
    let high = n.ceil() as i32;
    if (frequency - key_frequency(low)).abs() <= (frequency - key_frequency(high)).abs() {
        low
    } else {
        high
    }
}

/// MIDI note number of a piano key, if it is within 0..=127
pub fn midi_key(key: i32) -> Option<u8> {
    u8::try_from(key + MIDI_KEY_OFFSET)
        .ok()
        .filter(|&k| k <= 127)
}

pub fn key_name(key: i32) -> String {
    let name = NOTE_NAMES[key.rem_euclid(12) as usize];
    format!("{}{}", name, (key + 9).div_euclid(12))
}
