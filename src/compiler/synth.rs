//! Note event synthesis
//!
//! Walks the compiled frames and decides, per chip channel, when the
//! sounding MIDI note ends and a new one starts. POKEY has no key-on signal,
//! so a new note is inferred from a pitch change, a volume cut to zero, or
//! (with merged decays) volume rising again on a held pitch.

use super::options::{ConvertOptions, TimbreChangePolicy};
use crate::error::{Error, Result};
use crate::midi::event::{controller, MidiEvent};
use crate::pokey::{note, CHANNELS};
use crate::song::{CompiledSong, Voice};
use std::collections::BTreeMap;

/// Highest chip count that fits in 16 MIDI channels
pub const MAX_CHIPS: usize = 16 / CHANNELS;

/// A MIDI event placed on a track at a time in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub time: f64,
    /// 1-based output track
    pub track: usize,
    pub event: MidiEvent,
}

/// Note currently held on a chip channel
#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    key: u8,
    /// Last register volume seen while the note was held
    volume: u8,
    track: usize,
    poly: u8,
}

/// Scale a 4-bit register volume to 0..=127
pub fn scale_volume(volume: u8, boost: f64) -> u8 {
    (volume as f64 / 15.0 * 127.0 * boost).clamp(0.0, 127.0) as u8
}

pub struct NoteSynthesizer<'a> {
    options: &'a ConvertOptions,
    frame_period: f64,
}

impl<'a> NoteSynthesizer<'a> {
    /// `frame_period` is the gap left before the final note-offs
    pub fn new(options: &'a ConvertOptions, frame_period: f64) -> Self {
        Self {
            options,
            frame_period,
        }
    }

    /// Events of the whole song in time order
    pub fn synthesize(&self, song: &CompiledSong) -> Result<Vec<TimedEvent>> {
        if song.num_chips > MAX_CHIPS {
            return Err(Error::TooManyChips(song.num_chips));
        }

        let opts = self.options;
        let tracks: BTreeMap<Voice, usize> = song
            .voices
            .iter()
            .filter_map(|v| song.voice_track(v).map(|t| (*v, t)))
            .collect();

        let mut active: Vec<[Option<ActiveNote>; CHANNELS]> = vec![[None; CHANNELS]; song.num_chips];
        let mut events = Vec::new();

        for frame in &song.frames {
            let t = frame.timestamp;
            for (pn, channels) in frame.chips.iter().enumerate() {
                for (ch, cf) in channels.iter().enumerate() {
                    let voice = Voice::new(pn, ch, cf.poly, opts.split_timbre);
                    let Some(&track) = tracks.get(&voice) else {
                        continue;
                    };
                    let midi_channel = (pn * CHANNELS + ch) as u8;

                    let key = cf.key.and_then(|k| {
                        let midi_key = note::midi_key(k);
                        if midi_key.is_none() {
                            log::debug!(
                                "POKEY {}, channel {}: {} is outside the MIDI key range",
                                pn,
                                ch + 1,
                                note::key_name(k)
                            );
                        }
                        midi_key
                    });

                    let volume = cf.volume;
                    let scaled = scale_volume(volume, opts.boost);
                    let velocity = if opts.channel_volume { 127 } else { scaled };

                    let slot = &mut active[pn][ch];

                    if let Some(note) = slot.as_mut() {
                        let kill = opts.always_retrigger
                            || note_ends(opts, note, key, volume, cf.poly);
                        if kill {
                            events.push(TimedEvent {
                                time: t,
                                track: note.track,
                                event: note_off(midi_channel, note.key),
                            });
                            *slot = None;
                        } else {
                            if opts.channel_volume && note.volume != volume {
                                events.push(TimedEvent {
                                    time: t,
                                    track: note.track,
                                    event: channel_volume(midi_channel, scaled),
                                });
                            }
                            note.volume = volume;
                        }
                    }

                    if slot.is_none() && volume > 0 {
                        if let Some(key) = key {
                            if opts.channel_volume {
                                events.push(TimedEvent {
                                    time: t,
                                    track,
                                    event: channel_volume(midi_channel, scaled),
                                });
                            }
                            if opts.use_instruments {
                                events.push(TimedEvent {
                                    time: t,
                                    track,
                                    event: MidiEvent::Program {
                                        channel: midi_channel,
                                        program: opts.instruments[cf.poly as usize & 0x07],
                                    },
                                });
                            }
                            // A zero velocity would read as a note-off
                            events.push(TimedEvent {
                                time: t,
                                track,
                                event: MidiEvent::NoteOn {
                                    channel: midi_channel,
                                    key,
                                    velocity: velocity.max(1),
                                },
                            });
                            *slot = Some(ActiveNote {
                                key,
                                volume,
                                track,
                                poly: cf.poly,
                            });
                        }
                    }
                }
            }
        }

        if let Some(last) = song.last_timestamp() {
            let end = last + self.frame_period;
            for (pn, channels) in active.iter().enumerate() {
                for (ch, note) in channels.iter().enumerate() {
                    if let Some(note) = note {
                        events.push(TimedEvent {
                            time: end,
                            track: note.track,
                            event: note_off((pn * CHANNELS + ch) as u8, note.key),
                        });
                    }
                }
            }
        }

        Ok(events)
    }
}

/// Whether a held note ends in this frame (retrigger mode aside)
fn note_ends(opts: &ConvertOptions, note: &ActiveNote, key: Option<u8>, volume: u8, poly: u8) -> bool {
    if key != Some(note.key) || volume == 0 {
        return true;
    }
    if opts.merge_decays && !opts.channel_volume && volume > note.volume {
        return true;
    }
    opts.timbre_change == TimbreChangePolicy::Retrigger && poly != note.poly
}

fn note_off(channel: u8, key: u8) -> MidiEvent {
    MidiEvent::NoteOn {
        channel,
        key,
        velocity: 0,
    }
}

fn channel_volume(channel: u8, value: u8) -> MidiEvent {
    MidiEvent::Controller {
        channel,
        controller: controller::CHANNEL_VOLUME,
        value,
    }
}
