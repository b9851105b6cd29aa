pub mod event;
pub mod vlq;
pub mod writer;

pub use event::{MidiEvent, Track};
pub use writer::MidiWriter;
