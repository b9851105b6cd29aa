//! POKEY register dumps
//!
//! Text dumps produced by a patched asapscan: one line per video frame, a
//! timestamp in seconds followed by one 9-byte hex register block per chip,
//! blocks separated by `|`.

pub mod reader;
pub mod standard;

pub use reader::{open_dump, parse_line, read_dump, END_MARKER};
pub use standard::detect_standard;
