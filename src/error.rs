use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Expected {expected} POKEY register blocks, found {found}")]
    ChipCountMismatch { expected: usize, found: usize },

    #[error("Timestamp {timestamp} is not after the previous state at {previous}")]
    NonMonotonicTimestamp { timestamp: f64, previous: f64 },

    #[error("{0} POKEY chips cannot be mapped onto 16 MIDI channels")]
    TooManyChips(usize),

    #[error("MIDI track {track} out of range ({count} tracks)")]
    InvalidTrack { track: usize, count: usize },

    #[error("MIDI channel {0} out of range")]
    InvalidChannel(u8),

    #[error("MIDI key {0} out of range")]
    InvalidKey(u8),

    #[error("Negative MIDI tick: {0}")]
    NegativeTick(i64),

    #[error("MIDI tick {0} exceeds the variable-length quantity range")]
    TickOverflow(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
