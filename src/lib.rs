pub mod compiler;
pub mod dump;
pub mod error;
pub mod midi;
pub mod pokey;
pub mod song;

pub use compiler::{Compiler, ConvertOptions};
pub use error::Error;
