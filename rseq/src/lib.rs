//! Sequence (`RSEQ`) bytecode decoding and conversion to Standard MIDI Files.

pub mod convert;
pub mod error;
pub mod mml;

pub use convert::{Conversion, Converter, NoteMode, TrackError, MAX_CALL_DEPTH, MAX_STEPS};
pub use error::{Result, RseqError};
pub use mml::{ArgKind, ArgRegister, MmlCmd};
