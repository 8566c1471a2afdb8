//! SoundFont 2 export of instrument banks.

pub mod envelope;
pub mod error;
pub mod riff;
pub mod soundfont;

pub use envelope::Envelope;
pub use error::{Result, Sf2Error};
pub use soundfont::SoundFont;
