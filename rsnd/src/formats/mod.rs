//! Readers for the individual container formats.

pub mod archive;
pub mod bank;
pub mod sequence;
pub mod stream;
pub mod wave;
pub mod wave_archive;
pub mod wsd;

pub use archive::{SoundArchive, SoundKind};
pub use bank::SoundBank;
pub use sequence::SoundSequence;
pub use stream::SoundStream;
pub use wave::SoundWave;
pub use wave_archive::SoundWaveArchive;
pub use wsd::SoundWsd;
