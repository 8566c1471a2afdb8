//! Readers for the console sound containers: archives, streams, waves,
//! wave archives, banks, wave-sound-data and sequences.
//!
//! Every container is decoded from a borrowed byte buffer with bounds checks
//! on each access. Little-endian files are normalized on the fly.

pub mod decode;
pub mod error;
pub mod format;
pub mod formats;
pub mod region;
pub mod types;

pub use decode::{DecodedWave, SampleAddressing, SampleFormat};
pub use error::{Result, RsndError};
pub use format::FileFormat;
pub use formats::*;
pub use region::{InstrumentParams, InstrumentRegion, Region};
pub use types::{Endian, FileHeader, ID};
