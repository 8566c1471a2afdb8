use crate::types::ID;
use std::fmt;

/// The container kinds, told apart by their magic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Archive,
    Stream,
    Wave,
    WaveArchive,
    Sequence,
    Bank,
    Wsd,
}

impl FileFormat {
    pub const ALL: [FileFormat; 7] = [
        FileFormat::Archive,
        FileFormat::Stream,
        FileFormat::Wave,
        FileFormat::WaveArchive,
        FileFormat::Sequence,
        FileFormat::Bank,
        FileFormat::Wsd,
    ];

    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            FileFormat::Archive => b"RSAR",
            FileFormat::Stream => b"RSTM",
            FileFormat::Wave => b"RWAV",
            FileFormat::WaveArchive => b"RWAR",
            FileFormat::Sequence => b"RSEQ",
            FileFormat::Bank => b"RBNK",
            FileFormat::Wsd => b"RWSD",
        }
    }

    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| &f.magic()[..] == magic)
    }

    /// Looks at the first four bytes of `data`.
    pub fn detect(data: &[u8]) -> Option<Self> {
        data.get(0..4).and_then(Self::from_magic)
    }

    /// File extension, e.g. `brseq`.
    pub fn extension(self) -> String {
        format!("b{}", ID(*self.magic()).lowercase())
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&ID(*self.magic()), f)
    }
}

/// Extension for an arbitrary blob, `bin` when the magic is not printable.
pub fn extension_for(data: &[u8]) -> String {
    match data.get(0..4) {
        Some(magic) if magic.iter().all(u8::is_ascii_alphanumeric) => {
            let lower: String = magic.iter().map(|b| (*b as char).to_ascii_lowercase()).collect();
            format!("b{}", lower)
        }
        _ => "bin".to_string(),
    }
}
