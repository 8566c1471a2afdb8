use crate::types::ID;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RsndError {
    #[error("malformed container at 0x{offset:x}: {reason}")]
    Malformed { offset: usize, reason: String },
    #[error("bad magic: expected {expected}, found {found}")]
    BadMagic { expected: ID, found: ID },
    #[error("invalid byte order mark {0:02x?}")]
    BadByteOrder([u8; 2]),

    #[error("unsupported variant: {0}")]
    Unsupported(String),
    #[error("key {key} is outside index region {min}..{max}")]
    KeyOutOfDomain { key: u8, min: u8, max: u8 },
    #[error("{0} not found")]
    NotFound(String),
}

impl RsndError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        RsndError::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RsndError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_offset_in_hex() {
        let err = RsndError::malformed(0x40, "read past end of buffer");
        assert_eq!(
            err.to_string(),
            "malformed container at 0x40: read past end of buffer"
        );
    }

    #[test]
    fn display_bad_magic() {
        let err = RsndError::BadMagic {
            expected: ID(*b"RWAV"),
            found: ID(*b"RIFF"),
        };
        assert_eq!(err.to_string(), "bad magic: expected RWAV, found RIFF");
    }
}
