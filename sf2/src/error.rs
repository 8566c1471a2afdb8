use thiserror::Error;

#[derive(Error, Debug)]
pub enum Sf2Error {
    #[error("program {program} plays wave {wave}, which was not supplied")]
    MissingWave { program: usize, wave: i32 },
    #[error("{what} does not fit in a SoundFont ({count})")]
    TooMany { what: &'static str, count: usize },

    #[error(transparent)]
    Container(#[from] rsnd::RsndError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Sf2Error>;
