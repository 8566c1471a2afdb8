use thiserror::Error;

#[derive(Error, Debug)]
pub enum RseqError {
    #[error("unknown instruction 0x{opcode:02x} at 0x{offset:06x}")]
    UnknownInstruction { opcode: u8, offset: usize },
    #[error("unknown extended instruction 0x{sub:02x} at 0x{offset:06x}")]
    UnknownExtended { sub: u8, offset: usize },
    #[error("instruction at 0x{offset:06x} runs past the end of the sequence")]
    Truncated { offset: usize },
    #[error("call or loop nesting too deep at 0x{offset:06x}")]
    CallDepth { offset: usize },
    #[error("track did not finish within {0} instructions")]
    StepLimit(usize),
    #[error("no label named {0:?}")]
    UnknownLabel(String),

    #[error(transparent)]
    Container(#[from] rsnd::RsndError),
}

pub type Result<T> = std::result::Result<T, RseqError>;
