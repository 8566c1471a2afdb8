use crate::error::*;
use crate::types::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeqLabel {
    pub name: String,
    /// Entry point, relative to the start of the bytecode.
    pub offset: u32,
}

/// A sequence file (`RSEQ`).
#[derive(Debug)]
pub struct SoundSequence<'a> {
    pub header: FileHeader,
    pub labels: Vec<SeqLabel>,
    code: &'a [u8],
}

impl<'a> SoundSequence<'a> {
    pub const MAGIC: &'static [u8; 4] = b"RSEQ";

    pub fn read(data: &'a [u8]) -> Result<Self> {
        let (header, view) = FileHeader::expect(data, Self::MAGIC)?;
        let data_block = Block::locate(&view, 0x10, b"DATA")?;

        // the bytecode offset is stored relative to the block header
        let start = data_block.offset + view.offset(data_block.base())?;
        if start < data_block.base() + 4 || start > data_block.end() {
            return Err(RsndError::malformed(
                data_block.base(),
                "sequence data offset outside its block",
            ));
        }
        let code = view.bytes(start, data_block.end() - start)?;

        let labels = match view.offset(0x18)? {
            0 => Vec::new(),
            _ => {
                let label_block = Block::locate(&view, 0x18, b"LABL")?;
                let base = label_block.base();
                view.table(base, 4, |at| {
                    let label = base + view.offset(at)?;
                    let len = view.offset(label + 4)?;
                    let name = view.bytes(label + 8, len)?;
                    Ok(SeqLabel {
                        name: String::from_utf8_lossy(name).into_owned(),
                        offset: view.u32(label)?,
                    })
                })?
            }
        };

        Ok(Self {
            header,
            labels,
            code,
        })
    }

    /// The bytecode, always big-endian.
    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    pub fn label(&self, name: &str) -> Option<u32> {
        self.labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.offset)
    }
}
