use crate::error::*;
use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    position: Option<usize>,
    size: u32,
}

/// A table of embedded `RWAV` files (`RWAR`).
#[derive(Debug)]
pub struct SoundWaveArchive<'a> {
    pub header: FileHeader,
    view: View<'a>,
    entries: Vec<Entry>,
}

impl<'a> SoundWaveArchive<'a> {
    pub const MAGIC: &'static [u8; 4] = b"RWAR";

    pub fn read(data: &'a [u8]) -> Result<Self> {
        let (header, view) = FileHeader::expect(data, Self::MAGIC)?;
        let table = Block::locate(&view, 0x10, b"TABL")?;
        let waves = Block::locate(&view, 0x18, b"DATA")?;

        // wave references are relative to the data block header, not its body
        let entries = view.table(table.base(), DataRef::SIZE + 4, |at| {
            Ok(Entry {
                position: view.data_ref(at)?.resolve(waves.offset),
                size: view.u32(at + DataRef::SIZE)?,
            })
        })?;

        Ok(Self {
            header,
            view,
            entries,
        })
    }

    pub fn wave_count(&self) -> usize {
        self.entries.len()
    }

    /// Bytes of the `RWAV` file at `index`. Null entries yield an empty slice.
    pub fn wave(&self, index: usize) -> Result<&'a [u8]> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| RsndError::NotFound(format!("wave {}", index)))?;
        match entry.position {
            Some(position) => self.view.bytes(position, entry.size as usize),
            None => Ok(&[]),
        }
    }

    pub fn waves(&self) -> impl Iterator<Item = Result<&'a [u8]>> + '_ {
        (0..self.entries.len()).map(move |i| self.wave(i))
    }
}
