//! RIFF chunk trees.

use byteorder::{ByteOrder, WriteBytesExt, LE};
use std::fmt;
use std::io::{self, Write};

#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct ID(pub [u8; 4]);

impl fmt::Debug for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID(")?;
        fmt::Display::fmt(&self, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Chunk {
    Data { id: ID, data: Vec<u8> },
    /// `RIFF` or `LIST` container with a form type.
    List { id: ID, form: ID, children: Vec<Chunk> },
}

impl Chunk {
    pub fn data(id: &[u8; 4], data: Vec<u8>) -> Self {
        Chunk::Data { id: ID(*id), data }
    }

    pub fn list(form: &[u8; 4], children: Vec<Chunk>) -> Self {
        Chunk::List {
            id: ID(*b"LIST"),
            form: ID(*form),
            children,
        }
    }

    pub fn riff(form: &[u8; 4], children: Vec<Chunk>) -> Self {
        Chunk::List {
            id: ID(*b"RIFF"),
            form: ID(*form),
            children,
        }
    }

    /// Zero-terminated string chunk, padded to an even length.
    pub fn string(id: &[u8; 4], text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        if data.len() % 2 == 1 {
            data.push(0);
        }
        Self::data(id, data)
    }

    /// Value of the size field.
    pub fn payload_size(&self) -> usize {
        match self {
            Chunk::Data { data, .. } => data.len(),
            Chunk::List { children, .. } => {
                4 + children.iter().map(Chunk::total_size).sum::<usize>()
            }
        }
    }

    /// Bytes taken by the whole chunk, pad byte included.
    pub fn total_size(&self) -> usize {
        let size = self.payload_size();
        8 + size + size % 2
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let size = self.payload_size();
        match self {
            Chunk::Data { id, data } => {
                w.write_all(&id.0)?;
                w.write_u32::<LE>(size as u32)?;
                w.write_all(data)?;
            }
            Chunk::List { id, form, children } => {
                w.write_all(&id.0)?;
                w.write_u32::<LE>(size as u32)?;
                w.write_all(&form.0)?;
                for child in children {
                    child.write(w)?;
                }
            }
        }
        if size % 2 == 1 {
            w.write_u8(0)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.total_size());
        self.write(&mut buf).expect("writing to a Vec cannot fail");
        buf
    }
}

/// Splits the next chunk off `data`, returning its id and payload.
pub fn read_chunk<'a>(data: &mut &'a [u8]) -> Option<(ID, &'a [u8])> {
    if data.len() < 8 {
        return None;
    }
    let mut id = [0; 4];
    id.copy_from_slice(&data[0..4]);
    let size = LE::read_u32(&data[4..8]) as usize;
    let chunk_data = data.get(8..8 + size)?;

    let padded = (8 + size + size % 2).min(data.len());
    *data = &data[padded..];
    Some((ID(id), chunk_data))
}
