//! Checked, byte-order aware views over container bytes.
//!
//! Every container starts with a [`FileHeader`] whose byte-order mark says
//! how the multi-byte fields are stored. Big-endian is the console's native
//! order; little-endian files take the swapped path. Fields are decoded one
//! at a time through a [`View`], so normalizing a container is the same
//! pass as decoding it, and every access is bounds checked.

use crate::error::*;
use byteorder::{ByteOrder, BE};
use std::convert::TryInto;
use std::fmt;

#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct ID(pub [u8; 4]);

impl ID {
    pub fn data(&self) -> &[u8] {
        &self.0
    }

    pub fn read(data: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = data
            .get(0..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RsndError::malformed(0, "missing magic"))?;
        Ok(Self(bytes))
    }

    /// Lowercased magic, used for `.b<magic>` file extensions.
    pub fn lowercase(&self) -> String {
        self.0
            .iter()
            .map(|b| (*b as char).to_ascii_lowercase())
            .collect()
    }
}

impl fmt::Debug for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID(")?;
        fmt::Display::fmt(&self, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.0[0] as char, self.0[1] as char, self.0[2] as char, self.0[3] as char,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    pub fn from_bom(bom: [u8; 2]) -> Result<Self> {
        match bom {
            [0xfe, 0xff] => Ok(Endian::Big),
            [0xff, 0xfe] => Ok(Endian::Little),
            _ => Err(RsndError::BadByteOrder(bom)),
        }
    }

    pub fn bom(self) -> [u8; 2] {
        match self {
            Endian::Big => [0xfe, 0xff],
            Endian::Little => [0xff, 0xfe],
        }
    }

    pub fn is_native(self) -> bool {
        self == Endian::Big
    }
}

/// A scalar whose byte order can be reversed.
pub trait Swap: Copy {
    fn swap(self) -> Self;
}

macro_rules! impl_swap {
    ($($t:ty),*) => {
        $(impl Swap for $t {
            fn swap(self) -> Self {
                self.swap_bytes()
            }
        })*
    };
}

impl_swap!(u16, i16, u32, i32, u64);

impl Swap for f32 {
    fn swap(self) -> Self {
        f32::from_bits(self.to_bits().swap_bytes())
    }
}

#[derive(Clone, Copy)]
pub struct View<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> fmt::Debug for View<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("len", &self.data.len())
            .field("endian", &self.endian)
            .finish()
    }
}

impl<'a> View<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn normalize<T: Swap>(&self, raw: T) -> T {
        match self.endian {
            Endian::Big => raw,
            Endian::Little => raw.swap(),
        }
    }

    pub fn bytes(&self, at: usize, len: usize) -> Result<&'a [u8]> {
        at.checked_add(len)
            .and_then(|end| self.data.get(at..end))
            .ok_or_else(|| {
                RsndError::malformed(
                    at,
                    format!("{} byte read past end of {} byte buffer", len, self.data.len()),
                )
            })
    }

    pub fn u8(&self, at: usize) -> Result<u8> {
        Ok(self.bytes(at, 1)?[0])
    }

    pub fn i8(&self, at: usize) -> Result<i8> {
        Ok(self.u8(at)? as i8)
    }

    pub fn u16(&self, at: usize) -> Result<u16> {
        Ok(self.normalize(BE::read_u16(self.bytes(at, 2)?)))
    }

    pub fn i16(&self, at: usize) -> Result<i16> {
        Ok(self.normalize(BE::read_i16(self.bytes(at, 2)?)))
    }

    pub fn u32(&self, at: usize) -> Result<u32> {
        Ok(self.normalize(BE::read_u32(self.bytes(at, 4)?)))
    }

    pub fn i32(&self, at: usize) -> Result<i32> {
        Ok(self.normalize(BE::read_i32(self.bytes(at, 4)?)))
    }

    pub fn f32(&self, at: usize) -> Result<f32> {
        Ok(self.normalize(BE::read_f32(self.bytes(at, 4)?)))
    }

    /// Reads a `u32` and widens it to a buffer position.
    pub fn offset(&self, at: usize) -> Result<usize> {
        Ok(self.u32(at)? as usize)
    }

    pub fn data_ref(&self, at: usize) -> Result<DataRef> {
        DataRef::read(self, at)
    }

    /// NUL-terminated string starting at `at`.
    pub fn cstr(&self, at: usize) -> Result<String> {
        let rest = self
            .data
            .get(at..)
            .ok_or_else(|| RsndError::malformed(at, "string starts past end of buffer"))?;
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| RsndError::malformed(at, "unterminated string"))?;
        Ok(String::from_utf8_lossy(&rest[..len]).into_owned())
    }

    /// Reads a `u32` count at `at`, then one element per `stride` bytes after it.
    pub fn table<T>(
        &self,
        at: usize,
        stride: usize,
        mut read: impl FnMut(usize) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = self.u32(at)? as usize;
        let first = at + 4;
        let needed = count
            .checked_mul(stride)
            .and_then(|n| n.checked_add(first))
            .ok_or_else(|| RsndError::malformed(at, "table count overflows"))?;
        if needed > self.data.len() {
            return Err(RsndError::malformed(
                at,
                format!("table of {} entries does not fit in buffer", count),
            ));
        }

        (0..count).map(|i| read(first + i * stride)).collect()
    }

    /// Follows every reference of a `Table<DataRef>` relative to `base`.
    /// Null references are kept as `None`.
    pub fn ref_table(&self, at: usize, base: usize) -> Result<Vec<Option<usize>>> {
        self.table(at, DataRef::SIZE, |pos| Ok(self.data_ref(pos)?.resolve(base)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefKind {
    /// Absolute position in the file; zero means null.
    Address,
    /// Relative to an explicitly supplied base.
    Offset,
}

/// A tagged cross-reference inside a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataRef {
    pub kind: RefKind,
    pub data_type: u8,
    pub value: u32,
}

impl DataRef {
    pub const SIZE: usize = 8;

    pub(crate) fn read(view: &View<'_>, at: usize) -> Result<Self> {
        let kind = match view.u8(at)? {
            0 => RefKind::Address,
            1 => RefKind::Offset,
            other => {
                return Err(RsndError::malformed(
                    at,
                    format!("unknown reference kind {}", other),
                ))
            }
        };
        Ok(Self {
            kind,
            data_type: view.u8(at + 1)?,
            value: view.u32(at + 4)?,
        })
    }

    pub fn is_null(&self) -> bool {
        self.kind == RefKind::Address && self.value == 0
    }

    pub fn resolve(&self, base: usize) -> Option<usize> {
        match self.kind {
            RefKind::Address if self.value == 0 => None,
            RefKind::Address => Some(self.value as usize),
            RefKind::Offset => base.checked_add(self.value as usize),
        }
    }

    /// Like [`DataRef::resolve`], but a null reference is an error.
    pub fn require(&self, base: usize, what: &str) -> Result<usize> {
        self.resolve(base)
            .ok_or_else(|| RsndError::malformed(base, format!("null reference to {}", what)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: ID,
    pub endian: Endian,
    pub version: u16,
    pub file_size: u32,
    pub header_size: u16,
    pub block_count: u16,
}

impl FileHeader {
    pub const SIZE: usize = 0x10;

    pub fn read(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(RsndError::malformed(0, "file header truncated"));
        }
        let magic = ID::read(data)?;
        let endian = Endian::from_bom([data[4], data[5]])?;
        let view = View::new(data, endian);

        Ok(Self {
            magic,
            endian,
            version: view.u16(6)?,
            file_size: view.u32(8)?,
            header_size: view.u16(12)?,
            block_count: view.u16(14)?,
        })
    }

    /// Reads the header and checks its magic, returning a view over the file.
    pub fn expect<'a>(data: &'a [u8], magic: &[u8; 4]) -> Result<(Self, View<'a>)> {
        let header = Self::read(data)?;
        if header.magic.0 != *magic {
            return Err(RsndError::BadMagic {
                expected: ID(*magic),
                found: header.magic,
            });
        }
        if (header.file_size as usize) > data.len() {
            log::warn!(
                "{} declares {} bytes but only {} are present",
                header.magic,
                header.file_size,
                data.len()
            );
        }
        let view = View::new(data, header.endian);
        Ok((header, view))
    }

    pub fn version_major(&self) -> u8 {
        (self.version >> 8) as u8
    }

    pub fn version_minor(&self) -> u8 {
        self.version as u8
    }
}

/// A block located through the file header's offset table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub magic: ID,
    /// Position of the block header in the file.
    pub offset: usize,
    /// Length declared by the block header, header included.
    pub length: usize,
}

impl Block {
    pub const HEADER_SIZE: usize = 8;

    /// Reads the `(offset, size)` pair at `entry` in the file header and the
    /// block header it points at.
    pub fn locate(view: &View<'_>, entry: usize, magic: &[u8; 4]) -> Result<Self> {
        let offset = view.offset(entry)?;
        Self::read(view, offset, magic)
    }

    pub fn read(view: &View<'_>, offset: usize, magic: &[u8; 4]) -> Result<Self> {
        let found = ID::read(view.bytes(offset, 4)?)?;
        if found.0 != *magic {
            return Err(RsndError::BadMagic {
                expected: ID(*magic),
                found,
            });
        }
        let length = view.offset(offset + 4)?;
        if length < Self::HEADER_SIZE {
            return Err(RsndError::malformed(offset, "block shorter than its header"));
        }
        view.bytes(offset, length).map_err(|_| {
            RsndError::malformed(offset, format!("{} block overruns the file", found))
        })?;

        Ok(Self {
            magic: found,
            offset,
            length,
        })
    }

    /// Address right after the block header.
    pub fn base(&self) -> usize {
        self.offset + Self::HEADER_SIZE
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn body<'a>(&self, view: &View<'a>) -> Result<&'a [u8]> {
        view.bytes(self.base(), self.length - Self::HEADER_SIZE)
    }
}
