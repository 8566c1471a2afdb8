//! Builds small containers in memory, in either byte order.
#![allow(dead_code)]

use rsnd::Endian;

pub struct Builder {
    pub data: Vec<u8>,
    pub endian: Endian,
}

impl Builder {
    pub fn new(endian: Endian) -> Self {
        Self {
            data: Vec::new(),
            endian,
        }
    }

    pub fn pos(&self) -> usize {
        self.data.len()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.data.extend_from_slice(v);
        self
    }

    pub fn zeros(&mut self, n: usize) -> &mut Self {
        self.data.resize(self.data.len() + n, 0);
        self
    }

    pub fn align(&mut self, n: usize) -> &mut Self {
        while self.data.len() % n != 0 {
            self.data.push(0);
        }
        self
    }

    fn ordered<const N: usize>(&self, be: [u8; N]) -> [u8; N] {
        let mut out = be;
        if self.endian == Endian::Little {
            out.reverse();
        }
        out
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        let b = self.ordered(v.to_be_bytes());
        self.bytes(&b)
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.u16(v as u16)
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        let b = self.ordered(v.to_be_bytes());
        self.bytes(&b)
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.u32(v.to_bits())
    }

    pub fn patch_u32(&mut self, at: usize, v: u32) {
        let b = self.ordered(v.to_be_bytes());
        self.data[at..at + 4].copy_from_slice(&b);
    }

    /// Offset-kind reference.
    pub fn offset_ref(&mut self, data_type: u8, value: u32) -> &mut Self {
        self.u8(1).u8(data_type).zeros(2).u32(value)
    }

    pub fn null_ref(&mut self) -> &mut Self {
        self.zeros(8)
    }

    /// Writes a reference placeholder and returns its position.
    pub fn ref_slot(&mut self, data_type: u8) -> usize {
        let at = self.pos();
        self.offset_ref(data_type, 0);
        at
    }

    /// Points the reference at `slot` to the current position, relative to `base`.
    pub fn fill_ref(&mut self, slot: usize, base: usize) {
        let here = (self.pos() - base) as u32;
        self.patch_u32(slot + 4, here);
    }

    /// File header plus a zeroed block table of `blocks` entries.
    pub fn header(&mut self, magic: &[u8; 4], version: u16, blocks: u16) -> &mut Self {
        self.bytes(magic);
        let bom = self.endian.bom();
        self.bytes(&bom);
        self.u16(version).u32(0).u16(0x10 + blocks * 8).u16(blocks);
        self.zeros(blocks as usize * 8);
        self.align(0x20)
    }

    /// Starts a block and records its offset in header slot `entry`.
    pub fn begin_block(&mut self, magic: &[u8; 4], entry: usize) -> usize {
        let start = self.pos();
        self.patch_u32(entry, start as u32);
        self.bytes(magic).u32(0);
        start
    }

    pub fn end_block(&mut self, start: usize, entry: usize) {
        self.align(4);
        let len = (self.pos() - start) as u32;
        self.patch_u32(start + 4, len);
        self.patch_u32(entry + 4, len);
    }

    pub fn finish(mut self) -> Vec<u8> {
        let len = self.data.len() as u32;
        self.patch_u32(8, len);
        self.data
    }
}

/// Instrument record pointing at `wave`.
pub fn instrument(b: &mut Builder, wave: i32, original_key: u8) {
    b.u32(wave as u32);
    b.bytes(&[127, 127, 100, 90, 0, 0, 0, 0, original_key, 127, 64, 0]);
    b.f32(1.0);
    b.zeros(0x30 - 0x14);
}

/// A mono wave info whose channel reads `data_offset` from the sample data.
pub fn wave_info(b: &mut Builder, format: u8, rate: u32, loop_end: u32, data_location: u32) {
    let at = b.pos();
    b.u8(format).u8(0).u8(1).u8((rate >> 16) as u8).u16(rate as u16);
    b.u8(0).u8(0);
    b.u32(0).u32(loop_end);
    b.u32(0x1c).u32(data_location).u32(0);
    // channel table
    b.u32(0x20);
    // channel info
    let adpcm = if format == 2 { 0x38 } else { 0 };
    b.u32(0).u32(adpcm).zeros(16);
    if format == 2 {
        assert_eq!(b.pos() - at, 0x38);
        // coefficients, gain, scale, history, loop scale, loop history
        b.zeros(0x2e);
        b.align(4);
    }
}

/// A complete mono wave file.
pub fn rwav(endian: Endian, version: u16, format: u8, rate: u32, loop_end: u32, samples: &[u8]) -> Vec<u8> {
    let mut b = Builder::new(endian);
    b.header(b"RWAV", version, 2);
    let info = b.begin_block(b"INFO", 0x10);
    wave_info(&mut b, format, rate, loop_end, 0);
    b.end_block(info, 0x10);
    let data = b.begin_block(b"DATA", 0x18);
    b.bytes(samples);
    b.end_block(data, 0x18);
    b.finish()
}

/// Mono PCM16 samples in `endian` order.
pub fn pcm16(endian: Endian, samples: &[i16]) -> Vec<u8> {
    let mut b = Builder::new(endian);
    for s in samples {
        b.i16(*s);
    }
    b.data
}

/// A wave archive; empty entries become null references.
pub fn rwar(endian: Endian, waves: &[&[u8]]) -> Vec<u8> {
    let mut b = Builder::new(endian);
    b.header(b"RWAR", 0x0100, 2);
    let tabl = b.begin_block(b"TABL", 0x10);
    b.u32(waves.len() as u32);
    let mut offset = 8;
    for wave in waves {
        if wave.is_empty() {
            b.null_ref().u32(0);
        } else {
            b.offset_ref(0, offset).u32(wave.len() as u32);
            offset += wave.len() as u32;
        }
    }
    b.end_block(tabl, 0x10);
    let data = b.begin_block(b"DATA", 0x18);
    for wave in waves {
        b.bytes(wave);
    }
    b.end_block(data, 0x18);
    b.finish()
}

/// An archive with one sequence sound `SE_A` stored as item 0 of group `GRP`.
pub fn archive(endian: Endian, payload: &[u8]) -> Vec<u8> {
    let mut b = Builder::new(endian);
    b.header(b"RSAR", 0x0104, 3);

    let symb = b.begin_block(b"SYMB", 0x10);
    let base = b.pos();
    b.u32(0x14).u32(0).u32(0).u32(0).u32(0);
    // string table
    b.u32(2).u32(0).u32(0);
    b.patch_u32(base + 0x18, (b.pos() - base) as u32);
    b.bytes(b"SE_A\0");
    b.patch_u32(base + 0x1c, (b.pos() - base) as u32);
    b.bytes(b"GRP\0");
    b.align(4);
    // sound tree with a single leaf
    b.patch_u32(base + 4, (b.pos() - base) as u32);
    b.u32(0).u32(1);
    b.u16(1).u16(0).u32(u32::MAX).u32(u32::MAX).u32(0).u32(0);
    for slot in &[8usize, 0x0c, 0x10] {
        b.patch_u32(base + slot, (b.pos() - base) as u32);
        b.u32(0).u32(0);
    }
    b.end_block(symb, 0x10);

    let info = b.begin_block(b"INFO", 0x18);
    let base = b.pos();
    let slots: Vec<usize> = (0..6).map(|_| b.ref_slot(0)).collect();

    b.fill_ref(slots[0], base);
    b.u32(1);
    let sound = b.ref_slot(0);
    b.fill_ref(sound, base);
    let sound_at = b.pos();
    b.u32(0).u32(0).u32(0).null_ref();
    b.u8(100).u8(64).u8(1).u8(0);
    let ext = b.ref_slot(0);
    b.u32(0).u32(0).u8(0).u8(0).u8(0).u8(0);
    assert_eq!(b.pos() - sound_at, 0x2c);
    b.fill_ref(ext, base);
    b.u32(0x10).u32(0).u32(1).u8(64).u8(0).zeros(2);

    b.fill_ref(slots[1], base);
    b.u32(0);
    b.fill_ref(slots[2], base);
    b.u32(0);

    b.fill_ref(slots[3], base);
    b.u32(1);
    let file = b.ref_slot(0);
    b.fill_ref(file, base);
    b.u32(payload.len() as u32).u32(0).u32(0).null_ref();
    let places = b.ref_slot(0);
    b.fill_ref(places, base);
    b.u32(1);
    let place = b.ref_slot(0);
    b.fill_ref(place, base);
    b.u32(0).u32(0);

    b.fill_ref(slots[4], base);
    b.u32(1);
    let group = b.ref_slot(0);
    b.fill_ref(group, base);
    let group_at = b.pos();
    b.u32(1).u32(0).null_ref();
    b.u32(0).u32(payload.len() as u32).u32(0).u32(0);
    let items = b.ref_slot(0);
    b.fill_ref(items, base);
    b.u32(1);
    let item = b.ref_slot(0);
    b.fill_ref(item, base);
    b.u32(0).u32(0).u32(payload.len() as u32).u32(0).u32(0).u32(0);

    b.fill_ref(slots[5], base);
    b.u16(1).u16(1).zeros(12).u32(0);
    b.end_block(info, 0x18);

    let fileblk = b.begin_block(b"FILE", 0x20);
    b.align(0x20);
    let start = b.pos() as u32;
    b.patch_u32(group_at + 0x10, start);
    b.bytes(payload);
    b.end_block(fileblk, 0x20);
    b.finish()
}
