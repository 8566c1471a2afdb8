//! PCM8, PCM16 and 4-bit DSP ADPCM decoding.

use crate::error::*;
use crate::types::{Endian, View};
use byteorder::{ByteOrder, BE, LE};
use std::convert::TryFrom;

/// Samples coded by one 8 byte ADPCM frame.
pub const SAMPLES_PER_FRAME: usize = 14;
pub const BYTES_PER_FRAME: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    Pcm8,
    Pcm16,
    Adpcm,
}

impl TryFrom<u8> for SampleFormat {
    type Error = RsndError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SampleFormat::Pcm8),
            1 => Ok(SampleFormat::Pcm16),
            2 => Ok(SampleFormat::Adpcm),
            _ => Err(RsndError::Unsupported(format!("sample format {}", value))),
        }
    }
}

impl SampleFormat {
    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::Pcm8 => "PCM8",
            SampleFormat::Pcm16 => "PCM16",
            SampleFormat::Adpcm => "ADPCM",
        }
    }
}

/// How loop points and lengths stored in a wave header map to sample indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleAddressing {
    /// DSP nibble addresses: two header nibbles per 16-nibble frame.
    Nibble,
    /// Byte offsets past an 8 byte lead-in, divided across channels.
    Legacy,
}

impl SampleAddressing {
    /// Converts a stored ADPCM position into a sample index.
    pub fn to_samples(self, address: u32, channels: u8) -> u32 {
        match self {
            SampleAddressing::Nibble => nibble_to_samples(address),
            SampleAddressing::Legacy => legacy_to_samples(address, channels),
        }
    }
}

pub fn nibble_to_samples(address: u32) -> u32 {
    let address = address as u64;
    ((address / 16) * 14 + address % 16).saturating_sub(2) as u32
}

pub fn legacy_to_samples(address: u32, channels: u8) -> u32 {
    let bytes = (address as u64).saturating_sub(8);
    (SAMPLES_PER_FRAME as u64 * bytes / BYTES_PER_FRAME as u64 / channels.max(1) as u64) as u32
}

/// Bytes occupied by `count` ADPCM samples.
pub fn adpcm_bytes(count: usize) -> usize {
    let frames = count / SAMPLES_PER_FRAME;
    let rest = count % SAMPLES_PER_FRAME;
    frames * BYTES_PER_FRAME + if rest > 0 { 1 + (rest + 1) / 2 } else { 0 }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdpcmHistory {
    pub yn1: i16,
    pub yn2: i16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdpcmParams {
    pub coefs: [i16; 16],
    pub gain: u16,
    pub pred_scale: u16,
    pub history: AdpcmHistory,
    pub loop_pred_scale: u16,
    pub loop_history: AdpcmHistory,
}

impl AdpcmParams {
    pub const SIZE: usize = 0x2e;

    pub(crate) fn read(view: &View<'_>, at: usize) -> Result<Self> {
        let mut coefs = [0i16; 16];
        for (i, coef) in coefs.iter_mut().enumerate() {
            *coef = view.i16(at + i * 2)?;
        }
        Ok(Self {
            coefs,
            gain: view.u16(at + 0x20)?,
            pred_scale: view.u16(at + 0x22)?,
            history: AdpcmHistory {
                yn1: view.i16(at + 0x24)?,
                yn2: view.i16(at + 0x26)?,
            },
            loop_pred_scale: view.u16(at + 0x28)?,
            loop_history: AdpcmHistory {
                yn1: view.i16(at + 0x2a)?,
                yn2: view.i16(at + 0x2c)?,
            },
        })
    }
}

/// Where a channel's samples land in a shared interleaved buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lane {
    pub offset: usize,
    pub stride: usize,
}

impl Lane {
    pub const MONO: Lane = Lane {
        offset: 0,
        stride: 1,
    };

    pub fn channel(index: usize, channels: usize) -> Self {
        Self {
            offset: index,
            stride: channels.max(1),
        }
    }

    fn fits(&self, count: usize, len: usize) -> bool {
        (count - 1)
            .checked_mul(self.stride)
            .and_then(|n| n.checked_add(self.offset))
            .map_or(false, |last| last < len)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Codec<'a> {
    Pcm8,
    Pcm16(Endian),
    Adpcm(&'a [i16; 16], AdpcmHistory),
}

/// Decodes `count` samples of `raw` into `out` along `lane`.
///
/// Returns the ADPCM history after the last sample, so consecutive blocks
/// can be chained. PCM codecs return the default history.
pub fn decode_block(
    raw: &[u8],
    count: usize,
    codec: Codec<'_>,
    out: &mut [i16],
    lane: Lane,
) -> Result<AdpcmHistory> {
    if count == 0 {
        return Ok(match codec {
            Codec::Adpcm(_, history) => history,
            _ => AdpcmHistory::default(),
        });
    }
    if !lane.fits(count, out.len()) {
        return Err(RsndError::malformed(
            lane.offset,
            format!("{} samples do not fit the output buffer", count),
        ));
    }
    let needed = match codec {
        Codec::Pcm8 => count,
        Codec::Pcm16(_) => count * 2,
        Codec::Adpcm(..) => adpcm_bytes(count),
    };
    if raw.len() < needed {
        return Err(RsndError::malformed(
            raw.len(),
            format!("sample block needs {} bytes", needed),
        ));
    }

    match codec {
        Codec::Pcm8 => {
            for (i, b) in raw[..count].iter().enumerate() {
                out[lane.offset + i * lane.stride] = (*b as i8) as i16;
            }
            Ok(AdpcmHistory::default())
        }
        Codec::Pcm16(endian) => {
            let dst = &mut out[lane.offset..];
            let src = &raw[..count * 2];
            if lane.stride == 1 {
                match endian {
                    Endian::Big => BE::read_i16_into(src, &mut dst[..count]),
                    Endian::Little => LE::read_i16_into(src, &mut dst[..count]),
                }
            } else {
                for (i, pair) in src.chunks_exact(2).enumerate() {
                    dst[i * lane.stride] = match endian {
                        Endian::Big => BE::read_i16(pair),
                        Endian::Little => LE::read_i16(pair),
                    };
                }
            }
            Ok(AdpcmHistory::default())
        }
        Codec::Adpcm(coefs, history) => Ok(decode_adpcm(raw, count, coefs, history, out, lane)),
    }
}

fn decode_adpcm(
    raw: &[u8],
    count: usize,
    coefs: &[i16; 16],
    mut history: AdpcmHistory,
    out: &mut [i16],
    lane: Lane,
) -> AdpcmHistory {
    let mut pos = 0;
    let mut scale = 1i32;
    let mut coef1 = 0i32;
    let mut coef2 = 0i32;

    for i in 0..count {
        if i % SAMPLES_PER_FRAME == 0 {
            let ps = raw[pos];
            pos += 1;
            scale = 1 << (ps & 0xf);
            let idx = ((ps >> 4) as usize * 2).min(14);
            coef1 = coefs[idx] as i32;
            coef2 = coefs[idx + 1] as i32;
        }

        let byte = raw[pos];
        let nibble = if i % 2 == 0 {
            (byte as i8) >> 4
        } else {
            pos += 1;
            ((byte << 4) as i8) >> 4
        };

        let predicted = (0x400
            + ((scale * nibble as i32) << 11)
            + coef1 * history.yn1 as i32
            + coef2 * history.yn2 as i32)
            >> 11;
        let sample = predicted.max(i16::MIN as i32).min(i16::MAX as i32) as i16;

        out[lane.offset + i * lane.stride] = sample;
        history.yn2 = history.yn1;
        history.yn1 = sample;
    }

    history
}

/// Owned, interleaved PCM16 with its playback metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedWave {
    pub sample_rate: u32,
    pub channels: u16,
    pub looped: bool,
    pub loop_start: u32,
    pub loop_end: u32,
    pub samples: Vec<i16>,
}

impl DecodedWave {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Copies one channel out of the interleaved buffer.
    pub fn channel(&self, index: usize) -> Vec<i16> {
        self.samples
            .iter()
            .skip(index)
            .step_by(self.channels.max(1) as usize)
            .copied()
            .collect()
    }
}
