use crate::decode::*;
use crate::error::*;
use crate::types::*;
use std::convert::TryFrom;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataLocation {
    /// Sample data is found relative to the wave data block.
    Offset,
    /// Sample data lives at an absolute address in console memory.
    Address,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChannelInfo {
    pub data_offset: u32,
    pub adpcm: Option<AdpcmParams>,
    pub volumes: [u32; 4],
}

impl ChannelInfo {
    pub const SIZE: usize = 0x18;

    fn read(view: &View<'_>, at: usize, base: usize, format: SampleFormat) -> Result<Self> {
        let adpcm_offset = view.offset(at + 4)?;
        let adpcm = if format == SampleFormat::Adpcm {
            Some(AdpcmParams::read(view, base + adpcm_offset)?)
        } else {
            None
        };
        Ok(Self {
            data_offset: view.u32(at)?,
            adpcm,
            volumes: [
                view.u32(at + 0x08)?,
                view.u32(at + 0x0c)?,
                view.u32(at + 0x10)?,
                view.u32(at + 0x14)?,
            ],
        })
    }
}

/// Format, loop and channel layout of a single wave.
///
/// Shared by standalone waves and the wave tables embedded in banks and
/// wave-sound-data files. Channel info offsets are relative to the start of
/// the wave info itself.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveInfo {
    pub format: SampleFormat,
    pub looped: bool,
    pub sample_rate: u32,
    pub location: DataLocation,
    pub loop_start: u32,
    pub loop_end: u32,
    pub data_location: u32,
    pub channels: Vec<ChannelInfo>,
}

impl WaveInfo {
    pub const SIZE: usize = 0x1c;

    pub fn read(view: &View<'_>, at: usize) -> Result<Self> {
        let format = SampleFormat::try_from(view.u8(at)?)?;
        let channel_count = view.u8(at + 2)? as usize;
        let sample_rate = ((view.u8(at + 3)? as u32) << 16) | view.u16(at + 4)? as u32;
        let location = match view.u8(at + 6)? {
            0 => DataLocation::Offset,
            1 => DataLocation::Address,
            other => {
                return Err(RsndError::Unsupported(format!(
                    "wave data location type {}",
                    other
                )))
            }
        };
        let table = at + view.offset(at + 0x10)?;

        let mut channels = Vec::with_capacity(channel_count);
        for c in 0..channel_count {
            let info = at + view.offset(table + c * 4)?;
            channels.push(ChannelInfo::read(view, info, at, format)?);
        }

        Ok(Self {
            format,
            looped: view.u8(at + 1)? != 0,
            sample_rate,
            location,
            loop_start: view.u32(at + 8)?,
            loop_end: view.u32(at + 0x0c)?,
            data_location: view.u32(at + 0x14)?,
            channels,
        })
    }

    pub fn channel_count(&self) -> u8 {
        self.channels.len() as u8
    }

    /// Loop points in samples. ADPCM positions go through `addressing`.
    pub fn loop_points(&self, addressing: SampleAddressing) -> (u32, u32) {
        match self.format {
            SampleFormat::Adpcm => {
                let channels = self.channel_count();
                (
                    addressing.to_samples(self.loop_start, channels),
                    addressing.to_samples(self.loop_end, channels),
                )
            }
            _ => (self.loop_start, self.loop_end),
        }
    }

    /// Decodes every channel, interleaved.
    ///
    /// Channel `c` starts at `sample_base + channels[c].data_offset` within
    /// `wave_data`.
    pub fn decode(
        &self,
        endian: Endian,
        wave_data: &[u8],
        sample_base: usize,
        frames: usize,
        addressing: SampleAddressing,
    ) -> Result<DecodedWave> {
        if self.location == DataLocation::Address {
            return Err(RsndError::Unsupported(
                "wave data at an absolute address".into(),
            ));
        }

        let count = self.channels.len();
        let mut samples = vec![0i16; frames * count];
        for (c, channel) in self.channels.iter().enumerate() {
            let start = sample_base + channel.data_offset as usize;
            let raw = wave_data.get(start..).ok_or_else(|| {
                RsndError::malformed(start, format!("channel {} data starts past wave data", c))
            })?;
            let codec = match (&channel.adpcm, self.format) {
                (Some(params), SampleFormat::Adpcm) => Codec::Adpcm(&params.coefs, params.history),
                (_, SampleFormat::Pcm16) => Codec::Pcm16(endian),
                _ => Codec::Pcm8,
            };
            decode_block(raw, frames, codec, &mut samples, Lane::channel(c, count))?;
        }

        let (loop_start, loop_end) = self.loop_points(addressing);
        Ok(DecodedWave {
            sample_rate: self.sample_rate,
            channels: count as u16,
            looped: self.looped,
            loop_start,
            loop_end,
            samples,
        })
    }
}

/// A standalone wave file (`RWAV`).
#[derive(Debug)]
pub struct SoundWave<'a> {
    pub header: FileHeader,
    pub info: WaveInfo,
    view: View<'a>,
    data: Block,
}

impl<'a> SoundWave<'a> {
    pub const MAGIC: &'static [u8; 4] = b"RWAV";
    pub const NIBBLE_ADDRESS_VERSION: u16 = 0x0102;

    pub fn read(data: &'a [u8]) -> Result<Self> {
        let (header, view) = FileHeader::expect(data, Self::MAGIC)?;
        let info_block = Block::locate(&view, 0x10, b"INFO")?;
        let data_block = Block::locate(&view, 0x18, b"DATA")?;
        let info = WaveInfo::read(&view, info_block.base())?;

        Ok(Self {
            header,
            info,
            view,
            data: data_block,
        })
    }

    /// Wave files before 1.2 store ADPCM loop positions as byte offsets.
    pub fn addressing(&self) -> SampleAddressing {
        if self.header.version < Self::NIBBLE_ADDRESS_VERSION {
            SampleAddressing::Legacy
        } else {
            SampleAddressing::Nibble
        }
    }

    pub fn channel_count(&self) -> u8 {
        self.info.channel_count()
    }

    pub fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    /// Samples per channel. ADPCM length follows from the data block size.
    pub fn sample_count(&self) -> u32 {
        match self.info.format {
            SampleFormat::Adpcm => legacy_to_samples(self.data.length as u32, self.channel_count()),
            _ => self.info.loop_end,
        }
    }

    pub fn decode(&self) -> Result<DecodedWave> {
        let body = self.data.body(&self.view)?;
        self.info.decode(
            self.view.endian(),
            body,
            0,
            self.sample_count() as usize,
            self.addressing(),
        )
    }
}
