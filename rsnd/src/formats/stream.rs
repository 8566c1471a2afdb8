use crate::decode::*;
use crate::error::*;
use crate::types::*;
use std::convert::TryFrom;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub format: SampleFormat,
    pub looped: bool,
    pub channel_count: u8,
    pub sample_rate: u32,
    pub block_header_offset: u16,
    pub loop_start: u32,
    pub loop_end: u32,
    pub data_offset: u32,
    pub block_count: u32,
    pub block_size: u32,
    pub block_samples: u32,
    pub final_block_size: u32,
    pub final_block_samples: u32,
    pub final_block_padded_size: u32,
    pub adpcm_interval: u32,
    pub adpcm_data_size: u32,
}

impl StreamInfo {
    fn read(view: &View<'_>, at: usize) -> Result<Self> {
        Ok(Self {
            format: SampleFormat::try_from(view.u8(at)?)?,
            looped: view.u8(at + 1)? != 0,
            channel_count: view.u8(at + 2)?,
            sample_rate: ((view.u8(at + 3)? as u32) << 16) | view.u16(at + 4)? as u32,
            block_header_offset: view.u16(at + 6)?,
            loop_start: view.u32(at + 0x08)?,
            loop_end: view.u32(at + 0x0c)?,
            data_offset: view.u32(at + 0x10)?,
            block_count: view.u32(at + 0x14)?,
            block_size: view.u32(at + 0x18)?,
            block_samples: view.u32(at + 0x1c)?,
            final_block_size: view.u32(at + 0x20)?,
            final_block_samples: view.u32(at + 0x24)?,
            final_block_padded_size: view.u32(at + 0x28)?,
            adpcm_interval: view.u32(at + 0x2c)?,
            adpcm_data_size: view.u32(at + 0x30)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamTrack {
    /// Volume and pan, present only in extended track tables.
    pub mix: Option<(u8, u8)>,
    pub channels: Vec<u8>,
}

/// A streamed audio file (`RSTM`).
#[derive(Debug)]
pub struct SoundStream<'a> {
    pub header: FileHeader,
    pub info: StreamInfo,
    pub tracks: Vec<StreamTrack>,
    /// ADPCM parameters per channel; empty for PCM streams.
    pub channel_params: Vec<Option<AdpcmParams>>,
    view: View<'a>,
    adpc: Option<Block>,
    data: Block,
}

impl<'a> SoundStream<'a> {
    pub const MAGIC: &'static [u8; 4] = b"RSTM";

    pub fn read(data: &'a [u8]) -> Result<Self> {
        let (header, view) = FileHeader::expect(data, Self::MAGIC)?;
        let head = Block::locate(&view, 0x10, b"HEAD")?;
        let adpc = match view.offset(0x18)? {
            0 => None,
            _ => Some(Block::locate(&view, 0x18, b"ADPC")?),
        };
        let data_block = Block::locate(&view, 0x20, b"DATA")?;

        let base = head.base();
        let info_at = view.data_ref(base)?.require(base, "stream info")?;
        let tracks_at = view.data_ref(base + 8)?.require(base, "track table")?;
        let channels_at = view.data_ref(base + 16)?.require(base, "channel table")?;

        let info = StreamInfo::read(&view, info_at)?;
        let tracks = read_tracks(&view, tracks_at, base)?;

        let channel_count = view.u8(channels_at)? as usize;
        let mut channel_params = Vec::with_capacity(channel_count);
        for c in 0..channel_count {
            let channel = view.data_ref(channels_at + 4 + c * DataRef::SIZE)?.require(base, "channel info")?;
            let params = match (info.format, view.data_ref(channel)?.resolve(base)) {
                (SampleFormat::Adpcm, Some(at)) => Some(AdpcmParams::read(&view, at)?),
                _ => None,
            };
            channel_params.push(params);
        }

        let body = data_block.base();
        let samples_start = body + view.offset(body)?;
        check_geometry(&info, data_block.end().saturating_sub(samples_start), info_at)?;

        for track in &tracks {
            if let Some(bad) = track.channels.iter().find(|c| **c >= info.channel_count) {
                return Err(RsndError::malformed(
                    tracks_at,
                    format!("track refers to channel {} of {}", bad, info.channel_count),
                ));
            }
        }

        Ok(Self {
            header,
            info,
            tracks,
            channel_params,
            view,
            adpc,
            data: data_block,
        })
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn channel_count(&self) -> u8 {
        self.info.channel_count
    }

    /// Samples per channel.
    pub fn sample_count(&self) -> Result<u32> {
        let info = &self.info;
        match info.block_count {
            0 => Ok(0),
            n => (n - 1)
                .checked_mul(info.block_samples)
                .and_then(|s| s.checked_add(info.final_block_samples))
                .ok_or_else(|| RsndError::malformed(0, "stream sample count overflows")),
        }
    }

    fn block_data(&self, block: u32, channel: u8) -> Result<&'a [u8]> {
        let info = &self.info;
        let (b, c, chans) = (block as usize, channel as usize, info.channel_count as usize);
        let block_size = info.block_size as usize;
        let (raw, len) = if block + 1 == info.block_count {
            let len = info.final_block_size as usize;
            if c == 0 {
                (b * chans * block_size, len)
            } else {
                (b * chans * block_size + c * info.final_block_padded_size as usize, len)
            }
        } else {
            ((b * chans + c) * block_size, block_size)
        };

        let body = self.data.base();
        let start = body + self.view.offset(body)? + raw;
        self.view.bytes(start, len)
    }

    fn block_history(&self, block: u32, channel: u8) -> Result<Option<AdpcmHistory>> {
        match &self.adpc {
            Some(adpc) => {
                let at = adpc.base()
                    + (block as usize * self.info.channel_count as usize + channel as usize) * 4;
                Ok(Some(AdpcmHistory {
                    yn1: self.view.i16(at)?,
                    yn2: self.view.i16(at + 2)?,
                }))
            }
            None => Ok(None),
        }
    }

    fn decode_into(&self, channel: u8, out: &mut [i16], lane: Lane) -> Result<()> {
        let info = &self.info;
        let params = self.channel_params.get(channel as usize).and_then(Option::as_ref);
        let mut history = params.map(|p| p.history).unwrap_or_default();

        for b in 0..info.block_count {
            let raw = self.block_data(b, channel)?;
            let count = if b + 1 == info.block_count {
                info.final_block_samples
            } else {
                info.block_samples
            } as usize;
            let block_lane = Lane {
                offset: b as usize * info.block_samples as usize * lane.stride + lane.offset,
                stride: lane.stride,
            };

            let codec = match (info.format, params) {
                (SampleFormat::Adpcm, Some(params)) => {
                    if let Some(h) = self.block_history(b, channel)? {
                        history = h;
                    }
                    Codec::Adpcm(&params.coefs, history)
                }
                (SampleFormat::Adpcm, None) => {
                    return Err(RsndError::malformed(
                        0,
                        format!("ADPCM channel {} has no parameters", channel),
                    ))
                }
                (SampleFormat::Pcm16, _) => Codec::Pcm16(self.view.endian()),
                (SampleFormat::Pcm8, _) => Codec::Pcm8,
            };
            history = decode_block(raw, count, codec, out, block_lane)?;
        }
        Ok(())
    }

    pub fn decode_channel(&self, channel: u8) -> Result<Vec<i16>> {
        if channel >= self.info.channel_count {
            return Err(RsndError::NotFound(format!("channel {}", channel)));
        }
        let mut out = vec![0i16; self.sample_count()? as usize];
        self.decode_into(channel, &mut out, Lane::MONO)?;
        Ok(out)
    }

    /// Decodes the channels of `track`, interleaved in track order.
    pub fn decode_track(&self, track: usize) -> Result<DecodedWave> {
        let channels = &self
            .tracks
            .get(track)
            .ok_or_else(|| RsndError::NotFound(format!("track {}", track)))?
            .channels;
        let stride = channels.len();
        let mut samples = vec![0i16; self.sample_count()? as usize * stride];
        for (i, channel) in channels.iter().enumerate() {
            self.decode_into(*channel, &mut samples, Lane::channel(i, stride))?;
        }

        Ok(DecodedWave {
            sample_rate: self.info.sample_rate,
            channels: stride as u16,
            looped: self.info.looped,
            loop_start: self.info.loop_start,
            loop_end: self.info.loop_end,
            samples,
        })
    }
}

/// Blocks must hold the samples they claim and fit in the `available` data bytes.
fn check_geometry(info: &StreamInfo, available: usize, at: usize) -> Result<()> {
    if info.block_count == 0 {
        return Ok(());
    }

    let bytes = |count: u32| -> u64 {
        match info.format {
            SampleFormat::Pcm8 => count as u64,
            SampleFormat::Pcm16 => count as u64 * 2,
            SampleFormat::Adpcm => adpcm_bytes(count as usize) as u64,
        }
    };
    if bytes(info.block_samples) > info.block_size as u64
        || bytes(info.final_block_samples) > info.final_block_size as u64
    {
        return Err(RsndError::malformed(at, "stream block holds more samples than bytes"));
    }

    let channels = info.channel_count as u64;
    let span = (info.block_count as u64 - 1)
        .checked_mul(channels)
        .and_then(|s| s.checked_mul(info.block_size as u64))
        .and_then(|s| {
            let last = channels.saturating_sub(1) * info.final_block_padded_size as u64;
            s.checked_add(last)
        })
        .and_then(|s| s.checked_add(info.final_block_size as u64));
    match span {
        Some(span) if span <= available as u64 => Ok(()),
        _ => Err(RsndError::malformed(
            at,
            format!("stream blocks overrun {} bytes of sample data", available),
        )),
    }
}

fn read_tracks(view: &View<'_>, at: usize, base: usize) -> Result<Vec<StreamTrack>> {
    let count = view.u8(at)? as usize;
    let extended = match view.u8(at + 1)? {
        0 => false,
        1 => true,
        other => return Err(RsndError::Unsupported(format!("track info type {}", other))),
    };

    let mut tracks = Vec::with_capacity(count);
    for t in 0..count {
        let track = view.data_ref(at + 4 + t * DataRef::SIZE)?.require(base, "track info")?;
        let (mix, list) = if extended {
            (Some((view.u8(track)?, view.u8(track + 1)?)), track + 8)
        } else {
            (None, track)
        };
        let channel_count = view.u8(list)? as usize;
        let channels = view.bytes(list + 1, channel_count)?.to_vec();
        tracks.push(StreamTrack { mix, channels });
    }
    Ok(tracks)
}
