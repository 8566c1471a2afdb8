use crate::decode::*;
use crate::error::*;
use crate::formats::wave::WaveInfo;
use crate::region::*;
use crate::types::*;

/// An instrument bank (`RBNK`).
#[derive(Debug)]
pub struct SoundBank<'a> {
    pub header: FileHeader,
    /// Root region of every program.
    pub programs: Vec<Region>,
    /// Wave table; present when the bank embeds its own wave infos.
    pub waves: Option<Vec<WaveInfo>>,
    view: View<'a>,
}

impl<'a> SoundBank<'a> {
    pub const MAGIC: &'static [u8; 4] = b"RBNK";

    pub fn read(data: &'a [u8]) -> Result<Self> {
        let (header, view) = FileHeader::expect(data, Self::MAGIC)?;
        let data_block = Block::locate(&view, 0x10, b"DATA")?;

        let base = data_block.base();
        let programs = view.table(base, DataRef::SIZE, |at| {
            Region::read(&view, view.data_ref(at)?, base)
        })?;

        let waves = match view.offset(0x18)? {
            0 => None,
            _ => {
                let wave_block = Block::locate(&view, 0x18, b"WAVE")?;
                let wave_base = wave_block.base();
                let infos = view
                    .ref_table(wave_base, wave_base)?
                    .into_iter()
                    .enumerate()
                    .map(|(i, at)| match at {
                        Some(at) => WaveInfo::read(&view, at),
                        None => Err(RsndError::malformed(
                            wave_base,
                            format!("null reference to wave {}", i),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Some(infos)
            }
        };

        Ok(Self {
            header,
            programs,
            waves,
            view,
        })
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn program(&self, program: usize) -> Result<&Region> {
        self.programs
            .get(program)
            .ok_or_else(|| RsndError::NotFound(format!("program {}", program)))
    }

    /// Instrument played by `program` at `key` and `velocity`, if any.
    pub fn instrument_params(
        &self,
        program: usize,
        key: u8,
        velocity: u8,
    ) -> Result<Option<&InstrumentParams>> {
        self.program(program)?.resolve(&[key, velocity])
    }

    pub fn flatten_regions(&self, program: usize) -> Result<Vec<InstrumentRegion<'_>>> {
        Ok(self.program(program)?.flatten())
    }

    pub fn has_embedded_waves(&self) -> bool {
        self.waves.is_some()
    }

    pub fn wave_count(&self) -> usize {
        self.waves.as_ref().map_or(0, Vec::len)
    }

    /// Decodes embedded wave `index` from the sibling wave data.
    pub fn decode_wave(&self, index: usize, wave_data: &[u8]) -> Result<DecodedWave> {
        let info = self
            .waves
            .as_ref()
            .and_then(|waves| waves.get(index))
            .ok_or_else(|| RsndError::NotFound(format!("embedded wave {}", index)))?;
        decode_embedded(info, self.view.endian(), wave_data)
    }

    pub fn decode_waves(&self, wave_data: &[u8]) -> Result<Vec<DecodedWave>> {
        (0..self.wave_count())
            .map(|i| self.decode_wave(i, wave_data))
            .collect()
    }
}

/// Embedded waves store positions as DSP nibble addresses and place their
/// samples at `data_location` within the sibling wave data.
pub(crate) fn decode_embedded(info: &WaveInfo, endian: Endian, wave_data: &[u8]) -> Result<DecodedWave> {
    let frames = match info.format {
        SampleFormat::Adpcm => nibble_to_samples(info.loop_end),
        _ => info.loop_end,
    };
    info.decode(
        endian,
        wave_data,
        info.data_location as usize,
        frames as usize,
        SampleAddressing::Nibble,
    )
}
