use crate::decode::DecodedWave;
use crate::error::*;
use crate::formats::bank::decode_embedded;
use crate::formats::wave::{SoundWave, WaveInfo};
use crate::formats::wave_archive::SoundWaveArchive;
use crate::region::InstrumentParams;
use crate::types::*;

#[derive(Clone, Debug, PartialEq)]
pub struct WsdInfo {
    pub pitch: f32,
    pub pan: u8,
    pub surround_pan: u8,
    pub fx_send: [u8; 3],
    pub main_send: i8,
}

impl WsdInfo {
    fn read(view: &View<'_>, at: usize) -> Result<Self> {
        let b = view.bytes(at + 4, 6)?;
        Ok(Self {
            pitch: view.f32(at)?,
            pan: b[0],
            surround_pan: b[1],
            fx_send: [b[2], b[3], b[4]],
            main_send: b[5] as i8,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NoteEvent {
    pub position: f32,
    pub length: f32,
    pub note_index: u32,
}

/// One entry of the data block: a short sound built from note events.
#[derive(Clone, Debug, PartialEq)]
pub struct Wsd {
    pub info: Option<WsdInfo>,
    pub tracks: Vec<Vec<NoteEvent>>,
    pub notes: Vec<InstrumentParams>,
}

/// Where the samples played by a wave-sound-data file live.
#[derive(Clone, Debug, PartialEq)]
pub enum WaveSource {
    /// Old layout: wave infos are embedded, samples sit in the sibling data.
    Embedded(Vec<WaveInfo>),
    /// New layout: note wave indices select `RWAV`s of a sibling wave archive.
    Archive,
}

/// A wave-sound-data file (`RWSD`).
#[derive(Debug)]
pub struct SoundWsd<'a> {
    pub header: FileHeader,
    pub sounds: Vec<Wsd>,
    pub waves: WaveSource,
    view: View<'a>,
}

impl<'a> SoundWsd<'a> {
    pub const MAGIC: &'static [u8; 4] = b"RWSD";
    /// First version whose waves moved out into a wave archive.
    pub const ARCHIVE_WAVES_VERSION: u16 = 0x0103;

    pub fn read(data: &'a [u8]) -> Result<Self> {
        let (header, view) = FileHeader::expect(data, Self::MAGIC)?;
        let data_block = Block::locate(&view, 0x10, b"DATA")?;
        let base = data_block.base();

        let sounds = view
            .ref_table(base, base)?
            .into_iter()
            .map(|at| match at {
                Some(at) => read_wsd(&view, at, base),
                None => Ok(Wsd {
                    info: None,
                    tracks: Vec::new(),
                    notes: Vec::new(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        let wave_offset = view.offset(0x18)?;
        let waves = if header.version < Self::ARCHIVE_WAVES_VERSION && wave_offset != 0 {
            let wave_block = Block::locate(&view, 0x18, b"WAVE")?;
            let wave_base = wave_block.base();
            let infos = view.table(wave_base, 4, |at| {
                WaveInfo::read(&view, wave_base + view.offset(at)?)
            })?;
            WaveSource::Embedded(infos)
        } else {
            WaveSource::Archive
        };

        Ok(Self {
            header,
            sounds,
            waves,
            view,
        })
    }

    pub fn sound_count(&self) -> usize {
        self.sounds.len()
    }

    pub fn sound(&self, index: usize) -> Result<&Wsd> {
        self.sounds
            .get(index)
            .ok_or_else(|| RsndError::NotFound(format!("wave sound {}", index)))
    }

    /// Parameters of note `note` in sound `sound`.
    pub fn note(&self, sound: usize, note: usize) -> Result<&InstrumentParams> {
        self.sound(sound)?
            .notes
            .get(note)
            .ok_or_else(|| RsndError::NotFound(format!("note {} of wave sound {}", note, sound)))
    }

    pub fn has_embedded_waves(&self) -> bool {
        matches!(self.waves, WaveSource::Embedded(_))
    }

    /// Embedded wave count, or the number of waves in the sibling archive.
    pub fn wave_count(&self, wave_data: &[u8]) -> Result<usize> {
        match &self.waves {
            WaveSource::Embedded(infos) => Ok(infos.len()),
            WaveSource::Archive => Ok(SoundWaveArchive::read(wave_data)?.wave_count()),
        }
    }

    /// Decodes wave `index`, whichever layout the file uses.
    pub fn decode_wave(&self, index: usize, wave_data: &[u8]) -> Result<DecodedWave> {
        match &self.waves {
            WaveSource::Embedded(infos) => {
                let info = infos
                    .get(index)
                    .ok_or_else(|| RsndError::NotFound(format!("embedded wave {}", index)))?;
                decode_embedded(info, self.view.endian(), wave_data)
            }
            WaveSource::Archive => {
                let archive = SoundWaveArchive::read(wave_data)?;
                SoundWave::read(archive.wave(index)?)?.decode()
            }
        }
    }
}

fn read_wsd(view: &View<'_>, at: usize, base: usize) -> Result<Wsd> {
    let info = match view.data_ref(at)?.resolve(base) {
        Some(info) => Some(WsdInfo::read(view, info)?),
        None => None,
    };

    let mut tracks = Vec::new();
    if let Some(table) = view.data_ref(at + 8)?.resolve(base) {
        for track in view.ref_table(table, base)? {
            let events = match track {
                Some(track) => match view.data_ref(track)?.resolve(base) {
                    Some(events) => view
                        .ref_table(events, base)?
                        .into_iter()
                        .flatten()
                        .map(|event| {
                            Ok(NoteEvent {
                                position: view.f32(event)?,
                                length: view.f32(event + 4)?,
                                note_index: view.u32(event + 8)?,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    None => Vec::new(),
                },
                None => Vec::new(),
            };
            tracks.push(events);
        }
    }

    let notes = match view.data_ref(at + 16)?.resolve(base) {
        Some(table) => view
            .ref_table(table, base)?
            .into_iter()
            .flatten()
            .map(|note| InstrumentParams::read(view, note))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(Wsd {
        info,
        tracks,
        notes,
    })
}
