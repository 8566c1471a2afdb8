use crate::envelope::{self, Envelope};
use crate::error::*;
use crate::riff::Chunk;
use byteorder::{WriteBytesExt, LE};
use rsnd::{DecodedWave, InstrumentRegion, SoundBank};
use std::convert::TryFrom;
use std::io::{self, Write};

/// Silent frames after every sample.
pub const SAMPLE_PADDING: usize = 46;
/// Root key of samples no zone refers to.
pub const DEFAULT_ROOT_KEY: u8 = 60;

pub const PHDR_SIZE: usize = 38;
pub const BAG_SIZE: usize = 4;
pub const MOD_SIZE: usize = 10;
pub const GEN_SIZE: usize = 4;
pub const INST_SIZE: usize = 22;
pub const SHDR_SIZE: usize = 46;

/// Generator operators.
pub mod gen {
    pub const PAN: u16 = 17;
    pub const REVERB_EFFECTS_SEND: u16 = 16;
    pub const ATTACK_VOL_ENV: u16 = 34;
    pub const HOLD_VOL_ENV: u16 = 35;
    pub const DECAY_VOL_ENV: u16 = 36;
    pub const SUSTAIN_VOL_ENV: u16 = 37;
    pub const RELEASE_VOL_ENV: u16 = 38;
    pub const INSTRUMENT: u16 = 41;
    pub const KEY_RANGE: u16 = 43;
    pub const VEL_RANGE: u16 = 44;
    pub const INITIAL_ATTENUATION: u16 = 48;
    pub const SAMPLE_ID: u16 = 53;
    pub const SAMPLE_MODES: u16 = 54;
    pub const OVERRIDING_ROOT_KEY: u16 = 58;
}

const MONO_SAMPLE: u16 = 1;

/// A SoundFont 2.01 bank: one preset and one instrument per program.
#[derive(Clone, Debug)]
pub struct SoundFont {
    root: Chunk,
}

impl SoundFont {
    pub fn from_bank(bank: &SoundBank<'_>, waves: &[DecodedWave], name: &str) -> Result<Self> {
        let programs = (0..bank.program_count())
            .map(|i| bank.flatten_regions(i))
            .collect::<rsnd::Result<Vec<_>>>()?;
        Self::from_programs(&programs, waves, name)
    }

    /// Builds the bank from each program's flattened regions and the waves
    /// their `wave_index` points into.
    pub fn from_programs(
        programs: &[Vec<InstrumentRegion<'_>>],
        waves: &[DecodedWave],
        name: &str,
    ) -> Result<Self> {
        for (program, regions) in programs.iter().enumerate() {
            for region in regions {
                let wave = region.params.wave_index;
                if wave < 0 || wave as usize >= waves.len() {
                    return Err(Sf2Error::MissingWave { program, wave });
                }
            }
        }

        let zones: usize = programs.iter().map(Vec::len).sum();
        check_count("programs", programs.len())?;
        check_count("waves", waves.len())?;
        check_count("zones", zones)?;
        check_count("generators", zones * 12)?;

        let (smpl, shdr) = samples(programs, waves)?;
        let pdta = Chunk::list(
            b"pdta",
            vec![
                Chunk::data(b"phdr", presets(programs.len())?),
                Chunk::data(b"pbag", preset_bags(programs.len())?),
                Chunk::data(b"pmod", vec![0; MOD_SIZE]),
                Chunk::data(b"pgen", preset_generators(programs.len())?),
                Chunk::data(b"inst", instruments(programs)?),
                Chunk::data(b"ibag", instrument_bags(programs)?),
                Chunk::data(b"imod", vec![0; MOD_SIZE]),
                Chunk::data(b"igen", instrument_generators(programs, waves)?),
                Chunk::data(b"shdr", shdr),
            ],
        );

        let root = Chunk::riff(
            b"sfbk",
            vec![
                info(name)?,
                Chunk::list(b"sdta", vec![Chunk::data(b"smpl", smpl)]),
                pdta,
            ],
        );
        log::debug!(
            "soundfont {:?}: {} presets, {} zones, {} samples",
            name,
            programs.len(),
            zones,
            waves.len()
        );
        Ok(Self { root })
    }

    pub fn chunk(&self) -> &Chunk {
        &self.root
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<()> {
        self.root.write(&mut w)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.root.to_bytes()
    }
}

fn check_count(what: &'static str, count: usize) -> Result<()> {
    if count >= u16::MAX as usize {
        return Err(Sf2Error::TooMany { what, count });
    }
    Ok(())
}

fn info(name: &str) -> io::Result<Chunk> {
    let mut ifil = Vec::new();
    ifil.write_u16::<LE>(2)?;
    ifil.write_u16::<LE>(1)?;
    Ok(Chunk::list(
        b"INFO",
        vec![
            Chunk::data(b"ifil", ifil),
            Chunk::string(b"isng", "EMU8000"),
            Chunk::string(b"INAM", name),
            Chunk::string(
                b"ISFT",
                concat!("rsndtools ", env!("CARGO_PKG_VERSION")),
            ),
        ],
    ))
}

fn write_name<W: Write>(w: &mut W, name: &str) -> io::Result<()> {
    let mut field = [0u8; 20];
    let bytes = name.as_bytes();
    let len = bytes.len().min(19);
    field[..len].copy_from_slice(&bytes[..len]);
    w.write_all(&field)
}

fn write_bag<W: Write>(w: &mut W, first_gen: usize) -> io::Result<()> {
    w.write_u16::<LE>(first_gen as u16)?;
    w.write_u16::<LE>(0)
}

fn write_gen<W: Write>(w: &mut W, oper: u16, amount: i16) -> io::Result<()> {
    w.write_u16::<LE>(oper)?;
    w.write_i16::<LE>(amount)
}

fn write_range<W: Write>(w: &mut W, oper: u16, lo: u8, hi: u8) -> io::Result<()> {
    w.write_u16::<LE>(oper)?;
    w.write_u8(lo)?;
    w.write_u8(hi)
}

fn presets(count: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((count + 1) * PHDR_SIZE);
    for i in 0..=count {
        let name = if i < count {
            format!("instr{}", i)
        } else {
            "EOP".to_string()
        };
        write_name(&mut buf, &name)?;
        buf.write_u16::<LE>(if i < count { i as u16 } else { 0 })?;
        // bank
        buf.write_u16::<LE>(0)?;
        buf.write_u16::<LE>(i as u16)?;
        // library, genre, morphology
        buf.write_u32::<LE>(0)?;
        buf.write_u32::<LE>(0)?;
        buf.write_u32::<LE>(0)?;
    }
    Ok(buf)
}

const PRESET_GENERATORS: usize = 2;

fn preset_bags(count: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((count + 1) * BAG_SIZE);
    for i in 0..=count {
        write_bag(&mut buf, i * PRESET_GENERATORS)?;
    }
    Ok(buf)
}

fn preset_generators(count: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((count * PRESET_GENERATORS + 1) * GEN_SIZE);
    for i in 0..count {
        write_gen(&mut buf, gen::REVERB_EFFECTS_SEND, 0)?;
        write_gen(&mut buf, gen::INSTRUMENT, i as i16)?;
    }
    write_gen(&mut buf, 0, 0)?;
    Ok(buf)
}

fn instruments(programs: &[Vec<InstrumentRegion<'_>>]) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((programs.len() + 1) * INST_SIZE);
    let mut zone = 0;
    for (i, regions) in programs.iter().enumerate() {
        write_name(&mut buf, &format!("instr{}", i))?;
        buf.write_u16::<LE>(zone as u16)?;
        zone += regions.len();
    }
    write_name(&mut buf, "EOI")?;
    buf.write_u16::<LE>(zone as u16)?;
    Ok(buf)
}

/// Generators written for a zone; the velocity range is left out when unset.
fn zone_generators(region: &InstrumentRegion<'_>) -> usize {
    if region.vel_hi != 0 {
        12
    } else {
        11
    }
}

fn instrument_bags(programs: &[Vec<InstrumentRegion<'_>>]) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut gens = 0;
    for region in programs.iter().flatten() {
        write_bag(&mut buf, gens)?;
        gens += zone_generators(region);
    }
    write_bag(&mut buf, gens)?;
    Ok(buf)
}

fn instrument_generators(
    programs: &[Vec<InstrumentRegion<'_>>],
    waves: &[DecodedWave],
) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for region in programs.iter().flatten() {
        let params = region.params;
        let wave_index = params.wave_index as usize;
        let looped = waves.get(wave_index).map_or(false, |w| w.looped);
        let env = Envelope::from_params(params);

        write_range(&mut buf, gen::KEY_RANGE, region.key_lo, region.key_hi)?;
        if region.vel_hi != 0 {
            write_range(&mut buf, gen::VEL_RANGE, region.vel_lo, region.vel_hi)?;
        }
        write_gen(
            &mut buf,
            gen::INITIAL_ATTENUATION,
            envelope::attenuation(params.volume),
        )?;
        write_gen(&mut buf, gen::PAN, envelope::pan(params.pan))?;
        write_gen(&mut buf, gen::SAMPLE_MODES, looped as i16)?;
        write_gen(&mut buf, gen::OVERRIDING_ROOT_KEY, params.original_key as i16)?;
        write_gen(&mut buf, gen::ATTACK_VOL_ENV, envelope::timecents(env.attack))?;
        write_gen(&mut buf, gen::HOLD_VOL_ENV, envelope::timecents(env.hold))?;
        write_gen(&mut buf, gen::DECAY_VOL_ENV, envelope::timecents(env.decay))?;
        write_gen(&mut buf, gen::SUSTAIN_VOL_ENV, env.sustain_attenuation())?;
        write_gen(&mut buf, gen::RELEASE_VOL_ENV, envelope::timecents(env.release))?;
        write_gen(&mut buf, gen::SAMPLE_ID, wave_index as i16)?;
    }
    write_gen(&mut buf, 0, 0)?;
    Ok(buf)
}

/// End of a sample of `frames` frames placed at `start`, and where the next one begins.
fn sample_span(start: u32, frames: usize) -> Result<(u32, u32)> {
    let too_many = || Sf2Error::TooMany {
        what: "sample frames",
        count: (start as usize).saturating_add(frames).saturating_add(SAMPLE_PADDING),
    };
    let end = u32::try_from(frames)
        .ok()
        .and_then(|len| start.checked_add(len))
        .ok_or_else(too_many)?;
    let next = end
        .checked_add(SAMPLE_PADDING as u32)
        .ok_or_else(too_many)?;
    Ok((end, next))
}

/// The `smpl` payload and the matching sample headers.
fn samples(
    programs: &[Vec<InstrumentRegion<'_>>],
    waves: &[DecodedWave],
) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut smpl = Vec::new();
    let mut shdr = Vec::with_capacity((waves.len() + 1) * SHDR_SIZE);
    let mut start = 0u32;

    for (i, wave) in waves.iter().enumerate() {
        if wave.channels > 1 {
            log::debug!("wave {} has {} channels, keeping the first", i, wave.channels);
        }
        let frames = wave.channel(0);
        for &sample in &frames {
            smpl.write_i16::<LE>(sample)?;
        }
        smpl.resize(smpl.len() + SAMPLE_PADDING * 2, 0);

        let root_key = programs
            .iter()
            .flatten()
            .find(|region| region.params.wave_index as usize == i)
            .map_or(DEFAULT_ROOT_KEY, |region| region.params.original_key);

        let (end, next) = sample_span(start, frames.len())?;
        let len = end - start;
        write_name(&mut shdr, &format!("wav{}", i))?;
        shdr.write_u32::<LE>(start)?;
        shdr.write_u32::<LE>(end)?;
        shdr.write_u32::<LE>(start + wave.loop_start.min(len))?;
        shdr.write_u32::<LE>(start + wave.loop_end.min(len))?;
        shdr.write_u32::<LE>(wave.sample_rate)?;
        shdr.write_u8(root_key)?;
        // pitch correction
        shdr.write_i8(0)?;
        // sample link
        shdr.write_u16::<LE>(0)?;
        shdr.write_u16::<LE>(MONO_SAMPLE)?;

        start = next;
    }

    write_name(&mut shdr, "EOS")?;
    shdr.resize(shdr.len() + SHDR_SIZE - 20, 0);
    Ok((smpl, shdr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_spans_include_padding() {
        assert_eq!(sample_span(0, 10).unwrap(), (10, 56));
        assert_eq!(sample_span(56, 0).unwrap(), (56, 102));
    }

    #[test]
    fn sample_offsets_past_u32_are_rejected() {
        assert!(matches!(
            sample_span(u32::MAX - 4, 8),
            Err(Sf2Error::TooMany { what: "sample frames", .. })
        ));
        assert!(matches!(
            sample_span(u32::MAX - 20, 8),
            Err(Sf2Error::TooMany { .. })
        ));
    }
}
