//! Prints the contents of a container.

use anyhow::{Context, Result};
use clap::Args;
use rsnd::{
    FileFormat, Region, SoundArchive, SoundBank, SoundKind, SoundSequence, SoundStream, SoundWave,
    SoundWaveArchive, SoundWsd,
};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Default, Args)]
pub struct ListArgs {
    /// Container to list
    pub input: PathBuf,

    /// List the groups of an archive
    #[arg(long)]
    pub groups: bool,

    /// List the banks of an archive
    #[arg(long)]
    pub banks: bool,

    /// List the sounds of an archive
    #[arg(long)]
    pub sounds: bool,
}

pub fn execute(args: ListArgs) -> Result<()> {
    let data = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let stdout = io::stdout();
    list(&data, &args, &mut stdout.lock())
}

/// Writes the listing of `data` to `out`.
pub fn list<W: Write>(data: &[u8], args: &ListArgs, out: &mut W) -> Result<()> {
    let format = FileFormat::detect(data).context("not a known container")?;
    match format {
        FileFormat::Archive => list_archive(&SoundArchive::read(data)?, args, out),
        FileFormat::Bank => list_bank(&SoundBank::read(data)?, out),
        FileFormat::Sequence => {
            let seq = SoundSequence::read(data)?;
            writeln!(out, "Label count: {}", seq.labels.len())?;
            for (i, label) in seq.labels.iter().enumerate() {
                writeln!(out, "{}) {}, offset: {}", i, label.name, label.offset)?;
            }
            Ok(())
        }
        FileFormat::Stream => {
            let stream = SoundStream::read(data)?;
            writeln!(out, "Track count: {}", stream.track_count())?;
            writeln!(out, "Sample rate: {}", stream.info.sample_rate)?;
            writeln!(out, "Sample count: {}", stream.sample_count()?)?;
            writeln!(out, "Sample format: {}", stream.info.format.name())?;
            for (i, track) in stream.tracks.iter().enumerate() {
                writeln!(out, "Track {}", i)?;
                writeln!(out, "\t# channels: {}", track.channels.len())?;
            }
            Ok(())
        }
        FileFormat::Wave => {
            let wave = SoundWave::read(data)?;
            writeln!(out, "Channel count: {}", wave.channel_count())?;
            writeln!(out, "Sample rate: {}", wave.sample_rate())?;
            writeln!(out, "Sample count: {}", wave.sample_count())?;
            writeln!(out, "Sample format: {}", wave.info.format.name())?;
            Ok(())
        }
        FileFormat::WaveArchive => {
            let archive = SoundWaveArchive::read(data)?;
            writeln!(out, "WAVE count: {}", archive.wave_count())?;
            Ok(())
        }
        FileFormat::Wsd => {
            let wsd = SoundWsd::read(data)?;
            writeln!(out, "Sound count: {}", wsd.sound_count())?;
            for (i, sound) in wsd.sounds.iter().enumerate() {
                writeln!(out, "\t{}) {} tracks", i, sound.tracks.len())?;
            }
            if !wsd.has_embedded_waves() {
                writeln!(out, "WSD file does not embed any WAVE info")?;
            }
            Ok(())
        }
    }
}

fn list_archive<W: Write>(rsar: &SoundArchive<'_>, args: &ListArgs, out: &mut W) -> Result<()> {
    if !(args.groups || args.banks || args.sounds) {
        writeln!(
            out,
            "At least one of --groups, --banks, or --sounds must be specified for archives"
        )?;
        return Ok(());
    }

    if args.groups {
        for group in &rsar.groups {
            writeln!(out, "{}", rsar.string(group.name_index).unwrap_or("<anonymous group>"))?;
        }
    }

    if args.banks {
        for (i, bank) in rsar.banks.iter().enumerate() {
            let name = rsar.name(bank.name_index).unwrap_or("<anonymous bank>");
            writeln!(out, "{}) {}", i, name)?;
            list_placements(rsar, bank.file_index as usize, out)?;
        }
    }

    if args.sounds {
        for (i, sound) in rsar.sounds.iter().enumerate() {
            let name = match rsar.name(sound.name_index) {
                Some(name) => name,
                None => {
                    writeln!(out, "{}) <anonymous sound>", i)?;
                    list_placements(rsar, sound.file_index as usize, out)?;
                    continue;
                }
            };
            let description = match sound.kind {
                SoundKind::Sequence { offset, bank, .. } => {
                    let bank = rsar
                        .banks
                        .get(bank as usize)
                        .and_then(|b| rsar.name(b.name_index))
                        .unwrap_or("<anonymous bank>");
                    format!("off: {}, {}", offset, bank)
                }
                SoundKind::Stream { start_position, .. } => format!("+{}", start_position),
                SoundKind::Wave { index, .. } => format!("#{}", index),
                SoundKind::Unknown(_) => String::new(),
            };
            writeln!(out, "{}) {} | {} | {}", i, name, sound.kind.name(), description)?;
            list_placements(rsar, sound.file_index as usize, out)?;
        }
    }
    Ok(())
}

/// Where the archive stores `file`: an external path or `group:item` pairs.
fn list_placements<W: Write>(rsar: &SoundArchive<'_>, file: usize, out: &mut W) -> Result<()> {
    let info = match rsar.file(file) {
        Ok(info) => info,
        Err(e) => {
            writeln!(out, "\t<{}>", e)?;
            return Ok(());
        }
    };

    if let Some(path) = &info.external_name {
        writeln!(out, "\t{}", path)?;
        return Ok(());
    }
    for place in &info.placements {
        let group = rsar
            .groups
            .get(place.group as usize)
            .and_then(|g| rsar.string(g.name_index))
            .unwrap_or("<anonymous group>");
        writeln!(out, "\t{}:{}", group, place.item)?;
    }
    Ok(())
}

fn list_bank<W: Write>(bank: &SoundBank<'_>, out: &mut W) -> Result<()> {
    writeln!(out, "Program count: {}", bank.program_count())?;
    for (i, program) in bank.programs.iter().enumerate() {
        writeln!(out, "Program {}", i)?;
        list_region(program, 1, out)?;
    }
    if bank.has_embedded_waves() {
        writeln!(out, "Embedded WAVE count: {}", bank.wave_count())?;
    } else {
        writeln!(out, "Bank file does not embed any WAVE files")?;
    }
    Ok(())
}

fn list_region<W: Write>(region: &Region, depth: usize, out: &mut W) -> io::Result<()> {
    let indent = "    ".repeat(depth);
    match region {
        Region::Direct(params) => writeln!(out, "{}sample #: {}", indent, params.wave_index),
        Region::Range(children) => {
            for (hi, child) in children {
                writeln!(out, "{}range: up to {}", indent, hi)?;
                list_region(child, depth + 1, out)?;
            }
            Ok(())
        }
        Region::Index { min, children, .. } => {
            for (i, child) in children.iter().enumerate() {
                writeln!(out, "{}index {}", indent, *min as usize + i)?;
                list_region(child, depth + 1, out)?;
            }
            Ok(())
        }
        Region::None => writeln!(out, "{}sample: none", indent),
    }
}
