//! Unpacks archives and wave archives into directories.

use crate::decode::{bank_to_soundfont, sequence_to_midi, write_file};
use crate::wav::write_wave;
use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use rseq::NoteMode;
use rsnd::format::extension_for;
use rsnd::{FileFormat, SoundArchive, SoundKind, SoundWave, SoundWaveArchive, SoundWsd};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Style {
    /// One directory per group, one subdirectory per item
    #[default]
    Groups,
    /// One file per named sound
    Sounds,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Archive (brsar) or wave archive (brwar) to extract
    pub input: PathBuf,

    /// Output directory; defaults to the input with a `.d` extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Style::Groups)]
    pub style: Style,

    /// Also convert what can be converted (waves, sequences, banks)
    #[arg(long)]
    pub decode: bool,

    /// Split wave archives found in groups into their waves
    #[arg(long)]
    pub extract_rwar: bool,

    /// Extend sounding notes instead of striking them again
    #[arg(long)]
    pub continue_notes: bool,
}

impl ExtractArgs {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            style: Style::Groups,
            decode: false,
            extract_rwar: false,
            continue_notes: false,
        }
    }

    fn note_mode(&self) -> NoteMode {
        if self.continue_notes {
            NoteMode::Continue
        } else {
            NoteMode::Retrigger
        }
    }
}

pub fn execute(args: ExtractArgs) -> Result<()> {
    let data = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let out = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("d"));

    match FileFormat::detect(&data) {
        Some(FileFormat::Archive) => {
            let rsar = SoundArchive::read(&data)?;
            match args.style {
                Style::Groups => extract_groups(&rsar, &out, &args),
                Style::Sounds => extract_sounds(&rsar, &out, &args),
            }
        }
        Some(FileFormat::WaveArchive) => extract_rwar(&data, &out, args.decode),
        _ => bail!("{} is not an archive", args.input.display()),
    }
}

fn extract_groups(rsar: &SoundArchive<'_>, out: &Path, args: &ExtractArgs) -> Result<()> {
    for (i, group) in rsar.groups.iter().enumerate() {
        if group.is_external() {
            tracing::info!("skipping external group {}", i);
            continue;
        }
        let name = rsar.string(group.name_index).unwrap_or("_anonymous_group_");
        let dir = out.join(sanitize(name));
        tracing::info!("extracting group {} to {}", i, dir.display());

        for item in 0..group.items.len() {
            let item_dir = dir.join(item.to_string());
            if let Err(e) = extract_item(rsar, i, item, &item_dir, args) {
                tracing::error!("group {} item {}: {:#}", name, item, e);
            }
        }
    }
    Ok(())
}

fn extract_item(
    rsar: &SoundArchive<'_>,
    group: usize,
    item: usize,
    dir: &Path,
    args: &ExtractArgs,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let file = rsar.group_file(group, item)?;
    let wave_data = rsar.group_wave_data(group, item)?;
    let format = FileFormat::detect(file);

    write_file(&dir.join(format!("file.{}", extension_for(file))), file)?;

    if args.decode {
        match format {
            Some(FileFormat::Bank) => {
                let sf2 = bank_to_soundfont(file, wave_data, "soundfont")?;
                write_file(&dir.join("soundfont.sf2"), &sf2)?;
            }
            Some(FileFormat::Sequence) => {
                let midi = sequence_to_midi(file, None, None, args.note_mode())?;
                write_file(&dir.join("file.mid"), &midi)?;
            }
            Some(FileFormat::Wsd) if !wave_data.is_empty() => {
                let wsd = SoundWsd::read(file)?;
                if wsd.has_embedded_waves() {
                    let wave_dir = dir.join("wave");
                    fs::create_dir_all(&wave_dir)?;
                    for k in 0..wsd.wave_count(wave_data)? {
                        let wave = wsd.decode_wave(k, wave_data)?;
                        write_wave(&wave_dir.join(format!("{}.wav", k)), &wave)?;
                    }
                }
            }
            _ => {}
        }
    }

    if FileFormat::detect(wave_data) == Some(FileFormat::WaveArchive) {
        let rwar = dir.join("wave.brwar");
        write_file(&rwar, wave_data)?;
        if args.extract_rwar {
            // bank waves already went into the soundfont
            let decode = args.decode && format != Some(FileFormat::Bank);
            extract_rwar(wave_data, &rwar.with_extension("brwar.d"), decode)?;
        }
    }
    Ok(())
}

fn extract_sounds(rsar: &SoundArchive<'_>, out: &Path, args: &ExtractArgs) -> Result<()> {
    fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;

    for (i, sound) in rsar.sounds.iter().enumerate() {
        let name = match rsar.name(sound.name_index) {
            Some(name) => sanitize(name),
            None => {
                tracing::debug!("skipping anonymous sound {}", i);
                continue;
            }
        };
        let file = match rsar.file_data(sound.file_index as usize) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("sound {}: {}", name, e);
                continue;
            }
        };

        let path = out.join(format!("{}.{}", name, extension_for(file)));
        if let Err(e) = write_file(&path, file) {
            tracing::error!("{:#}", e);
            continue;
        }

        if let (true, SoundKind::Sequence { offset, .. }) = (args.decode, sound.kind) {
            let midi = sequence_to_midi(file, None, Some(offset), args.note_mode())
                .and_then(|midi| write_file(&out.join(format!("{}.mid", name)), &midi));
            if let Err(e) = midi {
                tracing::error!("sound {}: {:#}", name, e);
            }
        }
    }
    Ok(())
}

/// Writes every entry of a wave archive as `<i>.brwav`, plus `<i>.wav` when decoding.
pub fn extract_rwar(data: &[u8], out: &Path, decode: bool) -> Result<()> {
    let archive = SoundWaveArchive::read(data)?;
    fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;

    for (i, wave) in archive.waves().enumerate() {
        let wave = wave?;
        if wave.is_empty() {
            tracing::debug!("wave {} is empty", i);
            continue;
        }
        write_file(&out.join(format!("{}.brwav", i)), wave)?;
        if decode {
            let decoded = SoundWave::read(wave).and_then(|w| w.decode());
            match decoded {
                Ok(decoded) => write_wave(&out.join(format!("{}.wav", i)), &decoded)?,
                Err(e) => tracing::error!("wave {}: {}", i, e),
            }
        }
    }
    Ok(())
}

/// Keeps names usable as file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize("SE/HIT:01"), "SE_HIT_01");
        assert_eq!(sanitize("BGM_MAIN"), "BGM_MAIN");
    }
}
