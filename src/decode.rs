//! Conversion of single containers to WAV, MIDI and SoundFont files.

use crate::wav::write_wave;
use anyhow::{bail, Context, Result};
use clap::Args;
use rseq::{Converter, NoteMode};
use rsnd::{
    DecodedWave, FileFormat, SoundBank, SoundSequence, SoundStream, SoundWave, SoundWaveArchive,
};
use sf2::SoundFont;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Container to decode (brwav, brstm, brseq, brbnk or brwar)
    pub input: PathBuf,

    /// Output file, or directory for multi-file results
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sequence label to start from
    #[arg(long)]
    pub label: Option<String>,

    /// Extend sounding notes instead of striking them again
    #[arg(long)]
    pub continue_notes: bool,

    /// Wave data for a bank (an RWAR, or the raw data of embedded waves)
    #[arg(long)]
    pub waves: Option<PathBuf>,
}

impl DecodeArgs {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            label: None,
            continue_notes: false,
            waves: None,
        }
    }

    fn note_mode(&self) -> NoteMode {
        if self.continue_notes {
            NoteMode::Continue
        } else {
            NoteMode::Retrigger
        }
    }

    fn output_or(&self, extension: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension(extension))
    }
}

pub fn execute(args: DecodeArgs) -> Result<()> {
    let data = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let format = FileFormat::detect(&data)
        .with_context(|| format!("{} is not a known container", args.input.display()))?;

    match format {
        FileFormat::Wave => {
            let wave = SoundWave::read(&data)?.decode()?;
            write_wave(&args.output_or("wav"), &wave)
        }
        FileFormat::Stream => decode_stream(&args, &data),
        FileFormat::Sequence => {
            let midi = sequence_to_midi(&data, args.label.as_deref(), None, args.note_mode())?;
            write_file(&args.output_or("mid"), &midi)
        }
        FileFormat::Bank => {
            let waves_path = args
                .waves
                .as_ref()
                .context("decoding a bank needs its wave data (--waves)")?;
            let wave_data = fs::read(waves_path)
                .with_context(|| format!("failed to read {}", waves_path.display()))?;
            let name = args
                .input
                .file_stem()
                .map_or_else(|| "bank".into(), |s| s.to_string_lossy());
            let sf2 = bank_to_soundfont(&data, &wave_data, &name)?;
            write_file(&args.output_or("sf2"), &sf2)
        }
        FileFormat::WaveArchive => {
            let dir = args.output_or("d");
            fs::create_dir_all(&dir)?;
            let archive = SoundWaveArchive::read(&data)?;
            for (i, wave) in archive.waves().enumerate() {
                let wave = wave?;
                if wave.is_empty() {
                    continue;
                }
                let decoded = SoundWave::read(wave)
                    .and_then(|w| w.decode())
                    .with_context(|| format!("wave {}", i))?;
                write_wave(&dir.join(format!("{}.wav", i)), &decoded)?;
            }
            Ok(())
        }
        other => bail!("{} files cannot be decoded", other),
    }
}

fn decode_stream(args: &DecodeArgs, data: &[u8]) -> Result<()> {
    let stream = SoundStream::read(data)?;
    match stream.track_count() {
        0 => bail!("{} has no tracks", args.input.display()),
        1 => write_wave(&args.output_or("wav"), &stream.decode_track(0)?),
        tracks => {
            let dir = args.output_or("d");
            fs::create_dir_all(&dir)?;
            for track in 0..tracks {
                let wave = stream
                    .decode_track(track)
                    .with_context(|| format!("track {}", track))?;
                write_wave(&dir.join(format!("{}.wav", track)), &wave)?;
            }
            Ok(())
        }
    }
}

/// Converts a sequence file to MIDI bytes, from `label` or `entry` if given.
///
/// Tracks that fail are logged and kept up to the failing instruction.
pub fn sequence_to_midi(
    data: &[u8],
    label: Option<&str>,
    entry: Option<u32>,
    mode: NoteMode,
) -> Result<Vec<u8>> {
    let seq = SoundSequence::read(data)?;
    let mut converter = Converter::for_sequence(&seq, label)?.note_mode(mode);
    if let Some(entry) = entry {
        converter = converter.entry(entry);
    }

    let conversion = converter.convert();
    for error in &conversion.errors {
        tracing::warn!("{}", error);
    }
    Ok(conversion.midi.to_bytes())
}

/// Decodes every wave a bank can play from its wave data.
pub fn bank_waves(bank: &SoundBank<'_>, wave_data: &[u8]) -> Result<Vec<DecodedWave>> {
    if bank.has_embedded_waves() {
        return Ok(bank.decode_waves(wave_data)?);
    }

    let archive = SoundWaveArchive::read(wave_data)?;
    archive
        .waves()
        .enumerate()
        .map(|(i, wave)| -> Result<DecodedWave> {
            let wave = wave?;
            if wave.is_empty() {
                tracing::debug!("bank wave {} is empty", i);
                return Ok(silent_wave());
            }
            let decoded = SoundWave::read(wave).and_then(|w| w.decode());
            decoded.with_context(|| format!("bank wave {}", i))
        })
        .collect()
}

/// Stands in for null wave archive entries so wave indices stay aligned.
fn silent_wave() -> DecodedWave {
    DecodedWave {
        sample_rate: 32000,
        channels: 1,
        looped: false,
        loop_start: 0,
        loop_end: 0,
        samples: Vec::new(),
    }
}

pub fn bank_to_soundfont(data: &[u8], wave_data: &[u8], name: &str) -> Result<Vec<u8>> {
    let bank = SoundBank::read(data)?;
    let waves = bank_waves(&bank, wave_data)?;
    Ok(SoundFont::from_bank(&bank, &waves, name)?.to_bytes())
}

pub(crate) fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}
