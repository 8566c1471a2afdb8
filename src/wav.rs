use anyhow::{Context, Result};
use rsnd::DecodedWave;
use std::path::Path;

/// Writes interleaved PCM16 as a WAV file.
pub fn write_wave(path: &Path, wave: &DecodedWave) -> Result<()> {
    let spec = hound::WavSpec {
        channels: wave.channels.max(1),
        sample_rate: wave.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &sample in &wave.samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("failed to finish {}", path.display()))?;

    tracing::debug!(
        "wrote {} ({} frames, {} Hz)",
        path.display(),
        wave.frames(),
        wave.sample_rate
    );
    Ok(())
}
