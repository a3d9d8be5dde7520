//! WAV output for reconstructed signals

use crate::error::{PoiprepError, Result};
use crate::types::Signal;
use std::path::Path;
use tracing::debug;

/// Write a signal as 16-bit PCM mono WAV, clamping out-of-range samples
pub fn write_mono_wav(path: &Path, signal: &Signal) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: signal.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let output_err = |reason: String| PoiprepError::OutputError {
        path: path.to_path_buf(),
        reason,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| output_err(format!("Failed to create WAV file: {}", e)))?;

    for &s in &signal.samples {
        let sample = (s * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(sample)
            .map_err(|e| output_err(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| output_err(format!("Failed to finalize WAV: {}", e)))?;

    debug!("Wrote {} samples to {}", signal.len(), path.display());
    Ok(())
}
