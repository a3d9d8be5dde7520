//! Core data types for poiprep
//!
//! These types represent the domain model and flow through the pipeline.

use crate::audio::{decoder, mixer, resample, wav};
use crate::error::{PoiprepError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

// =============================================================================
// Time-domain signal
// =============================================================================

/// Mono audio samples with their sample rate and provenance label
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Mono samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (always > 0)
    sample_rate: u32,
    /// Source identifier, used in diagnostics and mixed-signal names
    pub label: String,
}

impl Signal {
    /// Wrap a buffer. Fails if the sample rate is zero.
    pub fn new(samples: Vec<f32>, sample_rate: u32, label: impl Into<String>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PoiprepError::InvalidConfig(
                "sample rate must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
            label: label.into(),
        })
    }

    /// Decode an audio file to a mono signal at its native sample rate
    pub fn load(path: &Path) -> Result<Self> {
        decoder::decode(path)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Resample in place to `target_rate`. No-op when the rates already match.
    pub fn resample(&mut self, target_rate: u32) -> Result<()> {
        if target_rate == 0 {
            return Err(PoiprepError::InvalidConfig(
                "target sample rate must be greater than zero".to_string(),
            ));
        }
        if target_rate == self.sample_rate {
            return Ok(());
        }

        self.samples = resample::resample_poly(&self.samples, self.sample_rate, target_rate)?;
        debug!(
            "Resampled '{}': {} Hz -> {} Hz ({} samples)",
            self.label,
            self.sample_rate,
            target_rate,
            self.samples.len()
        );
        self.sample_rate = target_rate;
        Ok(())
    }

    /// Truncate or zero-pad to exactly `round(target_seconds * sample_rate)` samples
    pub fn clip_or_pad(&mut self, target_seconds: f64) -> Result<()> {
        if !target_seconds.is_finite() || target_seconds < 0.0 {
            return Err(PoiprepError::InvalidConfig(format!(
                "target duration must be a non-negative number of seconds, got {}",
                target_seconds
            )));
        }

        let target_len = samples_for(target_seconds, self.sample_rate);
        if target_len > MAX_SIGNAL_SAMPLES {
            return Err(PoiprepError::InvalidConfig(format!(
                "target duration {}s at {} Hz exceeds {} samples",
                target_seconds, self.sample_rate, MAX_SIGNAL_SAMPLES
            )));
        }
        if target_len != self.samples.len() {
            debug!(
                "{} '{}': {} -> {} samples",
                if target_len > self.samples.len() { "Padding" } else { "Clipping" },
                self.label,
                self.samples.len(),
                target_len
            );
            self.samples.resize(target_len, 0.0);
        }
        Ok(())
    }

    /// Sum this signal with `others` (see [`mixer::mix`])
    pub fn mix(&self, others: &[&Signal]) -> Result<Signal> {
        let mut all = Vec::with_capacity(others.len() + 1);
        all.push(self);
        all.extend_from_slice(others);
        mixer::mix(&all)
    }

    /// Peak absolute amplitude
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root-mean-square amplitude (0 for an empty buffer)
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }

    /// Write as 16-bit mono WAV
    pub fn save_wav(&self, path: &Path) -> Result<()> {
        wav::write_mono_wav(path, self)
    }
}

/// Longest signal a clip may be padded to (2^31 samples, ~27 h at 22.05 kHz)
pub const MAX_SIGNAL_SAMPLES: usize = 1 << 31;

/// Sample count for a duration, rounded to the nearest sample
pub fn samples_for(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round() as usize
}

// =============================================================================
// Pipeline input
// =============================================================================

/// A person-of-interest recording paired with an interfering recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairPaths {
    pub poi: PathBuf,
    pub non_poi: PathBuf,
}

impl PairPaths {
    pub fn new(poi: impl Into<PathBuf>, non_poi: impl Into<PathBuf>) -> Self {
        Self {
            poi: poi.into(),
            non_poi: non_poi.into(),
        }
    }

    /// Short name for output files: `<poi stem>_with_<non-poi stem>`
    pub fn stem_name(&self) -> String {
        let stem = |p: &Path| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("audio")
                .to_string()
        };
        format!("{}_with_{}", stem(&self.poi), stem(&self.non_poi))
    }

    /// File name stem for the pair at `index` in a batch
    ///
    /// Pairs from different directories can share file stems, so the batch
    /// index keeps every output name unique.
    pub fn output_stem(&self, index: usize) -> String {
        format!("{:04}_{}", index, self.stem_name())
    }
}
