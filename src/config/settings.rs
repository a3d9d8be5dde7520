//! Runtime configuration settings

use crate::error::{PoiprepError, Result};
use crate::spectral::StftConfig;
use crate::types::{samples_for, PairPaths, MAX_SIGNAL_SAMPLES};
use std::path::{Path, PathBuf};

/// Default target sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Default clip length (seconds)
pub const DEFAULT_DURATION: f64 = 5.0;

/// Default (freq, time) extent handed to the model
pub const DEFAULT_TRIM_SHAPE: (usize, usize) = (1024, 176);

/// Default magnitude threshold for the binary mask
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.1;

/// Both trimmed extents are cut to a multiple of this (a U-Net with three
/// pooling levels needs 2^3)
pub const DEFAULT_TRIM_MULTIPLE: usize = 8;

/// Default dynamic range kept by the decibel conversion
pub const DEFAULT_TOP_DB: f32 = 80.0;

/// How the separation mask is derived from the trimmed spectrograms
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskPolicy {
    /// 1 where the target magnitude is strictly above `threshold`
    Binary { threshold: f32 },
    /// `|poi|^p / (|poi|^p + |non-poi|^p)`
    Soft { power: f32 },
}

impl Default for MaskPolicy {
    fn default() -> Self {
        MaskPolicy::Binary {
            threshold: DEFAULT_MASK_THRESHOLD,
        }
    }
}

/// Post-processing of the magnitude channel of both outputs
///
/// Only the magnitude channel is touched, so real and imaginary parts stay
/// invertible. Normalization runs before the decibel conversion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MagnitudeScaling {
    /// Divide by the spectrogram's peak magnitude
    pub normalize: bool,
    /// Convert to decibels, keeping this many dB below the peak
    pub top_db: Option<f32>,
}

impl MagnitudeScaling {
    pub fn is_identity(&self) -> bool {
        !self.normalize && self.top_db.is_none()
    }
}

/// Parameters fixed at pipeline construction
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Target clip length in seconds
    pub duration: f64,
    /// (frequency bins, time frames) kept after the STFT
    pub trim_shape: (usize, usize),
    /// Trimmed extents are cut down to a multiple of this (1 disables)
    pub trim_multiple: usize,
    /// Mask derivation
    pub mask: MaskPolicy,
    /// STFT framing
    pub stft: StftConfig,
    /// Magnitude post-processing of the outputs
    pub magnitude: MagnitudeScaling,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            duration: DEFAULT_DURATION,
            trim_shape: DEFAULT_TRIM_SHAPE,
            trim_multiple: DEFAULT_TRIM_MULTIPLE,
            mask: MaskPolicy::default(),
            stft: StftConfig::default(),
            magnitude: MagnitudeScaling::default(),
        }
    }
}

impl PipelineConfig {
    /// Check every parameter, including that the trim shape fits the
    /// spectrogram a normalized clip will produce
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PoiprepError::InvalidConfig(
                "sample_rate must be greater than zero".to_string(),
            ));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(PoiprepError::InvalidConfig(format!(
                "duration must be a positive number of seconds, got {}",
                self.duration
            )));
        }
        if self.duration * self.sample_rate as f64 > MAX_SIGNAL_SAMPLES as f64 {
            return Err(PoiprepError::InvalidConfig(format!(
                "{}s at {} Hz exceeds the {} sample clip limit",
                self.duration, self.sample_rate, MAX_SIGNAL_SAMPLES
            )));
        }
        if self.trim_shape.0 == 0 || self.trim_shape.1 == 0 {
            return Err(PoiprepError::InvalidConfig(format!(
                "trim_shape dimensions must be non-zero, got {:?}",
                self.trim_shape
            )));
        }
        if self.trim_multiple == 0
            || self.trim_multiple > self.trim_shape.0
            || self.trim_multiple > self.trim_shape.1
        {
            return Err(PoiprepError::InvalidConfig(format!(
                "trim_multiple must be in 1..={}, got {}",
                self.trim_shape.0.min(self.trim_shape.1),
                self.trim_multiple
            )));
        }
        if let Some(top_db) = self.magnitude.top_db {
            if !(top_db.is_finite() && top_db > 0.0) {
                return Err(PoiprepError::InvalidConfig(format!(
                    "top_db must be positive, got {}",
                    top_db
                )));
            }
        }
        match self.mask {
            MaskPolicy::Binary { threshold } if !threshold.is_finite() => {
                return Err(PoiprepError::InvalidConfig(format!(
                    "mask_threshold must be finite, got {}",
                    threshold
                )));
            }
            MaskPolicy::Soft { power } if !(power.is_finite() && power > 0.0) => {
                return Err(PoiprepError::InvalidConfig(format!(
                    "soft mask power must be positive, got {}",
                    power
                )));
            }
            _ => {}
        }
        self.stft.validate()?;

        let extent = self.spectrogram_extent();
        if self.trim_shape.0 > extent.0 || self.trim_shape.1 > extent.1 {
            return Err(PoiprepError::InvalidConfig(format!(
                "trim_shape {:?} exceeds the {:?} spectrogram of a {}s clip at {} Hz (n_fft {}, hop {})",
                self.trim_shape,
                extent,
                self.duration,
                self.sample_rate,
                self.stft.n_fft,
                self.stft.hop_length
            )));
        }
        Ok(())
    }

    /// Samples per normalized clip
    pub fn clip_samples(&self) -> usize {
        samples_for(self.duration, self.sample_rate)
    }

    /// (freq, time) extent of a normalized clip's spectrogram before trimming
    pub fn spectrogram_extent(&self) -> (usize, usize) {
        (self.stft.freq_bins(), self.stft.frames_for(self.clip_samples()))
    }

    /// (freq, time) extent of every pipeline output
    pub fn output_extent(&self) -> (usize, usize) {
        let (freq, time) = self.trim_shape;
        let m = self.trim_multiple.max(1);
        (freq - freq % m, time - time % m)
    }
}

/// Runtime settings for a batch run
#[derive(Debug, Clone)]
pub struct Settings {
    /// Pairs to process, in order
    pub pairs: Vec<PairPaths>,
    /// Output directory for the report and optional audio
    pub output: PathBuf,
    /// Core pipeline parameters
    pub pipeline: PipelineConfig,
    /// Number of worker threads
    pub threads: usize,
    /// Write ISTFT reconstructions of masked/target spectrograms as WAV
    pub write_audio: bool,
    /// Show progress bars
    pub show_progress: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &super::cli::Cli) -> Result<Self> {
        let mask = match cli.soft_mask {
            Some(power) => MaskPolicy::Soft { power },
            None => MaskPolicy::Binary {
                threshold: cli.threshold,
            },
        };

        let pipeline = PipelineConfig {
            sample_rate: cli.sample_rate,
            duration: cli.duration,
            trim_shape: cli.trim,
            trim_multiple: cli.trim_multiple,
            mask,
            stft: StftConfig {
                n_fft: cli.n_fft,
                hop_length: cli.hop_length,
                center: true,
            },
            magnitude: MagnitudeScaling {
                normalize: cli.normalize,
                top_db: cli.decibels.then_some(cli.top_db),
            },
        };
        pipeline.validate()?;

        Ok(Self {
            pairs: cli.pairs(),
            output: cli.output.clone(),
            pipeline,
            threads: cli.threads.unwrap_or_else(default_threads),
            write_audio: cli.write_audio,
            show_progress: !cli.quiet,
        })
    }
}

impl Settings {
    /// Pair files that do not exist
    ///
    /// These are not fatal: the batch records each affected pair as a
    /// decode failure and carries on with the rest.
    pub fn missing_inputs(&self) -> Vec<&Path> {
        self.pairs
            .iter()
            .flat_map(|pair| [pair.poi.as_path(), pair.non_poi.as_path()])
            .filter(|path| !path.is_file())
            .collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            output: PathBuf::from("./output"),
            pipeline: PipelineConfig::default(),
            threads: default_threads(),
            write_audio: false,
            show_progress: true,
        }
    }
}

/// All cores but one, at least one
pub fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
