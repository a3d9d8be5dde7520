//! poiprep - Person-of-Interest Audio Preparation
//!
//! Turns a pair of recordings (a person-of-interest speaker and an
//! interfering source) into model-ready spectrograms: both files are decoded
//! to mono, resampled, clipped or padded to a fixed length, mixed, transformed
//! with an STFT, trimmed, and a separation mask derived from the target is
//! applied to the mixture.
//!
//! # Architecture
//!
//! - `audio`: Decoding, resampling, mixing and WAV output
//! - `spectral`: STFT/ISTFT, spectrogram container and masks
//! - `pipeline`: Statically composed stages and the parallel batch runner
//! - `config`: CLI argument parsing and runtime settings
//! - `export`: JSON batch report
//!
//! # Example
//!
//! ```no_run
//! use poiprep::{PairPaths, PipelineConfig, PoiPipeline};
//!
//! let pipeline = PoiPipeline::new(PipelineConfig::default())?;
//! let output = pipeline.process(&PairPaths::new("speaker.wav", "street.flac"))?;
//! assert_eq!(output.shape(), [1024, 176, 3]);
//! # Ok::<(), poiprep::PoiprepError>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod spectral;
pub mod types;

// Re-export key types at crate root
pub use config::{MagnitudeScaling, MaskPolicy, PipelineConfig};
pub use error::{PoiprepError, Result};
pub use pipeline::{PipelineOutput, PoiPipeline};
pub use spectral::{Mask, Spectrogram, StftConfig, StftTransform};
pub use types::{PairPaths, Signal};
