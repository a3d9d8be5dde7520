//! Unified error types for poiprep
//!
//! Error strategy:
//! - Input errors (decode, mixer validation, shapes): fatal to one pair,
//!   the batch runner records them and moves on
//! - System errors (output, configuration): abort the run
//!
//! Every variant carries the offending paths, shapes or rates so a failed
//! pair can be diagnosed from the message alone.

use std::path::PathBuf;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "WAV, FLAC, MP3, AIFF, OGG/Vorbis";

/// Top-level error type for poiprep operations
#[derive(Debug, Error)]
pub enum PoiprepError {
    // =========================================================================
    // Input errors - fatal to a single pipeline invocation
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}")]
    Decode { path: PathBuf, reason: String },

    #[error("Cannot mix signals of different lengths: {lengths:?} samples")]
    DurationMismatch { lengths: Vec<usize> },

    #[error("Cannot mix signals of different sample rates: {rates:?} Hz")]
    SampleRateMismatch { rates: Vec<u32> },

    #[error("Numeric representation mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Trim target {requested:?} exceeds spectrogram extent {actual:?} (freq, time)")]
    ShapeTooLarge {
        requested: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Resampling {from} Hz -> {to} Hz failed: {reason}")]
    Resample { from: u32, to: u32, reason: String },

    // =========================================================================
    // System errors - abort the run
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for poiprep operations
pub type Result<T> = std::result::Result<T, PoiprepError>;

impl PoiprepError {
    /// Returns true if the error stems from one pair's input data
    /// (the batch should record it and continue)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PoiprepError::Decode { .. }
                | PoiprepError::DurationMismatch { .. }
                | PoiprepError::SampleRateMismatch { .. }
                | PoiprepError::TypeMismatch { .. }
                | PoiprepError::ShapeTooLarge { .. }
                | PoiprepError::ShapeMismatch { .. }
                | PoiprepError::Resample { .. }
        )
    }

    /// Create a decode error with context about the issue
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PoiprepError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!(
                    "Directory does not exist: {}",
                    path.parent().map(|p| p.display().to_string()).unwrap_or_default()
                )
            }
            _ => err.to_string(),
        };
        PoiprepError::OutputError { path, reason }
    }

    /// Shape mismatch between two 2-D (freq, time) extents
    pub fn extent_mismatch(expected: (usize, usize), found: (usize, usize)) -> Self {
        PoiprepError::ShapeMismatch {
            expected: vec![expected.0, expected.1],
            found: vec![found.0, found.1],
        }
    }
}
