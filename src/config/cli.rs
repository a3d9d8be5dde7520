//! CLI argument parsing and configuration

use crate::config::settings::{
    DEFAULT_DURATION, DEFAULT_MASK_THRESHOLD, DEFAULT_SAMPLE_RATE, DEFAULT_TOP_DB,
    DEFAULT_TRIM_MULTIPLE,
};
use crate::spectral::stft::{DEFAULT_HOP_LENGTH, DEFAULT_N_FFT};
use crate::types::PairPaths;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// poiprep - Prepare person-of-interest training pairs
///
/// Loads each (person-of-interest, interfering) recording pair, normalizes
/// rate and length, mixes them, and produces the masked mixture spectrogram
/// together with the target spectrogram.
#[derive(Parser, Debug)]
#[command(name = "poiprep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Recording pair: person-of-interest file, then interfering file (repeatable)
    #[arg(
        short,
        long = "pair",
        value_names = ["POI", "NON_POI"],
        num_args = 2,
        action = ArgAction::Append,
        required = true
    )]
    pub pair: Vec<PathBuf>,

    /// Output directory for the report (and audio with --write-audio)
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Target sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Clip length in seconds (shorter recordings are zero-padded)
    #[arg(long, default_value_t = DEFAULT_DURATION)]
    pub duration: f64,

    /// Spectrogram extent kept for the model, as FREQxTIME
    #[arg(long, default_value = "1024x176", value_parser = parse_trim_shape)]
    pub trim: (usize, usize),

    /// Cut both trimmed extents down to a multiple of N (1 disables)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TRIM_MULTIPLE)]
    pub trim_multiple: usize,

    /// Magnitude threshold for the binary mask (strictly greater-than)
    #[arg(long, default_value_t = DEFAULT_MASK_THRESHOLD)]
    pub threshold: f32,

    /// Use a soft ratio mask with this exponent instead of the binary mask
    #[arg(long, value_name = "POWER")]
    pub soft_mask: Option<f32>,

    /// STFT window size
    #[arg(long, default_value_t = DEFAULT_N_FFT)]
    pub n_fft: usize,

    /// STFT hop length
    #[arg(long, default_value_t = DEFAULT_HOP_LENGTH)]
    pub hop_length: usize,

    /// Divide each output's magnitude channel by its peak
    #[arg(long)]
    pub normalize: bool,

    /// Convert the magnitude channel of the outputs to decibels
    #[arg(long)]
    pub decibels: bool,

    /// Dynamic range kept by --decibels
    #[arg(long, value_name = "DB", default_value_t = DEFAULT_TOP_DB, requires = "decibels")]
    pub top_db: f32,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Write ISTFT reconstructions of masked and target spectrograms as WAV
    #[arg(long)]
    pub write_audio: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Group the flat `--pair` values into pairs
    pub fn pairs(&self) -> Vec<PairPaths> {
        self.pair
            .chunks_exact(2)
            .map(|p| PairPaths::new(p[0].clone(), p[1].clone()))
            .collect()
    }
}

/// Parse `FREQxTIME` (e.g. `1024x176`)
pub fn parse_trim_shape(value: &str) -> Result<(usize, usize), String> {
    let (freq, time) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected FREQxTIME, got '{}'", value))?;
    let freq = freq
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid frequency extent '{}': {}", freq, e))?;
    let time = time
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid time extent '{}': {}", time, e))?;
    Ok((freq, time))
}
