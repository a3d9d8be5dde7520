//! STFT (Short-Time Fourier Transform) between signals and spectrograms
//!
//! # Parameter Choices
//!
//! - **n_fft = 2048**: at 22.05 kHz this is a ~93 ms window with 1025
//!   frequency bins, enough for the 1024-bin trim the model expects.
//!
//! - **hop_length = 512**: 75% overlap. A 5 s clip at 22.05 kHz yields
//!   `1 + 110250 / 512 = 216` frames, comfortably above the 176-frame trim.
//!
//! - **Periodic Hann window, centered frames**: the signal is zero-padded by
//!   `n_fft / 2` on both sides so frame `t` is centered on sample
//!   `t * hop_length`. The same window is used for synthesis and the
//!   overlap-add is normalised by the summed squared window, which gives
//!   reconstruction up to float precision wherever the window sum is non-zero.

use crate::error::{PoiprepError, Result};
use crate::spectral::spectrogram::{Channel, Spectrogram, NUM_CHANNELS};
use crate::types::Signal;
use ndarray::Array3;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::debug;

/// Default FFT window size
pub const DEFAULT_N_FFT: usize = 2048;

/// Default hop between frames (75% overlap)
pub const DEFAULT_HOP_LENGTH: usize = 512;

/// Window sums below this are treated as uncovered during overlap-add
const WINDOW_SUM_EPSILON: f32 = 1e-8;

/// STFT framing parameters, shared by the forward and inverse transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StftConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    /// Pad `n_fft / 2` zeros on both ends so frames are centered on hops
    pub center: bool,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            n_fft: DEFAULT_N_FFT,
            hop_length: DEFAULT_HOP_LENGTH,
            center: true,
        }
    }
}

impl StftConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_fft == 0 || self.n_fft % 2 != 0 {
            return Err(PoiprepError::InvalidConfig(format!(
                "n_fft must be a positive even number, got {}",
                self.n_fft
            )));
        }
        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(PoiprepError::InvalidConfig(format!(
                "hop_length must be in 1..={}, got {}",
                self.n_fft, self.hop_length
            )));
        }

        // Nonzero overlap-add: every hop offset must see some window energy
        let window = hann_window(self.n_fft);
        for offset in 0..self.hop_length {
            let covered: f32 = window
                .iter()
                .skip(offset)
                .step_by(self.hop_length)
                .map(|w| w * w)
                .sum();
            if covered <= WINDOW_SUM_EPSILON {
                return Err(PoiprepError::InvalidConfig(format!(
                    "hop_length {} leaves samples uncovered by the {}-point Hann window (offset {}); use a hop below n_fft",
                    self.hop_length, self.n_fft, offset
                )));
            }
        }
        Ok(())
    }

    /// Number of frequency bins in the positive-frequency half of the spectrum
    pub fn freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn frames_for(&self, len: usize) -> usize {
        if self.center {
            1 + len / self.hop_length
        } else {
            1 + len.saturating_sub(self.n_fft) / self.hop_length
        }
    }
}

/// Forward and inverse STFT with precomputed window and FFT plans
///
/// Immutable after construction and `Send + Sync`, so one instance can serve
/// many concurrent pipeline invocations.
#[derive(Clone)]
pub struct StftTransform {
    config: StftConfig,
    window: Vec<f32>,
    forward_fft: Arc<dyn Fft<f32>>,
    inverse_fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for StftTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StftTransform")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StftTransform {
    pub fn new(config: StftConfig) -> Result<Self> {
        config.validate()?;

        let mut planner = FftPlanner::new();
        let forward_fft = planner.plan_fft_forward(config.n_fft);
        let inverse_fft = planner.plan_fft_inverse(config.n_fft);

        Ok(Self {
            config,
            window: hann_window(config.n_fft),
            forward_fft,
            inverse_fft,
        })
    }

    pub fn config(&self) -> &StftConfig {
        &self.config
    }

    /// Compute the 3-channel spectrogram (magnitude, real, imaginary)
    pub fn forward(&self, signal: &Signal) -> Spectrogram {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let padded = self.pad(&signal.samples);

        let num_bins = self.config.freq_bins();
        let num_frames = 1 + (padded.len() - n_fft) / hop;
        let mut data = Array3::<f32>::zeros((num_bins, num_frames, NUM_CHANNELS));

        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.forward_fft.get_inplace_scratch_len()];

        for frame_idx in 0..num_frames {
            let start = frame_idx * hop;
            for (i, (slot, &w)) in buffer.iter_mut().zip(self.window.iter()).enumerate() {
                *slot = Complex::new(padded[start + i] * w, 0.0);
            }

            self.forward_fft.process_with_scratch(&mut buffer, &mut scratch);

            for (bin, c) in buffer[..num_bins].iter().enumerate() {
                data[[bin, frame_idx, Channel::Magnitude.index()]] = c.norm();
                data[[bin, frame_idx, Channel::Real.index()]] = c.re;
                data[[bin, frame_idx, Channel::Imaginary.index()]] = c.im;
            }
        }

        debug!(
            "STFT '{}': {} samples -> {} bins x {} frames",
            signal.label,
            signal.len(),
            num_bins,
            num_frames
        );

        Spectrogram::from_parts(data, signal.sample_rate(), signal.label.clone())
    }

    /// Reconstruct a signal from the real and imaginary channels
    ///
    /// The magnitude channel is ignored. Bins missing above a trimmed
    /// frequency extent are treated as zero. When centered, the output has
    /// `hop_length * (frames - 1)` samples.
    pub fn inverse(&self, spectrogram: &Spectrogram) -> Result<Signal> {
        let (ola, natural_len) = self.overlap_add(spectrogram)?;
        let offset = self.center_offset();
        let samples = ola[offset.min(ola.len())..]
            .iter()
            .take(natural_len)
            .copied()
            .collect();
        Signal::new(samples, spectrogram.sample_rate(), spectrogram.label.clone())
    }

    /// Like [`inverse`](Self::inverse), but with an exact output length
    /// (zero-padded or truncated)
    pub fn inverse_with_length(&self, spectrogram: &Spectrogram, length: usize) -> Result<Signal> {
        let (ola, _) = self.overlap_add(spectrogram)?;
        let offset = self.center_offset().min(ola.len());
        let mut samples: Vec<f32> = ola[offset..].iter().take(length).copied().collect();
        samples.resize(length, 0.0);
        Signal::new(samples, spectrogram.sample_rate(), spectrogram.label.clone())
    }

    fn center_offset(&self) -> usize {
        if self.config.center {
            self.config.n_fft / 2
        } else {
            0
        }
    }

    fn pad(&self, samples: &[f32]) -> Vec<f32> {
        let n_fft = self.config.n_fft;
        if self.config.center {
            let half = n_fft / 2;
            let mut padded = vec![0.0f32; samples.len() + 2 * half];
            padded[half..half + samples.len()].copy_from_slice(samples);
            padded
        } else {
            let mut padded = samples.to_vec();
            if padded.len() < n_fft {
                padded.resize(n_fft, 0.0);
            }
            padded
        }
    }

    /// Windowed overlap-add of every frame. Returns the normalised buffer and
    /// the natural output length (after removing center padding).
    fn overlap_add(&self, spectrogram: &Spectrogram) -> Result<(Vec<f32>, usize)> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let max_bins = self.config.freq_bins();
        let (num_bins, num_frames) = spectrogram.shape();

        if num_bins > max_bins {
            return Err(PoiprepError::ShapeMismatch {
                expected: vec![max_bins, num_frames, NUM_CHANNELS],
                found: vec![num_bins, num_frames, NUM_CHANNELS],
            });
        }
        if num_frames == 0 {
            return Ok((Vec::new(), 0));
        }

        let ola_len = n_fft + hop * (num_frames - 1);
        let natural_len = if self.config.center {
            hop * (num_frames - 1)
        } else {
            ola_len
        };

        let real = spectrogram.channel(Channel::Real);
        let imag = spectrogram.channel(Channel::Imaginary);

        let mut output = vec![0.0f32; ola_len];
        let mut window_sum = vec![0.0f32; ola_len];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.inverse_fft.get_inplace_scratch_len()];
        let scale = 1.0 / n_fft as f32;

        for frame_idx in 0..num_frames {
            buffer.fill(Complex::new(0.0, 0.0));
            for bin in 0..num_bins {
                buffer[bin] = Complex::new(real[[bin, frame_idx]], imag[[bin, frame_idx]]);
            }
            // Conjugate-symmetric negative frequencies
            for bin in 1..num_bins.min(n_fft / 2) {
                buffer[n_fft - bin] = buffer[bin].conj();
            }

            self.inverse_fft.process_with_scratch(&mut buffer, &mut scratch);

            let start = frame_idx * hop;
            for (i, &w) in self.window.iter().enumerate() {
                output[start + i] += buffer[i].re * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &ws) in output.iter_mut().zip(window_sum.iter()) {
            if ws > WINDOW_SUM_EPSILON {
                *sample /= ws;
            }
        }

        Ok((output, natural_len))
    }
}

/// Periodic Hann window of the given size
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}
