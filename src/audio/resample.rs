//! Rational-ratio resampling using rubato
//!
//! Rates are reduced by their greatest common divisor to an integer
//! `up / down` ratio and fed to rubato's synchronous FFT resampler, which
//! applies a band-limiting filter per polyphase branch. The resampler's group
//! delay is removed, so output sample `k` lines up with input time
//! `k * down / up`.

use crate::error::{PoiprepError, Result};
use rubato::{FftFixedInOut, Resampler};
use tracing::trace;

/// Input frames per rubato chunk. Rubato rounds this up to a multiple of the
/// reduced input rate.
const CHUNK_SIZE: usize = 1024;

/// Greatest common divisor (Euclid)
pub fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Upsample / downsample factors between two rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleRatio {
    pub up: u32,
    pub down: u32,
}

impl ResampleRatio {
    /// Reduced ratio for converting `from_rate` to `to_rate`. Both must be > 0.
    pub fn between(from_rate: u32, to_rate: u32) -> Self {
        let g = gcd(from_rate, to_rate).max(1);
        Self {
            up: to_rate / g,
            down: from_rate / g,
        }
    }

    /// Output length for `input_len` samples: `ceil(input_len * up / down)`
    pub fn output_len(&self, input_len: usize) -> usize {
        let num = input_len as u64 * self.up as u64;
        num.div_ceil(self.down as u64) as usize
    }
}

/// Resample `samples` from `from_rate` to `to_rate`
///
/// Returns exactly [`ResampleRatio::output_len`] samples. Deterministic for
/// a fixed input and rate pair.
pub fn resample_poly(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(PoiprepError::Resample {
            from: from_rate,
            to: to_rate,
            reason: "sample rates must be greater than zero".to_string(),
        });
    }
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let ratio = ResampleRatio::between(from_rate, to_rate);
    let expected_len = ratio.output_len(samples.len());
    if expected_len == 0 {
        return Ok(Vec::new());
    }

    let resample_err = |reason: String| PoiprepError::Resample {
        from: from_rate,
        to: to_rate,
        reason,
    };

    let mut resampler =
        FftFixedInOut::<f32>::new(ratio.down as usize, ratio.up as usize, CHUNK_SIZE, 1)
            .map_err(|e| resample_err(e.to_string()))?;

    let input_frames = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let needed = expected_len + delay;

    trace!(
        "Resampling {} samples: up={} down={} chunk={} delay={}",
        samples.len(),
        ratio.up,
        ratio.down,
        input_frames,
        delay
    );

    let mut output = Vec::with_capacity(needed + resampler.output_frames_next());
    let mut pos = 0;

    // Keep feeding (zero-padded past the end) until the delayed tail is flushed
    while output.len() < needed {
        let mut chunk = vec![0.0f32; input_frames];
        if pos < samples.len() {
            let end = (pos + input_frames).min(samples.len());
            chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }

        let resampled = resampler
            .process(&[chunk], None)
            .map_err(|e| resample_err(e.to_string()))?;
        let channel = resampled
            .first()
            .ok_or_else(|| resample_err("resampler returned no channels".to_string()))?;
        output.extend_from_slice(channel);

        pos += input_frames;
    }

    output.drain(..delay);
    output.truncate(expected_len);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(44100, 22050), 22050);
        assert_eq!(gcd(44100, 48000), 300);
        assert_eq!(gcd(7, 13), 1);
        assert_eq!(gcd(0, 5), 5);
    }

    #[test]
    fn test_ratio_reduction() {
        assert_eq!(ResampleRatio::between(44100, 22050), ResampleRatio { up: 1, down: 2 });
        assert_eq!(ResampleRatio::between(48000, 22050), ResampleRatio { up: 147, down: 320 });
        assert_eq!(ResampleRatio::between(16000, 22050).output_len(16000), 22050);
        // ceil(1001 / 2)
        assert_eq!(ResampleRatio { up: 1, down: 2 }.output_len(1001), 501);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(resample_poly(&samples, 44100, 44100).unwrap(), samples);
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample_poly(&[], 44100, 22050).unwrap().is_empty());
    }

    #[test]
    fn test_resample_exact_lengths() {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        assert_eq!(resample_poly(&samples, 44100, 22050).unwrap().len(), 500);
        assert_eq!(resample_poly(&samples, 22050, 44100).unwrap().len(), 2000);
        assert_eq!(resample_poly(&samples, 44100, 48000).unwrap().len(), 1089);
    }

    #[test]
    fn test_resample_rejects_zero_rate() {
        assert!(resample_poly(&[0.0; 8], 0, 22050).is_err());
    }

    #[test]
    fn test_resample_deterministic() {
        let samples = sine(440.0, 44100, 5000);
        let a = resample_poly(&samples, 44100, 16000).unwrap();
        let b = resample_poly(&samples, 44100, 16000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_resample_sine_amplitude_preserved() {
        let samples = sine(440.0, 44100, 8820);
        let result = resample_poly(&samples, 44100, 22050).unwrap();

        let interior = &result[500..result.len() - 500];
        let max_val = interior.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_val = interior.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(max_val > 0.9, "Max value {} should be > 0.9", max_val);
        assert!(min_val < -0.9, "Min value {} should be < -0.9", min_val);
    }

    #[test]
    fn test_resample_time_aligned() {
        // A 440 Hz tone resampled to 22050 Hz should match a tone generated
        // directly at 22050 Hz once the filter delay is removed.
        let source = sine(440.0, 44100, 44100);
        let result = resample_poly(&source, 44100, 22050).unwrap();
        let reference = sine(440.0, 22050, result.len());

        let interior = 2000..result.len() - 2000;
        let dot: f32 = interior.clone().map(|i| result[i] * reference[i]).sum();
        let norm_a: f32 = interior.clone().map(|i| result[i] * result[i]).sum::<f32>().sqrt();
        let norm_b: f32 = interior.map(|i| reference[i] * reference[i]).sum::<f32>().sqrt();
        let correlation = dot / (norm_a * norm_b);
        assert!(correlation > 0.95, "correlation {} too low", correlation);
    }
}
