//! Audio decoding using symphonia
//!
//! Decodes audio files to a mono f32 [`Signal`] at the file's native sample
//! rate. Rate normalization is a separate pipeline stage.

use crate::error::{PoiprepError, Result};
use crate::types::Signal;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Maximum file size we'll attempt to decode (2GB)
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Decode an audio file to a mono Signal labelled with its path
pub fn decode(path: &Path) -> Result<Signal> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| PoiprepError::decode(path, format!("Failed to read file metadata: {}", e)))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(PoiprepError::decode(
            path,
            format!(
                "File too large ({:.1} GB). Maximum supported size is 2 GB.",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| PoiprepError::decode(path, format!("Failed to open file: {}", e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PoiprepError::decode(path, format!("Failed to detect format: {}", e)))?;

    let mut format = detected.format;

    // First audio track only
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PoiprepError::decode(path, "No audio tracks found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate;

    debug!(
        "Decoding: {} @ {:?}Hz, {:?} channels",
        path.display(),
        sample_rate,
        codec_params.channels.map(|c| c.count())
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| PoiprepError::decode(path, format!("Failed to create decoder: {}", e)))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(PoiprepError::decode(path, format!("Failed to read packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => {
                return Err(PoiprepError::decode(path, format!("Decode error: {}", e)));
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        if sample_rate.is_none() {
            sample_rate = Some(spec.rate);
        }

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        all_samples.extend(to_mono(sample_buf.samples(), spec.channels.count()));
    }

    let sample_rate = sample_rate
        .filter(|&rate| rate > 0)
        .ok_or_else(|| PoiprepError::decode(path, "Stream does not declare a sample rate"))?;

    debug!(
        "Decoded {} samples ({:.2}s) from {}",
        all_samples.len(),
        all_samples.len() as f64 / sample_rate as f64,
        path.display()
    );

    Signal::new(all_samples, sample_rate, path.display().to_string())
}

/// Convert interleaved multi-channel audio to mono by averaging channels
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_stereo() {
        let stereo = vec![0.5, 0.3, 0.8, 0.2, 1.0, 0.0];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.4).abs() < 0.001);
        assert!((mono[1] - 0.5).abs() < 0.001);
        assert!((mono[2] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_to_mono_already_mono() {
        let mono = vec![0.5, 0.8, 1.0];
        assert_eq!(to_mono(&mono, 1), mono);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, PoiprepError::Decode { .. }));
        assert!(err.to_string().contains("here.wav"));
    }

    #[test]
    fn test_decode_garbage_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"this is not a riff header at all").unwrap();

        let err = decode(&path).unwrap_err();
        assert!(matches!(err, PoiprepError::Decode { .. }));
    }

    #[test]
    fn test_decode_stereo_wav_to_mono() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..1600 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let signal = decode(&path).unwrap();
        assert_eq!(signal.sample_rate(), 16000);
        assert_eq!(signal.len(), 1600);
        assert!((signal.samples[800] - 0.25).abs() < 1e-3);
        assert!(signal.label.ends_with("stereo.wav"));
    }
}
