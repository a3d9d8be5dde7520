//! Integration tests for the poiprep pipeline
//!
//! These tests write WAV fixtures with hound and run the full pipeline and
//! batch runner over them.

use poiprep::config::{MagnitudeScaling, Settings};
use poiprep::export::{read_report, PairReport, REPORT_FILE_NAME};
use poiprep::pipeline::{self, run_batch, run_batch_with, BatchOptions};
use poiprep::spectral::{Channel, MaskKind};
use poiprep::{MaskPolicy, PairPaths, PipelineConfig, PoiPipeline, PoiprepError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Generate a sine wave WAV file for testing
///
/// Creates a 16-bit WAV file with `channels` identical channels.
fn generate_sine_wav(
    path: &Path,
    frequency_hz: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
    channels: u16,
) {
    use std::f32::consts::PI;

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");

    let num_samples = (duration_secs * sample_rate as f32) as usize;

    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * PI * frequency_hz * t).sin() * amplitude;
        let sample_i16 = (sample * 32767.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample_i16).expect("Failed to write sample");
        }
    }

    writer.finalize().expect("Failed to finalize WAV");
}

/// A speaker-like tone and a higher interfering tone, both mono
fn create_pair(dir: &Path, name: &str, duration_secs: f32, sample_rate: u32) -> PairPaths {
    let poi = dir.join(format!("{}_voice.wav", name));
    let non_poi = dir.join(format!("{}_noise.wav", name));
    generate_sine_wav(&poi, 440.0, 0.5, duration_secs, sample_rate, 1);
    generate_sine_wav(&non_poi, 3000.0, 0.3, duration_secs, sample_rate, 1);
    PairPaths::new(poi, non_poi)
}

fn create_corrupt_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"this is definitely not audio data").unwrap();
    path
}

fn create_test_settings(pairs: Vec<PairPaths>, output: &Path) -> Settings {
    Settings {
        pairs,
        output: output.to_path_buf(),
        pipeline: PipelineConfig::default(),
        threads: 2,
        write_audio: false,
        show_progress: false,
    }
}

#[test]
fn test_end_to_end_model_shape() {
    let temp = TempDir::new().unwrap();
    let pair = create_pair(temp.path(), "a", 5.0, 22050);

    let pipeline = PoiPipeline::new(PipelineConfig::default()).unwrap();
    let output = pipeline.process(&pair).unwrap();

    assert_eq!(output.shape(), [1024, 176, 3]);
    assert_eq!(output.masked.data().shape(), &[1024, 176, 3]);
    assert_eq!(output.target.data().shape(), &[1024, 176, 3]);
    assert_eq!(output.mask.shape(), (1024, 176));
    assert_eq!(output.mask.kind(), MaskKind::Binary);
    assert_eq!(output.masked.sample_rate(), 22050);
}

#[test]
fn test_masked_is_zero_where_mask_is_zero() {
    let temp = TempDir::new().unwrap();
    let pair = create_pair(temp.path(), "a", 5.0, 22050);

    let pipeline = PoiPipeline::new(PipelineConfig::default()).unwrap();
    let output = pipeline.process(&pair).unwrap();

    let mask = output.mask.data();
    assert!(mask.iter().all(|&v| v == 0.0 || v == 1.0));

    let coverage = output.mask.coverage();
    assert!(coverage > 0.0 && coverage < 1.0, "coverage {}", coverage);

    for channel in Channel::ALL {
        let values = output.masked.channel(channel);
        for (value, keep) in values.iter().zip(mask.iter()) {
            if *keep == 0.0 {
                assert_eq!(*value, 0.0);
            }
        }
    }
}

#[test]
fn test_mask_follows_target_threshold() {
    let temp = TempDir::new().unwrap();
    let pair = create_pair(temp.path(), "a", 5.0, 22050);

    let pipeline = PoiPipeline::new(PipelineConfig::default()).unwrap();
    let output = pipeline.process(&pair).unwrap();

    let target_mag = output.target.channel(Channel::Magnitude);
    for (mag, keep) in target_mag.iter().zip(output.mask.data().iter()) {
        assert_eq!(*keep == 1.0, *mag > 0.1);
    }
}

#[test]
fn test_resampled_stereo_input() {
    let temp = TempDir::new().unwrap();
    let poi = temp.path().join("voice_44k.wav");
    let non_poi = temp.path().join("noise_16k.wav");
    generate_sine_wav(&poi, 440.0, 0.5, 5.0, 44100, 2);
    generate_sine_wav(&non_poi, 3000.0, 0.3, 5.0, 16000, 1);

    let pipeline = PoiPipeline::new(PipelineConfig::default()).unwrap();
    let output = pipeline.process(&PairPaths::new(poi, non_poi)).unwrap();

    assert_eq!(output.shape(), [1024, 176, 3]);
    assert_eq!(output.target.sample_rate(), 22050);
}

#[test]
fn test_short_and_long_inputs_are_normalized() {
    let temp = TempDir::new().unwrap();
    let poi = temp.path().join("short.wav");
    let non_poi = temp.path().join("long.wav");
    generate_sine_wav(&poi, 440.0, 0.5, 2.0, 22050, 1);
    generate_sine_wav(&non_poi, 3000.0, 0.3, 8.0, 22050, 1);

    let pipeline = PoiPipeline::new(PipelineConfig::default()).unwrap();
    let output = pipeline.process(&PairPaths::new(poi, non_poi)).unwrap();

    assert_eq!(output.shape(), [1024, 176, 3]);
}

#[test]
fn test_corrupt_input_is_decode_error() {
    let temp = TempDir::new().unwrap();
    let good = create_pair(temp.path(), "a", 5.0, 22050);
    let corrupt = create_corrupt_file(temp.path(), "broken.wav");

    let pipeline = PoiPipeline::new(PipelineConfig::default()).unwrap();
    let err = pipeline
        .process(&PairPaths::new(good.poi, corrupt))
        .unwrap_err();

    assert!(matches!(err, PoiprepError::Decode { .. }));
    assert!(err.is_input_error());
    assert!(err.to_string().contains("broken.wav"));
}

#[test]
fn test_soft_mask_policy() {
    let temp = TempDir::new().unwrap();
    let pair = create_pair(temp.path(), "a", 5.0, 22050);

    let config = PipelineConfig {
        mask: MaskPolicy::Soft { power: 2.0 },
        ..Default::default()
    };
    let pipeline = PoiPipeline::new(config).unwrap();
    let output = pipeline.process(&pair).unwrap();

    assert_eq!(output.mask.kind(), MaskKind::Soft);
    assert!(output.mask.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert_eq!(output.shape(), [1024, 176, 3]);
}

#[test]
fn test_batch_counts_failures_without_aborting() {
    let temp = TempDir::new().unwrap();
    let first = create_pair(temp.path(), "a", 5.0, 22050);
    let second = create_pair(temp.path(), "b", 3.0, 16000);
    let corrupt = create_corrupt_file(temp.path(), "broken.mp3");
    let bad = PairPaths::new(first.poi.clone(), corrupt);

    let pipeline = PoiPipeline::new(PipelineConfig::default()).unwrap();
    let pairs = vec![first.clone(), bad.clone(), second];
    let options = BatchOptions {
        threads: 2,
        show_progress: false,
    };

    let (outcomes, summary) = run_batch(&pipeline, &pairs, &options).unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);

    // Input order is preserved
    assert_eq!(outcomes[0].pair, first);
    assert_eq!(outcomes[1].pair, bad);
    assert_eq!(outcomes[1].index, 1);
    assert!(outcomes[0].result.is_ok());
    assert!(outcomes[1].result.is_err());
    assert_eq!(outcomes[2].result.as_ref().unwrap().shape(), [1024, 176, 3]);
}

#[test]
fn test_batch_sink_reduces_outputs() {
    let temp = TempDir::new().unwrap();
    let pairs = vec![
        create_pair(temp.path(), "a", 5.0, 22050),
        create_pair(temp.path(), "b", 5.0, 22050),
    ];

    let pipeline = PoiPipeline::new(PipelineConfig::default()).unwrap();
    let (outcomes, summary) = run_batch_with(
        &pipeline,
        &pairs,
        &BatchOptions::default(),
        |_, _, output| Ok(output.mask.coverage()),
    )
    .unwrap();

    assert_eq!(summary.successful, 2);
    for outcome in outcomes {
        let coverage = outcome.result.unwrap();
        assert!(coverage > 0.0 && coverage <= 1.0);
    }
}

#[test]
fn test_run_writes_report() {
    let temp = TempDir::new().unwrap();
    let output_dir = temp.path().join("prepared");
    let good = create_pair(temp.path(), "a", 5.0, 22050);
    let bad = PairPaths::new(good.poi.clone(), temp.path().join("missing.wav"));

    let settings = create_test_settings(vec![good, bad], &output_dir);
    let summary = pipeline::run(&settings).unwrap();

    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 1);

    let report = read_report(&output_dir.join(REPORT_FILE_NAME)).unwrap();
    assert_eq!(report.version, "1.0");
    assert_eq!(report.metadata.pair_count, 2);
    assert_eq!(report.metadata.failed_count, 1);

    let ok: &PairReport = &report.pairs[0];
    assert_eq!(ok.shape, Some([1024, 176, 3]));
    assert!(ok.mask_coverage.is_some());
    assert!(ok.error.is_none());
    assert!(ok.masked_audio.is_none());

    let failed = &report.pairs[1];
    assert!(failed.shape.is_none());
    assert!(failed.error.as_deref().unwrap().contains("missing.wav"));
}

#[test]
fn test_run_writes_audio() {
    let temp = TempDir::new().unwrap();
    let output_dir = temp.path().join("prepared");
    let pair = create_pair(temp.path(), "a", 5.0, 22050);

    let mut settings = create_test_settings(vec![pair], &output_dir);
    settings.write_audio = true;
    let summary = pipeline::run(&settings).unwrap();
    assert_eq!(summary.successful, 1);

    let masked = output_dir.join("audio").join("0000_a_voice_with_a_noise_masked.wav");
    let target = output_dir.join("audio").join("0000_a_voice_with_a_noise_target.wav");
    assert!(masked.exists(), "missing {}", masked.display());
    assert!(target.exists(), "missing {}", target.display());

    let reader = hound::WavReader::open(&target).unwrap();
    assert_eq!(reader.spec().sample_rate, 22050);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len() as usize, 512 * 175);

    let report = read_report(&output_dir.join(REPORT_FILE_NAME)).unwrap();
    assert_eq!(
        report.pairs[0].masked_audio.as_deref(),
        Some(masked.to_string_lossy().as_ref())
    );
}

#[test]
fn test_same_stems_from_different_dirs_get_distinct_audio() {
    let temp = TempDir::new().unwrap();
    let first_dir = temp.path().join("s1");
    let second_dir = temp.path().join("s2");
    fs::create_dir_all(&first_dir).unwrap();
    fs::create_dir_all(&second_dir).unwrap();
    let first = create_pair(&first_dir, "a", 5.0, 22050);
    let second = create_pair(&second_dir, "a", 5.0, 22050);
    assert_eq!(first.stem_name(), second.stem_name());

    let output_dir = temp.path().join("prepared");
    let mut settings = create_test_settings(vec![first, second], &output_dir);
    settings.write_audio = true;
    let summary = pipeline::run(&settings).unwrap();
    assert_eq!(summary.successful, 2);

    let report = read_report(&output_dir.join(REPORT_FILE_NAME)).unwrap();
    let first_target = report.pairs[0].target_audio.clone().unwrap();
    let second_target = report.pairs[1].target_audio.clone().unwrap();
    assert_ne!(first_target, second_target);
    assert_ne!(report.pairs[0].masked_audio, report.pairs[1].masked_audio);
    assert!(Path::new(&first_target).exists());
    assert!(Path::new(&second_target).exists());
}

#[test]
fn test_missing_input_counted_not_fatal() {
    let temp = TempDir::new().unwrap();
    let good = create_pair(temp.path(), "a", 5.0, 22050);
    let missing = temp.path().join("gone.wav");
    let output_dir = temp.path().join("prepared");

    let settings = create_test_settings(
        vec![PairPaths::new(missing.clone(), good.non_poi.clone()), good],
        &output_dir,
    );
    assert_eq!(settings.missing_inputs(), vec![missing.as_path()]);

    let summary = pipeline::run(&settings).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.successful, 1);
    assert!(output_dir.join(REPORT_FILE_NAME).exists());
}

#[test]
fn test_scaled_magnitude_keeps_mask_and_shape() {
    let temp = TempDir::new().unwrap();
    let pair = create_pair(temp.path(), "a", 5.0, 22050);

    let linear = PoiPipeline::new(PipelineConfig::default())
        .unwrap()
        .process(&pair)
        .unwrap();

    let config = PipelineConfig {
        magnitude: MagnitudeScaling {
            normalize: true,
            top_db: Some(80.0),
        },
        ..Default::default()
    };
    let scaled = PoiPipeline::new(config).unwrap().process(&pair).unwrap();

    assert_eq!(scaled.shape(), [1024, 176, 3]);
    assert_eq!(scaled.mask, linear.mask);
    assert_eq!(
        scaled.masked.channel(Channel::Real),
        linear.masked.channel(Channel::Real)
    );

    let mag = scaled.target.channel(Channel::Magnitude);
    assert!(mag.iter().all(|&db| (-80.0 - 1e-3..=1e-3).contains(&db)));
}

#[test]
fn test_trim_multiple_shapes_output() {
    let temp = TempDir::new().unwrap();
    let pair = create_pair(temp.path(), "a", 5.0, 22050);

    let config = PipelineConfig {
        trim_shape: (1000, 170),
        trim_multiple: 16,
        ..Default::default()
    };
    let output = PoiPipeline::new(config).unwrap().process(&pair).unwrap();
    assert_eq!(output.shape(), [992, 160, 3]);
    assert_eq!(output.mask.shape(), (992, 160));

    let (masked, target) = output.to_channels_first();
    assert_eq!(masked.shape(), &[3, 992, 160]);
    assert_eq!(target.shape(), &[3, 992, 160]);
}

#[test]
fn test_invalid_trim_rejected_before_processing() {
    let temp = TempDir::new().unwrap();
    let pair = create_pair(temp.path(), "a", 1.0, 22050);

    let mut settings = create_test_settings(vec![pair], &temp.path().join("out"));
    settings.pipeline.trim_shape = (1024, 500);

    assert!(matches!(
        pipeline::run(&settings),
        Err(PoiprepError::InvalidConfig(_))
    ));
    assert!(!temp.path().join("out").join(REPORT_FILE_NAME).exists());
}
