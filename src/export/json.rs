//! JSON report of a batch run

use crate::config::{MaskPolicy, PipelineConfig};
use crate::error::{PoiprepError, Result};
use crate::pipeline::PipelineOutput;
use crate::types::PairPaths;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// File name of the report inside the output directory
pub const REPORT_FILE_NAME: &str = "poiprep.json";

/// Top-level JSON output structure
#[derive(Debug, Serialize, Deserialize)]
pub struct PoiprepJson {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ExportMetadata,
    /// Parameters every pair was prepared with
    pub config: ConfigJson,
    pub pairs: Vec<PairReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// poiprep version that generated this file
    pub generator_version: String,
    /// RFC 3339 timestamp
    pub exported_at: String,
    pub pair_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigJson {
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub trim_shape: [usize; 2],
    pub trim_multiple: usize,
    /// "binary" or "soft"
    pub mask: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_power: Option<f32>,
    pub n_fft: usize,
    pub hop_length: usize,
    pub normalize: bool,
    /// Dynamic range of the decibel magnitude channel, absent when linear
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_db: Option<f32>,
}

impl From<&PipelineConfig> for ConfigJson {
    fn from(config: &PipelineConfig) -> Self {
        let (mask, mask_threshold, mask_power) = match config.mask {
            MaskPolicy::Binary { threshold } => ("binary", Some(threshold), None),
            MaskPolicy::Soft { power } => ("soft", None, Some(power)),
        };
        Self {
            sample_rate: config.sample_rate,
            duration_seconds: config.duration,
            trim_shape: [config.trim_shape.0, config.trim_shape.1],
            trim_multiple: config.trim_multiple,
            mask: mask.to_string(),
            mask_threshold,
            mask_power,
            n_fft: config.stft.n_fft,
            hop_length: config.stft.hop_length,
            normalize: config.magnitude.normalize,
            top_db: config.magnitude.top_db,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    Ok,
    Failed,
}

/// One pair's entry in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    pub poi: String,
    pub non_poi: String,
    pub status: PairStatus,
    /// (freq, time, channel) of the masked and target spectrograms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<[usize; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_coverage: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PairReport {
    pub fn succeeded(
        pair: &PairPaths,
        output: &PipelineOutput,
        audio: Option<(PathBuf, PathBuf)>,
    ) -> Self {
        let (masked_audio, target_audio) = match audio {
            Some((masked, target)) => (Some(path_string(&masked)), Some(path_string(&target))),
            None => (None, None),
        };
        Self {
            poi: path_string(&pair.poi),
            non_poi: path_string(&pair.non_poi),
            status: PairStatus::Ok,
            shape: Some(output.shape()),
            mask_coverage: Some(output.mask.coverage()),
            masked_audio,
            target_audio,
            error: None,
        }
    }

    pub fn failed(pair: &PairPaths, error: &PoiprepError) -> Self {
        Self {
            poi: path_string(&pair.poi),
            non_poi: path_string(&pair.non_poi),
            status: PairStatus::Failed,
            shape: None,
            mask_coverage: None,
            masked_audio: None,
            target_audio: None,
            error: Some(error.to_string()),
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Write the batch report to a JSON file
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
pub fn write_report(reports: &[PairReport], config: &PipelineConfig, output_path: &Path) -> Result<()> {
    // Same directory keeps the rename on one filesystem
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| PoiprepError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let output = PoiprepJson {
        version: SCHEMA_VERSION.to_string(),
        metadata: ExportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            pair_count: reports.len(),
            failed_count: reports
                .iter()
                .filter(|r| r.status == PairStatus::Failed)
                .count(),
        },
        config: ConfigJson::from(config),
        pairs: reports.to_vec(),
    };

    if let Err(reason) = write_pretty(BufWriter::new(file), &output) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(PoiprepError::OutputError {
            path: output_path.to_path_buf(),
            reason,
        });
    }

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        PoiprepError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!("Wrote report for {} pairs to {}", reports.len(), output_path.display());

    Ok(())
}

/// Serialize and flush, so a short write fails here instead of on drop
fn write_pretty<W: Write, T: Serialize>(mut writer: W, value: &T) -> std::result::Result<(), String> {
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| e.to_string())?;
    writer
        .flush()
        .map_err(|e| format!("Failed to flush report: {}", e))
}

/// Read a report written by [`write_report`]
pub fn read_report(path: &Path) -> Result<PoiprepJson> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| PoiprepError::OutputError {
        path: path.to_path_buf(),
        reason: format!("Invalid report: {}", e),
    })
}
