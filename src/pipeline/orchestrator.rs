//! Batch orchestration
//!
//! Runs independent pipeline invocations in parallel on a rayon pool. A pair
//! that fails is logged and counted; it never aborts the rest of the batch
//! and is never retried.

use crate::config::Settings;
use crate::error::{PoiprepError, Result};
use crate::export::{self, PairReport};
use crate::pipeline::poi::PoiPipeline;
use crate::pipeline::stages::PipelineOutput;
use crate::types::PairPaths;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Worker pool options for a batch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub threads: usize,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threads: crate::config::settings::default_threads(),
            show_progress: false,
        }
    }
}

/// Outcome of one pair
#[derive(Debug)]
pub struct PairOutcome<T> {
    /// Position of the pair in the batch
    pub index: usize,
    pub pair: PairPaths,
    pub result: Result<T>,
}

/// Batch counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Run the pipeline on every pair and collect the outputs, in input order
pub fn run_batch(
    pipeline: &PoiPipeline,
    pairs: &[PairPaths],
    options: &BatchOptions,
) -> Result<(Vec<PairOutcome<PipelineOutput>>, BatchSummary)> {
    run_batch_with(pipeline, pairs, options, |_, _, output| Ok(output))
}

/// Run the pipeline on every pair, handing each output to `sink` on the
/// worker thread that produced it, along with the pair's batch index
///
/// The sink lets callers reduce or persist large outputs without holding the
/// whole batch in memory. A sink error counts as a failure of that pair.
pub fn run_batch_with<T, F>(
    pipeline: &PoiPipeline,
    pairs: &[PairPaths],
    options: &BatchOptions,
    sink: F,
) -> Result<(Vec<PairOutcome<T>>, BatchSummary)>
where
    T: Send,
    F: Fn(usize, &PairPaths, PipelineOutput) -> Result<T> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.max(1))
        .build()
        .map_err(|e| PoiprepError::InvalidConfig(format!("Failed to build thread pool: {}", e)))?;
    debug!("Batch of {} pairs on {} threads", pairs.len(), options.threads.max(1));

    let progress_bar = if options.show_progress {
        let pb = ProgressBar::new(pairs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let outcomes: Vec<PairOutcome<T>> = pool.install(|| {
        pairs
            .par_iter()
            .enumerate()
            .map(|(index, pair)| {
                let result = pipeline
                    .process(pair)
                    .and_then(|output| sink(index, pair, output));

                match &result {
                    Ok(_) => {
                        successful.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(
                            "Failed {} + {}: {}",
                            pair.poi.display(),
                            pair.non_poi.display(),
                            e
                        );
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }

                if let Some(ref pb) = progress_bar {
                    pb.inc(1);
                    pb.set_message(pair.stem_name());
                }

                PairOutcome {
                    index,
                    pair: pair.clone(),
                    result,
                }
            })
            .collect()
    });

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Preparation complete");
    }

    let summary = BatchSummary {
        total: pairs.len(),
        successful: successful.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
    };
    Ok((outcomes, summary))
}

/// Run a full CLI batch: process every pair, optionally write audio, and
/// export the JSON report
pub fn run(settings: &Settings) -> Result<BatchSummary> {
    let start = Instant::now();

    let pipeline = PoiPipeline::new(settings.pipeline.clone())?;
    info!(
        "Preparing {} pairs ({} Hz, {}s, trim {:?})",
        settings.pairs.len(),
        settings.pipeline.sample_rate,
        settings.pipeline.duration,
        settings.pipeline.trim_shape
    );

    std::fs::create_dir_all(&settings.output)
        .map_err(|e| PoiprepError::output_error(&settings.output, e))?;

    let audio_dir = settings.output.join("audio");
    if settings.write_audio {
        std::fs::create_dir_all(&audio_dir).map_err(|e| PoiprepError::output_error(&audio_dir, e))?;
    }

    let options = BatchOptions {
        threads: settings.threads,
        show_progress: settings.show_progress,
    };

    let (outcomes, summary) = run_batch_with(&pipeline, &settings.pairs, &options, |index, pair, output| {
        let audio_dir = settings.write_audio.then_some(audio_dir.as_path());
        summarize_output(&pipeline, index, pair, output, audio_dir)
    })?;

    let reports: Vec<PairReport> = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(report) => report,
            Err(e) => PairReport::failed(&outcome.pair, &e),
        })
        .collect();

    let report_path = settings.output.join(export::REPORT_FILE_NAME);
    export::write_report(&reports, &settings.pipeline, &report_path)?;

    info!(
        "Prepared {}/{} pairs in {:.2}s",
        summary.successful,
        summary.total,
        start.elapsed().as_secs_f64()
    );

    Ok(summary)
}

/// Reduce one output to its report entry, writing audio if requested
fn summarize_output(
    pipeline: &PoiPipeline,
    index: usize,
    pair: &PairPaths,
    output: PipelineOutput,
    audio_dir: Option<&Path>,
) -> Result<PairReport> {
    let audio = match audio_dir {
        Some(dir) => Some(write_audio(pipeline, index, pair, &output, dir)?),
        None => None,
    };
    Ok(PairReport::succeeded(pair, &output, audio))
}

/// Reconstruct masked and target spectrograms and save them as WAV
fn write_audio(
    pipeline: &PoiPipeline,
    index: usize,
    pair: &PairPaths,
    output: &PipelineOutput,
    dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    let stem = pair.output_stem(index);
    let masked_path = dir.join(format!("{}_masked.wav", stem));
    let target_path = dir.join(format!("{}_target.wav", stem));

    pipeline.transform().inverse(&output.masked)?.save_wav(&masked_path)?;
    pipeline.transform().inverse(&output.target)?.save_wav(&target_path)?;

    debug!("Wrote {} and {}", masked_path.display(), target_path.display());
    Ok((masked_path, target_path))
}
