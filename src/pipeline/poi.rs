//! The person-of-interest pipeline
//!
//! `load -> resample -> clip -> mix -> stft -> trim -> align -> maskify ->
//! apply-mask -> scale`
//!
//! Built once from a validated [`PipelineConfig`]; every invocation owns its
//! own entities, so one pipeline can be shared by reference across threads.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::stage::{stage_names, Stage, Then};
use crate::pipeline::stages::{
    AlignStage, ApplyMaskStage, ClipStage, LoadStage, MaskifyStage, MixStage, PipelineOutput,
    ResampleStage, ScaleStage, SpectifyStage, TrimStage,
};
use crate::spectral::StftTransform;
use crate::types::PairPaths;
use std::sync::Arc;
use tracing::debug;

type SignalChain = Then<Then<Then<LoadStage, ResampleStage>, ClipStage>, MixStage>;
type SpectralChain = Then<Then<Then<SignalChain, SpectifyStage>, TrimStage>, AlignStage>;
type PoiChain = Then<Then<Then<SpectralChain, MaskifyStage>, ApplyMaskStage>, ScaleStage>;

/// Paths in, `(masked, target)` spectrograms out
#[derive(Debug, Clone)]
pub struct PoiPipeline {
    config: PipelineConfig,
    transform: Arc<StftTransform>,
    chain: PoiChain,
}

impl PoiPipeline {
    /// Validate `config` and assemble the stage chain
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let transform = Arc::new(StftTransform::new(config.stft)?);

        let chain = LoadStage
            .then(ResampleStage {
                target_rate: config.sample_rate,
            })
            .then(ClipStage {
                seconds: config.duration,
            })
            .then(MixStage)
            .then(SpectifyStage {
                transform: Arc::clone(&transform),
            })
            .then(TrimStage {
                shape: config.trim_shape,
            })
            .then(AlignStage {
                multiple: config.trim_multiple,
            })
            .then(MaskifyStage {
                policy: config.mask,
            })
            .then(ApplyMaskStage)
            .then(ScaleStage {
                scaling: config.magnitude,
            });

        debug!("Pipeline: {}", stage_names(&chain).join(" -> "));

        Ok(Self {
            config,
            transform,
            chain,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The STFT used by the pipeline, for inverting its outputs
    pub fn transform(&self) -> &StftTransform {
        &self.transform
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        stage_names(&self.chain)
    }

    /// Run every stage on one pair
    ///
    /// Both outputs are checked against [`PipelineConfig::output_extent`].
    pub fn process(&self, pair: &PairPaths) -> Result<PipelineOutput> {
        debug!(
            "Processing {} + {}",
            pair.poi.display(),
            pair.non_poi.display()
        );
        let output = self.chain.apply(pair.clone())?;
        let extent = self.config.output_extent();
        output.masked.validate_shape(extent)?;
        output.target.validate_shape(extent)?;
        Ok(output)
    }
}

impl Stage for PoiPipeline {
    type Input = PairPaths;
    type Output = PipelineOutput;

    fn name(&self) -> &'static str {
        "poi-pipeline"
    }

    fn apply(&self, input: PairPaths) -> Result<PipelineOutput> {
        self.process(&input)
    }

    fn describe(&self, names: &mut Vec<&'static str>) {
        self.chain.describe(names);
    }
}
