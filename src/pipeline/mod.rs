//! Pipeline composition and batch orchestration

pub mod orchestrator;
pub mod poi;
pub mod stage;
pub mod stages;

pub use orchestrator::{run, run_batch, run_batch_with, BatchOptions, BatchSummary, PairOutcome};
pub use poi::PoiPipeline;
pub use stage::{stage_names, Stage, Then};
pub use stages::{MaskPlan, Mixture, Pair, PipelineOutput};
