//! Concrete stages of the person-of-interest pipeline and the entity types
//! flowing between them

use crate::audio::mixer;
use crate::config::{MagnitudeScaling, MaskPolicy};
use crate::error::Result;
use crate::pipeline::stage::Stage;
use crate::spectral::{Mask, Spectrogram, StftTransform};
use crate::types::{PairPaths, Signal};
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// Entities
// =============================================================================

/// The person-of-interest item and the interfering item, before mixing
#[derive(Debug, Clone, PartialEq)]
pub struct Pair<T> {
    pub poi: T,
    pub non_poi: T,
}

impl<T> Pair<T> {
    /// Apply a fallible transform to both items
    pub fn try_map<U>(self, mut f: impl FnMut(T) -> Result<U>) -> Result<Pair<U>> {
        Ok(Pair {
            poi: f(self.poi)?,
            non_poi: f(self.non_poi)?,
        })
    }
}

/// Both sources plus their sum
#[derive(Debug, Clone, PartialEq)]
pub struct Mixture<T> {
    pub poi: T,
    pub non_poi: T,
    pub mixed: T,
}

impl<T> Mixture<T> {
    /// Apply a fallible transform to all three items
    pub fn try_map<U>(self, mut f: impl FnMut(T) -> Result<U>) -> Result<Mixture<U>> {
        Ok(Mixture {
            poi: f(self.poi)?,
            non_poi: f(self.non_poi)?,
            mixed: f(self.mixed)?,
        })
    }
}

/// Mask derived and ready to apply to the mixture
#[derive(Debug, Clone, PartialEq)]
pub struct MaskPlan {
    pub mixture: Spectrogram,
    pub target: Spectrogram,
    pub mask: Mask,
}

/// Final result of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Mask applied to the mixture spectrogram (model input)
    pub masked: Spectrogram,
    /// Person-of-interest spectrogram (model target)
    pub target: Spectrogram,
    /// The mask that produced `masked`
    pub mask: Mask,
}

impl PipelineOutput {
    /// (freq, time, channel) shape shared by `masked` and `target`
    pub fn shape(&self) -> [usize; 3] {
        let (freq, time) = self.target.shape();
        [freq, time, crate::spectral::NUM_CHANNELS]
    }

    /// Hand the raw (freq, time, channel) arrays to a consumer
    pub fn into_arrays(self) -> (ndarray::Array3<f32>, ndarray::Array3<f32>) {
        (self.masked.into_array(), self.target.into_array())
    }

    /// `(masked, target)` as (channel, freq, time) arrays
    pub fn to_channels_first(&self) -> (ndarray::Array3<f32>, ndarray::Array3<f32>) {
        (self.masked.to_channels_first(), self.target.to_channels_first())
    }
}

// =============================================================================
// Stages
// =============================================================================

/// Decode both files of a pair
#[derive(Debug, Clone, Default)]
pub struct LoadStage;

impl Stage for LoadStage {
    type Input = PairPaths;
    type Output = Pair<Signal>;

    fn name(&self) -> &'static str {
        "load"
    }

    fn apply(&self, input: PairPaths) -> Result<Pair<Signal>> {
        Ok(Pair {
            poi: Signal::load(&input.poi)?,
            non_poi: Signal::load(&input.non_poi)?,
        })
    }
}

/// Bring both signals to one sample rate
#[derive(Debug, Clone)]
pub struct ResampleStage {
    pub target_rate: u32,
}

impl Stage for ResampleStage {
    type Input = Pair<Signal>;
    type Output = Pair<Signal>;

    fn name(&self) -> &'static str {
        "resample"
    }

    fn apply(&self, input: Pair<Signal>) -> Result<Pair<Signal>> {
        input.try_map(|mut signal| {
            signal.resample(self.target_rate)?;
            Ok(signal)
        })
    }
}

/// Clip or zero-pad both signals to a fixed duration
#[derive(Debug, Clone)]
pub struct ClipStage {
    pub seconds: f64,
}

impl Stage for ClipStage {
    type Input = Pair<Signal>;
    type Output = Pair<Signal>;

    fn name(&self) -> &'static str {
        "clip"
    }

    fn apply(&self, input: Pair<Signal>) -> Result<Pair<Signal>> {
        input.try_map(|mut signal| {
            signal.clip_or_pad(self.seconds)?;
            Ok(signal)
        })
    }
}

/// Sum the two sources, keeping the originals
#[derive(Debug, Clone, Default)]
pub struct MixStage;

impl Stage for MixStage {
    type Input = Pair<Signal>;
    type Output = Mixture<Signal>;

    fn name(&self) -> &'static str {
        "mix"
    }

    fn apply(&self, input: Pair<Signal>) -> Result<Mixture<Signal>> {
        let mixed = mixer::mix(&[&input.poi, &input.non_poi])?;
        Ok(Mixture {
            poi: input.poi,
            non_poi: input.non_poi,
            mixed,
        })
    }
}

/// Forward STFT of all three signals
#[derive(Debug, Clone)]
pub struct SpectifyStage {
    pub transform: Arc<StftTransform>,
}

impl Stage for SpectifyStage {
    type Input = Mixture<Signal>;
    type Output = Mixture<Spectrogram>;

    fn name(&self) -> &'static str {
        "stft"
    }

    fn apply(&self, input: Mixture<Signal>) -> Result<Mixture<Spectrogram>> {
        input.try_map(|signal| Ok(self.transform.forward(&signal)))
    }
}

/// Trim all three spectrograms to the model's extent
#[derive(Debug, Clone)]
pub struct TrimStage {
    pub shape: (usize, usize),
}

impl Stage for TrimStage {
    type Input = Mixture<Spectrogram>;
    type Output = Mixture<Spectrogram>;

    fn name(&self) -> &'static str {
        "trim"
    }

    fn apply(&self, input: Mixture<Spectrogram>) -> Result<Mixture<Spectrogram>> {
        input.try_map(|mut spec| {
            spec.trim(self.shape)?;
            Ok(spec)
        })
    }
}

/// Cut all three spectrograms down to a multiple of the encoder's stride
#[derive(Debug, Clone)]
pub struct AlignStage {
    pub multiple: usize,
}

impl Stage for AlignStage {
    type Input = Mixture<Spectrogram>;
    type Output = Mixture<Spectrogram>;

    fn name(&self) -> &'static str {
        "align"
    }

    fn apply(&self, input: Mixture<Spectrogram>) -> Result<Mixture<Spectrogram>> {
        if self.multiple <= 1 {
            return Ok(input);
        }
        input.try_map(|mut spec| {
            spec.trim_to_multiple(self.multiple)?;
            Ok(spec)
        })
    }
}

/// Derive the mask from the person-of-interest spectrogram
#[derive(Debug, Clone)]
pub struct MaskifyStage {
    pub policy: MaskPolicy,
}

impl Stage for MaskifyStage {
    type Input = Mixture<Spectrogram>;
    type Output = MaskPlan;

    fn name(&self) -> &'static str {
        "maskify"
    }

    fn apply(&self, input: Mixture<Spectrogram>) -> Result<MaskPlan> {
        let mask = match self.policy {
            MaskPolicy::Binary { threshold } => Mask::derive(&input.poi, threshold),
            MaskPolicy::Soft { power } => Mask::soft(&input.poi, &input.non_poi, power)?,
        };
        Ok(MaskPlan {
            mixture: input.mixed,
            target: input.poi,
            mask,
        })
    }
}

/// Multiply the mixture by the mask
#[derive(Debug, Clone, Default)]
pub struct ApplyMaskStage;

impl Stage for ApplyMaskStage {
    type Input = MaskPlan;
    type Output = PipelineOutput;

    fn name(&self) -> &'static str {
        "apply-mask"
    }

    fn apply(&self, input: MaskPlan) -> Result<PipelineOutput> {
        let masked = input.mask.apply(&input.mixture)?;
        debug!(
            "Masked '{}': shape {:?}, coverage {:.3}",
            masked.label,
            masked.data().shape(),
            input.mask.coverage()
        );
        Ok(PipelineOutput {
            masked,
            target: input.target,
            mask: input.mask,
        })
    }
}

/// Normalize and/or convert the outputs' magnitude channel to decibels
///
/// Runs after masking, so the mask threshold always sees linear magnitudes.
#[derive(Debug, Clone)]
pub struct ScaleStage {
    pub scaling: MagnitudeScaling,
}

impl Stage for ScaleStage {
    type Input = PipelineOutput;
    type Output = PipelineOutput;

    fn name(&self) -> &'static str {
        "scale"
    }

    fn apply(&self, mut input: PipelineOutput) -> Result<PipelineOutput> {
        for spec in [&mut input.masked, &mut input.target] {
            if self.scaling.normalize {
                spec.normalize_magnitude();
            }
            if let Some(top_db) = self.scaling.top_db {
                spec.magnitude_to_db(top_db);
            }
        }
        Ok(input)
    }
}
