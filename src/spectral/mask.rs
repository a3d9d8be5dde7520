//! Separation masks over a spectrogram's (freq, time) extent
//!
//! Masks are 2-D and broadcast across the channel axis when applied, so
//! magnitude, real and imaginary parts are scaled together and the masked
//! spectrogram stays invertible.

use crate::error::{PoiprepError, Result};
use crate::spectral::spectrogram::{Channel, Spectrogram};
use ndarray::{Array2, Axis, Zip};
use tracing::debug;

/// How the mask values were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    /// Values in {0, 1}
    Binary,
    /// Values in [0, 1]
    Soft,
}

/// Elementwise filter over (frequency bins, time frames)
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Array2<f32>,
    kind: MaskKind,
}

impl Mask {
    /// Wrap precomputed mask values
    pub fn new(data: Array2<f32>, kind: MaskKind) -> Self {
        Self { data, kind }
    }

    /// Binary mask: 1 where the reference magnitude is strictly greater than
    /// `threshold`, else 0
    pub fn derive(reference: &Spectrogram, threshold: f32) -> Self {
        let data = reference
            .channel(Channel::Magnitude)
            .mapv(|m| if m > threshold { 1.0 } else { 0.0 });

        let mask = Self {
            data,
            kind: MaskKind::Binary,
        };
        debug!(
            "Binary mask from '{}' (threshold {}): {:.1}% active",
            reference.label,
            threshold,
            mask.coverage() * 100.0
        );
        mask
    }

    /// Soft ratio mask `|T|^p / (|T|^p + |I|^p)`, 0 where both are silent
    pub fn soft(target: &Spectrogram, interference: &Spectrogram, power: f32) -> Result<Self> {
        if !(power.is_finite() && power > 0.0) {
            return Err(PoiprepError::InvalidConfig(format!(
                "soft mask power must be positive, got {}",
                power
            )));
        }
        if target.shape() != interference.shape() {
            return Err(PoiprepError::extent_mismatch(target.shape(), interference.shape()));
        }

        let mut data = Array2::<f32>::zeros(target.shape());
        Zip::from(&mut data)
            .and(&target.channel(Channel::Magnitude))
            .and(&interference.channel(Channel::Magnitude))
            .for_each(|out, &t, &i| {
                let tp = t.powf(power);
                let total = tp + i.powf(power);
                *out = if total > f32::MIN_POSITIVE { tp / total } else { 0.0 };
            });

        Ok(Self {
            data,
            kind: MaskKind::Soft,
        })
    }

    pub fn kind(&self) -> MaskKind {
        self.kind
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// (frequency bins, time frames)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Mean mask value: the active fraction for a binary mask
    pub fn coverage(&self) -> f32 {
        self.data.mean().unwrap_or(0.0)
    }

    /// Multiply `spectrogram` by this mask, broadcasting across channels
    pub fn apply(&self, spectrogram: &Spectrogram) -> Result<Spectrogram> {
        if self.shape() != spectrogram.shape() {
            return Err(PoiprepError::extent_mismatch(spectrogram.shape(), self.shape()));
        }

        let mask = self.data.view().insert_axis(Axis(2));
        let filtered = spectrogram.data() * &mask;

        Ok(Spectrogram::from_parts(
            filtered,
            spectrogram.sample_rate(),
            spectrogram.label.clone(),
        ))
    }
}
