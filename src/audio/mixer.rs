//! Signal mixing
//!
//! Combines same-length, same-rate signals into one composite signal.
//! All inputs share one numeric representation (`f32` buffers), so the
//! representation check that a dual array/tensor design would need is
//! satisfied by construction and `TypeMismatch` is never raised here.

use crate::error::{PoiprepError, Result};
use crate::types::Signal;
use tracing::debug;

/// Separator used when joining source labels of mixed signals
pub const MIX_LABEL_SEPARATOR: &str = " with ";

/// Elementwise sum of `signals`
///
/// Validation order: non-empty input, equal lengths, equal sample rates.
pub fn mix(signals: &[&Signal]) -> Result<Signal> {
    let first = signals
        .first()
        .ok_or_else(|| PoiprepError::InvalidConfig("mix requires at least one signal".to_string()))?;

    if signals.iter().any(|s| s.len() != first.len()) {
        return Err(PoiprepError::DurationMismatch {
            lengths: signals.iter().map(|s| s.len()).collect(),
        });
    }

    if signals.iter().any(|s| s.sample_rate() != first.sample_rate()) {
        return Err(PoiprepError::SampleRateMismatch {
            rates: signals.iter().map(|s| s.sample_rate()).collect(),
        });
    }

    let mut mixed = first.samples.clone();
    for signal in &signals[1..] {
        for (acc, &s) in mixed.iter_mut().zip(signal.samples.iter()) {
            *acc += s;
        }
    }

    let label = signals
        .iter()
        .map(|s| s.label.as_str())
        .collect::<Vec<_>>()
        .join(MIX_LABEL_SEPARATOR);

    debug!("Mixed {} signals ({} samples): {}", signals.len(), mixed.len(), label);

    Signal::new(mixed, first.sample_rate(), label)
}
