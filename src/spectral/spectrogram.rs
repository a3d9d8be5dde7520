//! Three-channel spectrogram container and shape operations

use crate::error::{PoiprepError, Result};
use crate::spectral::stft::StftTransform;
use crate::types::Signal;
use ndarray::{s, Array3, ArrayView2, Axis};
use std::path::Path;
use tracing::debug;

/// Length of the channel axis: magnitude, real, imaginary
pub const NUM_CHANNELS: usize = 3;

/// Smallest magnitude used by the decibel conversion (-100 dB)
const AMPLITUDE_FLOOR: f32 = 1e-5;

/// Named positions on the channel axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Magnitude,
    Real,
    Imaginary,
}

impl Channel {
    pub const ALL: [Channel; NUM_CHANNELS] = [Channel::Magnitude, Channel::Real, Channel::Imaginary];

    pub fn index(self) -> usize {
        match self {
            Channel::Magnitude => 0,
            Channel::Real => 1,
            Channel::Imaginary => 2,
        }
    }
}

/// Spectrogram with axes (frequency bins, time frames, channel)
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    data: Array3<f32>,
    sample_rate: u32,
    /// Source label inherited from the analysed signal
    pub label: String,
}

impl Spectrogram {
    /// Wrap an existing array. The channel axis must have length 3.
    pub fn new(data: Array3<f32>, sample_rate: u32, label: impl Into<String>) -> Result<Self> {
        let shape = data.shape();
        if shape[2] != NUM_CHANNELS {
            return Err(PoiprepError::ShapeMismatch {
                expected: vec![shape[0], shape[1], NUM_CHANNELS],
                found: shape.to_vec(),
            });
        }
        if sample_rate == 0 {
            return Err(PoiprepError::InvalidConfig(
                "sample rate must be greater than zero".to_string(),
            ));
        }
        Ok(Self::from_parts(data, sample_rate, label.into()))
    }

    /// Trusted constructor for arrays built with a 3-wide channel axis
    pub(crate) fn from_parts(data: Array3<f32>, sample_rate: u32, label: String) -> Self {
        debug_assert_eq!(data.shape()[2], NUM_CHANNELS);
        Self {
            data,
            sample_rate,
            label,
        }
    }

    /// Load an audio file and transform it in one step
    pub fn from_file(path: &Path, transform: &StftTransform) -> Result<Self> {
        let signal = Signal::load(path)?;
        Ok(transform.forward(&signal))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Mutable access to the values. The shape cannot change through it.
    pub fn data_mut(&mut self) -> ndarray::ArrayViewMut3<'_, f32> {
        self.data.view_mut()
    }

    pub fn into_array(self) -> Array3<f32> {
        self.data
    }

    /// (frequency bins, time frames)
    pub fn shape(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[0], shape[1])
    }

    pub fn freq_bins(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn frames(&self) -> usize {
        self.data.shape()[1]
    }

    /// 2-D (freq, time) view of one channel
    pub fn channel(&self, channel: Channel) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(2), channel.index())
    }

    /// Keep the leading `(freq, time)` region. Never grows.
    pub fn trim(&mut self, target: (usize, usize)) -> Result<()> {
        let actual = self.shape();
        if target.0 > actual.0 || target.1 > actual.1 {
            return Err(PoiprepError::ShapeTooLarge {
                requested: target,
                actual,
            });
        }
        if target == actual {
            return Ok(());
        }

        self.data = self.data.slice(s![..target.0, ..target.1, ..]).to_owned();
        debug!("Trimmed '{}': {:?} -> {:?}", self.label, actual, target);
        Ok(())
    }

    /// Trim both extents down to the nearest multiple of `multiple`
    ///
    /// U-Net style encoders halve the extent at every level, so inputs must
    /// divide evenly by `2^levels`.
    pub fn trim_to_multiple(&mut self, multiple: usize) -> Result<()> {
        let actual = self.shape();
        if multiple == 0 || actual.0 < multiple || actual.1 < multiple {
            return Err(PoiprepError::ShapeTooLarge {
                requested: (multiple, multiple),
                actual,
            });
        }
        self.trim((actual.0 - actual.0 % multiple, actual.1 - actual.1 % multiple))
    }

    /// Fail unless the spectrogram is exactly `(freq, time)`
    pub fn validate_shape(&self, expected: (usize, usize)) -> Result<()> {
        let found = self.shape();
        if found != expected {
            return Err(PoiprepError::extent_mismatch(expected, found));
        }
        Ok(())
    }

    /// Copy out as (channel, freq, time), the layout tensor frameworks expect
    pub fn to_channels_first(&self) -> Array3<f32> {
        self.data
            .view()
            .permuted_axes([2, 0, 1])
            .as_standard_layout()
            .into_owned()
    }

    /// Divide the magnitude channel by its peak. A silent spectrogram is left
    /// untouched.
    pub fn normalize_magnitude(&mut self) {
        let mut mag = self.data.index_axis_mut(Axis(2), Channel::Magnitude.index());
        let peak = mag.fold(0.0f32, |acc, &m| acc.max(m));
        if peak > 0.0 {
            mag.mapv_inplace(|m| m / peak);
        }
    }

    /// Replace the magnitude channel with `20 * log10(m)`, floored `top_db`
    /// below its peak
    pub fn magnitude_to_db(&mut self, top_db: f32) {
        let mut mag = self.data.index_axis_mut(Axis(2), Channel::Magnitude.index());
        mag.mapv_inplace(|m| 20.0 * m.max(AMPLITUDE_FLOOR).log10());
        let floor = mag.fold(f32::NEG_INFINITY, |acc, &db| acc.max(db)) - top_db;
        mag.mapv_inplace(|db| db.max(floor));
    }
}
