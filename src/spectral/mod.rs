//! Time-frequency representations: STFT, spectrograms and masks

pub mod mask;
pub mod spectrogram;
pub mod stft;

pub use mask::{Mask, MaskKind};
pub use spectrogram::{Channel, Spectrogram, NUM_CHANNELS};
pub use stft::{StftConfig, StftTransform};
