//! Time-domain audio: decoding, resampling, mixing and WAV output

pub mod decoder;
pub mod mixer;
pub mod resample;
pub mod wav;

pub use decoder::decode;
pub use mixer::mix;
pub use resample::{gcd, resample_poly, ResampleRatio};
