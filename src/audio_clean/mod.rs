//! Noise reduction and source separation
//!
//! Two stages share one short-time transform:
//! 1. Spectral subtraction of a stationary noise profile
//! 2. Harmonic-percussive separation by median filtering

pub mod stft;
pub mod spectral;
pub mod hpss;
pub mod pipeline;

pub use pipeline::{
    process_waveform, reduce_noise, split_harmonic_percussive, SeparatedAudio, SeparationOptions,
};
