//! In-memory separation pipeline
//!
//! Runs spectral noise reduction followed by harmonic-percussive separation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::hpss::{HpssParams, HpssSeparator};
use super::spectral::SpectralDenoiser;
use crate::audio_util::Waveform;
use crate::error::{AudioError, ConfigError};

/// Options that control every pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeparationOptions {
    /// FFT frame length shared by both stages
    pub n_fft: usize,
    /// Frame advance in samples
    pub hop_length: usize,

    /// Leading frames averaged into the noise profile
    pub noise_frames: usize,

    /// HPSS median window across time
    pub harmonic_kernel: usize,
    /// HPSS median window across frequency
    pub percussive_kernel: usize,
    /// Soft mask exponent
    pub power: f32,
    /// Margins (>= 1) widening the gap between components
    pub harmonic_margin: f32,
    pub percussive_margin: f32,
}

impl Default for SeparationOptions {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            noise_frames: 10,
            harmonic_kernel: 31,
            percussive_kernel: 31,
            power: 2.0,
            harmonic_margin: 1.0,
            percussive_margin: 1.0,
        }
    }
}

impl SeparationOptions {
    /// Load options from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn hpss_params(&self) -> HpssParams {
        HpssParams {
            harmonic_kernel: self.harmonic_kernel,
            percussive_kernel: self.percussive_kernel,
            power: self.power,
            harmonic_margin: self.harmonic_margin,
            percussive_margin: self.percussive_margin,
        }
    }

    /// Check every option without running any stage
    pub fn validate(&self) -> Result<(), AudioError> {
        SpectralDenoiser::new(self.n_fft, self.hop_length, self.noise_frames)?;
        self.hpss_params().validate()
    }
}

/// The three waveforms produced by one run
#[derive(Debug, Clone)]
pub struct SeparatedAudio {
    pub noise_reduced: Waveform,
    pub harmonic: Waveform,
    pub percussive: Waveform,
}

/// Subtract the stationary noise profile from `waveform`
///
/// The result may be up to one hop shorter than the input.
pub fn reduce_noise(waveform: &Waveform, options: &SeparationOptions) -> Result<Waveform, AudioError> {
    let denoiser = SpectralDenoiser::new(options.n_fft, options.hop_length, options.noise_frames)?;
    let samples = denoiser.process(&waveform.samples)?;
    Ok(Waveform::new(samples, waveform.sample_rate))
}

/// Split `waveform` into `(harmonic, percussive)` of the same length
pub fn split_harmonic_percussive(
    waveform: &Waveform,
    options: &SeparationOptions,
) -> Result<(Waveform, Waveform), AudioError> {
    let separator = HpssSeparator::new(options.n_fft, options.hop_length, options.hpss_params())?;
    let (harmonic, percussive) = separator.process(&waveform.samples)?;
    Ok((
        Waveform::new(harmonic, waveform.sample_rate),
        Waveform::new(percussive, waveform.sample_rate),
    ))
}

/// Run noise reduction then separation on an in-memory waveform
pub fn process_waveform(waveform: &Waveform, options: &SeparationOptions) -> Result<SeparatedAudio, AudioError> {
    let noise_reduced = reduce_noise(waveform, options)?;
    let (harmonic, percussive) = split_harmonic_percussive(&noise_reduced, options)?;

    Ok(SeparatedAudio {
        noise_reduced,
        harmonic,
        percussive,
    })
}
