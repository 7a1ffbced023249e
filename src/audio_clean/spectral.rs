//! Spectral noise suppression by magnitude subtraction
//!
//! Estimates a stationary noise profile from the opening frames of the clip
//! and subtracts it from every frame, keeping the original phase.

use ndarray::{s, Array2};

use super::stft::{magphase, recombine, Stft};
use crate::error::AudioError;

/// FFT-based spectral subtractor
pub struct SpectralDenoiser {
    stft: Stft,
    noise_frames: usize,
}

impl SpectralDenoiser {
    /// Create a new spectral denoiser
    ///
    /// # Arguments
    /// * `n_fft` - FFT size (typically 2048)
    /// * `hop_length` - Frame advance (typically 512)
    /// * `noise_frames` - Number of leading frames assumed to hold only noise
    pub fn new(n_fft: usize, hop_length: usize, noise_frames: usize) -> Result<Self, AudioError> {
        if noise_frames == 0 {
            return Err(AudioError::InvalidOptions(
                "Noise estimation needs at least one frame".to_string(),
            ));
        }

        Ok(Self {
            stft: Stft::new(n_fft, hop_length)?,
            noise_frames,
        })
    }

    /// Denoise `samples`, returning `hop * (frames - 1)` samples
    pub fn process(&self, samples: &[f32]) -> Result<Vec<f32>, AudioError> {
        let spectrogram = self.stft.forward(samples)?;
        let (mut magnitude, phase) = magphase(&spectrogram);

        let profile = estimate_noise_profile(&magnitude, self.noise_frames);
        if magnitude.ncols() < self.noise_frames {
            log::debug!(
                "Only {} frames available, noise profile uses all of them",
                magnitude.ncols()
            );
        }

        subtract_noise_profile(&mut magnitude, &profile);

        self.stft.inverse(&recombine(&magnitude, &phase), None)
    }
}

/// Mean magnitude per bin over the first `noise_frames` frames
///
/// Uses every frame when fewer than `noise_frames` exist.
pub fn estimate_noise_profile(magnitude: &Array2<f32>, noise_frames: usize) -> Vec<f32> {
    let frames = magnitude.ncols().min(noise_frames);
    if frames == 0 {
        return vec![0.0; magnitude.nrows()];
    }

    magnitude
        .slice(s![.., ..frames])
        .rows()
        .into_iter()
        .map(|row| row.sum() / frames as f32)
        .collect()
}

/// Subtract `profile` from every frame, clamping each bin at zero
pub fn subtract_noise_profile(magnitude: &mut Array2<f32>, profile: &[f32]) {
    for (mut row, &noise) in magnitude.rows_mut().into_iter().zip(profile) {
        row.mapv_inplace(|m| (m - noise).max(0.0));
    }
}
