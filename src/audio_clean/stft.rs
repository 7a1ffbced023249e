//! Short-time Fourier transform with centred framing
//!
//! Frames are taken from the signal padded by `n_fft / 2` zeros on both sides,
//! so frame `k` is centred on sample `k * hop`. The inverse is a windowed
//! overlap-add normalised by the summed squared window.

use std::sync::Arc;

use ndarray::{Array2, Zip};
use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::error::AudioError;

/// Complex time-frequency matrix, `bins x frames`
pub type Spectrogram = Array2<Complex32>;

/// Forward/inverse STFT pair sharing one window and one set of FFT plans
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    forward_fft: Arc<dyn RealToComplex<f32>>,
    inverse_fft: Arc<dyn ComplexToReal<f32>>,
    window: Vec<f32>,
}

impl Stft {
    /// Create a transform
    ///
    /// # Arguments
    /// * `n_fft` - Frame length, must be even (typically 2048)
    /// * `hop_length` - Frame advance in samples (typically `n_fft / 4`)
    pub fn new(n_fft: usize, hop_length: usize) -> Result<Self, AudioError> {
        if n_fft < 2 || n_fft % 2 != 0 {
            return Err(AudioError::InvalidOptions(format!(
                "FFT size must be an even number of at least 2, got {}",
                n_fft
            )));
        }
        if hop_length == 0 || hop_length > n_fft {
            return Err(AudioError::InvalidOptions(format!(
                "Hop length must be between 1 and {}, got {}",
                n_fft, hop_length
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let forward_fft = planner.plan_fft_forward(n_fft);
        let inverse_fft = planner.plan_fft_inverse(n_fft);

        // Periodic Hann window
        let window: Vec<f32> = (0..n_fft)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_fft as f32).cos()))
            .collect();

        Ok(Self {
            n_fft,
            hop_length,
            forward_fft,
            inverse_fft,
            window,
        })
    }

    /// Number of frequency bins per frame
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Analyse `samples` into a `bins x frames` spectrogram
    pub fn forward(&self, samples: &[f32]) -> Result<Spectrogram, AudioError> {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let frames = self.frame_count(samples.len());
        let mut spectrogram = Array2::from_elem((self.n_bins(), frames), Complex32::new(0.0, 0.0));

        let mut buffer = self.forward_fft.make_input_vec();
        let mut spectrum = self.forward_fft.make_output_vec();

        for frame in 0..frames {
            let start = frame * self.hop_length;
            let segment = &padded[start..start + self.n_fft];
            for ((dst, sample), w) in buffer.iter_mut().zip(segment).zip(&self.window) {
                *dst = sample * w;
            }

            self.forward_fft
                .process(&mut buffer, &mut spectrum)
                .map_err(|e| AudioError::Transform(format!("Forward FFT failed: {}", e)))?;

            for (dst, src) in spectrogram.column_mut(frame).iter_mut().zip(&spectrum) {
                *dst = *src;
            }
        }

        Ok(spectrogram)
    }

    /// Resynthesise a signal from a spectrogram
    ///
    /// Without `length` the output holds `hop * (frames - 1)` samples, which
    /// may be shorter than the analysed signal. With `length` the output is
    /// zero-padded or truncated to exactly that many samples.
    pub fn inverse(&self, spectrogram: &Spectrogram, length: Option<usize>) -> Result<Vec<f32>, AudioError> {
        if spectrogram.nrows() != self.n_bins() {
            return Err(AudioError::Transform(format!(
                "Spectrogram has {} bins, expected {}",
                spectrogram.nrows(),
                self.n_bins()
            )));
        }

        let frames = spectrogram.ncols();
        let full_len = self.n_fft + self.hop_length * frames.saturating_sub(1);
        let mut output = vec![0.0f32; full_len];
        let mut window_sum = vec![0.0f32; full_len];

        let mut spectrum = self.inverse_fft.make_input_vec();
        let mut time_buffer = self.inverse_fft.make_output_vec();
        let norm = 1.0 / self.n_fft as f32;

        for frame in 0..frames {
            for (dst, src) in spectrum.iter_mut().zip(spectrogram.column(frame)) {
                *dst = *src;
            }
            // DC and Nyquist bins of a real signal have no imaginary part
            spectrum[0].im = 0.0;
            if let Some(last) = spectrum.last_mut() {
                last.im = 0.0;
            }

            self.inverse_fft
                .process(&mut spectrum, &mut time_buffer)
                .map_err(|e| AudioError::Transform(format!("Inverse FFT failed: {}", e)))?;

            let start = frame * self.hop_length;
            for (i, (sample, w)) in time_buffer.iter().zip(&self.window).enumerate() {
                output[start + i] += sample * norm * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, sum) in output.iter_mut().zip(&window_sum) {
            if *sum > f32::MIN_POSITIVE {
                *sample /= sum;
            }
        }

        let natural_len = self.hop_length * frames.saturating_sub(1);
        let target_len = length.unwrap_or(natural_len);

        let mut samples: Vec<f32> = output
            .into_iter()
            .skip(self.n_fft / 2)
            .take(target_len)
            .collect();
        samples.resize(target_len, 0.0);

        Ok(samples)
    }
}

/// Split a spectrogram into magnitude and unit-magnitude phase
///
/// Bins with zero magnitude get a phase of `1 + 0i`.
pub fn magphase(spectrogram: &Spectrogram) -> (Array2<f32>, Spectrogram) {
    let magnitude = spectrogram.mapv(|c| c.norm());
    let phase = spectrogram.mapv(|c| {
        let mag = c.norm();
        if mag > 0.0 {
            c / mag
        } else {
            Complex32::new(1.0, 0.0)
        }
    });
    (magnitude, phase)
}

/// Recombine magnitude and phase into a complex spectrogram
pub fn recombine(magnitude: &Array2<f32>, phase: &Spectrogram) -> Spectrogram {
    Zip::from(magnitude)
        .and(phase)
        .map_collect(|&mag, &ph| ph * mag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_stft_shape() {
        let stft = Stft::new(2048, 512).unwrap();
        let spec = stft.forward(&vec![0.0f32; 16000]).unwrap();
        assert_eq!(spec.nrows(), 1025);
        assert_eq!(spec.ncols(), 1 + 16000 / 512);
    }

    #[test]
    fn test_stft_empty_signal_has_one_frame() {
        let stft = Stft::new(2048, 512).unwrap();
        let spec = stft.forward(&[]).unwrap();
        assert_eq!(spec.ncols(), 1);
        assert!(spec.iter().all(|c| c.norm() == 0.0));

        let restored = stft.inverse(&spec, None).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(matches!(Stft::new(0, 512), Err(AudioError::InvalidOptions(_))));
        assert!(matches!(Stft::new(2047, 512), Err(AudioError::InvalidOptions(_))));
        assert!(matches!(Stft::new(2048, 0), Err(AudioError::InvalidOptions(_))));
        assert!(matches!(Stft::new(2048, 4096), Err(AudioError::InvalidOptions(_))));
    }

    #[test]
    fn test_magphase_round_trip() {
        let stft = Stft::new(2048, 512).unwrap();
        let samples = sine(440.0, 16000.0, 16000, 0.5);

        let spec = stft.forward(&samples).unwrap();
        let (magnitude, phase) = magphase(&spec);
        assert!(magnitude.iter().all(|&m| m >= 0.0));

        let restored = stft.inverse(&recombine(&magnitude, &phase), Some(samples.len())).unwrap();
        assert_eq!(restored.len(), samples.len());
        for (a, b) in samples.iter().zip(&restored) {
            assert!((a - b).abs() < 1e-4, "round trip mismatch: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_inverse_natural_length_is_hop_multiple() {
        let stft = Stft::new(2048, 512).unwrap();
        let samples = sine(220.0, 16000.0, 5000, 0.3);

        let spec = stft.forward(&samples).unwrap();
        let restored = stft.inverse(&spec, None).unwrap();
        assert_eq!(restored.len(), 512 * (5000 / 512));

        for (a, b) in samples.iter().zip(&restored) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_inverse_pads_to_requested_length() {
        let stft = Stft::new(256, 64).unwrap();
        let spec = stft.forward(&vec![0.25f32; 300]).unwrap();
        let restored = stft.inverse(&spec, Some(1000)).unwrap();
        assert_eq!(restored.len(), 1000);
        assert!(restored[900..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_zero_magnitude_phase_is_unity() {
        let stft = Stft::new(64, 16).unwrap();
        let spec = stft.forward(&vec![0.0f32; 64]).unwrap();
        let (_, phase) = magphase(&spec);
        assert!(phase.iter().all(|p| *p == Complex32::new(1.0, 0.0)));
    }
}
