//! Harmonic-percussive source separation via median filtering
//!
//! Harmonic energy is smooth along time, percussive energy is smooth along
//! frequency. Median-filtering the magnitude spectrogram in each direction
//! gives two estimates that are turned into complementary soft masks.

use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis, Zip};

use super::stft::{Spectrogram, Stft};
use crate::error::AudioError;

/// Median-filter HPSS settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HpssParams {
    /// Median window across time frames
    pub harmonic_kernel: usize,
    /// Median window across frequency bins
    pub percussive_kernel: usize,
    /// Mask exponent; infinity gives a hard mask
    pub power: f32,
    pub harmonic_margin: f32,
    pub percussive_margin: f32,
}

impl Default for HpssParams {
    fn default() -> Self {
        Self {
            harmonic_kernel: 31,
            percussive_kernel: 31,
            power: 2.0,
            harmonic_margin: 1.0,
            percussive_margin: 1.0,
        }
    }
}

impl HpssParams {
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.harmonic_kernel == 0 || self.percussive_kernel == 0 {
            return Err(AudioError::InvalidOptions(
                "Median kernel sizes must be at least 1".to_string(),
            ));
        }
        if self.power.is_nan() || self.power <= 0.0 {
            return Err(AudioError::InvalidOptions(format!(
                "Mask power must be positive, got {}",
                self.power
            )));
        }
        if !(self.harmonic_margin >= 1.0 && self.percussive_margin >= 1.0) {
            return Err(AudioError::InvalidOptions(format!(
                "Margins must be >= 1, got ({}, {})",
                self.harmonic_margin, self.percussive_margin
            )));
        }
        Ok(())
    }
}

/// Splits a waveform into harmonic and percussive parts
pub struct HpssSeparator {
    stft: Stft,
    params: HpssParams,
}

impl HpssSeparator {
    pub fn new(n_fft: usize, hop_length: usize, params: HpssParams) -> Result<Self, AudioError> {
        params.validate()?;
        Ok(Self {
            stft: Stft::new(n_fft, hop_length)?,
            params,
        })
    }

    /// Returns `(harmonic, percussive)`, each the same length as `samples`
    pub fn process(&self, samples: &[f32]) -> Result<(Vec<f32>, Vec<f32>), AudioError> {
        let spectrogram = self.stft.forward(samples)?;
        let (harmonic, percussive) = decompose(&spectrogram, &self.params);

        let harmonic = self.stft.inverse(&harmonic, Some(samples.len()))?;
        let percussive = self.stft.inverse(&percussive, Some(samples.len()))?;
        Ok((harmonic, percussive))
    }
}

/// Decompose a complex spectrogram into harmonic and percussive spectrograms
pub fn decompose(spectrogram: &Spectrogram, params: &HpssParams) -> (Spectrogram, Spectrogram) {
    let magnitude = spectrogram.mapv(|c| c.norm());

    let harmonic = median_filter(&magnitude, Axis(1), params.harmonic_kernel);
    let percussive = median_filter(&magnitude, Axis(0), params.percussive_kernel);

    // Unit margins give masks that sum to one, so silent bins are split evenly
    let split_zeros = params.harmonic_margin == 1.0 && params.percussive_margin == 1.0;

    let harmonic_mask = softmask(
        &harmonic,
        &percussive.mapv(|v| v * params.harmonic_margin),
        params.power,
        split_zeros,
    );
    let percussive_mask = softmask(
        &percussive,
        &harmonic.mapv(|v| v * params.percussive_margin),
        params.power,
        split_zeros,
    );

    let apply = |mask: &Array2<f32>| -> Spectrogram {
        Zip::from(spectrogram)
            .and(mask)
            .map_collect(|&c, &m| c * m)
    };

    (apply(&harmonic_mask), apply(&percussive_mask))
}

/// Median filter every lane of `input` along `axis`
///
/// Edges are extended by half-sample symmetric reflection.
pub fn median_filter(input: &Array2<f32>, axis: Axis, kernel: usize) -> Array2<f32> {
    let mut output = Array2::<f32>::zeros(input.raw_dim());
    let mut window = Vec::with_capacity(kernel);

    for (lane, out_lane) in input.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        median_filter_lane(lane, out_lane, kernel, &mut window);
    }

    output
}

fn median_filter_lane(
    input: ArrayView1<f32>,
    mut output: ArrayViewMut1<f32>,
    kernel: usize,
    window: &mut Vec<f32>,
) {
    let len = input.len();
    if len == 0 || kernel == 0 {
        return;
    }

    let half = (kernel / 2) as isize;
    let rank = kernel / 2;

    for i in 0..len {
        window.clear();
        for offset in 0..kernel as isize {
            window.push(input[reflect_index(i as isize - half + offset, len)]);
        }
        let (_, median, _) = window.select_nth_unstable_by(rank, |a, b| a.total_cmp(b));
        output[i] = *median;
    }
}

/// Map an out-of-range index back into `0..len` (`d c b a | a b c d | d c b a`)
fn reflect_index(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let folded = index.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - 1 - folded) as usize
    }
}

/// Soft mask `x^p / (x^p + x_ref^p)`, computed relative to `max(x, x_ref)`
///
/// Bins where both inputs are below the smallest normal float get 0.5 when
/// `split_zeros` is set and 0 otherwise. An infinite `power` yields the hard
/// mask `x > x_ref`.
pub fn softmask(x: &Array2<f32>, x_ref: &Array2<f32>, power: f32, split_zeros: bool) -> Array2<f32> {
    Zip::from(x).and(x_ref).map_collect(|&x, &r| {
        if power.is_infinite() {
            return if x > r { 1.0 } else { 0.0 };
        }

        let z = x.max(r);
        if z < f32::MIN_POSITIVE {
            return if split_zeros { 0.5 } else { 0.0 };
        }

        let mask = (x / z).powf(power);
        let ref_mask = (r / z).powf(power);
        mask / (mask + ref_mask)
    })
}
