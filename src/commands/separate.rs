//! End-to-end separation of one audio file
//!
//! Checks the options, ensures the output directory, loads, denoises,
//! separates and writes the three result files. Every failure carries the
//! stage it happened in.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::export::write_waveform;
use super::import::load_waveform;
use crate::audio_clean::{reduce_noise, split_harmonic_percussive, SeparationOptions};
use crate::error::AudioError;
use crate::services::path_service::{ensure_output_dir, OutputPaths, PathError};

/// Pipeline stage, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Options,
    EnsureOutput,
    Load,
    NoiseReduction,
    Separation,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Options => "options",
            Stage::EnsureOutput => "ensure output",
            Stage::Load => "load",
            Stage::NoiseReduction => "noise reduction",
            Stage::Separation => "separation",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StageFailure {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// A failed run: which stage, and why
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: StageFailure,
}

impl StageError {
    fn new(stage: Stage, source: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Result of a separation run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeparationResult {
    pub noise_reduced_path: String,
    pub vocals_path: String,
    pub accompaniment_path: String,
    pub sample_rate: u32,
    pub input_duration: f64,
    pub output_duration: f64,
}

/// Denoise and separate `input`, writing the results into `output_dir`
///
/// # Arguments
/// * `input` - Any audio file symphonia can decode
/// * `output_dir` - Created if missing
/// * `options` - Transform and separation settings, checked before any I/O
pub fn separate_file(
    input: &Path,
    output_dir: &Path,
    options: &SeparationOptions,
) -> Result<SeparationResult, StageError> {
    options
        .validate()
        .map_err(|e| StageError::new(Stage::Options, e))?;

    let output_dir: PathBuf =
        ensure_output_dir(output_dir).map_err(|e| StageError::new(Stage::EnsureOutput, e))?;
    let paths = OutputPaths::in_dir(&output_dir);

    log::info!("Loading audio file {}", input.display());
    let waveform = load_waveform(input).map_err(|e| StageError::new(Stage::Load, e))?;

    log::info!("Performing noise reduction");
    let noise_reduced =
        reduce_noise(&waveform, options).map_err(|e| StageError::new(Stage::NoiseReduction, e))?;
    write_waveform(&noise_reduced, &paths.noise_reduced)
        .map_err(|e| StageError::new(Stage::Write, e))?;

    log::info!("Separating voice and background");
    let (harmonic, percussive) = split_harmonic_percussive(&noise_reduced, options)
        .map_err(|e| StageError::new(Stage::Separation, e))?;
    log::debug!(
        "Energy: denoised {:.4}, harmonic {:.4}, percussive {:.4}",
        noise_reduced.energy(),
        harmonic.energy(),
        percussive.energy()
    );

    write_waveform(&harmonic, &paths.vocals).map_err(|e| StageError::new(Stage::Write, e))?;
    write_waveform(&percussive, &paths.accompaniment)
        .map_err(|e| StageError::new(Stage::Write, e))?;

    Ok(SeparationResult {
        noise_reduced_path: paths.noise_reduced.to_string_lossy().to_string(),
        vocals_path: paths.vocals.to_string_lossy().to_string(),
        accompaniment_path: paths.accompaniment.to_string_lossy().to_string(),
        sample_rate: waveform.sample_rate,
        input_duration: waveform.duration_secs(),
        output_duration: noise_reduced.duration_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    const SAMPLE_RATE: u32 = 16000;

    /// Helper: 2 s of a 440Hz tone over quiet deterministic noise
    fn create_test_wav(path: &Path) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let mut state = 0x2545_f491u32;
        for i in 0..2 * SAMPLE_RATE as usize {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = (state as f32 / u32::MAX as f32) * 2.0 - 1.0;
            let t = i as f32 / SAMPLE_RATE as f32;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.4 + noise * 0.02;
            writer.write_sample(sample).unwrap(); // L
            writer.write_sample(sample).unwrap(); // R
        }
        writer.finalize().unwrap();
    }

    fn read_wav(path: &Path) -> (hound::WavSpec, Vec<f32>) {
        let mut reader = hound::WavReader::open(path).unwrap();
        let spec = reader.spec();
        let samples = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        (spec, samples)
    }

    #[test]
    fn test_separate_file_writes_three_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        let output_dir = dir.path().join("output");
        create_test_wav(&input);

        let result = separate_file(&input, &output_dir, &SeparationOptions::default()).unwrap();
        assert_eq!(result.sample_rate, SAMPLE_RATE);
        assert!((result.input_duration - 2.0).abs() < 1e-9);
        assert!(result.output_duration <= result.input_duration);

        let (spec, denoised) = read_wav(&output_dir.join("noise_reduced.wav"));
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let (_, vocals) = read_wav(Path::new(&result.vocals_path));
        let (_, accompaniment) = read_wav(Path::new(&result.accompaniment_path));
        assert_eq!(vocals.len(), denoised.len());
        assert_eq!(accompaniment.len(), denoised.len());
    }

    #[test]
    fn test_runs_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        create_test_wav(&input);

        let first = dir.path().join("first");
        let second = dir.path().join("second");
        separate_file(&input, &first, &SeparationOptions::default()).unwrap();
        separate_file(&input, &second, &SeparationOptions::default()).unwrap();

        for name in ["noise_reduced.wav", "vocals.wav", "accompaniment.wav"] {
            let a = std::fs::read(first.join(name)).unwrap();
            let b = std::fs::read(second.join(name)).unwrap();
            assert_eq!(a, b, "{} differs between runs", name);
        }
    }

    #[test]
    fn test_missing_input_fails_in_load_stage() {
        let dir = tempfile::tempdir().unwrap();
        let err = separate_file(
            &dir.path().join("absent.wav"),
            &dir.path().join("out"),
            &SeparationOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err.stage, Stage::Load);
        assert!(matches!(err.source, StageFailure::Audio(AudioError::Io { .. })));
        assert!(err.to_string().starts_with("load stage failed"));
    }

    #[test]
    fn test_output_dir_that_is_a_file_fails_early() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        create_test_wav(&input);
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let err = separate_file(&input, &blocker, &SeparationOptions::default()).unwrap_err();
        assert_eq!(err.stage, Stage::EnsureOutput);
        assert!(matches!(err.source, StageFailure::Path(PathError::NotADirectory(_))));
    }

    #[test]
    fn test_invalid_fft_size_fails_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        create_test_wav(&input);

        let options = SeparationOptions {
            n_fft: 1023,
            ..SeparationOptions::default()
        };
        let err = separate_file(&input, &dir.path().join("out"), &options).unwrap_err();
        assert_eq!(err.stage, Stage::Options);
        assert!(matches!(
            err.source,
            StageFailure::Audio(AudioError::InvalidOptions(_))
        ));
        assert!(!dir.path().join("out").exists());
    }

    /// Regression: a bad separation setting used to surface only after
    /// noise_reduced.wav had been written, leaving a partial output directory.
    #[test]
    fn test_invalid_margin_leaves_no_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        create_test_wav(&input);
        let output_dir = dir.path().join("out");
        std::fs::create_dir(&output_dir).unwrap();

        let options = SeparationOptions {
            harmonic_margin: 0.5,
            ..SeparationOptions::default()
        };
        let err = separate_file(&input, &output_dir, &options).unwrap_err();
        assert_eq!(err.stage, Stage::Options);
        assert!(err.to_string().starts_with("options stage failed"));

        let written = std::fs::read_dir(&output_dir).unwrap().count();
        assert_eq!(written, 0, "no files should be written for invalid options");
    }
}
