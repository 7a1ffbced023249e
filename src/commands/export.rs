use std::path::Path;

use hound::{WavSpec, WavWriter};

use crate::audio_util::Waveform;
use crate::error::AudioError;

/// Write `waveform` as a 32-bit float mono WAV
///
/// The parent directory must already exist.
pub fn write_waveform(waveform: &Waveform, output: &Path) -> Result<(), AudioError> {
    let encode_error = |source: hound::Error| AudioError::Encode {
        path: output.to_path_buf(),
        source,
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = WavWriter::create(output, spec).map_err(encode_error)?;

    for &sample in &waveform.samples {
        writer.write_sample(sample).map_err(encode_error)?;
    }

    writer.finalize().map_err(encode_error)?;

    log::info!(
        "Wrote {} ({:.2}s at {} Hz)",
        output.display(),
        waveform.duration_secs(),
        waveform.sample_rate
    );

    Ok(())
}
