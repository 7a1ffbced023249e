use std::path::PathBuf;

/// Typed audio errors shared by the loader, the transforms and the writer.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },
    #[error("No audio tracks found in '{0}'")]
    NoAudioTrack(PathBuf),
    #[error("Sample rate unknown for '{0}'")]
    MissingSampleRate(PathBuf),
    #[error("Failed to write WAV '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("Transform failed: {0}")]
    Transform(String),
}

/// Errors reading a JSON options file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read options file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse options file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
