use std::path::{Path, PathBuf};
use thiserror::Error;

pub const NOISE_REDUCED_FILE: &str = "noise_reduced.wav";
pub const VOCALS_FILE: &str = "vocals.wav";
pub const ACCOMPANIMENT_FILE: &str = "accompaniment.wav";

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Output path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Destination paths for one separation run
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub noise_reduced: PathBuf,
    pub vocals: PathBuf,
    pub accompaniment: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            noise_reduced: dir.join(NOISE_REDUCED_FILE),
            vocals: dir.join(VOCALS_FILE),
            accompaniment: dir.join(ACCOMPANIMENT_FILE),
        }
    }
}

/// Create the output directory (and parents) if needed
///
/// Succeeds when the directory already exists; fails when the path names a
/// file or cannot be created.
pub fn ensure_output_dir(dir: &Path) -> Result<PathBuf, PathError> {
    if dir.exists() && !dir.is_dir() {
        return Err(PathError::NotADirectory(dir.to_path_buf()));
    }

    std::fs::create_dir_all(dir)?;
    log::info!("Output directory ready: {}", dir.display());
    Ok(dir.to_path_buf())
}
