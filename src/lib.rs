pub mod audio_clean;
pub mod audio_util;
pub mod commands;
pub mod error;
pub mod services;
