use std::path::PathBuf;
use std::process::ExitCode;

use voice_separation::audio_clean::SeparationOptions;
use voice_separation::commands::separate::separate_file;

const USAGE: &str = "usage: voice-separation <input> <output_dir> [options.json]";
const DEFAULT_LOG_FILTER: &str = "info";

/// Logger reading its filter from `filter_var`, showing progress by default
fn logger_builder(filter_var: &str) -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(filter_var, DEFAULT_LOG_FILTER))
}

fn main() -> ExitCode {
    logger_builder(env_logger::DEFAULT_FILTER_ENV).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }

    let input = PathBuf::from(&args[0]);
    let output_dir = PathBuf::from(&args[1]);

    let options = match args.get(2) {
        Some(path) => match SeparationOptions::from_json_file(&PathBuf::from(path)) {
            Ok(options) => options,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => SeparationOptions::default(),
    };

    match separate_file(&input, &output_dir, &options) {
        Ok(result) => {
            log::info!("Vocals saved to: {}", result.vocals_path);
            log::info!("Accompaniment saved to: {}", result.accompaniment_path);
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => log::warn!("Failed to serialize result: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{} (input: {}, output: {})", e, input.display(), output_dir.display());
            ExitCode::FAILURE
        }
    }
}
