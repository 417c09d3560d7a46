//! Shared plumbing for the `collage` and `chop` binaries

pub mod output;
pub mod progress;

pub use progress::LogProgress;

/// Logs stay off unless `--verbose`, so stdout carries only the JSON summary.
/// `RUST_LOG` still refines filtering.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
