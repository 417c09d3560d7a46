//! collage - rebuild a target recording from snippets of a sample recording
//!
//! Usage: collage --target <file> --sample <file> [--outpath collage.wav]

use anyhow::{Context, Result};
use clap::Parser;
use collage_cli::output::{print_json, CollageSummary};
use collage_cli::{init_logging, LogProgress};
use collage_core::settings::parse_declick;
use collage_core::{create_collage_from_files, CollageConfig, CollageSettings, ProgressHandle};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "collage")]
#[command(about = "Rebuild a target audio file out of snippets of a sample audio file", long_about = None)]
struct Args {
    /// Audio file to approximate
    #[arg(long)]
    target: String,

    /// Audio file to take snippets from
    #[arg(long)]
    sample: String,

    /// Output WAV path
    #[arg(long, default_value = "collage.wav")]
    outpath: String,

    /// Window scales in ms, comma separated [default: 800,400,200,100,50]
    #[arg(long, value_delimiter = ',')]
    windows: Option<Vec<u32>>,

    /// Chop step in ms
    #[arg(long, conflicts_with = "step_factor")]
    step_ms: Option<u32>,

    /// Chop step as a fraction of the window length
    #[arg(long)]
    step_factor: Option<f64>,

    /// Crossfade shape: sigmoid, linear or none
    #[arg(long)]
    declick_fn: Option<String>,

    /// Crossfade length in ms (defaults per shape when only --declick-fn is given)
    #[arg(long)]
    declick_ms: Option<u32>,

    /// Distance function: mfcc, fast_mfcc, mean_mfcc, mfcc_cosine, chroma, mfcc_chroma, waveform
    #[arg(long)]
    distance_fn: Option<String>,

    /// Index cache directory [default: .cache]
    #[arg(long, conflicts_with = "no_cache")]
    cache_dir: Option<PathBuf>,

    /// Disable the index cache
    #[arg(long)]
    no_cache: bool,

    /// Abort when a built index cannot be written to the cache
    #[arg(long, conflicts_with = "no_cache")]
    strict_cache: bool,

    /// Parallel selection workers
    #[arg(long)]
    workers: Option<usize>,

    /// Working sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// TOML settings file; command-line options take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = build_config(&args)?;
    log::info!(
        "Collage of {} from {} (windows {:?}, distance {})",
        args.target,
        args.sample,
        config.windows(),
        config.distance_fn()
    );

    let report = create_collage_from_files(&config)?;
    print_json(&CollageSummary::new(report));
    Ok(())
}

fn build_config(args: &Args) -> Result<CollageConfig> {
    let mut builder = match &args.config {
        Some(path) => CollageSettings::load(path)?.to_builder()?,
        None => CollageConfig::builder(),
    };

    builder = builder
        .target_file(args.target.as_str())
        .sample_file(args.sample.as_str())
        .outpath(args.outpath.as_str());

    if let Some(windows) = &args.windows {
        builder = builder.windows(windows.clone());
    }
    if args.step_ms.is_some() || args.step_factor.is_some() {
        builder = builder.step_ms(args.step_ms).step_factor(args.step_factor);
    }
    if let Some(name) = &args.distance_fn {
        builder = builder.distance_fn(name.parse()?);
    }
    if let Some(name) = &args.declick_fn {
        let shape = parse_declick(name)?;
        let default_ms = shape.map_or(0, |s| s.default_crossfade_ms());
        builder = builder
            .declick_fn(shape)
            .declick_ms(args.declick_ms.unwrap_or(default_ms));
    } else if let Some(ms) = args.declick_ms {
        builder = builder.declick_ms(ms);
    }
    if args.no_cache {
        builder = builder.cache_dir(None);
    } else if let Some(dir) = &args.cache_dir {
        builder = builder.cache_dir(Some(dir.clone()));
    }
    if args.strict_cache {
        builder = builder.strict_cache(true);
    }
    if let Some(workers) = args.workers {
        builder = builder.workers(workers);
    }
    if let Some(rate) = args.sample_rate {
        builder = builder.sample_rate(rate);
    }

    if args.verbose {
        builder = builder.progress(ProgressHandle::new(Arc::new(LogProgress::new())));
    }

    builder.build().context("Invalid collage configuration")
}
