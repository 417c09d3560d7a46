//! chop - cut an audio file into fixed-length WAV snippets
//!
//! Usage: chop --file <audio> --outdir <dir> [--length 500]

use anyhow::Result;
use clap::Parser;
use collage_cli::output::{print_json, ChopSummary};
use collage_cli::{init_logging, LogProgress};
use collage_core::{chop_and_write_from_file, ChopStep, ProgressHandle};
use std::path::Path;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "chop")]
#[command(about = "Chop up an audio file into fixed-length WAV snippets", long_about = None)]
struct Args {
    /// Input audio file
    #[arg(long)]
    file: String,

    /// Output directory for the snippets
    #[arg(long)]
    outdir: String,

    /// Snippet length in ms
    #[arg(long, default_value_t = 500)]
    length: u32,

    /// Step between snippet starts in ms
    #[arg(long, conflicts_with = "step_factor")]
    step_ms: Option<u32>,

    /// Step as a fraction of the snippet length
    #[arg(long)]
    step_factor: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.length == 0 {
        anyhow::bail!("--length must be > 0");
    }
    let step = ChopStep::from_options(args.step_ms, args.step_factor)?;
    let progress = if args.verbose {
        ProgressHandle::new(Arc::new(LogProgress::new()))
    } else {
        ProgressHandle::none()
    };

    log::info!("Chopping {} into {}ms snippets", args.file, args.length);
    let files = chop_and_write_from_file(
        Path::new(&args.file),
        Path::new(&args.outdir),
        args.length,
        step,
        &progress,
    )?;

    print_json(&ChopSummary::new(&args.file, &args.outdir, args.length, &files));
    Ok(())
}
