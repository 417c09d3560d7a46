//! End-to-end operations: collage generation and file chopping

use crate::audio::{self, write_wav};
use crate::buffer::AudioBuffer;
use crate::chop::chop;
use crate::config::{ChopStep, CollageConfig};
use crate::error::Result;
use crate::mapper::Mapper;
use crate::progress::ProgressHandle;
use crate::reconstruct::concatenate;
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Rebuild `target` from snippets of `sample`
pub fn create_collage(
    sample: &AudioBuffer,
    target: &AudioBuffer,
    config: &CollageConfig,
) -> Result<AudioBuffer> {
    let (collage, _) = run(sample, target, config)?;
    Ok(collage)
}

fn run(
    sample: &AudioBuffer,
    target: &AudioBuffer,
    config: &CollageConfig,
) -> Result<(AudioBuffer, usize)> {
    let mapper = Mapper::new(sample, config)?;
    let snippets = mapper.map_audio(target)?;
    log::info!("Selected {} snippets", snippets.len());

    let collage = concatenate(
        &snippets,
        config.crossfade_ms(),
        config.declick_fn(),
        target.sample_rate(),
        config.progress(),
    )?;
    Ok((collage, snippets.len()))
}

/// Summary of one file-to-file collage run
#[derive(Debug, Clone, Serialize)]
pub struct CollageReport {
    pub target_file: String,
    pub sample_file: String,
    pub outpath: String,
    pub sample_rate: u32,
    pub target_duration_ms: f64,
    pub sample_duration_ms: f64,
    pub output_duration_ms: f64,
    pub snippets: usize,
    pub windows: Vec<u32>,
    pub distance_fn: String,
    pub declick_fn: Option<String>,
    pub crossfade_ms: u32,
    pub load_ms: u128,
    pub process_ms: u128,
    pub write_ms: u128,
}

/// Load target and sample files at the working rate, build the collage and
/// write it to the configured output path.
pub fn create_collage_from_files(config: &CollageConfig) -> anyhow::Result<CollageReport> {
    let target_file = config.target_file().context("No target file configured")?;
    let sample_file = config.sample_file().context("No sample file configured")?;
    let outpath = config.outpath().context("No output path configured")?;
    let rate = config.sample_rate();

    let started = Instant::now();
    let target = AudioBuffer::from_file(target_file, rate)
        .with_context(|| format!("Failed to load target {}", target_file))?;
    let sample = AudioBuffer::from_file(sample_file, rate)
        .with_context(|| format!("Failed to load sample {}", sample_file))?;
    let load_ms = started.elapsed().as_millis();
    log::info!(
        "Loaded target ({:.1}s) and sample ({:.1}s) at {} Hz",
        target.duration_ms() / 1000.0,
        sample.duration_ms() / 1000.0,
        rate
    );

    let started = Instant::now();
    let (collage, snippets) = run(&sample, &target, config)?;
    let process_ms = started.elapsed().as_millis();

    let started = Instant::now();
    write_wav(&collage, Path::new(outpath))?;
    let write_ms = started.elapsed().as_millis();
    log::info!("Wrote {}", outpath);

    Ok(CollageReport {
        target_file: target_file.to_string(),
        sample_file: sample_file.to_string(),
        outpath: outpath.to_string(),
        sample_rate: rate,
        target_duration_ms: target.duration_ms(),
        sample_duration_ms: sample.duration_ms(),
        output_duration_ms: collage.duration_ms(),
        snippets,
        windows: config.windows().to_vec(),
        distance_fn: config.distance_fn().name().to_string(),
        declick_fn: config.declick_fn().map(|s| s.name().to_string()),
        crossfade_ms: config.crossfade_ms(),
        load_ms,
        process_ms,
        write_ms,
    })
}

/// Chop `input` into `length_ms` snippets at its own sample rate and write
/// them to `outdir` as `0000.wav`, `0001.wav`, ...
pub fn chop_and_write_from_file(
    input: &Path,
    outdir: &Path,
    length_ms: u32,
    step: ChopStep,
    progress: &ProgressHandle,
) -> anyhow::Result<Vec<PathBuf>> {
    let decoded = audio::decode_file(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let rate = decoded.sample_rate;
    let buffer = AudioBuffer::new(decoded.to_mono(), rate);

    std::fs::create_dir_all(outdir)
        .with_context(|| format!("Failed to create {}", outdir.display()))?;

    let snippets = chop(&buffer, length_ms, step, progress);
    let mut written = Vec::with_capacity(snippets.len());
    for (i, snippet) in snippets.iter().enumerate() {
        let path = outdir.join(format!("{:04}.wav", i));
        write_wav(snippet, &path)?;
        written.push(path);
    }
    log::info!(
        "Wrote {} snippets of {}ms to {}",
        written.len(),
        length_ms,
        outdir.display()
    );
    Ok(written)
}
