//! JSON output formatting

use collage_core::CollageReport;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct CollageSummary {
    pub status: &'static str,
    #[serde(flatten)]
    pub report: CollageReport,
}

impl CollageSummary {
    pub fn new(report: CollageReport) -> Self {
        Self {
            status: "ok",
            report,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChopSummary {
    pub input: String,
    pub outdir: String,
    pub length_ms: u32,
    pub snippets: usize,
    pub files: Vec<String>,
}

impl ChopSummary {
    pub fn new(input: &str, outdir: &str, length_ms: u32, files: &[PathBuf]) -> Self {
        Self {
            input: input.to_string(),
            outdir: outdir.to_string(),
            length_ms,
            snippets: files.len(),
            files: files
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}
