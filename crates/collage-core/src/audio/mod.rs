//! Audio file I/O
//!
//! Decodes WAV, MP3, FLAC and OGG Vorbis with dedicated pure-Rust decoders and
//! the audio track of video containers (MP4, MKV, MOV, WebM) with Symphonia.
//! Everything is down-mixed to mono and resampled to the working rate.

mod decoder;
mod resample;
mod video;
mod writer;

pub use decoder::{decode_audio, decode_file, AudioData};
pub use resample::resample_linear;
pub use video::decode_container;
pub use writer::write_wav;

use std::path::Path;

/// Container/codec family, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Mkv,
    Mov,
    Webm,
    Unknown,
}

impl AudioFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("wav" | "wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg" | "oga") => AudioFormat::Ogg,
            Some("mp4" | "m4a" | "m4v") => AudioFormat::Mp4,
            Some("mkv" | "mka") => AudioFormat::Mkv,
            Some("mov") => AudioFormat::Mov,
            Some("webm") => AudioFormat::Webm,
            _ => AudioFormat::Unknown,
        }
    }

    /// Formats decoded through Symphonia's demuxers
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            AudioFormat::Mp4 | AudioFormat::Mkv | AudioFormat::Mov | AudioFormat::Webm
        )
    }
}
