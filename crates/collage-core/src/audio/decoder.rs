//! Format dispatch and per-codec decoders

use super::{decode_container, resample_linear, AudioFormat};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Interleaved PCM as it came out of a decoder
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let frames = samples.len() as f64 / channels.max(1) as f64;
        let duration_ms = if sample_rate == 0 {
            0
        } else {
            (frames / sample_rate as f64 * 1000.0) as u32
        };
        Self {
            samples,
            sample_rate,
            channels,
            duration_ms,
        }
    }

    /// Average the channels of each frame
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }

    /// Mono copy at `target_rate`
    pub fn into_mono_at(self, target_rate: u32) -> AudioData {
        let mono = self.to_mono();
        let samples = resample_linear(&mono, self.sample_rate, target_rate);
        AudioData::new(samples, target_rate, 1)
    }
}

/// Decode `path` to mono at `target_rate`
pub fn decode_audio(path: &Path, target_rate: u32) -> Result<AudioData> {
    Ok(decode_file(path)?.into_mono_at(target_rate))
}

/// Decode `path` as stored: interleaved, at the file's own sample rate
pub fn decode_file(path: &Path) -> Result<AudioData> {
    if !path.exists() {
        bail!("Audio file not found: {}", path.display());
    }

    let format = AudioFormat::from_path(path);
    let decoded = match format {
        AudioFormat::Wav => decode_wav(path)?,
        AudioFormat::Mp3 => decode_mp3(path)?,
        AudioFormat::Flac => decode_flac(path)?,
        AudioFormat::Ogg => decode_ogg(path)?,
        f if f.is_container() => decode_container(path)?,
        _ => bail!("Unsupported audio format: {}", path.display()),
    };

    if decoded.sample_rate == 0 {
        bail!("No audio frames decoded from {}", path.display());
    }

    log::debug!(
        "Decoded {}: {} Hz, {} channel(s), {} ms",
        path.display(),
        decoded.sample_rate,
        decoded.channels,
        decoded.duration_ms
    );
    Ok(decoded)
}

fn decode_wav(path: &Path) -> Result<AudioData> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok(AudioData::new(samples, spec.sample_rate, spec.channels))
}

fn decode_mp3(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open MP3 file: {}", path.display()))?;
    let mut decoder = minimp3::Decoder::new(std::io::BufReader::new(file));

    let mut samples = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0u16;
    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                    channels = frame.channels as u16;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => bail!("MP3 decode error in {}: {}", path.display(), e),
        }
    }
    Ok(AudioData::new(samples, sample_rate, channels))
}

fn decode_flac(path: &Path) -> Result<AudioData> {
    let mut reader = claxon::FlacReader::open(path)
        .with_context(|| format!("Failed to open FLAC file: {}", path.display()))?;
    let info = reader.streaminfo();
    let scale = (1i64 << (info.bits_per_sample - 1)) as f32;

    let samples = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(AudioData::new(samples, info.sample_rate, info.channels as u16))
}

fn decode_ogg(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open OGG file: {}", path.display()))?;
    let mut reader = lewton::inside_ogg::OggStreamReader::new(file)?;
    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as u16;

    let mut samples = Vec::new();
    while let Some(packet) = reader.read_dec_packet_itl()? {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }
    Ok(AudioData::new(samples, sample_rate, channels))
}
