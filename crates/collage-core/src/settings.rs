//! TOML settings file
//!
//! Every key is optional; missing keys take the same defaults as
//! [`CollageConfig`].
//!
//! ```toml
//! [collage]
//! windows = [400, 200, 100]
//! distance_fn = "fast_mfcc"
//! declick_fn = "linear"      # or "none"
//! declick_ms = 70            # defaults per shape when omitted
//! step_factor = 0.5
//! workers = 4
//!
//! [cache]
//! enabled = true
//! directory = ".cache"
//! compress = false
//! strict = false             # abort when the index cannot be cached
//!
//! [audio]
//! sample_rate = 22050
//! ```

use crate::config::{
    CollageConfig, CollageConfigBuilder, DEFAULT_CACHE_DIR, DEFAULT_SAMPLE_RATE, DEFAULT_WINDOWS,
};
use crate::declick::DeclickShape;
use crate::distance::DistanceKind;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CollageSettings {
    #[serde(default)]
    pub collage: CollageSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub audio: AudioSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollageSection {
    #[serde(default = "default_windows")]
    pub windows: Vec<u32>,
    #[serde(default = "default_distance_fn")]
    pub distance_fn: String,
    /// Shape name, or "none" to disable crossfades
    #[serde(default)]
    pub declick_fn: Option<String>,
    /// Crossfade length; the shape's default when only a shape is given
    #[serde(default)]
    pub declick_ms: Option<u32>,
    #[serde(default)]
    pub step_ms: Option<u32>,
    #[serde(default)]
    pub step_factor: Option<f64>,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for CollageSection {
    fn default() -> Self {
        Self {
            windows: default_windows(),
            distance_fn: default_distance_fn(),
            declick_fn: None,
            declick_ms: None,
            step_ms: None,
            step_factor: None,
            workers: default_workers(),
        }
    }
}

fn default_windows() -> Vec<u32> {
    DEFAULT_WINDOWS.to_vec()
}
fn default_distance_fn() -> String {
    DistanceKind::Mfcc.name().to_string()
}
fn default_workers() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_dir")]
    pub directory: String,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub strict: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_cache_dir(),
            compress: false,
            strict: false,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioSection {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
        }
    }
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

/// Parse a declick name; "none", "off" and "" disable crossfading
pub fn parse_declick(name: &str) -> Result<Option<DeclickShape>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "off" => Ok(None),
        other => other.parse().map(Some),
    }
}

impl CollageSettings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read settings file {}: {}", path.display(), e))?;
        let settings: CollageSettings = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML settings: {}", e))?;
        Ok(settings)
    }

    /// Builder pre-populated from these settings, for further overrides
    pub fn to_builder(&self) -> Result<CollageConfigBuilder> {
        let section = &self.collage;
        let cache_dir = self
            .cache
            .enabled
            .then(|| PathBuf::from(&self.cache.directory));

        let mut builder = CollageConfig::builder()
            .windows(section.windows.clone())
            .distance_fn(section.distance_fn.parse()?)
            .step_ms(section.step_ms)
            .step_factor(section.step_factor)
            .workers(section.workers)
            .sample_rate(self.audio.sample_rate)
            .cache_dir(cache_dir)
            .compress_cache(self.cache.compress)
            .strict_cache(self.cache.strict);

        match (&section.declick_fn, section.declick_ms) {
            (Some(name), ms) => {
                let shape = parse_declick(name)?;
                let default_ms = shape.map_or(0, |s| s.default_crossfade_ms());
                builder = builder
                    .declick_fn(shape)
                    .declick_ms(ms.unwrap_or(default_ms));
            }
            (None, Some(ms)) => builder = builder.declick_ms(ms),
            (None, None) => {}
        }
        Ok(builder)
    }

    pub fn into_config(
        self,
        target: impl Into<String>,
        sample: impl Into<String>,
        outpath: impl Into<String>,
    ) -> Result<CollageConfig> {
        self.to_builder()?
            .target_file(target)
            .sample_file(sample)
            .outpath(outpath)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChopStep;
    use crate::error::CollageError;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings: CollageSettings = toml::from_str("").unwrap();
        let config = settings.into_config("t.wav", "s.wav", "out.wav").unwrap();
        assert_eq!(config.windows(), &DEFAULT_WINDOWS);
        assert_eq!(config.distance_fn(), DistanceKind::Mfcc);
        assert_eq!(config.declick_fn(), Some(DeclickShape::Sigmoid));
        assert_eq!(config.sample_rate(), 22050);
        assert_eq!(config.cache_dir(), Some(Path::new(".cache")));
        assert_eq!(config.target_file(), Some("t.wav"));
    }

    #[test]
    fn test_parse_full_settings() {
        let toml_str = r#"
            [collage]
            windows = [400, 200]
            distance_fn = "fast_mfcc"
            declick_fn = "none"
            declick_ms = 30
            step_factor = 0.25
            workers = 4

            [cache]
            enabled = false

            [audio]
            sample_rate = 16000
        "#;
        let settings: CollageSettings = toml::from_str(toml_str).unwrap();
        let config = settings.into_config("t", "s", "o").unwrap();
        assert_eq!(config.windows(), &[400, 200]);
        assert_eq!(config.distance_fn(), DistanceKind::FastMfcc);
        assert_eq!(config.declick_fn(), None);
        assert_eq!(config.crossfade_ms(), 0);
        assert_eq!(config.chop_step(), ChopStep::Ratio(0.25));
        assert_eq!(config.workers(), 4);
        assert_eq!(config.sample_rate(), 16000);
        assert!(config.cache_dir().is_none());
    }

    #[test]
    fn test_shape_without_length_uses_shape_default() {
        let settings: CollageSettings =
            toml::from_str("[collage]\ndeclick_fn = \"linear\"\n").unwrap();
        let config = settings.into_config("t", "s", "o").unwrap();
        assert_eq!(config.declick_fn(), Some(DeclickShape::Linear));
        assert_eq!(config.crossfade_ms(), 70);

        let settings: CollageSettings =
            toml::from_str("[collage]\ndeclick_fn = \"sigmoid\"\n").unwrap();
        assert_eq!(settings.into_config("t", "s", "o").unwrap().crossfade_ms(), 20);
    }

    #[test]
    fn test_explicit_length_wins() {
        let toml_str = r#"
            [collage]
            declick_fn = "linear"
            declick_ms = 15
        "#;
        let settings: CollageSettings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.into_config("t", "s", "o").unwrap().crossfade_ms(), 15);

        // Length alone keeps the default shape
        let settings: CollageSettings = toml::from_str("[collage]\ndeclick_ms = 40\n").unwrap();
        let config = settings.into_config("t", "s", "o").unwrap();
        assert_eq!(config.declick_fn(), Some(DeclickShape::Sigmoid));
        assert_eq!(config.crossfade_ms(), 40);
    }

    #[test]
    fn test_strict_cache_setting() {
        let settings: CollageSettings = toml::from_str("[cache]\nstrict = true\n").unwrap();
        assert!(settings.into_config("t", "s", "o").unwrap().strict_cache());
        let settings: CollageSettings = toml::from_str("").unwrap();
        assert!(!settings.into_config("t", "s", "o").unwrap().strict_cache());
    }

    #[test]
    fn test_conflicting_steps_rejected() {
        let toml_str = r#"
            [collage]
            step_ms = 100
            step_factor = 0.5
        "#;
        let settings: CollageSettings = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            settings.into_config("t", "s", "o"),
            Err(CollageError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_distance_rejected() {
        let toml_str = r#"
            [collage]
            distance_fn = "spectral"
        "#;
        let settings: CollageSettings = toml::from_str(toml_str).unwrap();
        assert!(settings.to_builder().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collage.toml");
        std::fs::write(&path, "[audio]\nsample_rate = 8000\n").unwrap();
        let settings = CollageSettings::load(&path).unwrap();
        assert_eq!(settings.audio.sample_rate, 8000);
        assert_eq!(settings.collage.windows, DEFAULT_WINDOWS.to_vec());
    }

    #[test]
    fn test_parse_declick() {
        assert_eq!(parse_declick("None").unwrap(), None);
        assert_eq!(parse_declick("linear").unwrap(), Some(DeclickShape::Linear));
        assert!(parse_declick("square").is_err());
    }
}
