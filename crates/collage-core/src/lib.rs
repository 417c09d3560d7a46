//! Collage Core - concatenative audio synthesis
//!
//! Rebuilds a target recording out of short snippets of a sample recording.
//! The sample is chopped at several window scales, each scale gets a
//! vantage-point index over acoustic features, and a greedy scan over the
//! target picks the best snippet at every position. The chosen snippets are
//! joined with crossfades.

pub mod audio;
pub mod buffer;
pub mod chop;
pub mod config;
pub mod declick;
pub mod distance;
pub mod error;
pub mod features;
pub mod index;
pub mod mapper;
pub mod progress;
pub mod reconstruct;
pub mod settings;
pub mod vptree;
pub mod workflow;

pub use buffer::{AudioBuffer, WindowScale};
pub use chop::chop;
pub use config::{ChopStep, CollageConfig, CollageConfigBuilder};
pub use declick::{fade_in, fade_out, DeclickShape};
pub use distance::{align_distance, DistanceKind};
pub use error::{CollageError, Result};
pub use features::{shared_extractor, FeatureConfig, FeatureExtractor, FeatureMatrix};
pub use index::{content_hash, BestMatch, IndexCollection, MetricIndex};
pub use mapper::Mapper;
pub use progress::{Phase, ProgressEvent, ProgressHandle, ProgressSink, RecordingSink, Stage};
pub use reconstruct::concatenate;
pub use settings::CollageSettings;
pub use vptree::VpTree;
pub use workflow::{
    chop_and_write_from_file, create_collage, create_collage_from_files, CollageReport,
};
