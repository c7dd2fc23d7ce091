pub mod assemble;
pub mod clients;
pub mod config;
pub mod error;
pub mod format;
pub mod interval;
pub mod metadata;
pub mod normalize;
pub mod process;
pub mod ranking;
pub mod search;
pub mod services;
pub mod types;

pub use assemble::assemble;
pub use config::{EngineConfig, default_config_path};
pub use error::{Result, ScenesearchError};
pub use format::{format_interval, format_results_readable, format_segments_readable, format_timestamp};
pub use interval::{Interval, OverlapMode, filter_overlapping};
pub use normalize::{NormalizedSource, RawResultSet, canonicalize, normalize};
pub use process::{ProcessPipeline, ProcessRequest};
pub use ranking::rank;
pub use search::SearchEngine;
pub use services::Services;
pub use types::{CaptionResult, Modality, ProcessedVideo, RankedEntry, Segment};
