//! HTTP clients for the services this engine coordinates.

pub mod captioner;
pub mod http;
pub mod query_analyzer;
pub mod scene_detector;
pub mod translator;
pub mod vector_index;

pub use captioner::*;
pub use http::*;
pub use query_analyzer::*;
pub use scene_detector::*;
pub use translator::*;
pub use vector_index::*;
