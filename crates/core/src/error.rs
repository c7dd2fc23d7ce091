use thiserror::Error;

/// A result payload from one of the search sources did not have the shape
/// the source promises.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedSourceError {
    #[error("{source_name}: expected {expected}, got {found}")]
    UnexpectedShape {
        source_name: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("{source_name}: batch {batch} has {ids} ids but {metadatas} metadatas")]
    MisalignedBatch {
        source_name: &'static str,
        batch: usize,
        ids: usize,
        metadatas: usize,
    },

    #[error("{source_name}: {ids} id batches but {metadatas} metadata batches")]
    MisalignedBatchCount {
        source_name: &'static str,
        ids: usize,
        metadatas: usize,
    },
}

/// Per-modality caption results could not be combined segment by segment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("caption length mismatch: visual={visual}, speech={speech}, audio={audio}")]
    LengthMismatch {
        visual: usize,
        speech: usize,
        audio: usize,
    },

    #[error(
        "interval mismatch at segment {index}: {modality} has [{found_start}, {found_end}], visual has [{expected_start}, {expected_end}]"
    )]
    IntervalMismatch {
        index: usize,
        modality: &'static str,
        expected_start: f64,
        expected_end: f64,
        found_start: f64,
        found_end: f64,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntervalError {
    #[error("interval bounds must be finite, got [{start}, {end}]")]
    NotFinite { start: f64, end: f64 },

    #[error("interval start {start} is after end {end}")]
    Inverted { start: f64, end: f64 },
}

#[derive(Error, Debug)]
pub enum ScenesearchError {
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid interval: {0}")]
    InvalidInterval(#[from] IntervalError),

    #[error("No scenes found in the requested range")]
    NoScenesInRange,

    #[error("Malformed source payload: {0}")]
    MalformedSource(#[from] MalformedSourceError),

    #[error("Segment assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("{service} returned HTTP {status}: {body}")]
    UpstreamStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Metadata query failed: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Background task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl ScenesearchError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Whether the caller caused this error (bad input) rather than a
    /// collaborator or the engine itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. } | Self::InvalidInterval(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScenesearchError>;
