use std::path::PathBuf;

/// Message shown to the user whenever an analysis request fails.
///
/// The underlying cause is logged, never rendered verbatim.
pub const FAILURE_MESSAGE: &str = "Analysis failed. Please try again.";

/// A candidate file was refused before anything reached the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The declared media type is not an `image/*` type.
    #[error("'{media_type}' is not an image, please choose an image file")]
    NotAnImage { media_type: String },
    /// The file is larger than the configured limit.
    #[error("image is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    /// The file has no content.
    #[error("image file is empty")]
    Empty,
}

/// Failure of an outbound analysis request.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response has {labels} labels but {probabilities} probabilities")]
    LengthMismatch { labels: usize, probabilities: usize },
    /// The service scored a different number of labels than were submitted.
    #[error("submitted {submitted} labels but the service scored {returned}")]
    LabelCountMismatch { submitted: usize, returned: usize },
    #[error("analysis engine is not running")]
    EngineStopped,
}

/// Failure while reading a candidate image from disk.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while loading or validating the client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
