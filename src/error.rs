use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Upload Error: {0}")]
    Upload(#[from] UploadError),
    #[error("Poll Error: {0}")]
    Poll(#[from] PollError),
    #[error("Transport Error: {0}")]
    Transport(#[from] TransportError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Transport Error Type
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("the server did not return a task id")]
    MissingTaskId,
    #[error("Failed to analyze image: {0}")]
    Rejected(#[from] TransportError),
    #[error("not a supported image: {0}")]
    UnsupportedImage(String),
    #[error("image is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("status query failed: {0}")]
    Query(#[from] TransportError),
    #[error("analysis failed: {0}")]
    TaskFailed(String),
}

impl PollError {
    /// A failure reported by the server for the task itself. Polling never
    /// resumes after one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollError::TaskFailed(_))
    }
}
