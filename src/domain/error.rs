use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Please paste a video URL")]
    EmptyInput,

    #[error("Please enter a valid http(s) URL")]
    MalformedUrl,

    #[error("Unsupported link: {0}")]
    UnsupportedPlatform(String),

    #[error("Could not reach the download server: {0}")]
    Connectivity(String),

    #[error("Unexpected server response: {0}")]
    UnexpectedResponseFormat(String),

    #[error("Server error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(String),
}
