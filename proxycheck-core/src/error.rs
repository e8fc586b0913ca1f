use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid base url `{0}`")]
    InvalidBaseUrl(String),

    #[error("unsupported base url scheme `{0}` (expected http or https)")]
    UnsupportedScheme(String),

    #[error("`{0}` must be a positive integer")]
    NotPositive(&'static str),

    #[error("`{0}` must be a positive duration")]
    ZeroDuration(&'static str),

    #[error("`{0}` must not exceed {secs}s", secs = .1.as_secs())]
    DurationTooLarge(&'static str, Duration),

    #[error("`target` cannot be empty")]
    EmptyTarget,

    #[error("failed to encode report: {0}")]
    ReportEncode(#[from] serde_json::Error),
}
