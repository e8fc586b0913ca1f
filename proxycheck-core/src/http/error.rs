use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a probe ended without an HTTP response. Logged in snake_case next to the diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransportFailureKind {
    /// The request never left the process (bad url, scheme or header).
    InvalidRequest,
    Connect,
    Exchange,
    Timeout,
    BodyRead,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed probe url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme (expected http or https): {0}")]
    UnsupportedScheme(String),

    #[error("invalid probe header `{0}`")]
    InvalidHeader(String),

    #[error("could not assemble request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("request failed: {0}")]
    Exchange(#[from] hyper_util::client::legacy::Error),

    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("response body interrupted: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> TransportFailureKind {
        match self {
            Self::InvalidUrl(_)
            | Self::UnsupportedScheme(_)
            | Self::InvalidHeader(_)
            | Self::RequestBuild(_) => TransportFailureKind::InvalidRequest,
            Self::Exchange(err) if err.is_connect() => TransportFailureKind::Connect,
            Self::Exchange(_) => TransportFailureKind::Exchange,
            Self::Timeout(_) => TransportFailureKind::Timeout,
            Self::BodyRead(_) => TransportFailureKind::BodyRead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_renders_in_millis() {
        let err = Error::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "no response within 1500ms");
        assert_eq!(err.kind().to_string(), "timeout");
    }
}
