use std::borrow::Cow;
use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::http::{HeaderList, HttpClient, HttpRequest};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A single request against the proxy, relative to the prober's base URL.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: http::Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl ProbeRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(http::Method::GET, path)
    }

    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// The exception-free result of a probe.
///
/// `status` is `None` when the exchange failed at the transport level (connect refused, DNS,
/// TLS, timeout). In that case `body` holds a diagnostic message instead of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: Option<u16>,
    pub headers: HeaderList,
    pub body: Bytes,
    pub latency: Duration,
}

impl ProbeOutcome {
    pub fn response(status: u16, headers: HeaderList, body: Bytes, latency: Duration) -> Self {
        Self {
            status: Some(status),
            headers,
            body,
            latency,
        }
    }

    pub fn transport_failure(diagnostic: impl Into<String>, latency: Duration) -> Self {
        Self {
            status: None,
            headers: HeaderList::default(),
            body: Bytes::from(diagnostic.into()),
            latency,
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status.is_none()
    }

    pub fn status_in(&self, accepted: &[u16]) -> bool {
        self.status.is_some_and(|s| accepted.contains(&s))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// First `max_chars` characters of the body, lossily decoded.
    pub fn body_preview(&self, max_chars: usize) -> String {
        self.body_text().chars().take(max_chars).collect()
    }

    /// Hex MD5 of the body, or `None` for an empty body.
    pub fn body_md5(&self) -> Option<String> {
        if self.body.is_empty() {
            return None;
        }
        Some(format!("{:x}", md5::compute(&self.body)))
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

/// Issues probes. Implemented over HTTP by [`HttpProber`]; the driver and poller are generic
/// over it so they can run against any transport.
pub trait Probe: Send + Sync {
    fn probe(&self, req: &ProbeRequest) -> impl Future<Output = ProbeOutcome> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpProber {
    client: HttpClient,
    base_url: String,
}

impl HttpProber {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, HttpClient::default())
    }

    pub fn with_client(base_url: &str, client: HttpClient) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed =
            url::Url::parse(trimmed).map_err(|_| Error::InvalidBaseUrl(base_url.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if parsed.host_str().is_none() {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            client,
            base_url: trimmed.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

impl Probe for HttpProber {
    async fn probe(&self, req: &ProbeRequest) -> ProbeOutcome {
        let mut http_req = HttpRequest::new(req.method.clone(), self.url_for(&req.path));
        http_req.headers = req.headers.clone();
        http_req.body = req.body.clone().unwrap_or_default();
        http_req.timeout = Some(req.timeout);

        let started = Instant::now();
        let res = self.client.request(http_req).await;
        let latency = started.elapsed();

        match res {
            Ok(res) => ProbeOutcome::response(res.status, res.headers, res.body, latency),
            Err(err) => {
                tracing::debug!(
                    method = %req.method,
                    path = %req.path,
                    kind = %err.kind(),
                    "probe transport failure: {err}"
                );
                ProbeOutcome::transport_failure(err.to_string(), latency)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_validated_and_trimmed() {
        let prober = HttpProber::new("http://localhost:8080/")
            .unwrap_or_else(|err| panic!("valid base url rejected: {err}"));
        assert_eq!(prober.base_url(), "http://localhost:8080");
        assert_eq!(prober.url_for("/health"), "http://localhost:8080/health");
        assert_eq!(prober.url_for("health"), "http://localhost:8080/health");

        assert!(matches!(
            HttpProber::new("not a url"),
            Err(Error::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            HttpProber::new("ftp://localhost"),
            Err(Error::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn outcome_helpers_classify_and_hash() {
        let ok = ProbeOutcome::response(
            200,
            HeaderList::default(),
            Bytes::from_static(b"hello"),
            Duration::from_millis(12),
        );
        assert!(ok.status_in(&[200, 404]));
        assert!(!ok.is_transport_failure());
        assert_eq!(
            ok.body_md5().as_deref(),
            Some("5d41402abc4b2a76b9719d911017c592")
        );
        assert_eq!(ok.body_preview(3), "hel");

        let failed = ProbeOutcome::transport_failure("connection refused", Duration::ZERO);
        assert!(failed.is_transport_failure());
        assert!(!failed.status_in(&[200]));
        assert_eq!(failed.body_text(), "connection refused");

        let empty = ProbeOutcome::response(
            204,
            HeaderList::default(),
            Bytes::new(),
            Duration::ZERO,
        );
        assert_eq!(empty.body_md5(), None);
    }
}
