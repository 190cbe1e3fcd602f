//! Endpoint normalization and liveness probing.
//!
//! The probe is the hard precondition gate of the update cycle: the
//! pipeline aborts before authenticating when the endpoint does not
//! answer its health path, so credential-bearing calls are never sent
//! to a dead host.
//!
//! # Status Model
//!
//! A probe returns an [`EndpointStatus`]:
//!
//! - [`Healthy`](EndpointStatus::Healthy) — health path answered 200
//! - [`Unhealthy`](EndpointStatus::Unhealthy) — answered with an error status
//! - [`Unreachable`](EndpointStatus::Unreachable) — connection refused / DNS failure
//! - [`Timeout`](EndpointStatus::Timeout) — no response within the deadline

use crate::error::{Result, RotationError};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Well-known health path of the service.
const HEALTH_PATH: &str = "xrpc/_health";

/// Normalize a raw endpoint address into a usable base URL.
///
/// - a missing scheme becomes `https://`
/// - `http://` is rewritten to `https://`, except for loopback hosts
///   (`localhost`, `127.0.0.1`, `::1`) so local development servers stay
///   reachable
/// - anything other than HTTP(S) is rejected
///
/// # Errors
///
/// Returns [`RotationError::Config`] for an empty or unparseable address.
pub fn normalize_endpoint(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RotationError::Config("endpoint address is empty".into()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| RotationError::Config(format!("invalid endpoint {trimmed:?}: {e}")))?;

    match url.scheme() {
        "https" => {}
        "http" if is_loopback_host(&url) => {}
        "http" => {
            url.set_scheme("https").map_err(|_| {
                RotationError::Config(format!("cannot secure endpoint {trimmed:?}"))
            })?;
        }
        other => {
            return Err(RotationError::Config(format!(
                "unsupported endpoint scheme {other:?} in {trimmed:?}"
            )));
        }
    }

    Ok(url)
}

fn is_loopback_host(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
    )
}

/// Status of the endpoint after probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointStatus {
    /// Health path answered 200.
    Healthy {
        /// Round-trip latency in milliseconds.
        latency_ms: u64,
    },
    /// Health path answered with an error status.
    Unhealthy {
        /// HTTP status code.
        status_code: u16,
        /// Truncated response body, or the status line when empty.
        message: String,
    },
    /// Connection refused, DNS failure, or another transport error.
    Unreachable,
    /// No response within the deadline.
    Timeout,
}

impl EndpointStatus {
    /// Returns `true` if the endpoint answered its health check.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy { latency_ms } => write!(f, "healthy ({latency_ms}ms)"),
            Self::Unhealthy {
                status_code,
                message,
            } => write!(f, "unhealthy (HTTP {status_code}): {message}"),
            Self::Unreachable => write!(f, "unreachable (connection failed)"),
            Self::Timeout => write!(f, "timeout (no response)"),
        }
    }
}

/// Bounded-timeout health prober for one endpoint.
pub struct EndpointProber {
    base: Url,
    client: reqwest::Client,
}

impl EndpointProber {
    /// Create a prober for a normalized base URL.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RotationError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base, client })
    }

    /// The base URL this prober targets.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Issue one health request and classify the outcome.
    ///
    /// Never returns an error: every failure mode is a status.
    pub async fn check(&self) -> EndpointStatus {
        let url = format!(
            "{}/{HEALTH_PATH}",
            self.base.as_str().trim_end_matches('/')
        );

        let start = std::time::Instant::now();
        match self.client.get(&url).send().await {
            Ok(resp) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let status_code = resp.status().as_u16();
                // Strict 200: a redirect or partial answer on the health
                // path is not "alive".
                if status_code == 200 {
                    EndpointStatus::Healthy { latency_ms }
                } else {
                    let body = resp.text().await.unwrap_or_default();
                    let message = if body.is_empty() {
                        format!("HTTP {status_code}")
                    } else {
                        body.chars().take(200).collect()
                    };
                    EndpointStatus::Unhealthy {
                        status_code,
                        message,
                    }
                }
            }
            Err(e) => classify_reqwest_error(&e),
        }
    }
}

/// Classify a reqwest error into an endpoint status.
fn classify_reqwest_error(err: &reqwest::Error) -> EndpointStatus {
    if err.is_timeout() {
        EndpointStatus::Timeout
    } else {
        EndpointStatus::Unreachable
    }
}
