//! Endpoint descriptors and retry policies
//!
//! Endpoint descriptors are immutable once constructed and validated at
//! adapter construction: missing or invalid values fail fast with a
//! configuration error, there is no degraded mode.
//!
//! Reconnection and command retry are deliberately two distinct policy
//! types. Reconnection never gives up (hardware links are assumed to
//! recover); command retry fails after a bounded number of attempts. Folding
//! them into one generic retry abstraction would blur that difference.

use std::time::Duration;
use url::Url;

use crate::error::LinkError;

/// TCP endpoint for streaming hardware (e.g. a network camera)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpEndpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl TcpEndpoint {
    /// Create and validate a TCP endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, LinkError> {
        let endpoint = Self {
            host: host.into(),
            port,
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    fn validate(&self) -> Result<(), LinkError> {
        if self.host.trim().is_empty() {
            return Err(LinkError::config_error("host", "host must not be empty"));
        }
        if self.port == 0 {
            return Err(LinkError::config_error("port", "port must be non-zero"));
        }
        Ok(())
    }

    /// Socket address string for connecting
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Serial endpoint for line-protocol hardware (e.g. a door controller)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialEndpoint {
    /// Serial port path, e.g. `/dev/ttyUSB0`
    pub path: String,
    /// Baud rate, e.g. 9600
    pub baud_rate: u32,
}

impl SerialEndpoint {
    /// Create and validate a serial endpoint
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Result<Self, LinkError> {
        let endpoint = Self {
            path: path.into(),
            baud_rate,
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    fn validate(&self) -> Result<(), LinkError> {
        if self.path.trim().is_empty() {
            return Err(LinkError::config_error("path", "port path must not be empty"));
        }
        if self.baud_rate == 0 {
            return Err(LinkError::config_error(
                "baud_rate",
                "baud rate must be non-zero",
            ));
        }
        Ok(())
    }
}

/// HTTP endpoint for request/response hardware (e.g. an elevator controller)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEndpoint {
    /// Base URL, e.g. `http://elevators.local:8080/`
    pub base_url: Url,
}

impl HttpEndpoint {
    /// Create and validate an HTTP endpoint
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, LinkError> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| LinkError::config_error("base_url", e.to_string()))?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(LinkError::config_error(
                "base_url",
                format!("unsupported scheme '{}'", base_url.scheme()),
            ));
        }
        Ok(Self { base_url })
    }

    /// Resolve a path against the base URL
    pub fn join(&self, path: &str) -> Result<Url, LinkError> {
        self.base_url
            .join(path)
            .map_err(|e| LinkError::config_error("base_url", e.to_string()))
    }
}

/// Unbounded reconnection policy - never gives up
///
/// Liveness over latency: a fixed delay between attempts, repeated forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay between reconnect attempts
    pub delay: Duration,
}

impl ReconnectPolicy {
    /// Fixed-delay policy
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

/// Bounded command retry policy - fails after `max_attempts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRetryPolicy {
    /// Maximum number of round-trip attempts
    pub max_attempts: u32,
    /// Linear backoff step; the delay after attempt `k` is `k * backoff_step`
    pub backoff_step: Duration,
    /// Per-attempt response deadline
    pub attempt_timeout: Duration,
}

impl CommandRetryPolicy {
    /// Backoff delay after the given 1-based attempt number (non-decreasing)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    fn validate(&self) -> Result<(), LinkError> {
        if self.max_attempts == 0 {
            return Err(LinkError::config_error(
                "max_attempts",
                "at least one attempt is required",
            ));
        }
        Ok(())
    }

    /// Validate and return the policy
    pub fn build(self) -> Result<Self, LinkError> {
        self.validate()?;
        Ok(self)
    }
}

impl Default for CommandRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(1),
        }
    }
}
