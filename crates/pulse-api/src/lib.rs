//! Collector delivery client and session cache.
//!
//! A [`Session`] wraps an authenticated blocking HTTP client; the
//! [`SessionCache`] keeps one per destination host so repeated sends within
//! an invocation reuse the same connection state instead of paying the
//! handshake cost again. The cache is memory-only and rebuilt per process.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use thiserror::Error;

use pulse_core::Heartbeat;

/// Default request timeout for delivery attempts.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivery client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl ApiError {
    /// Whether this failure is a plain timeout. Timeouts indicate generic
    /// connectivity loss rather than stale session state, so they do not
    /// invalidate the cached session.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout(),
            Self::ClientBuild(_) => false,
        }
    }
}

/// Application-level result of a delivery attempt that reached the
/// collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx response; the collector accepted the heartbeat.
    Accepted,
    /// Any other status. An application outcome, not a session failure.
    Rejected { status: u16 },
}

fn classify(status: StatusCode) -> Outcome {
    if status.is_success() {
        Outcome::Accepted
    } else {
        Outcome::Rejected {
            status: status.as_u16(),
        }
    }
}

/// A reusable delivery session.
pub struct Session {
    http: Client,
    api_key: Option<String>,
    last_used: Cell<Instant>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("last_used", &self.last_used.get())
            .finish_non_exhaustive()
    }
}

impl Session {
    fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::ClientBuild)?;
        Ok(Self {
            http,
            api_key,
            last_used: Cell::new(Instant::now()),
        })
    }

    /// Attempts delivery of one heartbeat.
    ///
    /// Transport failures (connection refused or reset, timeout) are errors;
    /// a response of any status is an [`Outcome`].
    pub fn send(&self, api_url: &str, heartbeat: &Heartbeat) -> Result<Outcome, ApiError> {
        self.last_used.set(Instant::now());
        let mut request = self.http.post(api_url).json(heartbeat);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let response = request.send().map_err(ApiError::Transport)?;
        Ok(classify(response.status()))
    }

    /// When this session last attempted a send.
    pub fn last_used(&self) -> Instant {
        self.last_used.get()
    }
}

/// Process-wide cache of delivery sessions keyed by destination host.
pub struct SessionCache {
    api_key: Option<String>,
    timeout: Duration,
    sessions: HashMap<String, Session>,
}

impl SessionCache {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            api_key,
            timeout,
            sessions: HashMap::new(),
        }
    }

    /// Returns the cached session for a destination, constructing it lazily
    /// on first use.
    pub fn get(&mut self, destination: &str) -> Result<&Session, ApiError> {
        match self.sessions.entry(destination.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let session = Session::new(self.api_key.clone(), self.timeout)?;
                Ok(entry.insert(session))
            }
        }
    }

    /// Drops the cached session so the next [`SessionCache::get`] builds
    /// fresh connection state.
    pub fn invalidate(&mut self, destination: &str) {
        if self.sessions.remove(destination).is_some() {
            tracing::debug!(destination, "invalidated delivery session");
        }
    }

    /// Whether a session is currently cached for a destination.
    pub fn contains(&self, destination: &str) -> bool {
        self.sessions.contains_key(destination)
    }
}

/// Cache key for an API endpoint: its host, falling back to the raw URL
/// when it cannot be parsed.
pub fn destination(api_url: &str) -> String {
    reqwest::Url::parse(api_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| api_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_splits_on_2xx() {
        assert_eq!(classify(StatusCode::CREATED), Outcome::Accepted);
        assert_eq!(classify(StatusCode::OK), Outcome::Accepted);
        assert_eq!(
            classify(StatusCode::BAD_GATEWAY),
            Outcome::Rejected { status: 502 }
        );
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED),
            Outcome::Rejected { status: 401 }
        );
    }

    #[test]
    fn cache_constructs_lazily_and_caches() {
        let mut cache = SessionCache::new(None);
        assert!(!cache.contains("api.example.com"));

        cache.get("api.example.com").unwrap();
        assert!(cache.contains("api.example.com"));
        assert!(!cache.contains("other.example.com"));
    }

    #[test]
    fn invalidate_drops_only_that_destination() {
        let mut cache = SessionCache::new(Some("secret".to_string()));
        cache.get("a.example.com").unwrap();
        cache.get("b.example.com").unwrap();

        cache.invalidate("a.example.com");
        assert!(!cache.contains("a.example.com"));
        assert!(cache.contains("b.example.com"));

        // Invalidating an unknown destination is a no-op.
        cache.invalidate("missing.example.com");
    }

    #[test]
    fn destination_is_the_host() {
        assert_eq!(
            destination("https://api.example.com/v1/heartbeats"),
            "api.example.com"
        );
        assert_eq!(destination("http://127.0.0.1:8080/x"), "127.0.0.1");
        assert_eq!(destination("not a url"), "not a url");
    }

    #[test]
    fn session_debug_redacts_api_key() {
        let session = Session::new(Some("secret-key".to_string()), DEFAULT_TIMEOUT).unwrap();
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn heartbeat_payload_wire_format() {
        let heartbeat = Heartbeat {
            entity: "/home/dev/repo/emptyfile.txt".to_string(),
            entity_type: "file".to_string(),
            time: 1585598059.5,
            is_write: false,
            project: Some("repo".to_string()),
            branch: Some("master".to_string()),
            language: Some("Text".to_string()),
            lines: Some(0),
            dependencies: vec!["serde".to_string(), "regex".to_string()],
            user_agent: "pulse/0.1.0 (linux-x86_64)".to_string(),
        };
        let json = serde_json::to_string_pretty(&heartbeat).unwrap();
        insta::assert_snapshot!("heartbeat_payload", json);
    }
}
