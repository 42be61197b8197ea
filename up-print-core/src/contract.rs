#![allow(unused)]

//! # contract: seams between the submission core and the outside world
//!
//! The core never talks HTTP, prints, or authenticates by itself. It is handed
//! implementations of the traits below:
//!
//! - [`GraphTransport`]: issues JSON requests against Microsoft Graph and raw
//!   range uploads against pre-authorized upload URLs. The CLI crate provides a
//!   reqwest-backed client; tests use the generated `MockGraphTransport`.
//! - [`ProgressReporter`]: receives the user-facing progress lines.
//! - [`DiagnosticProbe`]: best-effort checks that never fail, only return an
//!   optional record.
//!
//! ## Mocking & Testing
//! - The transport trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde_json::Value;

use crate::endpoint::EndpointScope;

/// Snapshot of an HTTP response: status, lower-cased headers and raw body text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl GraphResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Response whose body is the serialized JSON value.
    pub fn json_body(status: u16, value: Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Body parsed as JSON, or `None` when it is empty or not JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn status_in(&self, accepted: &[u16]) -> bool {
        accepted.contains(&self.status)
    }
}

/// Failure below HTTP: the request never produced a status code.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Other(String),
}

/// Inclusive, zero-based byte range of one uploaded chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Transport for Graph calls and upload-session PUTs.
///
/// Implementors attach the bearer token to `get`/`post_json` and must NOT
/// attach it to `put_range`: the upload URL is pre-authorized.
/// Every call carries an explicit timeout chosen by the caller.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// `GET url` with JSON accept headers.
    async fn get(&self, url: &str, timeout: Duration) -> Result<GraphResponse, TransportError>;

    /// `POST url` with a JSON body.
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<GraphResponse, TransportError>;

    /// `PUT url` with one chunk and its `Content-Range`.
    async fn put_range(
        &self,
        url: &str,
        range: ByteRange,
        chunk: Vec<u8>,
        timeout: Duration,
    ) -> Result<GraphResponse, TransportError>;
}

/// Sink for progress lines meant for the user (stdout in the CLI).
pub trait ProgressReporter: Send + Sync {
    fn line(&self, message: &str);
}

/// What a probe should look at.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub printer_id: String,
    pub job_id: Option<String>,
    pub scope: EndpointScope,
}

/// Outcome of a single best-effort check.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticRecord {
    pub probe: String,
    pub passed: bool,
    pub summary: String,
    pub details: Vec<String>,
}

impl DiagnosticRecord {
    pub fn passed(probe: &str, summary: impl Into<String>) -> Self {
        Self {
            probe: probe.to_string(),
            passed: true,
            summary: summary.into(),
            details: Vec::new(),
        }
    }

    pub fn failed(probe: &str, summary: impl Into<String>) -> Self {
        Self {
            probe: probe.to_string(),
            passed: false,
            summary: summary.into(),
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "ok" } else { "FAILED" };
        write!(f, "[{}] {}: {}", mark, self.probe, self.summary)?;
        for detail in &self.details {
            write!(f, "\n    - {detail}")?;
        }
        Ok(())
    }
}

/// Permission/connectivity check that never raises.
///
/// `None` means the probe had nothing to say (for example, the target lacks a
/// job id the probe needs).
#[async_trait]
pub trait DiagnosticProbe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, target: &ProbeTarget) -> Option<DiagnosticRecord>;
}
