use std::time::Duration;
use tracing::{debug, info};

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Application roles an app-only token needs for the printer-scoped job path.
pub const DEFAULT_REQUIRED_ROLES: &[&str] = &[
    "Printer.Read.All",
    "PrintJob.Manage.All",
    "PrintJob.ReadWrite.All",
];

/// Immutable settings for one submission, injected into the orchestrator.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub base_url: String,
    pub scopes: Vec<String>,
    pub required_roles: Vec<String>,
    pub timeouts: Timeouts,
    pub chunk_size: usize,
    pub poll: PollSettings,
    pub share_discovery: ShareDiscoverySettings,
    /// Route the job through a discovered share when one exists.
    pub prefer_share_scope: bool,
    /// Derive the job configuration from the printer's defaults.
    pub apply_printer_defaults: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub metadata: Duration,
    pub mutation: Duration,
    pub upload: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct ShareDiscoverySettings {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            metadata: Duration::from_secs(30),
            mutation: Duration::from_secs(60),
            upload: Duration::from_secs(300),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

impl Default for ShareDiscoverySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: GRAPH_BASE_URL.to_string(),
            scopes: vec![GRAPH_DEFAULT_SCOPE.to_string()],
            required_roles: DEFAULT_REQUIRED_ROLES.iter().map(|r| r.to_string()).collect(),
            timeouts: Timeouts::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll: PollSettings::default(),
            share_discovery: ShareDiscoverySettings::default(),
            prefer_share_scope: true,
            apply_printer_defaults: true,
        }
    }
}

impl GraphConfig {
    /// Base URL without a trailing slash, so joined paths never contain "//".
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.base_url,
            chunk_size = self.chunk_size,
            poll_interval_secs = self.poll.interval.as_secs(),
            poll_timeout_secs = self.poll.timeout.as_secs(),
            prefer_share_scope = self.prefer_share_scope,
            apply_printer_defaults = self.apply_printer_defaults,
            "Loaded GraphConfig"
        );
        debug!(?self, "GraphConfig loaded (full debug)");
    }
}
