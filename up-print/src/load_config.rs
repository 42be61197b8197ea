/// `load_config` module: Loads an optional static YAML file and layers it over the default `GraphConfig`.
///
/// This module is the only place where untrusted YAML is parsed.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into an all-optional intermediate struct
/// - Overlay every present key on [`GraphConfig::default`]; absent keys keep their defaults
/// - Reject unknown keys so a typo never silently falls back to a default
///
/// Secrets (tenant, client id, client secret) are never read from this file.
/// They come from flags or the environment only.
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use up_print_core::config::GraphConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub required_roles: Option<Vec<String>>,
    pub chunk_size: Option<usize>,
    pub prefer_share_scope: Option<bool>,
    pub apply_printer_defaults: Option<bool>,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    #[serde(default)]
    pub poll: PollSection,
    #[serde(default)]
    pub share_discovery: ShareDiscoverySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsSection {
    pub metadata_secs: Option<u64>,
    pub mutation_secs: Option<u64>,
    pub upload_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollSection {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShareDiscoverySection {
    pub attempts: Option<u32>,
    pub backoff_secs: Option<u64>,
}

impl ConfigFile {
    /// Overlay the keys present in the file on `config`.
    pub fn apply(self, mut config: GraphConfig) -> GraphConfig {
        let secs = Duration::from_secs;
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(scopes) = self.scopes {
            config.scopes = scopes;
        }
        if let Some(roles) = self.required_roles {
            config.required_roles = roles;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(prefer) = self.prefer_share_scope {
            config.prefer_share_scope = prefer;
        }
        if let Some(apply) = self.apply_printer_defaults {
            config.apply_printer_defaults = apply;
        }
        config.timeouts.metadata = self.timeouts.metadata_secs.map_or(config.timeouts.metadata, secs);
        config.timeouts.mutation = self.timeouts.mutation_secs.map_or(config.timeouts.mutation, secs);
        config.timeouts.upload = self.timeouts.upload_secs.map_or(config.timeouts.upload, secs);
        config.poll.interval = self.poll.interval_secs.map_or(config.poll.interval, secs);
        config.poll.timeout = self.poll.timeout_secs.map_or(config.poll.timeout, secs);
        if let Some(attempts) = self.share_discovery.attempts {
            config.share_discovery.attempts = attempts;
        }
        config.share_discovery.backoff = self
            .share_discovery
            .backoff_secs
            .map_or(config.share_discovery.backoff, secs);
        config
    }
}

/// Loads a static YAML config file (no secrets) on top of the defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GraphConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid "all defaults" config.
    let raw: ConfigFile = if config_content.trim().is_empty() {
        ConfigFile::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    if raw.chunk_size == Some(0) {
        return Err(anyhow::anyhow!("chunk_size must be greater than zero"));
    }
    if raw.poll.interval_secs == Some(0) {
        return Err(anyhow::anyhow!("poll.interval_secs must be at least 1"));
    }
    if raw.share_discovery.attempts == Some(0) {
        return Err(anyhow::anyhow!("share_discovery.attempts must be at least 1"));
    }

    let config = raw.apply(GraphConfig::default());
    config.trace_loaded();
    Ok(config)
}
