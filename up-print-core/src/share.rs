//! Printer share discovery.
//!
//! There is no "shares of this printer" collection on the path we use, so
//! discovery lists every share in the tenant (printer expanded) and filters
//! client-side. Shares appear some time after creation, so an empty match is
//! retried like a failure. Discovery never aborts a submission: exhausting all
//! attempts yields an empty list, which only disables the share-scoped paths.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{GraphConfig, ShareDiscoverySettings};
use crate::contract::GraphTransport;
use crate::endpoint::{share_url, shares_url};
use crate::error::{PrintError, Result};
use crate::graph_error::translate;

/// A share exposing a printer to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterShare {
    pub id: String,
    pub display_name: String,
    pub printer_id: Option<String>,
}

impl PrinterShare {
    fn from_json(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        Some(Self {
            id,
            display_name: value
                .get("displayName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            printer_id: value
                .get("printer")
                .and_then(|p| p.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    pub fn references(&self, printer_id: &str) -> bool {
        self.printer_id
            .as_deref()
            .is_some_and(|id| id.eq_ignore_ascii_case(printer_id))
    }
}

/// Outcome of one listing attempt.
enum Listing {
    Shares(Vec<PrinterShare>),
    Failed(String),
}

pub struct ShareResolver<'a> {
    transport: &'a dyn GraphTransport,
    config: &'a GraphConfig,
    settings: ShareDiscoverySettings,
    cache: Mutex<HashMap<String, Vec<PrinterShare>>>,
}

impl<'a> ShareResolver<'a> {
    pub fn new(transport: &'a dyn GraphTransport, config: &'a GraphConfig) -> Self {
        Self {
            transport,
            config,
            settings: config.share_discovery,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Shares whose embedded printer reference matches `printer_id`.
    ///
    /// The result is cached for the lifetime of the resolver.
    pub async fn discover_shares_for_printer(&self, printer_id: &str) -> Vec<PrinterShare> {
        if let Some(cached) = self.cached(printer_id) {
            debug!(printer_id, count = cached.len(), "[SHARES] Using cached share discovery result");
            return cached;
        }

        let attempts = self.settings.attempts.max(1);
        let mut found = Vec::new();
        for attempt in 1..=attempts {
            match self.list_matching(printer_id).await {
                Listing::Shares(shares) if !shares.is_empty() => {
                    info!(printer_id, attempt, count = shares.len(), "[SHARES] Discovered printer shares");
                    found = shares;
                    break;
                }
                Listing::Shares(_) => {
                    info!(printer_id, attempt, "[SHARES] No share references this printer yet");
                }
                Listing::Failed(reason) => {
                    warn!(printer_id, attempt, reason = %reason, "[SHARES] Share listing attempt failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.backoff).await;
            }
        }

        if found.is_empty() {
            info!(printer_id, attempts, "[SHARES] Share discovery exhausted, continuing without shares");
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(printer_id.to_string(), found.clone());
        }
        found
    }

    /// Look up one share by id, as named explicitly by the caller.
    pub async fn get_share(&self, share_id: &str) -> Result<PrinterShare> {
        let url = share_url(self.config.base(), share_id);
        let response = self
            .transport
            .get(&url, self.config.timeouts.metadata)
            .await?;
        match response.status {
            200 => response
                .json()
                .as_ref()
                .and_then(PrinterShare::from_json)
                .ok_or_else(|| {
                    PrintError::InvalidResponse(format!("share {share_id}: body is not a printer share"))
                }),
            404 => Err(PrintError::ShareNotFound(translate("Get share", &response))),
            403 => Err(PrintError::ShareForbidden(translate("Get share", &response))),
            _ => {
                let message = translate("Get share", &response);
                error!(share_id, message = %message, "[SHARES] Share lookup failed");
                Err(PrintError::RequestFailed(message))
            }
        }
    }

    fn cached(&self, printer_id: &str) -> Option<Vec<PrinterShare>> {
        self.cache.lock().ok()?.get(printer_id).cloned()
    }

    async fn list_matching(&self, printer_id: &str) -> Listing {
        let mut next = Some(shares_url(self.config.base()));
        let mut matching = Vec::new();
        while let Some(url) = next.take() {
            let response = match self.transport.get(&url, self.config.timeouts.metadata).await {
                Ok(r) => r,
                Err(e) => return Listing::Failed(e.to_string()),
            };
            if response.status != 200 {
                return Listing::Failed(translate("List shares", &response));
            }
            let Some(body) = response.json() else {
                return Listing::Failed("share listing body is not JSON".to_string());
            };
            let Some(page) = body.get("value").and_then(Value::as_array) else {
                return Listing::Failed("share listing has no 'value' array".to_string());
            };
            matching.extend(
                page.iter()
                    .filter_map(PrinterShare::from_json)
                    .filter(|s| s.references(printer_id)),
            );
            next = body
                .get("@odata.nextLink")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        Listing::Shares(matching)
    }
}
