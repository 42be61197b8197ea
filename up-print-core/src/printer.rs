//! Printer metadata and the job configuration derived from printer defaults.

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::config::GraphConfig;
use crate::contract::GraphTransport;
use crate::endpoint::printer_url;
use crate::error::{PrintError, Result};
use crate::graph_error::translate;

/// Print settings forwarded from printer defaults into a job configuration.
pub const JOB_CONFIGURATION_KEYS: &[&str] = &[
    "copies",
    "colorMode",
    "duplexMode",
    "quality",
    "dpi",
    "orientation",
    "mediaSize",
    "mediaType",
    "pagesPerSheet",
    "margins",
    "finishings",
    "fitPdfToPage",
];

#[derive(Debug, Clone, Default)]
pub struct PrinterInfo {
    pub id: String,
    pub display_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub supported_content_types: Vec<String>,
    pub default_content_type: Option<String>,
    pub defaults: Map<String, Value>,
}

impl PrinterInfo {
    pub(crate) fn from_json(printer_id: &str, body: &Value) -> Self {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
        let defaults = body
            .get("defaults")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let supported_content_types = body
            .get("capabilities")
            .and_then(|c| {
                c.get("contentTypes")
                    .or_else(|| c.get("supportedDocumentMimeTypes"))
            })
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            id: text("id").unwrap_or_else(|| printer_id.to_string()),
            display_name: text("displayName"),
            manufacturer: text("manufacturer"),
            model: text("model"),
            supported_content_types,
            default_content_type: defaults
                .get("contentType")
                .and_then(Value::as_str)
                .map(str::to_string),
            defaults,
        }
    }

    pub fn job_configuration(&self) -> Map<String, Value> {
        job_configuration_from_defaults(&self.defaults)
    }
}

/// Keep only allow-listed settings; `copies` falls back to `copiesPerJob`, then 1.
pub fn job_configuration_from_defaults(defaults: &Map<String, Value>) -> Map<String, Value> {
    let mut configuration: Map<String, Value> = JOB_CONFIGURATION_KEYS
        .iter()
        .filter_map(|key| {
            defaults
                .get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect();

    if !configuration.contains_key("copies") {
        let copies = defaults
            .get("copiesPerJob")
            .filter(|v| v.is_number())
            .cloned()
            .unwrap_or_else(|| Value::from(1));
        configuration.insert("copies".to_string(), copies);
    }

    let dropped: Vec<&String> = defaults
        .keys()
        .filter(|k| !JOB_CONFIGURATION_KEYS.contains(&k.as_str()) && k.as_str() != "copiesPerJob")
        .collect();
    if !dropped.is_empty() {
        debug!(?dropped, "Dropped printer defaults outside the job configuration allow-list");
    }
    configuration
}

/// `GET /print/printers/{id}` with the fields the submission needs.
pub async fn fetch_printer(
    transport: &dyn GraphTransport,
    config: &GraphConfig,
    printer_id: &str,
) -> Result<PrinterInfo> {
    let url = printer_url(config.base(), printer_id);
    info!(printer_id, "[PRINTER] Fetching printer metadata");
    let response = transport.get(&url, config.timeouts.metadata).await?;
    match response.status {
        200 => {
            let body = response.json().ok_or_else(|| {
                PrintError::InvalidResponse(format!("printer {printer_id}: body is not JSON"))
            })?;
            let printer = PrinterInfo::from_json(printer_id, &body);
            info!(
                printer_id,
                display_name = printer.display_name.as_deref().unwrap_or("-"),
                defaults = printer.defaults.len(),
                "[PRINTER] Printer metadata loaded"
            );
            Ok(printer)
        }
        404 => Err(PrintError::PrinterNotFound(translate("Get printer", &response))),
        403 => Err(PrintError::PrinterForbidden(translate("Get printer", &response))),
        _ => {
            let message = translate("Get printer", &response);
            error!(printer_id, message = %message, "[PRINTER] Printer lookup failed");
            Err(PrintError::RequestFailed(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{GraphResponse, MockGraphTransport};
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn only_allow_listed_keys_survive() {
        let defaults = as_map(json!({
            "colorMode": "color",
            "duplexMode": "twoSidedLongEdge",
            "contentType": "application/pdf",
            "mediaColor": "white",
            "copies": 2
        }));
        let configuration = job_configuration_from_defaults(&defaults);
        assert_eq!(
            Value::Object(configuration),
            json!({"colorMode": "color", "duplexMode": "twoSidedLongEdge", "copies": 2})
        );
    }

    #[test]
    fn copies_default_to_one() {
        let configuration = job_configuration_from_defaults(&Map::new());
        assert_eq!(configuration.get("copies"), Some(&json!(1)));
    }

    #[test]
    fn copies_per_job_feeds_copies() {
        let configuration = job_configuration_from_defaults(&as_map(json!({"copiesPerJob": 3})));
        assert_eq!(Value::Object(configuration), json!({"copies": 3}));
    }

    fn answering(status: u16, body: Value) -> MockGraphTransport {
        let mut transport = MockGraphTransport::new();
        transport
            .expect_get()
            .times(1)
            .returning(move |url, _| {
                assert!(url.contains("/print/printers/p1"));
                Ok(GraphResponse::json_body(status, body.clone()))
            });
        transport
    }

    #[tokio::test]
    async fn missing_printer_is_not_found() {
        let transport = answering(
            404,
            json!({"error": {"code": "ResourceNotFound", "message": "Printer not found"}}),
        );
        match fetch_printer(&transport, &GraphConfig::default(), "p1").await {
            Err(PrintError::PrinterNotFound(message)) => assert_eq!(
                message,
                "Get printer failed: 404 code=ResourceNotFound message=Printer not found"
            ),
            other => panic!("expected PrinterNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn denied_printer_is_forbidden() {
        let transport = answering(403, json!({"error": {"code": "AccessDenied"}}));
        match fetch_printer(&transport, &GraphConfig::default(), "p1").await {
            Err(PrintError::PrinterForbidden(message)) => {
                assert!(message.starts_with("Get printer failed: 403 code=AccessDenied"))
            }
            other => panic!("expected PrinterForbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_statuses_are_request_failures() {
        let transport = answering(500, json!({"error": {"code": "InternalServerError"}}));
        let result = fetch_printer(&transport, &GraphConfig::default(), "p1").await;
        assert!(matches!(result, Err(PrintError::RequestFailed(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn metadata_and_defaults_are_parsed() {
        let transport = answering(
            200,
            json!({
                "id": "p1",
                "displayName": "Floor 3",
                "manufacturer": "Contoso",
                "capabilities": {"contentTypes": ["application/pdf"]},
                "defaults": {"contentType": "application/pdf", "colorMode": "color"}
            }),
        );
        let printer = fetch_printer(&transport, &GraphConfig::default(), "p1").await.unwrap();
        assert_eq!(printer.display_name.as_deref(), Some("Floor 3"));
        assert_eq!(printer.manufacturer.as_deref(), Some("Contoso"));
        assert_eq!(printer.supported_content_types, vec!["application/pdf"]);
        assert_eq!(printer.default_content_type.as_deref(), Some("application/pdf"));
        assert_eq!(
            Value::Object(printer.job_configuration()),
            json!({"colorMode": "color", "copies": 1})
        );
    }
}
