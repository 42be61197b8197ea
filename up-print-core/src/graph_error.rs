//! Turns a Graph error response into a single diagnostic line.
//!
//! Graph error bodies look like
//! `{"error": {"code": "...", "message": "...", "innerError": {"request-id": "...", ...}}}`
//! but the casing of the correlation fields varies between services. Ids are
//! read from the error object and its inner error only. A body that is not
//! JSON degrades to the status code alone.

use serde_json::Value;

use crate::contract::GraphResponse;

const REQUEST_ID_KEYS: &[&str] = &["request-id", "requestId"];
const CLIENT_REQUEST_ID_KEYS: &[&str] = &["client-request-id", "clientRequestId"];
const INNER_ERROR_KEYS: &[&str] = &["innerError", "innererror"];

/// Structured view of a Graph error response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphErrorDetails {
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
    pub client_request_id: Option<String>,
}

impl GraphErrorDetails {
    pub fn from_response(response: &GraphResponse) -> Self {
        let body = response.json();
        let error = body.as_ref().and_then(|b| b.get("error"));
        let inner = error.and_then(|e| first_present(e, INNER_ERROR_KEYS));

        let lookup = |keys: &[&str]| -> Option<String> {
            error
                .and_then(|e| string_field(e, keys))
                .or_else(|| inner.and_then(|i| string_field(i, keys)))
        };

        Self {
            status: response.status,
            code: error.and_then(|e| string_field(e, &["code"])),
            message: error
                .and_then(|e| string_field(e, &["message"]))
                .map(|m| single_line(&m)),
            request_id: lookup(REQUEST_ID_KEYS),
            client_request_id: lookup(CLIENT_REQUEST_ID_KEYS),
        }
    }

    /// A 404 whose code says nothing useful. The service answers this way when
    /// the printer is unshared, its connector is offline, or consent is missing.
    pub fn is_opaque_not_found(&self) -> bool {
        self.status == 404
            && self
                .code
                .as_deref()
                .map_or(true, |c| c.eq_ignore_ascii_case("UnknownError"))
    }

    pub fn render(&self, action: &str) -> String {
        let mut line = format!("{action} failed: {}", self.status);
        if let Some(code) = &self.code {
            line.push_str(&format!(" code={code}"));
        }
        if let Some(message) = &self.message {
            line.push_str(&format!(" message={message}"));
        }
        if let Some(id) = &self.request_id {
            line.push_str(&format!(" request-id={id}"));
        }
        if let Some(id) = &self.client_request_id {
            line.push_str(&format!(" client-request-id={id}"));
        }
        line
    }
}

/// `"{action} failed: {status}"` plus whichever of code, message and
/// correlation ids the response carries.
pub fn translate(action: &str, response: &GraphResponse) -> String {
    GraphErrorDetails::from_response(response).render(action)
}

fn first_present<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().find_map(|k| value.get(*k)).filter(|v| v.is_object())
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_all_fields_in_order() {
        let response = GraphResponse::json_body(
            403,
            json!({
                "error": {
                    "code": "AccessDenied",
                    "message": "Caller lacks\npermission",
                    "innerError": {
                        "request-id": "req-1",
                        "client-request-id": "client-1"
                    }
                }
            }),
        );

        assert_eq!(
            translate("Create job", &response),
            "Create job failed: 403 code=AccessDenied message=Caller lacks permission request-id=req-1 client-request-id=client-1"
        );
    }

    #[test]
    fn camel_case_inner_ids_are_accepted() {
        let response = GraphResponse::json_body(
            500,
            json!({"error": {"innererror": {"requestId": "r", "clientRequestId": "c"}}}),
        );
        let details = GraphErrorDetails::from_response(&response);
        assert_eq!(details.request_id.as_deref(), Some("r"));
        assert_eq!(details.client_request_id.as_deref(), Some("c"));
        assert_eq!(details.code, None);
    }

    #[test]
    fn header_ids_are_ignored_when_the_body_has_its_own() {
        let response = GraphResponse::json_body(
            404,
            json!({"error": {"code": "UnknownError", "innerError": {"request-id": "from-body"}}}),
        )
        .with_header("Request-Id", "from-header");

        let details = GraphErrorDetails::from_response(&response);
        assert_eq!(details.request_id.as_deref(), Some("from-body"));
        assert!(details.is_opaque_not_found());
    }

    #[test]
    fn unparseable_body_degrades_to_status_only() {
        let response = GraphResponse::new(502, "<html>Bad Gateway</html>");
        let message = translate("Start job", &response);
        assert_eq!(message, "Start job failed: 502");
        assert!(!message.contains("code="));
        assert!(!message.contains("message="));
        assert!(!message.contains("request-id="));
    }

    #[test]
    fn unparseable_body_ignores_correlation_headers() {
        let response = GraphResponse::new(502, "<html>Bad Gateway</html>")
            .with_header("request-id", "abc-123")
            .with_header("client-request-id", "cli-9");

        let message = translate("Start job", &response);
        assert_eq!(message, "Start job failed: 502");
        assert!(!message.contains("request-id="));
    }
}
