//! Best-effort diagnostics for printer, job and document access.
//!
//! Probes never fail: a request that errors is itself the finding. The full
//! [`run_diagnostics`] routine creates a throwaway job on the printer scope and
//! walks the attachment surfaces one by one, recording what the service says.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::GraphConfig;
use crate::content_type::{self, OCTET_STREAM};
use crate::contract::{DiagnosticProbe, DiagnosticRecord, GraphTransport, ProbeTarget};
use crate::endpoint::{printer_url, EndpointScope};
use crate::error::{PrintError, Result};
use crate::graph_error::translate;
use crate::printer::PrinterInfo;
use crate::share::ShareResolver;
use crate::strategy::{
    Attempt, AttemptContext, CollectionUploadSession, DocumentSpec, DocumentThenSession,
    SubmissionStrategy,
};

/// Content types tried after the detected one when probing upload sessions.
pub const ALTERNATE_CONTENT_TYPES: &[&str] = &[
    "application/oxps",
    "application/vnd.ms-xpsdocument",
    OCTET_STREAM,
];

const DEBUG_JOB_NAME: &str = "Debug Test Job";
const PRINTER_ACCESS: &str = "printer-access";

fn text<'v>(value: &'v Value, key: &str) -> &'v str {
    value.get(key).and_then(Value::as_str).unwrap_or("-")
}

/// Can the caller read the printer, and what does it accept?
pub struct PrinterAccessProbe<'a> {
    transport: &'a dyn GraphTransport,
    config: &'a GraphConfig,
}

impl<'a> PrinterAccessProbe<'a> {
    pub fn new(transport: &'a dyn GraphTransport, config: &'a GraphConfig) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl DiagnosticProbe for PrinterAccessProbe<'_> {
    fn name(&self) -> &'static str {
        PRINTER_ACCESS
    }

    async fn probe(&self, target: &ProbeTarget) -> Option<DiagnosticRecord> {
        let url = printer_url(self.config.base(), &target.printer_id);
        let response = match self.transport.get(&url, self.config.timeouts.metadata).await {
            Ok(response) => response,
            Err(e) => return Some(DiagnosticRecord::failed(self.name(), e.to_string())),
        };
        if response.status != 200 {
            return Some(DiagnosticRecord::failed(
                self.name(),
                translate("Get printer", &response),
            ));
        }
        let body = response.json().unwrap_or(Value::Null);
        let printer = PrinterInfo::from_json(&target.printer_id, &body);
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let formats = if printer.supported_content_types.is_empty() {
            "-".to_string()
        } else {
            printer.supported_content_types.join(", ")
        };
        Some(
            DiagnosticRecord::passed(
                self.name(),
                format!("printer '{}' is readable", or_dash(&printer.display_name)),
            )
            .with_detail(format!(
                "model: {} {}",
                or_dash(&printer.manufacturer),
                or_dash(&printer.model)
            ))
            .with_detail(format!("supported formats: {formats}"))
            .with_detail(format!(
                "default content type: {}",
                or_dash(&printer.default_content_type)
            )),
        )
    }
}

/// Can the caller read the job it just created?
pub struct JobAccessProbe<'a> {
    transport: &'a dyn GraphTransport,
    config: &'a GraphConfig,
}

impl<'a> JobAccessProbe<'a> {
    pub fn new(transport: &'a dyn GraphTransport, config: &'a GraphConfig) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl DiagnosticProbe for JobAccessProbe<'_> {
    fn name(&self) -> &'static str {
        "job-access"
    }

    async fn probe(&self, target: &ProbeTarget) -> Option<DiagnosticRecord> {
        let job_id = target.job_id.as_deref()?;
        let url = format!(
            "{}?$select=id,createdDateTime,status",
            target.scope.job_url(self.config.base(), job_id)
        );
        let response = match self.transport.get(&url, self.config.timeouts.metadata).await {
            Ok(response) => response,
            Err(e) => return Some(DiagnosticRecord::failed(self.name(), e.to_string())),
        };
        if response.status != 200 {
            return Some(DiagnosticRecord::failed(self.name(), translate("Get job", &response)));
        }
        let body = response.json().unwrap_or(Value::Null);
        let (state, description) = crate::poll::extract_job_state(&body);
        let record = DiagnosticRecord::passed(
            self.name(),
            format!("job {job_id} is readable on {} (state: {state})", target.scope),
        )
        .with_detail(format!("created: {}", text(&body, "createdDateTime")));
        Some(match description {
            Some(d) => record.with_detail(format!("status description: {d}")),
            None => record,
        })
    }
}

/// Can the caller list the job's documents collection?
pub struct DocumentsProbe<'a> {
    transport: &'a dyn GraphTransport,
    config: &'a GraphConfig,
}

impl<'a> DocumentsProbe<'a> {
    pub fn new(transport: &'a dyn GraphTransport, config: &'a GraphConfig) -> Self {
        Self { transport, config }
    }
}

#[async_trait]
impl DiagnosticProbe for DocumentsProbe<'_> {
    fn name(&self) -> &'static str {
        "documents-collection"
    }

    async fn probe(&self, target: &ProbeTarget) -> Option<DiagnosticRecord> {
        let job_id = target.job_id.as_deref()?;
        let url = target.scope.documents_url(self.config.base(), job_id);
        let response = match self.transport.get(&url, self.config.timeouts.metadata).await {
            Ok(response) => response,
            Err(e) => return Some(DiagnosticRecord::failed(self.name(), e.to_string())),
        };
        if response.status != 200 {
            return Some(DiagnosticRecord::failed(
                self.name(),
                translate("List documents", &response),
            ));
        }
        let body = response.json().unwrap_or(Value::Null);
        let entries = body
            .get("value")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut record = DiagnosticRecord::passed(
            self.name(),
            format!("documents collection lists {} entries", entries.len()),
        );
        for entry in &entries {
            record = record.with_detail(format!(
                "{} '{}' ({})",
                text(entry, "id"),
                text(entry, "displayName"),
                text(entry, "contentType")
            ));
        }
        Some(record)
    }
}

/// The three read probes the core provides, in the order they are reported.
pub fn default_probes<'a>(
    transport: &'a dyn GraphTransport,
    config: &'a GraphConfig,
) -> Vec<Box<dyn DiagnosticProbe + 'a>> {
    vec![
        Box::new(PrinterAccessProbe::new(transport, config)),
        Box::new(JobAccessProbe::new(transport, config)),
        Box::new(DocumentsProbe::new(transport, config)),
    ]
}

#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub job_id: String,
    pub records: Vec<DiagnosticRecord>,
}

impl DiagnosticReport {
    /// True when some attachment surface produced an upload URL.
    pub fn attachment_possible(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.probe.starts_with("attach:") && r.passed)
    }
}

/// Reproduce a troubleshooting session against `printer_id`.
///
/// Only the job creation may fail the run; every later step is recorded.
/// The debug job is left on the service.
pub async fn run_diagnostics<'a>(
    transport: &'a dyn GraphTransport,
    config: &'a GraphConfig,
    printer_id: &str,
    file_path: &Path,
    probes: &[Box<dyn DiagnosticProbe + 'a>],
) -> Result<DiagnosticReport> {
    let scope = EndpointScope::Printer(printer_id.to_string());
    info!(printer_id, file = %file_path.display(), "[DIAG] Starting diagnostic run");

    let response = transport
        .post_json(
            &scope.jobs_url(config.base()),
            &json!({ "displayName": DEBUG_JOB_NAME }),
            config.timeouts.mutation,
        )
        .await
        .map_err(|e| PrintError::JobCreationFailed(format!("Create job failed: {e}")))?;
    if !response.status_in(&[200, 201]) {
        return Err(PrintError::JobCreationFailed(translate("Create job", &response)));
    }
    let job_id = response
        .json()
        .and_then(|b| b.get("id").and_then(Value::as_str).map(str::to_string))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            PrintError::JobCreationFailed("Job ID missing in create job response".to_string())
        })?;
    info!(job_id = %job_id, "[DIAG] Debug job created");

    let mut records = Vec::new();
    let target = ProbeTarget {
        printer_id: printer_id.to_string(),
        job_id: Some(job_id.clone()),
        scope: scope.clone(),
    };
    for probe in probes {
        if let Some(record) = probe.probe(&target).await {
            records.push(record);
        }
    }

    // No attachment attempts without a readable printer.
    if records
        .iter()
        .any(|r| r.probe == PRINTER_ACCESS && !r.passed)
    {
        warn!(job_id = %job_id, "[DIAG] Printer is not readable, skipping attachment attempts");
        return Ok(DiagnosticReport { job_id, records });
    }

    let detected = content_type::resolve(file_path, None).content_type;
    let mut candidates = vec![detected];
    for alternate in ALTERNATE_CONTENT_TYPES {
        if !candidates.iter().any(|c| c == alternate) {
            candidates.push(alternate.to_string());
        }
    }

    let size = tokio::fs::metadata(file_path).await.map(|m| m.len()).unwrap_or(0);
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let shares = ShareResolver::new(transport, config);

    let mut attached = false;
    for content_type in &candidates {
        let document = DocumentSpec {
            path: file_path.to_path_buf(),
            name: name.clone(),
            content_type: content_type.clone(),
            size,
        };
        let ctx = AttemptContext {
            transport,
            config,
            shares: &shares,
            printer_id,
            job_id: &job_id,
            scope: &scope,
            document: &document,
        };
        let record = attempt_record(&CollectionUploadSession, &ctx, content_type).await;
        attached = record.passed;
        records.push(record);
        if attached {
            break;
        }
    }

    if !attached {
        let document = DocumentSpec {
            path: file_path.to_path_buf(),
            name,
            content_type: candidates[0].clone(),
            size,
        };
        let ctx = AttemptContext {
            transport,
            config,
            shares: &shares,
            printer_id,
            job_id: &job_id,
            scope: &scope,
            document: &document,
        };
        records.push(attempt_record(&DocumentThenSession, &ctx, &candidates[0]).await);
    }

    let report = DiagnosticReport { job_id, records };
    if report.attachment_possible() {
        info!(job_id = %report.job_id, "[DIAG] Diagnostic run found a working attachment surface");
    } else {
        warn!(job_id = %report.job_id, "[DIAG] No attachment surface accepted the document");
    }
    Ok(report)
}

async fn attempt_record(
    strategy: &dyn SubmissionStrategy,
    ctx: &AttemptContext<'_>,
    content_type: &str,
) -> DiagnosticRecord {
    let probe = format!("attach:{}", strategy.name());
    match strategy.attempt(ctx).await {
        Ok(Attempt::Attached(target)) => DiagnosticRecord::passed(
            &probe,
            format!("upload session created for {content_type}"),
        )
        .with_detail(format!(
            "document id: {}",
            if target.document_id.is_empty() { "-" } else { target.document_id.as_str() }
        )),
        Ok(Attempt::Rejected(rejected)) => {
            DiagnosticRecord::failed(&probe, format!("{content_type}: {}", rejected.message))
        }
        Err(e) => DiagnosticRecord::failed(&probe, format!("{content_type}: {e}")),
    }
}
