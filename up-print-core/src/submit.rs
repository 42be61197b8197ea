//! Print job submission: create → attach → upload → start → (poll).
//!
//! This module drives a single document through Universal Print:
//!   - Selects the endpoint scope (explicit share, discovered share, or printer)
//!   - Creates the job, optionally configured from the printer's defaults
//!   - Attaches the document through the ordered [`SubmissionStrategy`] chain
//!   - Streams the bytes with [`ChunkedUploader`]
//!   - Starts the job and, when asked, polls until a terminal state
//!
//! # Error Handling
//! Every step fails fast with a translated [`PrintError`]. Only share discovery
//! retries internally, and only the strategy chain accumulates failures before
//! giving up. Nothing is rolled back: a job or document created before a later
//! failure stays on the service.
//!
//! # Navigation
//! - Entrypoint: [`JobSubmitter::submit`]
//! - Supporting types: [`PrintRequest`], [`SubmissionReport`], [`PrintJob`].

use std::path::PathBuf;

use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::GraphConfig;
use crate::content_type::{self, ContentTypeSource};
use crate::contract::{DiagnosticProbe, DiagnosticRecord, GraphTransport, ProbeTarget, ProgressReporter};
use crate::endpoint::EndpointScope;
use crate::error::{AttachmentFailure, PrintError, Result};
use crate::graph_error::translate;
use crate::poll::{extract_job_state, poll_until_terminal, JobState};
use crate::printer::fetch_printer;
use crate::share::ShareResolver;
use crate::strategy::{
    default_strategies, remediation, Attempt, AttemptContext, DocumentSpec, RejectedAttempt,
    SubmissionStrategy, UploadTarget,
};
use crate::uploader::ChunkedUploader;

/// One document for one printer.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub printer_id: String,
    pub file_path: PathBuf,
    pub job_name: String,
    pub content_type_override: Option<String>,
    /// Route through this share instead of discovering one.
    pub share_id: Option<String>,
    pub poll: bool,
}

/// A job as returned by the create call.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: String,
    pub display_name: String,
    pub configuration: Option<Value>,
    pub status: Option<JobState>,
}

impl PrintJob {
    fn from_json(body: &Value) -> Option<Self> {
        let id = body.get("id")?.as_str().filter(|s| !s.is_empty())?.to_string();
        Some(Self {
            id,
            display_name: body
                .get("displayName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            configuration: body.get("configuration").cloned(),
            status: body
                .get("status")
                .map(|_| extract_job_state(body).0),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub job_id: String,
    pub document_id: String,
    pub scope: EndpointScope,
    pub strategy: &'static str,
    pub content_type: String,
    pub content_type_source: ContentTypeSource,
    pub bytes_uploaded: u64,
    pub chunks: u64,
    /// Set only when polling ran to a terminal state.
    pub final_state: Option<JobState>,
}

pub struct JobSubmitter<'a> {
    transport: &'a dyn GraphTransport,
    config: &'a GraphConfig,
    progress: &'a dyn ProgressReporter,
    shares: ShareResolver<'a>,
    strategies: Vec<Box<dyn SubmissionStrategy>>,
    probes: Vec<Box<dyn DiagnosticProbe + 'a>>,
}

impl<'a> JobSubmitter<'a> {
    pub fn new(
        transport: &'a dyn GraphTransport,
        config: &'a GraphConfig,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            transport,
            config,
            progress,
            shares: ShareResolver::new(transport, config),
            strategies: default_strategies(),
            probes: Vec::new(),
        }
    }

    /// Probes to run when every attachment strategy was rejected.
    pub fn with_probes(mut self, probes: Vec<Box<dyn DiagnosticProbe + 'a>>) -> Self {
        self.probes = probes;
        self
    }

    pub async fn submit(&self, request: &PrintRequest) -> Result<SubmissionReport> {
        info!(
            printer_id = %request.printer_id,
            file = %request.file_path.display(),
            job_name = %request.job_name,
            "[SUBMIT] Starting print submission"
        );

        let configuration = if self.config.apply_printer_defaults {
            let printer = fetch_printer(self.transport, self.config, &request.printer_id).await?;
            Some(printer.job_configuration())
        } else {
            None
        };

        let scope = self.select_scope(request).await?;
        let job = self
            .create_job(&scope, &request.job_name, configuration)
            .await?;
        self.progress.line(&format!("Created job {}", job.id));

        let resolved = content_type::resolve(
            &request.file_path,
            request.content_type_override.as_deref(),
        );
        let size = tokio::fs::metadata(&request.file_path).await?.len();
        let document = DocumentSpec {
            path: request.file_path.clone(),
            name: request
                .file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string()),
            content_type: resolved.content_type.clone(),
            size,
        };
        info!(
            content_type = %document.content_type,
            source = %resolved.source,
            size,
            "[SUBMIT] Document prepared"
        );

        let target = self
            .attach_document(&request.printer_id, &job.id, &scope, &document)
            .await?;
        if target.scope != scope {
            info!(job_id = %job.id, from = %scope, to = %target.scope, "[SUBMIT] Job continues under alternate scope");
        }

        self.progress.line("Uploading document...");
        let uploader = ChunkedUploader::new(
            self.transport,
            self.config.chunk_size,
            self.config.timeouts.upload,
        );
        let summary = uploader.upload(&target.upload_url, &document.path).await?;
        self.progress.line("Upload complete.");

        self.progress.line("Starting job...");
        self.start_job(&target.scope, &job.id).await?;
        self.progress.line("Job started.");

        let final_state = if request.poll {
            let state = poll_until_terminal(
                self.transport,
                self.config,
                &target.scope,
                &job.id,
                self.config.poll,
                self.progress,
            )
            .await?;
            self.progress.line("Job finished.");
            Some(state)
        } else {
            None
        };

        info!(job_id = %job.id, scope = %target.scope, strategy = target.strategy, "[SUBMIT] Print submission complete");
        Ok(SubmissionReport {
            job_id: job.id,
            document_id: target.document_id,
            scope: target.scope,
            strategy: target.strategy,
            content_type: resolved.content_type,
            content_type_source: resolved.source,
            bytes_uploaded: summary.bytes,
            chunks: summary.chunks,
            final_state,
        })
    }

    async fn select_scope(&self, request: &PrintRequest) -> Result<EndpointScope> {
        if let Some(share_id) = &request.share_id {
            let share = self.shares.get_share(share_id).await?;
            if !share.references(&request.printer_id) {
                warn!(
                    share_id = %share.id,
                    printer_id = %request.printer_id,
                    share_printer = share.printer_id.as_deref().unwrap_or("-"),
                    "[SUBMIT] Requested share does not reference the requested printer"
                );
            }
            return Ok(EndpointScope::Share(share.id));
        }
        if self.config.prefer_share_scope {
            let shares = self
                .shares
                .discover_shares_for_printer(&request.printer_id)
                .await;
            if let Some(share) = shares.into_iter().next() {
                info!(share_id = %share.id, "[SUBMIT] Using share scope");
                return Ok(EndpointScope::Share(share.id));
            }
        }
        info!(printer_id = %request.printer_id, "[SUBMIT] Using printer scope");
        Ok(EndpointScope::Printer(request.printer_id.clone()))
    }

    async fn create_job(
        &self,
        scope: &EndpointScope,
        job_name: &str,
        configuration: Option<Map<String, Value>>,
    ) -> Result<PrintJob> {
        let mut body = json!({ "displayName": job_name });
        if let Some(configuration) = configuration {
            body["configuration"] = Value::Object(configuration);
        }
        debug!(payload = %body, scope = %scope, "[SUBMIT] Creating print job");

        let response = self
            .transport
            .post_json(
                &scope.jobs_url(self.config.base()),
                &body,
                self.config.timeouts.mutation,
            )
            .await
            .map_err(|e| PrintError::JobCreationFailed(format!("Create job failed: {e}")))?;
        if !response.status_in(&[200, 201]) {
            let message = translate("Create job", &response);
            error!(scope = %scope, message = %message, "[SUBMIT] Job creation failed");
            return Err(PrintError::JobCreationFailed(message));
        }
        let job = response
            .json()
            .as_ref()
            .and_then(PrintJob::from_json)
            .ok_or_else(|| {
                PrintError::JobCreationFailed("Job ID missing in create job response".to_string())
            })?;
        info!(job_id = %job.id, scope = %scope, "[SUBMIT] Print job created");
        Ok(job)
    }

    async fn attach_document(
        &self,
        printer_id: &str,
        job_id: &str,
        scope: &EndpointScope,
        document: &DocumentSpec,
    ) -> Result<UploadTarget> {
        let ctx = AttemptContext {
            transport: self.transport,
            config: self.config,
            shares: &self.shares,
            printer_id,
            job_id,
            scope,
            document,
        };

        let mut rejections: Vec<RejectedAttempt> = Vec::new();
        for strategy in &self.strategies {
            if !strategy.applies(&ctx) {
                debug!(strategy = strategy.name(), "[ATTACH] Strategy does not apply, skipping");
                continue;
            }
            info!(strategy = strategy.name(), job_id, "[ATTACH] Trying attachment strategy");
            match strategy.attempt(&ctx).await? {
                Attempt::Attached(target) => {
                    info!(
                        strategy = target.strategy,
                        document_id = %target.document_id,
                        scope = %target.scope,
                        "[ATTACH] Upload target obtained"
                    );
                    return Ok(target);
                }
                Attempt::Rejected(rejected) => {
                    warn!(strategy = rejected.strategy, message = %rejected.message, "[ATTACH] Strategy rejected");
                    rejections.push(rejected);
                }
            }
        }

        let attempts = rejections
            .iter()
            .map(|r| format!("[{}@{}] {}", r.strategy, r.scope, r.message))
            .collect::<Vec<_>>()
            .join("; ");
        let mut message = format!(
            "Document attachment failed for job {job_id}: {attempts}. {}",
            remediation(scope, &rejections, &self.config.required_roles)
        );

        let records = self
            .run_probes(&ProbeTarget {
                printer_id: printer_id.to_string(),
                job_id: Some(job_id.to_string()),
                scope: scope.clone(),
            })
            .await;
        if !records.is_empty() {
            let summary = records
                .iter()
                .map(|r| format!("{} {}: {}", r.probe, if r.passed { "ok" } else { "FAILED" }, r.summary))
                .collect::<Vec<_>>()
                .join("; ");
            message.push_str(&format!(" Diagnostics: {summary}."));
        }

        error!(job_id, strategies = rejections.len(), "[ATTACH] All attachment strategies exhausted");
        Err(PrintError::DocumentAttachmentFailed {
            kind: AttachmentFailure::Exhausted,
            message,
        })
    }

    async fn run_probes(&self, target: &ProbeTarget) -> Vec<DiagnosticRecord> {
        let mut records = Vec::new();
        for probe in &self.probes {
            match probe.probe(target).await {
                Some(record) => {
                    debug!(probe = probe.name(), passed = record.passed, "[DIAG] Probe finished");
                    records.push(record);
                }
                None => debug!(probe = probe.name(), "[DIAG] Probe had nothing to report"),
            }
        }
        records
    }

    async fn start_job(&self, scope: &EndpointScope, job_id: &str) -> Result<()> {
        let response = self
            .transport
            .post_json(
                &scope.start_url(self.config.base(), job_id),
                &json!({}),
                self.config.timeouts.mutation,
            )
            .await
            .map_err(|e| PrintError::JobStartFailed(format!("Start job failed: {e}")))?;
        if !response.status_in(&[200, 202, 204]) {
            let message = translate("Start job", &response);
            error!(job_id, scope = %scope, message = %message, "[SUBMIT] Job start failed");
            return Err(PrintError::JobStartFailed(message));
        }
        info!(job_id, scope = %scope, "[SUBMIT] Print job started");
        Ok(())
    }
}
