//! Document attachment strategies.
//!
//! Getting an upload URL for a job's document can go through several API
//! surfaces, and tenants differ in which ones they accept. Each surface is a
//! [`SubmissionStrategy`]; the orchestrator tries them in order and stops at
//! the first one that yields an [`UploadTarget`].
//!
//! A strategy answers in one of three ways:
//! - `Ok(Attempt::Attached(target))`: done, later strategies are skipped.
//! - `Ok(Attempt::Rejected(..))`: the service refused this surface; try the next.
//! - `Err(..)`: fatal for the whole submission (transport failure, or a
//!   document that exists but cannot get an upload session).

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::GraphConfig;
use crate::contract::{GraphResponse, GraphTransport};
use crate::endpoint::EndpointScope;
use crate::error::{AttachmentFailure, PrintError, Result};
use crate::graph_error::GraphErrorDetails;
use crate::share::ShareResolver;

const CREATED: &[u16] = &[200, 201];

/// The local document being attached.
#[derive(Debug, Clone)]
pub struct DocumentSpec {
    pub path: PathBuf,
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

/// Where the bytes go, and which scope the rest of the job must use.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTarget {
    /// May be empty: the collection-level session does not always echo it.
    pub document_id: String,
    pub upload_url: String,
    pub scope: EndpointScope,
    pub strategy: &'static str,
}

/// A surface the service refused.
#[derive(Debug, Clone)]
pub struct RejectedAttempt {
    pub strategy: &'static str,
    pub scope: EndpointScope,
    pub details: Option<GraphErrorDetails>,
    pub message: String,
}

impl RejectedAttempt {
    fn from_response(strategy: &'static str, scope: &EndpointScope, action: &str, response: &GraphResponse) -> Self {
        let details = GraphErrorDetails::from_response(response);
        Self {
            strategy,
            scope: scope.clone(),
            message: details.render(action),
            details: Some(details),
        }
    }

    fn without_response(strategy: &'static str, scope: &EndpointScope, message: impl Into<String>) -> Self {
        Self {
            strategy,
            scope: scope.clone(),
            details: None,
            message: message.into(),
        }
    }
}

pub enum Attempt {
    Attached(UploadTarget),
    Rejected(RejectedAttempt),
}

/// Everything a strategy may look at for one job.
pub struct AttemptContext<'a> {
    pub transport: &'a dyn GraphTransport,
    pub config: &'a GraphConfig,
    pub shares: &'a ShareResolver<'a>,
    pub printer_id: &'a str,
    pub job_id: &'a str,
    /// Scope the job was created under.
    pub scope: &'a EndpointScope,
    pub document: &'a DocumentSpec,
}

impl AttemptContext<'_> {
    async fn post(&self, strategy: &'static str, url: &str, body: &Value) -> Result<GraphResponse> {
        self.transport
            .post_json(url, body, self.config.timeouts.mutation)
            .await
            .map_err(|e| {
                error!(strategy, url, error = %e, "[ATTACH] Transport failure during document attachment");
                PrintError::DocumentAttachmentFailed {
                    kind: AttachmentFailure::Transport,
                    message: format!("Document attachment ({strategy}) failed: {e}"),
                }
            })
    }
}

#[async_trait]
pub trait SubmissionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy makes sense for the job at all.
    fn applies(&self, _ctx: &AttemptContext<'_>) -> bool {
        true
    }

    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<Attempt>;
}

/// The standard order: collection session, document first, then a share.
pub fn default_strategies() -> Vec<Box<dyn SubmissionStrategy>> {
    vec![
        Box::new(CollectionUploadSession),
        Box::new(DocumentThenSession),
        Box::new(AlternateShareScope),
    ]
}

/// `POST {documents}/createUploadSession` creating document and session at once.
pub struct CollectionUploadSession;

#[async_trait]
impl SubmissionStrategy for CollectionUploadSession {
    fn name(&self) -> &'static str {
        "collection-upload-session"
    }

    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<Attempt> {
        let url = ctx
            .scope
            .collection_upload_session_url(ctx.config.base(), ctx.job_id);
        let body = json!({
            "documentName": ctx.document.name,
            "contentType": ctx.document.content_type,
            "size": ctx.document.size,
        });
        let response = ctx.post(self.name(), &url, &body).await?;
        if !response.status_in(CREATED) {
            return Ok(Attempt::Rejected(RejectedAttempt::from_response(
                self.name(),
                ctx.scope,
                "Create upload session",
                &response,
            )));
        }

        let session = response.json().unwrap_or(Value::Null);
        let Some(upload_url) = non_empty_str(session.get("uploadUrl")) else {
            return Ok(Attempt::Rejected(RejectedAttempt::without_response(
                self.name(),
                ctx.scope,
                "uploadUrl missing in collection upload session response",
            )));
        };
        let document_id = non_empty_str(session.get("documentId"))
            .or_else(|| non_empty_str(session.get("document").and_then(|d| d.get("id"))))
            .or_else(|| non_empty_str(session.get("id")))
            .unwrap_or_default();
        if document_id.is_empty() {
            // Nothing downstream needs the id today; a later per-document call would.
            warn!(job_id = ctx.job_id, "[ATTACH] Upload session response carried no document id");
        }

        Ok(Attempt::Attached(UploadTarget {
            document_id,
            upload_url,
            scope: ctx.scope.clone(),
            strategy: self.name(),
        }))
    }
}

/// `POST {documents}` followed by `POST {documents}/{id}/createUploadSession`.
pub struct DocumentThenSession;

#[async_trait]
impl SubmissionStrategy for DocumentThenSession {
    fn name(&self) -> &'static str {
        "create-document"
    }

    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<Attempt> {
        create_document_then_session(ctx, ctx.scope, self.name()).await
    }
}

/// Retry document creation under the printer's first share.
///
/// Only for jobs created printer-scoped. On success the job continues under
/// the share scope for every remaining call.
pub struct AlternateShareScope;

#[async_trait]
impl SubmissionStrategy for AlternateShareScope {
    fn name(&self) -> &'static str {
        "alternate-share-scope"
    }

    fn applies(&self, ctx: &AttemptContext<'_>) -> bool {
        ctx.scope.is_printer()
    }

    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<Attempt> {
        let shares = ctx.shares.discover_shares_for_printer(ctx.printer_id).await;
        let Some(share) = shares.first() else {
            return Ok(Attempt::Rejected(RejectedAttempt::without_response(
                self.name(),
                ctx.scope,
                format!("no printer share references printer {}", ctx.printer_id),
            )));
        };
        let share_scope = EndpointScope::Share(share.id.clone());
        info!(
            job_id = ctx.job_id,
            share_id = %share.id,
            share_name = %share.display_name,
            "[ATTACH] Retrying document creation under share scope"
        );
        create_document_then_session(ctx, &share_scope, self.name()).await
    }
}

async fn create_document_then_session(
    ctx: &AttemptContext<'_>,
    scope: &EndpointScope,
    strategy: &'static str,
) -> Result<Attempt> {
    let base = ctx.config.base();
    let body = json!({
        "displayName": ctx.document.name,
        "contentType": ctx.document.content_type,
    });
    let response = ctx
        .post(strategy, &scope.documents_url(base, ctx.job_id), &body)
        .await?;
    if !response.status_in(CREATED) {
        return Ok(Attempt::Rejected(RejectedAttempt::from_response(
            strategy,
            scope,
            "Create document",
            &response,
        )));
    }
    let document = response.json().unwrap_or(Value::Null);
    let Some(document_id) = non_empty_str(document.get("id")) else {
        return Ok(Attempt::Rejected(RejectedAttempt::without_response(
            strategy,
            scope,
            "Document ID missing in create document response",
        )));
    };
    info!(job_id = ctx.job_id, document_id = %document_id, scope = %scope, "[ATTACH] Document created");

    let session_url = scope.document_upload_session_url(base, ctx.job_id, &document_id);
    let session = ctx.post(strategy, &session_url, &json!({})).await?;
    if !session.status_in(CREATED) {
        let message = GraphErrorDetails::from_response(&session).render("Create upload session");
        error!(document_id = %document_id, message = %message, "[ATTACH] Upload session refused for created document");
        return Err(PrintError::DocumentAttachmentFailed {
            kind: AttachmentFailure::SessionRejected,
            message,
        });
    }
    let upload_url = session
        .json()
        .and_then(|s| non_empty_str(s.get("uploadUrl")))
        .ok_or_else(|| PrintError::UploadSessionMissingUrl {
            document_id: document_id.clone(),
        })?;

    Ok(Attempt::Attached(UploadTarget {
        document_id,
        upload_url,
        scope: scope.clone(),
        strategy,
    }))
}

/// Remediation text for an exhausted strategy chain.
pub fn remediation(scope: &EndpointScope, rejections: &[RejectedAttempt], required_roles: &[String]) -> String {
    let opaque = rejections
        .iter()
        .any(|r| r.details.as_ref().is_some_and(GraphErrorDetails::is_opaque_not_found));
    let roles = if required_roles.is_empty() {
        String::new()
    } else {
        format!(" (expected app roles: {})", required_roles.join(", "))
    };
    match (opaque, scope) {
        (true, EndpointScope::Printer(id)) => format!(
            "The service returned 404 without a specific error code for printer {id}. Likely causes: the printer is not shared in Universal Print, its connector is offline, or the application is missing print permissions or admin consent{roles}."
        ),
        (true, EndpointScope::Share(id)) => format!(
            "The service returned 404 without a specific error code for share {id}. Likely causes: the share does not grant access to this caller, the printer behind it is offline, or the application is missing print permissions or admin consent{roles}."
        ),
        (false, _) => format!(
            "Check the error codes above and run the diagnostics to probe printer, job and document access on {scope}{roles}."
        ),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
