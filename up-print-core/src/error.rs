// Error taxonomy for a print submission.

use std::time::Duration;

use thiserror::Error;

use crate::contract::{ByteRange, TransportError};

/// Why document attachment gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentFailure {
    /// Every strategy was rejected by the service.
    Exhausted,
    /// One strategy hit a transport error; later strategies were not tried.
    Transport,
    /// A document was created but its upload session was refused.
    SessionRejected,
}

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("printer not found: {0}")]
    PrinterNotFound(String),

    #[error("access to printer denied: {0}")]
    PrinterForbidden(String),

    #[error("printer share not found: {0}")]
    ShareNotFound(String),

    #[error("access to printer share denied: {0}")]
    ShareForbidden(String),

    #[error("{0}")]
    JobCreationFailed(String),

    #[error("{message}")]
    DocumentAttachmentFailed {
        kind: AttachmentFailure,
        message: String,
    },

    #[error("uploadUrl missing in upload session response for document '{document_id}'")]
    UploadSessionMissingUrl { document_id: String },

    #[error("upload chunk failed at range {range}: {message}")]
    ChunkUploadFailed { range: ByteRange, message: String },

    #[error("{0}")]
    JobStartFailed(String),

    #[error("{0}")]
    JobStatusFailed(String),

    #[error("timed out after {waited:?} waiting for job {job_id} (last state: {last_state})")]
    PollTimeout {
        job_id: String,
        waited: Duration,
        last_state: String,
    },

    #[error("{0}")]
    RequestFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PrintError>;
