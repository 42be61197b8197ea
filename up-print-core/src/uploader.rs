//! Streams a local file to a pre-authorized upload URL in byte-range chunks.

use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::contract::{ByteRange, GraphTransport};
use crate::error::{PrintError, Result};
use crate::graph_error::translate;

const ACCEPTED: &[u16] = &[200, 201, 202];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub bytes: u64,
    pub chunks: u64,
}

pub struct ChunkedUploader<'a> {
    transport: &'a dyn GraphTransport,
    chunk_size: usize,
    timeout: Duration,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(transport: &'a dyn GraphTransport, chunk_size: usize, timeout: Duration) -> Self {
        let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        Self {
            transport,
            chunk_size,
            timeout,
        }
    }

    /// Upload `path` to `upload_url`, one PUT per chunk.
    ///
    /// Chunk `k` starts at `end + 1` of chunk `k - 1`; the last chunk ends at
    /// `total - 1`. Any rejected chunk aborts the upload; it is never resumed.
    /// An empty file issues no request.
    pub async fn upload(&self, upload_url: &str, path: &Path) -> Result<UploadSummary> {
        let mut file = File::open(path).await?;
        let total = file.metadata().await?.len();
        info!(path = %path.display(), total, chunk_size = self.chunk_size, "[UPLOAD] Starting chunked upload");

        let mut uploaded: u64 = 0;
        let mut chunks: u64 = 0;
        while uploaded < total {
            let mut chunk = Vec::with_capacity(self.chunk_size);
            (&mut file)
                .take(self.chunk_size as u64)
                .read_to_end(&mut chunk)
                .await?;
            if chunk.is_empty() {
                break;
            }
            let range = ByteRange {
                start: uploaded,
                end: uploaded + chunk.len() as u64 - 1,
                total,
            };
            debug!(range = %range.content_range(), "[UPLOAD] Sending chunk");

            let response = self
                .transport
                .put_range(upload_url, range, chunk, self.timeout)
                .await
                .map_err(|e| {
                    error!(range = %range, error = %e, "[UPLOAD] Chunk transport failed");
                    PrintError::ChunkUploadFailed {
                        range,
                        message: e.to_string(),
                    }
                })?;
            if !response.status_in(ACCEPTED) {
                let message = translate("Upload chunk", &response);
                error!(range = %range, message = %message, "[UPLOAD] Chunk rejected");
                return Err(PrintError::ChunkUploadFailed { range, message });
            }

            uploaded = range.end + 1;
            chunks += 1;
        }

        info!(bytes = uploaded, chunks, "[UPLOAD] Chunked upload finished");
        Ok(UploadSummary {
            bytes: uploaded,
            chunks,
        })
    }
}
