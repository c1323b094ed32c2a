//! Chunked upload using the ownCloud `OC-Chunked` protocol
//!
//! A file is split into fixed-size chunks that are PUT one after the other to
//! `<resource url>-chunking-<token>-<count>-<index>` with the header
//! `OC-Chunked: OC-Chunked`. The server assembles the file once every chunk
//! of a token has arrived.
//!
//! Chunk bodies are streamed straight from the file; nothing is buffered
//! beyond a single read.

use std::{
    io::SeekFrom,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use futures_util::StreamExt;
use ocsync_core::{
    domain::{ChunkPlan, OperationResult, RawOutcome, RemotePath, TransportFailure, CHUNK_SIZE},
    ports::ITransferProgressListener,
};
use reqwest::{header::CONTENT_LENGTH, Body, Method};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::{client::WebdavClient, failure::failure_result, WebdavError};

/// Header marking a chunk request
const OC_CHUNKED_HEADER: &str = "OC-Chunked";

/// Size of a single read from the source file
const READ_CAPACITY: usize = 4096;

/// Uploads files in `OC-Chunked` chunks
pub struct ChunkedUploader {
    client: WebdavClient,
    chunk_size: u64,
    listeners: Vec<Arc<dyn ITransferProgressListener>>,
}

impl ChunkedUploader {
    /// Creates an uploader using the default [`CHUNK_SIZE`]
    pub fn new(client: WebdavClient) -> Self {
        Self {
            client,
            chunk_size: CHUNK_SIZE,
            listeners: Vec::new(),
        }
    }

    /// Overrides the chunk size
    ///
    /// A zero size is rejected when an upload is planned.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Registers a listener for byte-level progress
    pub fn add_progress_listener(&mut self, listener: Arc<dyn ITransferProgressListener>) {
        self.listeners.push(listener);
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Uploads `source` to `remote` under a fresh chunking token
    ///
    /// # Returns
    /// The classified result of the first failing chunk, or the result of
    /// the last chunk when all succeed.
    ///
    /// # Errors
    /// Returns [`WebdavError`] only when the upload cannot be planned: the
    /// source cannot be inspected or the chunk size is zero.
    pub async fn upload(
        &self,
        source: &Path,
        remote: &RemotePath,
    ) -> Result<OperationResult, WebdavError> {
        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|e| WebdavError::Source {
                path: source.to_path_buf(),
                source: e,
            })?;
        let plan = ChunkPlan::new(metadata.len(), self.chunk_size)?;
        self.upload_with_plan(source, remote, &plan).await
    }

    /// Uploads `source` following an existing plan
    ///
    /// Reusing a plan keeps the chunking token, so chunks the server already
    /// accepted are addressed identically.
    ///
    /// # Errors
    /// Returns [`WebdavError::Source`] if the file cannot be opened.
    #[tracing::instrument(skip(self, remote, plan), fields(remote = %remote, token = plan.token()))]
    pub async fn upload_with_plan(
        &self,
        source: &Path,
        remote: &RemotePath,
        plan: &ChunkPlan,
    ) -> Result<OperationResult, WebdavError> {
        let file = File::open(source)
            .await
            .map_err(|e| WebdavError::Source {
                path: source.to_path_buf(),
                source: e,
            })?;

        let secure = self.client.is_secure();
        let base_url = self.client.resource_url(remote);
        let file_name = remote
            .file_name()
            .map(str::to_string)
            .unwrap_or_default();
        let transferred = Arc::new(AtomicU64::new(0));

        info!(
            bytes = plan.total_len(),
            chunks = plan.chunk_count(),
            "Starting chunked upload"
        );

        let mut last = OperationResult::ok().with_secure(secure);
        for (index, range) in plan.ranges().enumerate() {
            let index = index as u64;
            let chunk_len = range.end - range.start;
            let url = format!("{}{}", base_url, plan.chunk_suffix(index));

            let mut handle = match file.try_clone().await {
                Ok(handle) => handle,
                Err(e) => return Ok(read_failure(e, secure)),
            };
            if let Err(e) = handle.seek(SeekFrom::Start(range.start)).await {
                return Ok(read_failure(e, secure));
            }

            let listeners = self.listeners.clone();
            let counter = Arc::clone(&transferred);
            let total = plan.total_len();
            let name = file_name.clone();
            let stream = ReaderStream::with_capacity(handle.take(chunk_len), READ_CAPACITY).inspect(
                move |read| {
                    if let Ok(bytes) = read {
                        let rate = bytes.len() as u64;
                        let so_far = counter.fetch_add(rate, Ordering::Relaxed) + rate;
                        for listener in &listeners {
                            listener.on_transfer_progress(rate, so_far, total, &name);
                        }
                    }
                },
            );

            debug!(chunk_index = index, bytes = chunk_len, "PUT chunk");

            let response = match self
                .client
                .request(Method::PUT, &url)
                .header(OC_CHUNKED_HEADER, OC_CHUNKED_HEADER)
                .header(CONTENT_LENGTH, chunk_len)
                .body(Body::wrap_stream(stream))
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    let result = failure_result(&e, secure);
                    warn!(chunk_index = index, "{}", result.log_message());
                    return Ok(result);
                }
            };

            let status = response.status();
            // Drain the body before the next chunk so the connection is reusable.
            if let Err(e) = response.bytes().await {
                let result = failure_result(&e, secure);
                warn!(chunk_index = index, "{}", result.log_message());
                return Ok(result);
            }

            last = OperationResult::from_outcome(
                RawOutcome::Response {
                    success: status.is_success(),
                    status: status.as_u16(),
                },
                secure,
            );
            if !last.is_success() {
                warn!(
                    chunk_index = index,
                    status = status.as_u16(),
                    "Chunk rejected: {}",
                    last.log_message()
                );
                return Ok(last);
            }
        }

        info!(bytes = transferred.load(Ordering::Relaxed), "Chunked upload finished");
        Ok(last)
    }
}

fn read_failure(err: std::io::Error, secure: bool) -> OperationResult {
    warn!(error = %err, "Cannot read upload source");
    OperationResult::from_failure(TransportFailure::Io, err.to_string()).with_secure(secure)
}
