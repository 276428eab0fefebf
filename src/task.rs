use std::path::Path;

use bytes::Bytes;
use tokio::sync::{oneshot, watch};

use crate::error::UploadError;

pub type TaskId = u64;

/// A selected file: name, optional MIME type and contents.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub filename: String,
    pub content_type: Option<String>,
    pub contents: Bytes,
}

impl FilePayload {
    pub fn new(filename: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            contents: contents.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        Ok(Self::new(filename, contents))
    }

    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }
}

/// One queued upload: the file field plus the non-file form fields captured
/// at submit time, in their original order. Immutable once built.
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// Multipart field name for the file part, taken from the originating
    /// input.
    pub field_name: String,
    pub file: FilePayload,
    pub form_fields: Vec<(String, String)>,
}

/// Observable handle for one enqueued upload.
///
/// Exposes progress notifications, the terminal outcome, and a settled signal
/// that fires on completion regardless of outcome.
#[derive(Debug)]
pub struct UploadHandle {
    pub id: TaskId,
    progress: watch::Receiver<f64>,
    settled: watch::Receiver<bool>,
    outcome: oneshot::Receiver<Result<String, UploadError>>,
}

impl UploadHandle {
    pub(crate) fn new(
        id: TaskId,
        progress: watch::Receiver<f64>,
        settled: watch::Receiver<bool>,
        outcome: oneshot::Receiver<Result<String, UploadError>>,
    ) -> Self {
        Self {
            id,
            progress,
            settled,
            outcome,
        }
    }

    /// Percent notifications in [0, 100], rounded to two decimal places.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Completes once the task has settled, success or failure.
    pub async fn settled(&self) {
        let mut rx = self.settled.clone();
        // A closed channel means the dispatch task is gone, which still
        // counts as settled.
        let _ = rx.wait_for(|settled| *settled).await;
    }

    /// Waits for the terminal outcome: the response body on a 2xx status, or
    /// `UploadError::ServerRejected` otherwise (status 0 on network failure).
    pub async fn wait(self) -> Result<String, UploadError> {
        match self.outcome.await {
            Ok(result) => result,
            Err(_) => Err(UploadError::ServerRejected { status: 0 }),
        }
    }
}
