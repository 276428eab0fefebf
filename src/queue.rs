use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::UploadError;
use crate::events::UploadEvent;
use crate::task::{FilePayload, TaskId, UploadHandle, UploadTask};

/// Upload bodies are streamed in chunks of this size so that progress can be
/// reported while the transfer is in flight.
const PROGRESS_CHUNK: usize = 64 * 1024;

struct QueueEntry {
    id: TaskId,
    settled: watch::Sender<bool>,
}

/// Owns the upload queue and enforces strict FIFO dispatch: each task's HTTP
/// request is sent only after the previous task has settled, success or
/// failure, so at most one request is in flight at any time.
///
/// One instance is constructed per form lifecycle and simply dropped when the
/// consumer navigates away.
pub struct UploadManager {
    client: reqwest::Client,
    endpoint: Url,
    events: mpsc::UnboundedSender<UploadEvent>,
    queue: Arc<Mutex<Vec<QueueEntry>>>,
    next_id: AtomicU64,
}

impl UploadManager {
    pub fn new(endpoint: Url, events: mpsc::UnboundedSender<UploadEvent>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            events,
            queue: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of tasks that have been enqueued but not yet settled.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Enqueue a task and return its observable handle.
    ///
    /// The queue push happens synchronously, before any async work starts, so
    /// a queue-length check immediately after an enqueue loop is reliable.
    /// Dispatch itself runs on a spawned task: immediately if the queue was
    /// empty, otherwise as a continuation of the current tail's settled
    /// signal. Must be called from within a tokio runtime.
    pub fn enqueue(&self, task: UploadTask) -> UploadHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (progress_tx, progress_rx) = watch::channel(0.0f64);
        let (settled_tx, settled_rx) = watch::channel(false);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let wait_for = {
            let mut queue = self.queue.lock();
            let prev = queue.last().map(|entry| entry.settled.subscribe());
            queue.push(QueueEntry {
                id,
                settled: settled_tx.clone(),
            });
            prev
        };

        debug!(
            task = id,
            filename = %task.file.filename,
            deferred = wait_for.is_some(),
            "enqueued upload"
        );

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let events = self.events.clone();
        let queue = Arc::clone(&self.queue);

        tokio::spawn(async move {
            if let Some(mut prev) = wait_for {
                // The predecessor settles regardless of outcome. A closed
                // channel means it is long gone; run anyway.
                let _ = prev.wait_for(|settled| *settled).await;
            }

            debug!(task = id, "dispatching upload request");
            let result = send_request(&client, &endpoint, &task, id, &progress_tx, &events).await;

            // Terminal state: leave the queue by identity, then settle.
            // Completions are sequential by construction, so this is always
            // the current head.
            let drained = {
                let mut queue = queue.lock();
                if let Some(pos) = queue.iter().position(|entry| entry.id == id) {
                    queue.remove(pos);
                }
                queue.is_empty()
            };

            match &result {
                Ok(_) => {
                    let _ = progress_tx.send(100.0);
                    let _ = events.send(UploadEvent::Progress {
                        task: id,
                        percent: 100.0,
                    });
                }
                Err(status) => {
                    warn!(task = id, status, "upload rejected");
                }
            }
            let event = match &result {
                Ok(body) => UploadEvent::Succeeded {
                    task: id,
                    body: body.clone(),
                },
                Err(status) => UploadEvent::Failed {
                    task: id,
                    status: *status,
                },
            };
            let _ = events.send(event);
            let _ = outcome_tx
                .send(result.map_err(|status| UploadError::ServerRejected { status }));

            let _ = events.send(UploadEvent::Settled { task: id });
            let _ = settled_tx.send(true);

            if drained {
                info!("upload queue drained");
                let _ = events.send(UploadEvent::Drained);
            }
        });

        UploadHandle::new(id, progress_rx, settled_rx, outcome_rx)
    }
}

/// Sends one multipart request: captured form fields in their original
/// order, then the file field last. Returns the response body on a 2xx
/// status; any other outcome is the rejecting status code, with 0 standing
/// in for requests that never completed at the HTTP level.
async fn send_request(
    client: &reqwest::Client,
    endpoint: &Url,
    task: &UploadTask,
    id: TaskId,
    progress: &watch::Sender<f64>,
    events: &mpsc::UnboundedSender<UploadEvent>,
) -> Result<String, u16> {
    let mut form = Form::new();
    for (name, value) in &task.form_fields {
        form = form.text(name.clone(), value.clone());
    }

    let part = match file_part(&task.file, id, progress, events) {
        Ok(part) => part,
        Err(err) => {
            warn!(task = id, error = %err, "could not build file part");
            return Err(0);
        }
    };
    form = form.part(task.field_name.clone(), part);

    let response = match client.post(endpoint.clone()).multipart(form).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(task = id, error = %err, "upload failed at the network level");
            return Err(0);
        }
    };

    let status = response.status();
    if status.is_success() {
        // Body read errors lose the response text, not the success.
        Ok(response.text().await.unwrap_or_default())
    } else {
        Err(status.as_u16())
    }
}

/// Builds the streaming file part. Each chunk handed to the transport bumps
/// the progress watch and emits a `Progress` event. A zero-length file
/// produces no intermediate notifications.
fn file_part(
    file: &FilePayload,
    id: TaskId,
    progress: &watch::Sender<f64>,
    events: &mpsc::UnboundedSender<UploadEvent>,
) -> Result<Part, reqwest::Error> {
    let total = file.contents.len() as u64;

    let mut remaining = file.contents.clone();
    let mut chunks = Vec::new();
    while remaining.len() > PROGRESS_CHUNK {
        chunks.push(remaining.split_to(PROGRESS_CHUNK));
    }
    if !remaining.is_empty() {
        chunks.push(remaining);
    }

    let progress = progress.clone();
    let events = events.clone();
    let mut sent = 0u64;
    let body = stream::iter(chunks).map(move |chunk: Bytes| {
        sent += chunk.len() as u64;
        if total > 0 {
            let percent = round_percent(sent, total);
            let _ = progress.send(percent);
            let _ = events.send(UploadEvent::Progress { task: id, percent });
        }
        Ok::<Bytes, std::io::Error>(chunk)
    });

    let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
        .file_name(file.filename.clone());
    match &file.content_type {
        Some(content_type) => part.mime_str(content_type),
        None => Ok(part),
    }
}

/// `loaded / total` as a percentage, rounded to two decimal places.
fn round_percent(sent: u64, total: u64) -> f64 {
    let raw = sent as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
