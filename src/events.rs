use serde::Serialize;

use crate::task::TaskId;

/// Notifications emitted by the upload manager as tasks move through the
/// queue.
///
/// `Settled` always follows `Succeeded` or `Failed` for the same task.
/// `Drained` is emitted exactly once per drain-to-zero transition and is the
/// signal to navigate to the post-upload destination.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    Progress { task: TaskId, percent: f64 },
    Succeeded { task: TaskId, body: String },
    Failed { task: TaskId, status: u16 },
    Settled { task: TaskId },
    Drained,
}
