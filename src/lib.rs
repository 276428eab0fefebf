//! Client-side sequential upload queue.
//!
//! Validates selected files (extension allow-list, size limit), keeps an
//! ordered queue of pending uploads, sends one `multipart/form-data` POST at
//! a time with progress reporting, and signals a redirect once the queue
//! drains. The slot/form logic is independent of any rendering surface:
//! callers feed it input operations and fold the emitted [`UploadEvent`]s
//! back in.

pub mod config;
pub mod error;
pub mod events;
pub mod form;
pub mod queue;
pub mod task;
pub mod validation;

pub use config::{Messages, SizeLimit, UploadConfig};
pub use error::UploadError;
pub use events::UploadEvent;
pub use form::{FormController, Slot, SlotState, SubmitOutcome};
pub use queue::UploadManager;
pub use task::{FilePayload, TaskId, UploadHandle, UploadTask};
