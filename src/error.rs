use thiserror::Error;

/// Errors surfaced by the upload pipeline.
///
/// Validation and server errors are recovered locally: they end up as per-slot
/// state on the form, never as a crash of the queue. `Config` and `Io` only
/// occur before anything is enqueued.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("file extension '{extension}' is not allowed")]
    ExtensionRejected { extension: String },

    /// `limit` is `None` when a size limit was configured but could not be
    /// parsed; in that case every file is rejected (fail closed).
    #[error("file size {size} bytes is not accepted by the configured limit")]
    SizeRejected { size: u64, limit: Option<u64> },

    /// Status 0 means the request never completed at the HTTP level
    /// (connection refused, reset, malformed request).
    #[error("server rejected upload with status {status}")]
    ServerRejected { status: u16 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
