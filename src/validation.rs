use crate::config::SizeLimit;
use crate::error::UploadError;

/// Extension of a filename as the upload form defines it: the substring from
/// the last `.` (inclusive) to the end. A name with no dot yields the whole
/// name, which then never matches a dotted allow-list entry.
pub fn file_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) => &filename[idx..],
        None => filename,
    }
}

/// Validates a filename against the configured allow-list. No allow-list
/// means everything is accepted. Matching is case-sensitive.
pub fn validate_extension(
    filename: &str,
    allowed: Option<&[String]>,
) -> Result<(), UploadError> {
    let Some(allowed) = allowed else {
        return Ok(());
    };

    let extension = file_extension(filename);
    if allowed.iter().any(|a| a == extension) {
        return Ok(());
    }

    Err(UploadError::ExtensionRejected {
        extension: extension.to_string(),
    })
}

/// Validates a file size against the configured limit. An invalid limit
/// rejects everything.
pub fn validate_size(size: u64, limit: &SizeLimit) -> Result<(), UploadError> {
    match limit {
        SizeLimit::Unlimited => Ok(()),
        SizeLimit::Max(max) if size <= *max => Ok(()),
        SizeLimit::Max(max) => Err(UploadError::SizeRejected {
            size,
            limit: Some(*max),
        }),
        SizeLimit::Invalid => Err(UploadError::SizeRejected { size, limit: None }),
    }
}
