use std::collections::HashMap;
use std::env;

use url::Url;

use crate::error::UploadError;

/// Size limit parsed from configuration.
///
/// A limit that is present but not a valid integer fails closed: every file
/// is rejected until the configuration is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeLimit {
    Unlimited,
    Max(u64),
    Invalid,
}

impl SizeLimit {
    /// Parse an optional raw limit. Absent or empty means no limit.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => SizeLimit::Unlimited,
            Some(v) if v.trim().is_empty() => SizeLimit::Unlimited,
            Some(v) => match v.trim().parse::<u64>() {
                // A zero limit counts as unconfigured, like the original
                // form's falsy check on the attribute.
                Ok(0) => SizeLimit::Unlimited,
                Ok(n) => SizeLimit::Max(n),
                Err(_) => SizeLimit::Invalid,
            },
        }
    }
}

/// Localized error strings shown on a slot.
#[derive(Debug, Clone)]
pub struct Messages {
    pub extension_error: String,
    pub size_error: String,
    pub server_error: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            extension_error: "File extension is not allowed".to_string(),
            size_error: "File exceeds the maximum upload size".to_string(),
            server_error: "Upload failed on the server".to_string(),
        }
    }
}

/// Upload configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Endpoint the multipart POST is sent to (the form action URL).
    pub endpoint: Url,

    /// Where to navigate once the queue drains (default: "/").
    pub redirect_when_done: String,

    /// Allow-list of dotted suffixes, e.g. `.png,.jpg`. `None` accepts
    /// everything. Matching is case-sensitive.
    pub allowed_extensions: Option<Vec<String>>,

    pub size_limit: SizeLimit,

    pub messages: Messages,
}

impl UploadConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            redirect_when_done: "/".to_string(),
            allowed_extensions: None,
            size_limit: SizeLimit::Unlimited,
            messages: Messages::default(),
        }
    }

    /// Build a configuration from a form action URL and its `data-*`
    /// attribute map, the way the original admin widget is configured.
    pub fn from_attrs(action: &str, attrs: &HashMap<String, String>) -> Result<Self, UploadError> {
        let endpoint = Url::parse(action)
            .map_err(|e| UploadError::Config(format!("invalid action URL '{action}': {e}")))?;

        let mut config = Self::new(endpoint);

        if let Some(url) = attrs.get("redirect-when-done") {
            config.redirect_when_done = url.clone();
        }
        config.allowed_extensions = parse_extensions(attrs.get("allowed-extensions"));
        config.size_limit = SizeLimit::parse(attrs.get("size-limit").map(String::as_str));

        if let Some(msg) = attrs.get("extension-error") {
            config.messages.extension_error = msg.clone();
        }
        if let Some(msg) = attrs.get("size-error") {
            config.messages.size_error = msg.clone();
        }
        if let Some(msg) = attrs.get("server-error") {
            config.messages.server_error = msg.clone();
        }

        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, UploadError> {
        let action = env::var("UPLOAD_URL")
            .map_err(|_| UploadError::Config("UPLOAD_URL must be set".to_string()))?;
        let endpoint = Url::parse(&action)
            .map_err(|e| UploadError::Config(format!("invalid UPLOAD_URL '{action}': {e}")))?;

        let mut config = Self::new(endpoint);

        if let Ok(url) = env::var("UPLOAD_REDIRECT") {
            config.redirect_when_done = url;
        }
        config.allowed_extensions =
            parse_extensions(env::var("UPLOAD_ALLOWED_EXTENSIONS").ok().as_ref());
        config.size_limit = SizeLimit::parse(env::var("UPLOAD_SIZE_LIMIT").ok().as_deref());

        Ok(config)
    }
}

/// Split a comma-separated extension list. An absent or empty value means no
/// allow-list. Entries are kept verbatim, dots and case included.
fn parse_extensions(raw: Option<&String>) -> Option<Vec<String>> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    Some(raw.split(',').map(str::to_string).collect())
}
