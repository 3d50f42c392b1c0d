//! Requested file list parsing

use super::ArchiveError;

/// Query parameter carrying the comma-separated file list
pub const FILES_PARAM: &str = "files";

/// Ordered list of requested names, exactly as the client sent them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    names: Vec<String>,
}

impl FileRequest {
    /// Extract and parse `files` from a raw (still percent-encoded) query string.
    /// When the parameter repeats, the first occurrence wins.
    pub fn from_query(query: Option<&str>) -> Result<Self, ArchiveError> {
        let files = query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == FILES_PARAM)
                .map(|(_, value)| value.into_owned())
        });
        Self::parse(files.as_deref().unwrap_or_default())
    }

    /// Split a decoded `files` value on commas
    pub fn parse(files: &str) -> Result<Self, ArchiveError> {
        if files.is_empty() {
            return Err(ArchiveError::NoFiles);
        }
        let names: Vec<String> = files.split(',').map(str::to_string).collect();
        if names.iter().any(String::is_empty) {
            return Err(ArchiveError::EmptyName);
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
