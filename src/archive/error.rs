//! Archive pipeline errors
//!
//! Every variant aborts the request; `status` maps it onto the HTTP response.

use hyper::StatusCode;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("No files specified")]
    NoFiles,

    #[error("Empty file name in list")]
    EmptyName,

    #[error("Path escapes base directory: {0}")]
    OutsideBase(String),

    #[error("Failed to open file: {name}")]
    FileAccess {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Not a regular file: {0}")]
    NotAFile(String),

    #[error("Failed to name archive entry for: {0}")]
    Naming(String),

    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("File changed while building archive: {0}")]
    Changed(String),

    #[error("Failed to write file to zip: {name}")]
    Write {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to close zip writer")]
    Finalize(#[source] zip::result::ZipError),
}

impl ArchiveError {
    pub(crate) fn file_access(name: &str, source: io::Error) -> Self {
        Self::FileAccess {
            name: name.to_string(),
            source,
        }
    }

    pub(crate) fn write(name: &str, source: impl Into<zip::result::ZipError>) -> Self {
        Self::Write {
            name: name.to_string(),
            source: source.into(),
        }
    }

    /// HTTP status reported for this error
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NoFiles | Self::EmptyName | Self::OutsideBase(_) => StatusCode::BAD_REQUEST,
            Self::FileAccess { .. }
            | Self::NotAFile(_)
            | Self::Naming(_)
            | Self::DuplicateEntry(_)
            | Self::Changed(_)
            | Self::Write { .. }
            | Self::Finalize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller, not the server, is at fault
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ArchiveError::NoFiles.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ArchiveError::OutsideBase("../x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        let err = ArchiveError::file_access("missing.txt", io::ErrorKind::NotFound.into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "Failed to open file: missing.txt");
    }
}
