//! Error taxonomy shared by the graph store, the indexer and the router.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("dangling reference: edge {source_id} -> {target_id} names a node that does not exist")]
    DanglingReference { source_id: String, target_id: String },

    #[error("invalid subgraph: {0}")]
    InvalidSubgraph(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("snapshot I/O failed: {0}")]
    SnapshotIo(String),

    #[error("graph lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Stable machine-readable code carried in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::DanglingReference { .. } => "dangling_reference",
            Error::InvalidSubgraph(_) => "invalid_subgraph",
            Error::UnsupportedLanguage(_) => "unsupported_language",
            Error::FileTooLarge { .. } => "file_too_large",
            Error::Analysis(_) => "analysis_error",
            Error::SnapshotIo(_) => "snapshot_io",
            Error::LockPoisoned => "lock_poisoned",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::SnapshotIo(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SnapshotIo(format!("decode: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_reference_names_both_endpoints() {
        let err = Error::DanglingReference {
            source_id: "missing1".into(),
            target_id: "missing2".into(),
        };
        assert_eq!(
            err.to_string(),
            "dangling reference: edge missing1 -> missing2 names a node that does not exist"
        );
        // Endpoint ids are data, not a wrapped cause.
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn file_too_large_reports_sizes() {
        let err = Error::FileTooLarge {
            size: 10,
            limit: 5,
        };
        assert_eq!(
            err.to_string(),
            "file too large: 10 bytes exceeds limit of 5 bytes"
        );
    }

    #[test]
    fn sqlite_errors_become_snapshot_errors() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::SnapshotIo(_)));
    }
}
