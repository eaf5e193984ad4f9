use std::path::PathBuf;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("attendance limit of {limit} reached")]
    LimitReached { limit: u32 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not read event store `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse event store `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("could not serialize events: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("could not write event store `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("event date and time are required for a calendar entry")]
    DateAndTimeNotSupplied,
    #[error("event duration is required for a calendar entry")]
    DurationNotSupplied,
    #[error("calendar integration is not configured")]
    NotConfigured,
    #[error("calendar request failed: {0}")]
    Remote(String),
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("could not write user directory `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("could not serialize user directory: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    /// Missing files are the normal first-run state rather than a fault.
    pub fn is_missing_file(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
