/// Error types for the gallery catalog
///
/// Business outcomes (validation, missing records, conflicts, the selection
/// lock) are ordinary variants so callers can match on them. Database and
/// filesystem failures are wrapped and flagged as retryable.

use thiserror::Error;

/// Coarse classification used by callers that map errors onto responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Upstream,
    Persistence,
}

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Edit request contains no valid items")]
    EmptyRequest,

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project already exists: {0}")]
    ProjectExists(String),

    #[error("Folder not found: {reference_id}/{folder}")]
    UnknownFolder { reference_id: String, folder: String },

    #[error("Folder already exists: {reference_id}/{folder}")]
    DuplicateFolder { reference_id: String, folder: String },

    #[error("Asset not found: {0}")]
    AssetNotFound(i64),

    #[error("Edit request not found: {0}")]
    EditRequestNotFound(i64),

    #[error("Selection version {version} not found for {reference_id}")]
    VersionNotFound { reference_id: String, version: i64 },

    #[error("Selection version {version} for {reference_id} was taken by a concurrent submission")]
    VersionConflict { reference_id: String, version: i64 },

    #[error("The selection window is closed. Contact the studio to make changes.")]
    SelectionLocked,

    #[error("Media provider error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog connection poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, GalleryError>;

impl GalleryError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        GalleryError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GalleryError::Validation { .. } | GalleryError::EmptyRequest => ErrorKind::Validation,
            GalleryError::ProjectNotFound(_)
            | GalleryError::UnknownFolder { .. }
            | GalleryError::AssetNotFound(_)
            | GalleryError::EditRequestNotFound(_)
            | GalleryError::VersionNotFound { .. } => ErrorKind::NotFound,
            GalleryError::ProjectExists(_)
            | GalleryError::DuplicateFolder { .. }
            | GalleryError::VersionConflict { .. } => ErrorKind::Conflict,
            GalleryError::SelectionLocked => ErrorKind::Forbidden,
            GalleryError::Upstream(_) => ErrorKind::Upstream,
            GalleryError::Persistence(_)
            | GalleryError::Io(_)
            | GalleryError::Json(_)
            | GalleryError::Config(_)
            | GalleryError::Poisoned => ErrorKind::Persistence,
        }
    }

    /// Whether the same request may succeed if simply tried again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GalleryError::Persistence(_) | GalleryError::Io(_) | GalleryError::VersionConflict { .. }
        )
    }
}

/// True when a rusqlite error is a UNIQUE/constraint violation
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
