/// Shared data structures for the catalog
///
/// These structs represent the data model that flows between
/// the database layer and its callers (CLI, portals). Field names
/// serialize in camelCase to match the portal payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached `{raw, selected}` totals for one folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderCounts {
    pub raw: i64,
    pub selected: i64,
}

/// Cached project-wide totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCounts {
    pub raw_total: i64,
    pub selected: i64,
}

/// A named partition of imported media ("Raw 1", "Raw 2", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFolder {
    pub name: String,
    pub counts: FolderCounts,
}

/// One customer engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Upper-cased reference code (e.g. "LCA-2041")
    pub reference_id: String,
    pub category: String,
    /// Folders in creation order
    pub raw_folders: Vec<RawFolder>,
    pub selection_locked: bool,
    pub selection_locked_at: Option<DateTime<Utc>>,
    /// Delivery notes and links
    pub edited_text: String,
    pub counts: ProjectCounts,
    pub last_selection_version: i64,
    pub last_selection_submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One imported media file, scoped to a single folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Unique database ID
    pub id: i64,
    pub reference_id: String,
    pub folder_name: String,
    /// Stable id from the media provider (None for direct uploads)
    pub external_id: Option<String>,
    /// Storage path for direct uploads
    pub storage_path: Option<String>,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub preview_ref: Option<String>,
    pub is_selected: bool,
    pub selected_at: Option<DateTime<Utc>>,
    pub selected_by: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One media item as reported by a provider listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceItem {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub storage_path: Option<String>,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub preview_ref: Option<String>,
}

impl SourceItem {
    /// Identity of the item within a folder.
    ///
    /// Provider ids win; direct uploads fall back to their storage path.
    /// Returns None when neither is present.
    pub fn source_key(&self) -> Option<String> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(id) = non_empty(&self.external_id) {
            return Some(format!("ext:{}", id));
        }
        non_empty(&self.storage_path).map(|p| format!("path:{}", p))
    }

    /// Only images and videos are catalogued
    pub fn is_media(&self) -> bool {
        let mime = self.mime_type.trim().to_ascii_lowercase();
        mime.starts_with("image/") || mime.starts_with("video/")
    }

    /// Label used when reporting a failure for this item
    pub fn label(&self) -> String {
        self.external_id
            .clone()
            .or_else(|| self.storage_path.clone())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// A per-item problem collected during an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub item: String,
    pub reason: String,
}

/// Result of a folder import operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub failures: Vec<ImportFailure>,
}

/// One selected asset captured in a submission snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionItem {
    pub asset_id: i64,
    pub name: String,
    pub mime_type: String,
    pub selected_at: Option<DateTime<Utc>>,
}

/// Change relative to the previous submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDiff {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
}

/// Immutable snapshot written on each customer submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionVersion {
    pub reference_id: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SelectionItem>,
    pub diff: SelectionDiff,
}

/// Workflow status of an edit request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRequestStatus {
    New,
    InProgress,
    Done,
}

impl EditRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditRequestStatus::New => "new",
            EditRequestStatus::InProgress => "in_progress",
            EditRequestStatus::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "new" => Some(EditRequestStatus::New),
            "in_progress" => Some(EditRequestStatus::InProgress),
            "done" => Some(EditRequestStatus::Done),
            _ => None,
        }
    }
}

/// One per-file change request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequestItem {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub changes: String,
}

/// A stored edit request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub id: i64,
    pub reference_id: String,
    pub items: Vec<EditRequestItem>,
    pub status: EditRequestStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(external_id: Option<&str>, storage_path: Option<&str>, mime: &str) -> SourceItem {
        SourceItem {
            external_id: external_id.map(str::to_string),
            storage_path: storage_path.map(str::to_string),
            name: "IMG_0001.JPG".to_string(),
            mime_type: mime.to_string(),
            size: 1024,
            preview_ref: None,
        }
    }

    #[test]
    fn test_source_key_prefers_external_id() {
        let it = item(Some("1AbC"), Some("uploads/IMG_0001.JPG"), "image/jpeg");
        assert_eq!(it.source_key().as_deref(), Some("ext:1AbC"));
    }

    #[test]
    fn test_source_key_falls_back_to_path() {
        let it = item(Some("  "), Some("uploads/IMG_0001.JPG"), "image/jpeg");
        assert_eq!(it.source_key().as_deref(), Some("path:uploads/IMG_0001.JPG"));
        assert_eq!(item(None, None, "image/jpeg").source_key(), None);
    }

    #[test]
    fn test_media_filter() {
        assert!(item(Some("a"), None, "image/x-nikon-nef").is_media());
        assert!(item(Some("a"), None, "Video/MP4").is_media());
        assert!(!item(Some("a"), None, "application/pdf").is_media());
    }

    #[test]
    fn test_status_strings() {
        for status in [EditRequestStatus::New, EditRequestStatus::InProgress, EditRequestStatus::Done] {
            assert_eq!(EditRequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EditRequestStatus::parse("archived"), None);
    }
}
