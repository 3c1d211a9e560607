/// Edit request log
///
/// After delivery the customer can ask for per-file changes. Each submission
/// is stored as one append-only row holding all of its valid items as JSON.
/// Invalid items are dropped; a submission with nothing left is rejected.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::data::{EditRequest, EditRequestItem, EditRequestStatus};
use super::library::{self, normalize_reference, Library};
use crate::error::{GalleryError, Result};

/// Length caps applied to each edit request item (in characters)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct EditRequestLimits {
    pub max_file_name_chars: usize,
    pub max_changes_chars: usize,
}

impl Default for EditRequestLimits {
    fn default() -> Self {
        Self {
            max_file_name_chars: 200,
            max_changes_chars: 4000,
        }
    }
}

impl EditRequestLimits {
    /// Trim an item and check it against the caps.
    /// Returns None when either field is empty or too long.
    pub fn accept(&self, item: &EditRequestItem) -> Option<EditRequestItem> {
        let file_name = item.file_name.trim();
        let changes = item.changes.trim();

        if file_name.is_empty() || changes.is_empty() {
            return None;
        }
        if file_name.chars().count() > self.max_file_name_chars
            || changes.chars().count() > self.max_changes_chars
        {
            return None;
        }

        Some(EditRequestItem {
            file_name: file_name.to_string(),
            changes: changes.to_string(),
        })
    }
}

/// Convert stored items JSON back into items
fn items_from_json(json: &str) -> std::result::Result<Vec<EditRequestItem>, serde_json::Error> {
    serde_json::from_str(json)
}

fn edit_request_from_parts(
    id: i64,
    reference_id: String,
    items_json: String,
    status: String,
    created_at: chrono::DateTime<Utc>,
) -> Result<EditRequest> {
    Ok(EditRequest {
        id,
        reference_id,
        items: items_from_json(&items_json)?,
        // Unknown statuses written by older tools read back as new
        status: EditRequestStatus::parse(&status).unwrap_or(EditRequestStatus::New),
        created_at,
    })
}

type RawEditRequest = (i64, String, String, String, chrono::DateTime<Utc>);

fn raw_from_row(row: &rusqlite::Row) -> rusqlite::Result<RawEditRequest> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

impl Library {
    /// Store a customer's edit request.
    ///
    /// Fails with `ProjectNotFound` for an unknown reference, then with
    /// `EmptyRequest` if no item survives validation.
    pub fn submit_edit_request(&self, reference_id: &str, items: &[EditRequestItem]) -> Result<EditRequest> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;

        let valid: Vec<EditRequestItem> = items.iter().filter_map(|item| self.edit_limits.accept(item)).collect();
        if valid.len() < items.len() {
            debug!(
                reference_id = %reference_id,
                dropped = items.len() - valid.len(),
                "Dropped invalid edit request items"
            );
        }
        if valid.is_empty() {
            return Err(GalleryError::EmptyRequest);
        }

        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO edit_requests (reference_id, items_json, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reference_id,
                serde_json::to_string(&valid)?,
                EditRequestStatus::New.as_str(),
                created_at,
            ],
        )?;
        let id = conn.last_insert_rowid();

        info!(reference_id = %reference_id, request_id = id, items = valid.len(), "Edit request submitted");

        Ok(EditRequest {
            id,
            reference_id,
            items: valid,
            status: EditRequestStatus::New,
            created_at,
        })
    }

    /// All edit requests for a project, newest first
    pub fn list_edit_requests(&self, reference_id: &str) -> Result<Vec<EditRequest>> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;

        let mut stmt = conn.prepare(
            "SELECT id, reference_id, items_json, status, created_at FROM edit_requests
             WHERE reference_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![reference_id], raw_from_row)?;

        let mut requests = Vec::new();
        for raw in rows {
            let (id, reference_id, items_json, status, created_at) = raw?;
            requests.push(edit_request_from_parts(id, reference_id, items_json, status, created_at)?);
        }
        Ok(requests)
    }

    /// Move an edit request through the studio's workflow
    pub fn set_edit_request_status(&self, request_id: i64, status: EditRequestStatus) -> Result<EditRequest> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE edit_requests SET status = ?1 WHERE id = ?2",
            params![status.as_str(), request_id],
        )?;
        if changed == 0 {
            return Err(GalleryError::EditRequestNotFound(request_id));
        }

        let (id, reference_id, items_json, status_text, created_at) = conn
            .query_row(
                "SELECT id, reference_id, items_json, status, created_at FROM edit_requests WHERE id = ?1",
                params![request_id],
                raw_from_row,
            )
            .optional()?
            .ok_or(GalleryError::EditRequestNotFound(request_id))?;

        info!(request_id, status = status.as_str(), "Edit request status changed");
        edit_request_from_parts(id, reference_id, items_json, status_text, created_at)
    }
}
