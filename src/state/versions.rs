/// Selection version ledger
///
/// Each customer submission appends an immutable snapshot of the selected set
/// with a diff against the previous one. The next number comes from the
/// project's `last_selection_version` cursor inside an IMMEDIATE transaction,
/// backed by a UNIQUE(reference_id, version) index. A collision (the cursor
/// lagging the ledger) resyncs the cursor and is retried once before
/// surfacing as a conflict.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::data::{SelectionDiff, SelectionItem, SelectionVersion};
use super::library::{self, normalize_reference, Library};
use super::selection::selected_assets;
use crate::error::{is_constraint_violation, GalleryError, Result};

/// Diff between the previous snapshot's asset ids and the current ones
pub fn diff_selection(previous: &[SelectionItem], current: &[SelectionItem]) -> SelectionDiff {
    let before: BTreeSet<i64> = previous.iter().map(|i| i.asset_id).collect();
    let now: BTreeSet<i64> = current.iter().map(|i| i.asset_id).collect();

    SelectionDiff {
        added: now.difference(&before).copied().collect(),
        removed: before.difference(&now).copied().collect(),
    }
}

fn version_from_row(row: &Row) -> rusqlite::Result<(SelectionVersion, String, String)> {
    Ok((
        SelectionVersion {
            reference_id: row.get(0)?,
            version: row.get(1)?,
            created_at: row.get(2)?,
            items: Vec::new(),
            diff: SelectionDiff::default(),
        },
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode(raw: (SelectionVersion, String, String)) -> Result<SelectionVersion> {
    let (mut version, items_json, diff_json) = raw;
    version.items = serde_json::from_str(&items_json)?;
    version.diff = serde_json::from_str(&diff_json)?;
    Ok(version)
}

const VERSION_COLUMNS: &str = "reference_id, version, created_at, items_json, diff_json";

fn latest_version(conn: &Connection, reference_id: &str) -> Result<Option<SelectionVersion>> {
    let sql = format!(
        "SELECT {} FROM selection_versions WHERE reference_id = ?1 ORDER BY version DESC LIMIT 1",
        VERSION_COLUMNS
    );
    let raw = conn
        .query_row(&sql, params![reference_id], version_from_row)
        .optional()?;
    raw.map(decode).transpose()
}

/// One attempt at assigning the next version and appending it
fn append_version(conn: &mut Connection, reference_id: &str) -> Result<SelectionVersion> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let cursor: i64 = tx
        .query_row(
            "SELECT last_selection_version FROM projects WHERE reference_id = ?1",
            params![reference_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| GalleryError::ProjectNotFound(reference_id.to_string()))?;

    let items: Vec<SelectionItem> = selected_assets(&tx, reference_id)?
        .into_iter()
        .map(|asset| SelectionItem {
            asset_id: asset.id,
            name: asset.name,
            mime_type: asset.mime_type,
            selected_at: asset.selected_at,
        })
        .collect();

    let version = cursor + 1;
    let diff = match latest_version(&tx, reference_id)? {
        Some(prev) => diff_selection(&prev.items, &items),
        None => diff_selection(&[], &items),
    };

    let created_at = Utc::now();
    let inserted = tx.execute(
        "INSERT INTO selection_versions (reference_id, version, created_at, items_json, diff_json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            reference_id,
            version,
            created_at,
            serde_json::to_string(&items)?,
            serde_json::to_string(&diff)?,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(GalleryError::VersionConflict {
                reference_id: reference_id.to_string(),
                version,
            });
        }
        Err(e) => return Err(e.into()),
    }

    tx.execute(
        "UPDATE projects
         SET last_selection_version = ?1, last_selection_submitted_at = ?2, updated_at = ?2
         WHERE reference_id = ?3",
        params![version, created_at, reference_id],
    )?;
    tx.commit()?;

    Ok(SelectionVersion {
        reference_id: reference_id.to_string(),
        version,
        created_at,
        items,
        diff,
    })
}

/// Move the project cursor up to the newest ledger row
fn resync_version_cursor(conn: &Connection, reference_id: &str) -> Result<i64> {
    conn.execute(
        "UPDATE projects
         SET last_selection_version = MAX(
             last_selection_version,
             COALESCE((SELECT MAX(version) FROM selection_versions WHERE reference_id = ?1), 0)
         )
         WHERE reference_id = ?1",
        params![reference_id],
    )?;
    let cursor = conn.query_row(
        "SELECT last_selection_version FROM projects WHERE reference_id = ?1",
        params![reference_id],
        |row| row.get(0),
    )?;
    Ok(cursor)
}

impl Library {
    /// Record the customer's current selection as the next version.
    ///
    /// Allowed whether or not the selection window is locked.
    pub fn submit_selection(&self, reference_id: &str) -> Result<SelectionVersion> {
        let reference_id = normalize_reference(reference_id)?;
        let mut conn = self.conn()?;

        let submitted = match append_version(&mut conn, &reference_id) {
            Err(GalleryError::VersionConflict { version, .. }) => {
                let cursor = resync_version_cursor(&conn, &reference_id)?;
                warn!(reference_id = %reference_id, version, cursor, "Version collision, retrying submission");
                append_version(&mut conn, &reference_id)?
            }
            other => other?,
        };

        info!(
            reference_id = %reference_id,
            version = submitted.version,
            selected = submitted.items.len(),
            added = submitted.diff.added.len(),
            removed = submitted.diff.removed.len(),
            "Selection submitted"
        );
        Ok(submitted)
    }

    /// All submissions for the project, newest first
    pub fn list_selection_versions(&self, reference_id: &str) -> Result<Vec<SelectionVersion>> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;

        let sql = format!(
            "SELECT {} FROM selection_versions WHERE reference_id = ?1 ORDER BY version DESC",
            VERSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![reference_id], version_from_row)?;

        let mut versions = Vec::new();
        for raw in rows {
            versions.push(decode(raw?)?);
        }
        Ok(versions)
    }

    pub fn get_selection_version(&self, reference_id: &str, version: i64) -> Result<SelectionVersion> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;

        let sql = format!(
            "SELECT {} FROM selection_versions WHERE reference_id = ?1 AND version = ?2",
            VERSION_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![reference_id, version], version_from_row)
            .optional()?
            .ok_or_else(|| GalleryError::VersionNotFound {
                reference_id: reference_id.clone(),
                version,
            })?;
        decode(raw)
    }
}
