/// Count aggregation
///
/// Folder and project totals are a cache over the `assets` table. Every
/// mutating operation calls these recounts instead of adjusting the numbers
/// by hand, and `reconcile` rebuilds the whole project on demand.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::data::{FolderCounts, ProjectCounts, RawFolder};
use super::library::{self, normalize_folder_name, normalize_reference, Library};
use crate::error::{GalleryError, Result};

/// Count a folder's assets and persist the totals into its folder entry
pub(crate) fn recount_folder(conn: &Connection, reference_id: &str, folder: &str) -> Result<FolderCounts> {
    let counts = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_selected), 0) FROM assets
         WHERE reference_id = ?1 AND folder_name = ?2",
        params![reference_id, folder],
        |row| {
            Ok(FolderCounts {
                raw: row.get(0)?,
                selected: row.get(1)?,
            })
        },
    )?;

    let updated = conn.execute(
        "UPDATE raw_folders SET raw_count = ?1, selected_count = ?2
         WHERE reference_id = ?3 AND name = ?4",
        params![counts.raw, counts.selected, reference_id, folder],
    )?;
    if updated == 0 {
        return Err(GalleryError::UnknownFolder {
            reference_id: reference_id.to_string(),
            folder: folder.to_string(),
        });
    }

    debug!(reference_id, folder, raw = counts.raw, selected = counts.selected, "Folder recounted");
    Ok(counts)
}

/// Count every asset of the project and persist into `projects`
pub(crate) fn recount_project(conn: &Connection, reference_id: &str) -> Result<ProjectCounts> {
    let counts = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_selected), 0) FROM assets WHERE reference_id = ?1",
        params![reference_id],
        |row| {
            Ok(ProjectCounts {
                raw_total: row.get(0)?,
                selected: row.get(1)?,
            })
        },
    )?;

    let updated = conn.execute(
        "UPDATE projects SET raw_total = ?1, selected_count = ?2, updated_at = ?3
         WHERE reference_id = ?4",
        params![counts.raw_total, counts.selected, Utc::now(), reference_id],
    )?;
    if updated == 0 {
        return Err(GalleryError::ProjectNotFound(reference_id.to_string()));
    }

    debug!(reference_id, raw_total = counts.raw_total, selected = counts.selected, "Project recounted");
    Ok(counts)
}

/// Recount every folder (in order) and then the project totals
pub(crate) fn recount_all(conn: &Connection, reference_id: &str) -> Result<(Vec<RawFolder>, ProjectCounts)> {
    let mut folders = library::load_folders(conn, reference_id)?;
    for folder in folders.iter_mut() {
        folder.counts = recount_folder(conn, reference_id, &folder.name)?;
    }
    let totals = recount_project(conn, reference_id)?;
    Ok((folders, totals))
}

impl Library {
    /// Rebuild one folder's `{raw, selected}` from the asset rows
    pub fn recount(&self, reference_id: &str, folder_name: &str) -> Result<FolderCounts> {
        let reference_id = normalize_reference(reference_id)?;
        let folder = normalize_folder_name(folder_name)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;
        recount_folder(&conn, &reference_id, &folder)
    }

    /// Rebuild the project-wide `{rawTotal, selected}` from the asset rows
    pub fn recount_project(&self, reference_id: &str) -> Result<ProjectCounts> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        recount_project(&conn, &reference_id)
    }

    /// Heal any drift between the cached counters and the asset rows
    pub fn reconcile(&self, reference_id: &str) -> Result<(Vec<RawFolder>, ProjectCounts)> {
        let reference_id = normalize_reference(reference_id)?;
        let mut conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;

        let tx = conn.transaction()?;
        let result = recount_all(&tx, &reference_id)?;
        tx.commit()?;

        info!(
            reference_id = %reference_id,
            raw_total = result.1.raw_total,
            selected = result.1.selected,
            "Counts reconciled"
        );
        Ok(result)
    }
}
