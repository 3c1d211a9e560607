/// Selection state machine
///
/// An asset is either selected for editing or not. Toggling is gated by the
/// project's selection lock; the lock check and the write are one conditional
/// UPDATE so a lock that lands first always wins.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::{debug, info};

use super::counts;
use super::data::{Asset, Project};
use super::library::{self, normalize_reference, Library, ASSET_COLUMNS};
use crate::error::{GalleryError, Result};

impl Library {
    /// Select or deselect one asset on behalf of `actor`.
    ///
    /// Fails with `SelectionLocked` while the photographer has closed the
    /// selection window; nothing is written in that case.
    pub fn set_selection(&self, reference_id: &str, asset_id: i64, is_selected: bool, actor: &str) -> Result<Asset> {
        let reference_id = normalize_reference(reference_id)?;
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(GalleryError::validation("actor", "must not be empty"));
        }

        let mut conn = self.conn()?;
        let now = Utc::now();
        let selected_at: Option<DateTime<Utc>> = if is_selected { Some(now) } else { None };

        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE assets
             SET is_selected = ?1, selected_at = ?2, selected_by = ?3, updated_at = ?4
             WHERE id = ?5 AND reference_id = ?6
               AND EXISTS (SELECT 1 FROM projects p
                           WHERE p.reference_id = assets.reference_id
                             AND p.selection_locked = 0)",
            params![is_selected, selected_at, actor, now, asset_id, reference_id],
        )?;

        if changed == 0 {
            // Work out which precondition failed
            let project = library::require_project(&tx, &reference_id)?;
            if project.selection_locked {
                debug!(reference_id = %reference_id, asset_id, "Selection rejected: window locked");
                return Err(GalleryError::SelectionLocked);
            }
            return Err(GalleryError::AssetNotFound(asset_id));
        }

        let asset = library::load_asset(&tx, &reference_id, asset_id)?.ok_or(GalleryError::AssetNotFound(asset_id))?;
        counts::recount_folder(&tx, &reference_id, &asset.folder_name)?;
        counts::recount_project(&tx, &reference_id)?;
        tx.commit()?;

        debug!(
            reference_id = %reference_id,
            asset_id,
            selected = is_selected,
            actor,
            "Selection changed"
        );
        Ok(asset)
    }

    /// Open or close the selection window
    pub fn set_lock(&self, reference_id: &str, locked: bool) -> Result<Project> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        let now = Utc::now();
        let locked_at: Option<DateTime<Utc>> = if locked { Some(now) } else { None };

        let changed = conn.execute(
            "UPDATE projects SET selection_locked = ?1, selection_locked_at = ?2, updated_at = ?3
             WHERE reference_id = ?4",
            params![locked, locked_at, now, reference_id],
        )?;
        if changed == 0 {
            return Err(GalleryError::ProjectNotFound(reference_id));
        }

        info!(reference_id = %reference_id, locked, "Selection window updated");
        library::require_project(&conn, &reference_id)
    }

    /// Everything currently selected, in selection order
    pub fn list_selected_assets(&self, reference_id: &str) -> Result<Vec<Asset>> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;
        selected_assets(&conn, &reference_id)
    }
}

pub(crate) fn selected_assets(conn: &rusqlite::Connection, reference_id: &str) -> Result<Vec<Asset>> {
    let sql = format!(
        "SELECT {} FROM assets WHERE reference_id = ?1 AND is_selected = 1 ORDER BY id",
        ASSET_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![reference_id], library::asset_from_row)?;
    let assets = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(assets)
}
