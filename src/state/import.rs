/// Asset catalog and import/dedup engine
///
/// An asset's identity is `(reference_id, folder_name, source_key)`, backed by a
/// UNIQUE index. Importing inserts new rows and, on a constraint hit, refreshes
/// metadata of the existing row without touching its selection state. The same
/// provider file may therefore live in several folders as independent copies.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use super::counts;
use super::data::{Asset, ImportFailure, ImportResult, SourceItem};
use super::library::{self, normalize_folder_name, normalize_reference, Library, ASSET_COLUMNS};
use crate::error::{is_constraint_violation, GalleryError, Result};
use crate::provider::{Listing, MediaProvider};

/// What happened to one listing item
enum Upserted {
    Inserted,
    Refreshed,
}

fn upsert_asset(
    conn: &Connection,
    reference_id: &str,
    folder: &str,
    source_key: &str,
    item: &SourceItem,
) -> rusqlite::Result<Upserted> {
    let now = Utc::now();

    let inserted = conn.execute(
        "INSERT INTO assets (reference_id, folder_name, source_key, external_id, storage_path,
                             name, mime_type, size, preview_ref, imported_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            reference_id,
            folder,
            source_key,
            item.external_id,
            item.storage_path,
            item.name.trim(),
            item.mime_type.trim(),
            item.size,
            item.preview_ref,
            now,
        ],
    );

    match inserted {
        Ok(_) => Ok(Upserted::Inserted),
        // Already catalogued in this folder: refresh metadata only
        Err(e) if is_constraint_violation(&e) => {
            conn.execute(
                "UPDATE assets
                 SET name = ?1, mime_type = ?2, size = ?3,
                     preview_ref = COALESCE(?4, preview_ref), updated_at = ?5
                 WHERE reference_id = ?6 AND folder_name = ?7 AND source_key = ?8",
                params![
                    item.name.trim(),
                    item.mime_type.trim(),
                    item.size,
                    item.preview_ref,
                    now,
                    reference_id,
                    folder,
                    source_key,
                ],
            )?;
            Ok(Upserted::Refreshed)
        }
        Err(e) => Err(e),
    }
}

impl Library {
    /// Import a provider listing into a registered folder.
    ///
    /// Items are processed one by one; a bad item is recorded in
    /// `failures` and never aborts the rest of the batch. Non-media items
    /// are skipped silently and counted nowhere.
    pub fn import_assets(
        &self,
        reference_id: &str,
        folder_name: &str,
        items: Vec<SourceItem>,
    ) -> Result<ImportResult> {
        let reference_id = normalize_reference(reference_id)?;
        let folder = normalize_folder_name(folder_name)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;
        library::ensure_folder_exists(&conn, &reference_id, &folder)?;

        debug!(reference_id = %reference_id, folder = %folder, items = items.len(), "Importing listing");

        let mut result = ImportResult::default();

        for item in items.iter().filter(|item| item.is_media()) {
            let Some(source_key) = item.source_key() else {
                result.failures.push(ImportFailure {
                    item: item.label(),
                    reason: "missing external id and storage path".to_string(),
                });
                continue;
            };
            if item.name.trim().is_empty() {
                result.failures.push(ImportFailure {
                    item: item.label(),
                    reason: "missing file name".to_string(),
                });
                continue;
            }

            match upsert_asset(&conn, &reference_id, &folder, &source_key, item) {
                Ok(Upserted::Inserted) => {
                    result.imported_count += 1;
                    if result.imported_count % 100 == 0 {
                        debug!(imported = result.imported_count, "Import progress");
                    }
                }
                Ok(Upserted::Refreshed) => result.skipped_count += 1,
                Err(e) => {
                    warn!(item = %item.label(), error = %e, "Import item failed");
                    result.failures.push(ImportFailure {
                        item: item.label(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        counts::recount_folder(&conn, &reference_id, &folder)?;
        counts::recount_project(&conn, &reference_id)?;

        info!(
            reference_id = %reference_id,
            folder = %folder,
            imported = result.imported_count,
            skipped = result.skipped_count,
            failed = result.failures.len(),
            "Import complete"
        );

        Ok(result)
    }

    /// List a provider folder and import what it returns.
    ///
    /// Items the provider could not describe are merged into the result's
    /// failures. A listing that fails outright is an `Upstream` error.
    pub fn import_from_provider(
        &self,
        provider: &dyn MediaProvider,
        reference_id: &str,
        folder_name: &str,
        external_folder_ref: &str,
        recursive: bool,
    ) -> Result<ImportResult> {
        self.ensure_import_target(reference_id, folder_name)?;

        let listing = if recursive {
            provider.list_folder_contents_recursive(external_folder_ref)?
        } else {
            provider.list_folder_contents(external_folder_ref)?
        };
        self.import_listing(reference_id, folder_name, listing)
    }

    /// Fail fast before listing a provider folder for an unknown target
    pub fn ensure_import_target(&self, reference_id: &str, folder_name: &str) -> Result<()> {
        let reference_id = normalize_reference(reference_id)?;
        let folder = normalize_folder_name(folder_name)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;
        library::ensure_folder_exists(&conn, &reference_id, &folder)
    }

    /// Import a provider listing, reporting the items the provider could not
    /// list ahead of the ones rejected on import
    pub fn import_listing(&self, reference_id: &str, folder_name: &str, listing: Listing) -> Result<ImportResult> {
        for failure in &listing.failures {
            warn!(item = %failure.item, reason = %failure.reason, "Provider could not list item");
        }

        let mut result = self.import_assets(reference_id, folder_name, listing.items)?;
        let mut failures = listing.failures;
        failures.append(&mut result.failures);
        result.failures = failures;
        Ok(result)
    }

    /// Assets of the project ordered by folder then name,
    /// optionally restricted to one folder
    pub fn list_assets(&self, reference_id: &str, folder_name: Option<&str>) -> Result<Vec<Asset>> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;

        let order = "ORDER BY (SELECT f.id FROM raw_folders f
                               WHERE f.reference_id = assets.reference_id
                                 AND f.name = assets.folder_name), name, id";

        let assets = match folder_name {
            Some(folder_name) => {
                let folder = normalize_folder_name(folder_name)?;
                library::ensure_folder_exists(&conn, &reference_id, &folder)?;
                let sql = format!(
                    "SELECT {} FROM assets WHERE reference_id = ?1 AND folder_name = ?2 {}",
                    ASSET_COLUMNS, order
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![reference_id, folder], library::asset_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!("SELECT {} FROM assets WHERE reference_id = ?1 {}", ASSET_COLUMNS, order);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![reference_id], library::asset_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(assets)
    }

    pub fn get_asset(&self, reference_id: &str, asset_id: i64) -> Result<Asset> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        library::load_asset(&conn, &reference_id, asset_id)?.ok_or(GalleryError::AssetNotFound(asset_id))
    }

    /// Admin removal of a single asset
    pub fn remove_asset(&self, reference_id: &str, asset_id: i64) -> Result<Asset> {
        let reference_id = normalize_reference(reference_id)?;
        let mut conn = self.conn()?;
        let asset =
            library::load_asset(&conn, &reference_id, asset_id)?.ok_or(GalleryError::AssetNotFound(asset_id))?;

        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM assets WHERE id = ?1 AND reference_id = ?2",
            params![asset_id, reference_id],
        )?;
        counts::recount_folder(&tx, &reference_id, &asset.folder_name)?;
        counts::recount_project(&tx, &reference_id)?;
        tx.commit()?;

        info!(reference_id = %reference_id, asset_id, folder = %asset.folder_name, "Asset removed");
        Ok(asset)
    }
}
