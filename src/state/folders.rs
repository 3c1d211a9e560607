/// Folder registry: the named raw partitions of a project

use chrono::Utc;
use rusqlite::params;
use tracing::info;

use super::counts;
use super::data::{FolderCounts, RawFolder};
use super::library::{self, normalize_folder_name, normalize_reference, Library};
use crate::error::{is_constraint_violation, GalleryError, Result};

impl Library {
    /// Append an empty folder to the project.
    /// Names are unique per project and compared case-sensitively.
    pub fn create_folder(&self, reference_id: &str, name: &str) -> Result<RawFolder> {
        let reference_id = normalize_reference(reference_id)?;
        let name = normalize_folder_name(name)?;
        let conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;

        let inserted = conn.execute(
            "INSERT INTO raw_folders (reference_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![reference_id, name, Utc::now()],
        );

        match inserted {
            Ok(_) => {
                info!(reference_id = %reference_id, folder = %name, "Folder created");
                Ok(RawFolder {
                    name,
                    counts: FolderCounts::default(),
                })
            }
            Err(e) if is_constraint_violation(&e) => Err(GalleryError::DuplicateFolder {
                reference_id,
                folder: name,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a folder together with every asset scoped to it.
    ///
    /// Selection versions keep their snapshots; only the live counts change.
    /// Returns the number of assets removed.
    pub fn delete_folder(&self, reference_id: &str, name: &str) -> Result<usize> {
        let reference_id = normalize_reference(reference_id)?;
        let name = normalize_folder_name(name)?;
        let mut conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;
        library::ensure_folder_exists(&conn, &reference_id, &name)?;

        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM assets WHERE reference_id = ?1 AND folder_name = ?2",
            params![reference_id, name],
        )?;
        tx.execute(
            "DELETE FROM raw_folders WHERE reference_id = ?1 AND name = ?2",
            params![reference_id, name],
        )?;
        counts::recount_project(&tx, &reference_id)?;
        tx.commit()?;

        info!(reference_id = %reference_id, folder = %name, removed, "Folder deleted");
        Ok(removed)
    }

    /// Current folders in creation order.
    /// With `recount`, each folder's totals are rebuilt and persisted first.
    pub fn list_folders(&self, reference_id: &str, recount: bool) -> Result<Vec<RawFolder>> {
        let reference_id = normalize_reference(reference_id)?;
        let mut conn = self.conn()?;
        library::ensure_project_exists(&conn, &reference_id)?;

        if !recount {
            return library::load_folders(&conn, &reference_id);
        }

        let tx = conn.transaction()?;
        let mut folders = library::load_folders(&tx, &reference_id)?;
        for folder in folders.iter_mut() {
            folder.counts = counts::recount_folder(&tx, &reference_id, &folder.name)?;
        }
        tx.commit()?;

        Ok(folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::data::SourceItem;

    fn setup() -> Library {
        let library = Library::open_in_memory().unwrap();
        library.create_project("LCA-TEST", "wedding").unwrap();
        library
    }

    fn item(id: &str) -> SourceItem {
        SourceItem {
            external_id: Some(id.to_string()),
            storage_path: None,
            name: format!("{}.NEF", id),
            mime_type: "image/x-nikon-nef".to_string(),
            size: 25_000_000,
            preview_ref: None,
        }
    }

    #[test]
    fn test_create_folder_duplicate_is_case_sensitive() {
        let library = setup();
        library.create_folder("LCA-TEST", "Raw 1").unwrap();

        let err = library.create_folder("lca-test", " Raw 1 ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Different case is a different folder
        library.create_folder("LCA-TEST", "raw 1").unwrap();
        let names: Vec<_> = library
            .list_folders("LCA-TEST", false)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Raw 1", "raw 1"]);
    }

    #[test]
    fn test_create_folder_validation() {
        let library = setup();
        let err = library.create_folder("LCA-TEST", "   ").unwrap_err();
        assert!(matches!(err, GalleryError::Validation { field: "folder_name", .. }));

        let err = library.create_folder("LCA-404", "Raw 1").unwrap_err();
        assert!(matches!(err, GalleryError::ProjectNotFound(_)));
    }

    #[test]
    fn test_delete_folder_removes_assets_and_recounts() {
        let library = setup();
        library.create_folder("LCA-TEST", "Raw 1").unwrap();
        library.create_folder("LCA-TEST", "Raw 2").unwrap();
        library.import_assets("LCA-TEST", "Raw 1", vec![item("a"), item("b")]).unwrap();
        library.import_assets("LCA-TEST", "Raw 2", vec![item("c")]).unwrap();

        let removed = library.delete_folder("LCA-TEST", "Raw 1").unwrap();
        assert_eq!(removed, 2);

        let project = library.get_project("LCA-TEST").unwrap();
        assert_eq!(project.raw_folders.len(), 1);
        assert_eq!(project.raw_folders[0].name, "Raw 2");
        assert_eq!(project.counts.raw_total, 1);
        assert!(library.list_assets("LCA-TEST", Some("Raw 1")).is_err());
    }

    #[test]
    fn test_delete_unknown_folder() {
        let library = setup();
        let err = library.delete_folder("LCA-TEST", "Raw 9").unwrap_err();
        assert!(matches!(err, GalleryError::UnknownFolder { .. }));
    }

    #[test]
    fn test_list_folders_with_recount() {
        let library = setup();
        library.create_folder("LCA-TEST", "Raw 1").unwrap();
        library.import_assets("LCA-TEST", "Raw 1", vec![item("a"), item("b")]).unwrap();
        {
            let conn = library.conn().unwrap();
            conn.execute("UPDATE raw_folders SET raw_count = 0, selected_count = 5", [])
                .unwrap();
        }

        let stale = library.list_folders("LCA-TEST", false).unwrap();
        assert_eq!(stale[0].counts, FolderCounts { raw: 0, selected: 5 });

        let fresh = library.list_folders("LCA-TEST", true).unwrap();
        assert_eq!(fresh[0].counts, FolderCounts { raw: 2, selected: 0 });

        // The refreshed numbers were persisted
        let again = library.list_folders("LCA-TEST", false).unwrap();
        assert_eq!(again[0].counts, FolderCounts { raw: 2, selected: 0 });
    }
}
