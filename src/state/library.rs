use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use super::data::{Asset, FolderCounts, Project, ProjectCounts, RawFolder};
use super::edit::EditRequestLimits;
use crate::error::{GalleryError, Result};

/// How long a handle waits on another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns selected whenever a full asset row is read
pub(crate) const ASSET_COLUMNS: &str = "id, reference_id, folder_name, external_id, storage_path, \
     name, mime_type, size, preview_ref, is_selected, selected_at, selected_by, \
     imported_at, updated_at";

/// The Library manages the SQLite catalog database.
/// It stores projects, their raw folders, imported assets, the
/// selection ledger and the edit request log.
///
/// Operations are split across the sibling modules (`folders`, `import`,
/// `counts`, `selection`, `versions`, `edit`); each one is an `impl Library`
/// block over the helpers defined here.
pub struct Library {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    pub(crate) edit_limits: EditRequestLimits,
}

impl Library {
    /// Open (or create) the catalog at `db_path` and initialize the schema.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        info!(path = %db_path.display(), "Catalog opened");

        Self::from_connection(conn, db_path)
    }

    /// Open a private in-memory catalog (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory catalog");
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;

        Ok(Library {
            conn: Mutex::new(conn),
            db_path,
            edit_limits: EditRequestLimits::default(),
        })
    }

    /// Replace the edit request length caps
    pub fn with_edit_limits(mut self, limits: EditRequestLimits) -> Self {
        self.edit_limits = limits;
        self
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| GalleryError::Poisoned)
    }

    /// Register a new engagement. Fails if the reference is already taken.
    pub fn create_project(&self, reference_id: &str, category: &str) -> Result<Project> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        let now = Utc::now();

        let inserted = conn.execute(
            "INSERT INTO projects (reference_id, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![reference_id, category.trim(), now],
        );

        match inserted {
            Ok(_) => {
                info!(reference_id = %reference_id, "Project created");
                require_project(&conn, &reference_id)
            }
            Err(e) if crate::error::is_constraint_violation(&e) => {
                Err(GalleryError::ProjectExists(reference_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create the project on first intake, or return the existing one untouched
    pub fn ensure_project(&self, reference_id: &str, category: &str) -> Result<Project> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        let now = Utc::now();

        let created = conn.execute(
            "INSERT OR IGNORE INTO projects (reference_id, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![reference_id, category.trim(), now],
        )?;
        if created > 0 {
            info!(reference_id = %reference_id, "Project created on intake");
        }

        require_project(&conn, &reference_id)
    }

    pub fn get_project(&self, reference_id: &str) -> Result<Project> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;
        require_project(&conn, &reference_id)
    }

    /// Store delivery notes / links for the customer
    pub fn set_edited_text(&self, reference_id: &str, text: &str) -> Result<Project> {
        let reference_id = normalize_reference(reference_id)?;
        let conn = self.conn()?;

        let changed = conn.execute(
            "UPDATE projects SET edited_text = ?1, updated_at = ?2 WHERE reference_id = ?3",
            params![text, Utc::now(), reference_id],
        )?;
        if changed == 0 {
            return Err(GalleryError::ProjectNotFound(reference_id));
        }

        require_project(&conn, &reference_id)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// Initialize the database schema.
/// Creates all necessary tables and indexes if they don't exist.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS projects (
            reference_id                 TEXT PRIMARY KEY,
            category                     TEXT NOT NULL DEFAULT '',
            selection_locked             INTEGER NOT NULL DEFAULT 0,
            selection_locked_at          TEXT,
            edited_text                  TEXT NOT NULL DEFAULT '',
            raw_total                    INTEGER NOT NULL DEFAULT 0,
            selected_count               INTEGER NOT NULL DEFAULT 0,
            last_selection_version       INTEGER NOT NULL DEFAULT 0,
            last_selection_submitted_at  TEXT,
            created_at                   TEXT NOT NULL,
            updated_at                   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_folders (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            reference_id    TEXT NOT NULL,
            name            TEXT NOT NULL,
            raw_count       INTEGER NOT NULL DEFAULT 0,
            selected_count  INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            FOREIGN KEY(reference_id) REFERENCES projects(reference_id),
            UNIQUE(reference_id, name)
        );

        CREATE TABLE IF NOT EXISTS assets (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            reference_id    TEXT NOT NULL,
            folder_name     TEXT NOT NULL,
            source_key      TEXT NOT NULL,
            external_id     TEXT,
            storage_path    TEXT,
            name            TEXT NOT NULL,
            mime_type       TEXT NOT NULL,
            size            INTEGER NOT NULL DEFAULT 0,
            preview_ref     TEXT,
            is_selected     INTEGER NOT NULL DEFAULT 0,
            selected_at     TEXT,
            selected_by     TEXT,
            imported_at     TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            UNIQUE(reference_id, folder_name, source_key)
        );

        CREATE TABLE IF NOT EXISTS selection_versions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            reference_id    TEXT NOT NULL,
            version         INTEGER NOT NULL,
            created_at      TEXT NOT NULL,
            items_json      TEXT NOT NULL,
            diff_json       TEXT NOT NULL,
            UNIQUE(reference_id, version)
        );

        CREATE TABLE IF NOT EXISTS edit_requests (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            reference_id    TEXT NOT NULL,
            items_json      TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'new',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_assets_selected
            ON assets(reference_id, is_selected);

        CREATE INDEX IF NOT EXISTS idx_edit_requests_reference
            ON edit_requests(reference_id, created_at DESC);",
    )?;

    debug!("Catalog schema initialized");
    Ok(())
}

/// Reference codes are compared upper-case with surrounding whitespace removed
pub fn normalize_reference(raw: &str) -> Result<String> {
    let reference_id = raw.trim().to_uppercase();
    if reference_id.is_empty() {
        return Err(GalleryError::validation("reference_id", "must not be empty"));
    }
    Ok(reference_id)
}

/// Folder names are case-sensitive; only surrounding whitespace is dropped
pub fn normalize_folder_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GalleryError::validation("folder_name", "must not be empty"));
    }
    Ok(name.to_string())
}

pub(crate) fn load_project(conn: &Connection, reference_id: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT reference_id, category, selection_locked, selection_locked_at, edited_text,
                    raw_total, selected_count, last_selection_version,
                    last_selection_submitted_at, created_at, updated_at
             FROM projects WHERE reference_id = ?1",
            params![reference_id],
            |row| {
                Ok(Project {
                    reference_id: row.get(0)?,
                    category: row.get(1)?,
                    raw_folders: Vec::new(),
                    selection_locked: row.get(2)?,
                    selection_locked_at: row.get(3)?,
                    edited_text: row.get(4)?,
                    counts: ProjectCounts {
                        raw_total: row.get(5)?,
                        selected: row.get(6)?,
                    },
                    last_selection_version: row.get(7)?,
                    last_selection_submitted_at: row.get(8)?,
                    created_at: row.get(9)?,
                    updated_at: row.get(10)?,
                })
            },
        )
        .optional()?;

    match project {
        Some(mut project) => {
            project.raw_folders = load_folders(conn, reference_id)?;
            Ok(Some(project))
        }
        None => Ok(None),
    }
}

pub(crate) fn require_project(conn: &Connection, reference_id: &str) -> Result<Project> {
    load_project(conn, reference_id)?
        .ok_or_else(|| GalleryError::ProjectNotFound(reference_id.to_string()))
}

pub(crate) fn ensure_project_exists(conn: &Connection, reference_id: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE reference_id = ?1)",
        params![reference_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(GalleryError::ProjectNotFound(reference_id.to_string()));
    }
    Ok(())
}

/// Folders in creation order
pub(crate) fn load_folders(conn: &Connection, reference_id: &str) -> Result<Vec<RawFolder>> {
    let mut stmt = conn.prepare(
        "SELECT name, raw_count, selected_count FROM raw_folders
         WHERE reference_id = ?1 ORDER BY id",
    )?;

    let folders = stmt
        .query_map(params![reference_id], |row| {
            Ok(RawFolder {
                name: row.get(0)?,
                counts: FolderCounts {
                    raw: row.get(1)?,
                    selected: row.get(2)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(folders)
}

pub(crate) fn ensure_folder_exists(conn: &Connection, reference_id: &str, folder: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM raw_folders WHERE reference_id = ?1 AND name = ?2)",
        params![reference_id, folder],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(GalleryError::UnknownFolder {
            reference_id: reference_id.to_string(),
            folder: folder.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn asset_from_row(row: &Row) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        reference_id: row.get(1)?,
        folder_name: row.get(2)?,
        external_id: row.get(3)?,
        storage_path: row.get(4)?,
        name: row.get(5)?,
        mime_type: row.get(6)?,
        size: row.get(7)?,
        preview_ref: row.get(8)?,
        is_selected: row.get(9)?,
        selected_at: row.get(10)?,
        selected_by: row.get(11)?,
        imported_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) fn load_asset(conn: &Connection, reference_id: &str, asset_id: i64) -> Result<Option<Asset>> {
    let sql = format!(
        "SELECT {} FROM assets WHERE id = ?1 AND reference_id = ?2",
        ASSET_COLUMNS
    );
    let asset = conn
        .query_row(&sql, params![asset_id, reference_id], asset_from_row)
        .optional()?;
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_reference_is_normalized() {
        assert_eq!(normalize_reference("  lca-2041 ").unwrap(), "LCA-2041");
        assert_eq!(
            normalize_reference("   ").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_create_project_rejects_duplicate() {
        let library = Library::open_in_memory().unwrap();
        let project = library.create_project("lca-test", "wedding").unwrap();
        assert_eq!(project.reference_id, "LCA-TEST");
        assert!(!project.selection_locked);
        assert_eq!(project.last_selection_version, 0);

        let err = library.create_project("LCA-TEST", "wedding").unwrap_err();
        assert!(matches!(err, GalleryError::ProjectExists(_)));
    }

    #[test]
    fn test_ensure_project_is_idempotent() {
        let library = Library::open_in_memory().unwrap();
        library.ensure_project("lca-1", "portrait").unwrap();
        library.set_edited_text("lca-1", "Gallery link: https://example.com/g/1").unwrap();

        let again = library.ensure_project("LCA-1", "other").unwrap();
        assert_eq!(again.category, "portrait");
        assert_eq!(again.edited_text, "Gallery link: https://example.com/g/1");
    }

    #[test]
    fn test_missing_project() {
        let library = Library::open_in_memory().unwrap();
        let err = library.get_project("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(library.set_edited_text("nope", "x").is_err());
    }

    #[test]
    fn test_open_on_disk_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gallery.db");
        let library = Library::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(library.path(), &path);
    }
}
