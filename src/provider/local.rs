/// Local folder provider
///
/// Lists media files from a directory on disk. Files are identified by their
/// path (there is no provider id), and the mime type is derived from the
/// extension. Entries that cannot be read are reported, not skipped.

use std::path::{Path, PathBuf};
use tokio::task;
use tracing::debug;
use walkdir::WalkDir;

use super::{Listing, MediaProvider};
use crate::error::{GalleryError, Result};
use crate::state::data::{ImportFailure, SourceItem};

/// Supported RAW file extensions (common formats) and their mime types
const RAW_EXTENSIONS: &[(&str, &str)] = &[
    ("nef", "image/x-nikon-nef"),
    ("dng", "image/x-adobe-dng"),
    ("cr2", "image/x-canon-cr2"),
    ("cr3", "image/x-canon-cr3"),
    ("arw", "image/x-sony-arw"),
    ("raf", "image/x-fuji-raf"),
    ("orf", "image/x-olympus-orf"),
    ("rw2", "image/x-panasonic-rw2"),
    ("pef", "image/x-pentax-pef"),
    ("srw", "image/x-samsung-srw"),
    ("erf", "image/x-epson-erf"),
    ("kdc", "image/x-kodak-kdc"),
    ("dcr", "image/x-kodak-dcr"),
    ("mos", "image/x-leaf-mos"),
    ("raw", "image/x-panasonic-raw"),
    ("rwl", "image/x-leica-rwl"),
];

/// Mime type for a file name, by extension.
/// Unknown extensions map to `application/octet-stream` and are filtered on import.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => return "application/octet-stream",
    };

    if let Some((_, mime)) = RAW_EXTENSIONS.iter().find(|(e, _)| *e == ext) {
        return *mime;
    }

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Lists directories below a root
#[derive(Debug, Clone)]
pub struct LocalFolderProvider {
    root: PathBuf,
}

impl LocalFolderProvider {
    /// Folder references are resolved relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, folder_ref: &str) -> PathBuf {
        let folder_ref = folder_ref.trim();
        if folder_ref.is_empty() || folder_ref == "." {
            self.root.clone()
        } else {
            self.root.join(folder_ref)
        }
    }

    /// List a folder on the blocking pool
    pub async fn scan(&self, folder_ref: String, recursive: bool) -> Result<Listing> {
        let provider = self.clone();
        task::spawn_blocking(move || {
            if recursive {
                provider.list_folder_contents_recursive(&folder_ref)
            } else {
                provider.list_folder_contents(&folder_ref)
            }
        })
        .await
        .map_err(|e| GalleryError::Upstream(format!("Task join error: {}", e)))?
    }
}

impl MediaProvider for LocalFolderProvider {
    fn list_folder_contents(&self, folder_ref: &str) -> Result<Listing> {
        walk(&self.resolve(folder_ref), Some(1))
    }

    fn list_folder_contents_recursive(&self, folder_ref: &str) -> Result<Listing> {
        walk(&self.resolve(folder_ref), None)
    }
}

fn walk(folder: &Path, max_depth: Option<usize>) -> Result<Listing> {
    if !folder.is_dir() {
        return Err(GalleryError::Upstream(format!(
            "folder does not exist: {}",
            folder.display()
        )));
    }

    debug!(folder = %folder.display(), recursive = max_depth.is_none(), "Scanning folder");

    let mut walker = WalkDir::new(folder).follow_links(true).sort_by_file_name();
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut listing = Listing::default();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                listing.failures.push(ImportFailure {
                    item: e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| folder.display().to_string()),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        // Only process files (not directories)
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let size = match entry.metadata() {
            Ok(meta) => meta.len() as i64,
            Err(e) => {
                listing.failures.push(ImportFailure {
                    item: path.display().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let storage_path = path.to_string_lossy().to_string();
        listing.items.push(SourceItem {
            external_id: None,
            storage_path: Some(storage_path.clone()),
            name: entry.file_name().to_string_lossy().to_string(),
            mime_type: mime_for_path(path).to_string(),
            size,
            preview_ref: Some(storage_path),
        });
    }

    Ok(listing)
}
