/// Preview resolution
///
/// The catalog stores only a reference for each asset (a provider id or a
/// storage path). A resolver turns that into something the portal can put in
/// an `<img>` or `<video>` tag.

use std::path::{Component, Path, PathBuf};

use crate::error::{GalleryError, Result};
use crate::state::data::Asset;

pub trait PreviewResolver {
    fn resolve(&self, asset: &Asset) -> Result<String>;
}

/// Builds provider thumbnail URLs from the asset's external id
#[derive(Debug, Clone)]
pub struct RemotePreviewResolver {
    base_url: String,
}

impl RemotePreviewResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl PreviewResolver for RemotePreviewResolver {
    fn resolve(&self, asset: &Asset) -> Result<String> {
        if let Some(id) = asset.external_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(format!("{}{}", self.base_url, id));
        }
        // Direct uploads carry their own preview URL
        asset
            .preview_ref
            .clone()
            .ok_or_else(|| GalleryError::validation("preview_ref", format!("asset {} has no preview", asset.id)))
    }
}

/// Resolves stored paths against a media root on disk
#[derive(Debug, Clone)]
pub struct LocalPreviewResolver {
    root: PathBuf,
}

impl LocalPreviewResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Join a stored path onto the root, refusing anything that climbs out of it
    pub fn resolve_path(&self, stored: &str) -> Result<PathBuf> {
        let stored_path = Path::new(stored);
        let relative = if stored_path.is_absolute() {
            stored_path
                .strip_prefix(&self.root)
                .map_err(|_| GalleryError::validation("storage_path", "outside the media root"))?
        } else {
            stored_path
        };

        if relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir)
        }) {
            return Err(GalleryError::validation("storage_path", "outside the media root"));
        }

        Ok(self.root.join(relative))
    }
}

impl PreviewResolver for LocalPreviewResolver {
    fn resolve(&self, asset: &Asset) -> Result<String> {
        let stored = asset
            .preview_ref
            .as_deref()
            .or(asset.storage_path.as_deref())
            .ok_or_else(|| GalleryError::validation("storage_path", format!("asset {} has no stored path", asset.id)))?;

        Ok(self.resolve_path(stored)?.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn asset(external_id: Option<&str>, storage_path: Option<&str>) -> Asset {
        Asset {
            id: 7,
            reference_id: "LCA-TEST".to_string(),
            folder_name: "Raw 1".to_string(),
            external_id: external_id.map(str::to_string),
            storage_path: storage_path.map(str::to_string),
            name: "IMG_7.JPG".to_string(),
            mime_type: "image/jpeg".to_string(),
            size: 1,
            preview_ref: None,
            is_selected: false,
            selected_at: None,
            selected_by: None,
            imported_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_remote_uses_external_id() {
        let resolver = RemotePreviewResolver::new("https://drive.example/thumb?id=");
        assert_eq!(
            resolver.resolve(&asset(Some("1xYz"), None)).unwrap(),
            "https://drive.example/thumb?id=1xYz"
        );

        let mut upload = asset(None, Some("uploads/a.jpg"));
        upload.preview_ref = Some("/media/uploads/a.jpg".to_string());
        assert_eq!(resolver.resolve(&upload).unwrap(), "/media/uploads/a.jpg");
        assert!(resolver.resolve(&asset(None, None)).is_err());
    }

    #[test]
    fn test_local_stays_inside_root() {
        let resolver = LocalPreviewResolver::new("/srv/media");
        assert_eq!(
            resolver.resolve(&asset(None, Some("LCA-TEST/IMG_7.JPG"))).unwrap(),
            "/srv/media/LCA-TEST/IMG_7.JPG"
        );
        assert!(resolver.resolve_path("../etc/passwd").is_err());
        assert!(resolver.resolve_path("/etc/passwd").is_err());
        assert!(resolver.resolve_path("/srv/media/../../etc/passwd").is_err());
        assert!(resolver.resolve_path("/srv/media/LCA-TEST/../../secrets").is_err());
        assert!(resolver.resolve_path("LCA-TEST/../../etc/passwd").is_err());
        assert_eq!(
            resolver.resolve_path("/srv/media/a.jpg").unwrap(),
            PathBuf::from("/srv/media/a.jpg")
        );
    }
}
