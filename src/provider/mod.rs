/// External media collaborators
///
/// This module handles:
/// - Listing media from a provider folder (cloud drive, local disk)
/// - Resolving an asset's stored reference into something a browser can show
///
/// The catalog only ever sees flat `SourceItem` listings; how the bytes are
/// stored is the provider's business.

pub mod local;
pub mod preview;

use std::collections::HashMap;

use crate::error::{GalleryError, Result};
use crate::state::data::{ImportFailure, SourceItem};

pub use local::LocalFolderProvider;
pub use preview::{LocalPreviewResolver, PreviewResolver, RemotePreviewResolver};

/// A provider listing: the items it could describe and the ones it could not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub items: Vec<SourceItem>,
    pub failures: Vec<ImportFailure>,
}

/// Source of media listings for import
pub trait MediaProvider {
    /// Items directly inside the folder
    fn list_folder_contents(&self, folder_ref: &str) -> Result<Listing>;

    /// Items in the folder and all of its sub-folders
    fn list_folder_contents_recursive(&self, folder_ref: &str) -> Result<Listing>;
}

/// Fixed listings keyed by folder reference.
/// Used for JSON-fed imports and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    folders: HashMap<String, Listing>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, folder_ref: &str, listing: Listing) -> Self {
        self.folders.insert(folder_ref.to_string(), listing);
        self
    }
}

impl MediaProvider for StaticProvider {
    fn list_folder_contents(&self, folder_ref: &str) -> Result<Listing> {
        self.folders
            .get(folder_ref)
            .cloned()
            .ok_or_else(|| GalleryError::Upstream(format!("unknown folder reference: {}", folder_ref)))
    }

    // Static listings are already flat
    fn list_folder_contents_recursive(&self, folder_ref: &str) -> Result<Listing> {
        self.list_folder_contents(folder_ref)
    }
}
