/// Customer gallery catalog for a photography studio.
///
/// Imports raw media into per-project folders, tracks which files the customer
/// picked for editing while the selection window is open, keeps an append-only
/// history of submitted selections, and logs post-delivery edit requests.
///
/// Everything goes through [`Library`], backed by a SQLite catalog.

pub mod config;
pub mod error;
pub mod provider;
pub mod state;

pub use config::Config;
pub use error::{ErrorKind, GalleryError, Result};
pub use provider::{Listing, MediaProvider, PreviewResolver, StaticProvider};
pub use state::data::{
    Asset, EditRequest, EditRequestItem, EditRequestStatus, FolderCounts, ImportFailure,
    ImportResult, Project, ProjectCounts, RawFolder, SelectionDiff, SelectionItem,
    SelectionVersion, SourceItem,
};
pub use state::edit::EditRequestLimits;
pub use state::library::Library;
