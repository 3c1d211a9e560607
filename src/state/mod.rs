/// State management module
///
/// This module handles the catalog and everything stored in it:
/// - Database connection, schema and projects (library.rs)
/// - Shared data structures (data.rs)
/// - Raw folders (folders.rs)
/// - Asset import and dedup (import.rs)
/// - Cached folder/project counts (counts.rs)
/// - Selection toggles and the selection lock (selection.rs)
/// - Submitted selection versions (versions.rs)
/// - Customer edit requests (edit.rs)

pub mod library;
pub mod data;
pub mod edit;
pub mod folders;
pub mod import;
pub mod counts;
pub mod selection;
pub mod versions;
