//! Infrastructure adapters for Weft.
//!
//! This crate implements the ports defined in `weft_core::application::ports`
//! and the structured hookups. It contains all external dependencies and I/O
//! operations.

pub mod filesystem;
pub mod hookups;
pub mod manifest_loader;
pub mod manifest_store;
pub mod renderer;

// Re-export commonly used adapters
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use hookups::{CargoDependency, DependencySource, JsonDependency};
pub use manifest_loader::{MANIFEST_FILE, ManifestLoader, WeaveManifest, parse_manifest};
pub use manifest_store::{JsonManifestStore, MemoryManifestStore};
pub use renderer::{FnRenderer, HandlebarsRenderer, TEMPLATE_EXTENSION};
