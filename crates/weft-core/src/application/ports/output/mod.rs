//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the weave needs from external systems.
//! The `weft-adapters` crate provides implementations.

use std::path::Path;

use crate::application::manifest::MarkerManifest;
use crate::domain::RenderContext;
use crate::error::WeftResult;

/// Port for filesystem operations.
///
/// Implemented by:
/// - `weft_adapters::filesystem::LocalFilesystem` (production)
/// - `weft_adapters::filesystem::MemoryFilesystem` (testing)
///
/// Paths handed to the port are already resolved against the workspace root.
#[cfg_attr(test, mockall::automock)]
pub trait Filesystem: Send + Sync {
    /// Read a whole file as UTF-8.
    fn read_file(&self, path: &Path) -> WeftResult<String>;

    /// Write content to a file, replacing it. Parent directories must exist.
    fn write_file(&self, path: &Path, content: &str) -> WeftResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> WeftResult<()>;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> WeftResult<()>;
}

/// Port for template rendering.
///
/// Templates are referenced by a language-neutral id (`jni/bridge.rs`,
/// `plugin/commands.ts`). What an id resolves to is the adapter's business.
///
/// Implemented by:
/// - `weft_adapters::renderer::HandlebarsRenderer`
/// - `weft_adapters::renderer::FnRenderer` (closures, for tests and code-defined templates)
#[cfg_attr(test, mockall::automock)]
pub trait TemplateRenderer: Send + Sync {
    /// Render template `id` with the data bag and transformed methods.
    fn render(&self, id: &str, context: &RenderContext) -> WeftResult<String>;

    /// Whether `id` is known to this renderer.
    fn has_template(&self, id: &str) -> bool;
}

/// Port for the persisted record of which files carry which blocks.
///
/// Implemented by:
/// - `weft_adapters::manifest_store::JsonManifestStore` (`.weft/markers.json`)
/// - `weft_adapters::manifest_store::MemoryManifestStore` (testing)
#[cfg_attr(test, mockall::automock)]
pub trait ManifestStore: Send + Sync {
    /// Load the manifest. A store that has never been saved yields an empty one.
    fn load(&self) -> WeftResult<MarkerManifest>;

    fn save(&self, manifest: &MarkerManifest) -> WeftResult<()>;
}
