//! Marker manifest stores.
//!
//! The JSON store keeps the manifest at `.weft/markers.json` under the
//! workspace root by default. A store that has never been saved loads as an
//! empty manifest; a file that exists but cannot be parsed is an error, and
//! the weave then leaves it alone.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, instrument};

use weft_core::application::ApplicationError;
use weft_core::application::manifest::{MANIFEST_VERSION, MarkerManifest};
use weft_core::application::ports::ManifestStore;
use weft_core::application::services::DEFAULT_MANIFEST_PATH;
use weft_core::error::WeftResult;

#[derive(Debug, Clone)]
pub struct JsonManifestStore {
    path: PathBuf,
}

impl JsonManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location under `root`.
    pub fn in_workspace(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(DEFAULT_MANIFEST_PATH))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl Into<String>) -> ApplicationError {
        ApplicationError::ManifestError {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl ManifestStore for JsonManifestStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> WeftResult<MarkerManifest> {
        if !self.path.exists() {
            debug!("no marker manifest yet");
            return Ok(MarkerManifest::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|e| self.error(e.to_string()))?;
        let manifest: MarkerManifest =
            serde_json::from_str(&raw).map_err(|e| self.error(format!("invalid JSON: {e}")))?;
        if manifest.version > MANIFEST_VERSION {
            return Err(self
                .error(format!(
                    "manifest version {} is newer than supported version {MANIFEST_VERSION}",
                    manifest.version
                ))
                .into());
        }
        debug!(files = manifest.files.len(), "marker manifest loaded");
        Ok(manifest)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn save(&self, manifest: &MarkerManifest) -> WeftResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.error(e.to_string()))?;
        }
        let mut json =
            serde_json::to_string_pretty(manifest).map_err(|e| self.error(e.to_string()))?;
        json.push('\n');

        // Write beside the target, then rename over it.
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, json).map_err(|e| self.error(e.to_string()))?;
        std::fs::rename(&staging, &self.path).map_err(|e| self.error(e.to_string()))?;
        debug!(blocks = manifest.block_count(), "marker manifest saved");
        Ok(())
    }
}

/// Manifest store kept in memory. Clones share the same manifest.
#[derive(Debug, Clone, Default)]
pub struct MemoryManifestStore {
    inner: Arc<RwLock<MarkerManifest>>,
    saves: Arc<RwLock<usize>>,
}

impl MemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest(manifest: MarkerManifest) -> Self {
        Self {
            inner: Arc::new(RwLock::new(manifest)),
            saves: Arc::default(),
        }
    }

    /// Current manifest (testing helper).
    pub fn snapshot(&self) -> MarkerManifest {
        self.inner.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.read().map(|n| *n).unwrap_or(0)
    }
}

impl ManifestStore for MemoryManifestStore {
    fn load(&self) -> WeftResult<MarkerManifest> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.clone())
    }

    fn save(&self, manifest: &MarkerManifest) -> WeftResult<()> {
        *self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)? = manifest.clone();
        *self
            .saves
            .write()
            .map_err(|_| ApplicationError::StoreLockError)? += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use weft_core::domain::MarkerKey;

    #[test]
    fn missing_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonManifestStore::in_workspace(temp.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = JsonManifestStore::in_workspace(temp.path());
        let mut manifest = MarkerManifest::new();
        manifest.merge("app/lib.rs", [MarkerKey::new("jni", "mod-decl").unwrap()]);

        store.save(&manifest).unwrap();
        assert!(temp.path().join(".weft/markers.json").exists());
        assert_eq!(store.load().unwrap(), manifest);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"jni:mod-decl\""));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = JsonManifestStore::in_workspace(temp.path());
        std::fs::create_dir_all(temp.path().join(".weft")).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryManifestStore::new();
        store.save(&MarkerManifest::new()).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.snapshot().is_empty());
    }
}
