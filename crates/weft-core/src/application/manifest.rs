//! Persisted record of the files that carry marker blocks.
//!
//! The sweep at the end of a weave has to find blocks written by earlier
//! runs, including blocks whose generator no longer exists. Marker presence
//! in a file is still the source of truth; the manifest only says which
//! files are worth scanning.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::MarkerKey;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerManifest {
    pub version: u32,
    /// Workspace-relative path to the blocks last seen in it.
    #[serde(default)]
    pub files: BTreeMap<PathBuf, BTreeSet<MarkerKey>>,
}

impl Default for MarkerManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            files: BTreeMap::new(),
        }
    }
}

impl MarkerManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn blocks(&self, path: &Path) -> Option<&BTreeSet<MarkerKey>> {
        self.files.get(path)
    }

    /// Record the exact block set of a file. An empty set forgets the file.
    pub fn set(&mut self, path: impl Into<PathBuf>, blocks: BTreeSet<MarkerKey>) {
        let path = path.into();
        if blocks.is_empty() {
            self.files.remove(&path);
        } else {
            self.files.insert(path, blocks);
        }
    }

    /// Add blocks without forgetting any already recorded.
    pub fn merge(&mut self, path: impl Into<PathBuf>, blocks: impl IntoIterator<Item = MarkerKey>) {
        let entry = self.files.entry(path.into()).or_default();
        entry.extend(blocks);
        if entry.is_empty() {
            // Nothing was added to a fresh entry.
            self.files.retain(|_, b| !b.is_empty());
        }
    }

    pub fn forget(&mut self, path: &Path) {
        self.files.remove(path);
    }

    pub fn block_count(&self) -> usize {
        self.files.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> MarkerKey {
        s.parse().unwrap()
    }

    #[test]
    fn set_and_merge() {
        let mut manifest = MarkerManifest::new();
        manifest.set("a.rs", BTreeSet::from([key("s:1")]));
        manifest.merge("a.rs", [key("s:2")]);
        manifest.merge("b.rs", Vec::<MarkerKey>::new());

        assert_eq!(manifest.block_count(), 2);
        assert!(manifest.blocks(Path::new("b.rs")).is_none());

        manifest.set("a.rs", BTreeSet::new());
        assert!(manifest.is_empty());
    }

    #[test]
    fn json_shape_is_stable() {
        let mut manifest = MarkerManifest::new();
        manifest.set("src/lib.rs", BTreeSet::from([key("jni:methods")]));
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "version": 1, "files": { "src/lib.rs": ["jni:methods"] } })
        );
        let back: MarkerManifest = serde_json::from_value(json).unwrap();
        assert_eq!(back, manifest);
    }
}
