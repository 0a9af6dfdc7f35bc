//! Ensure a `[dependencies]` entry in a `Cargo.toml`.
//!
//! The entry lives in a marker block right after the `[dependencies]`
//! header. A manifest without that table gets the header inside the block,
//! at the end of the file, so sweeping the block removes both. An entry the
//! user declared by hand is left alone.

use std::path::PathBuf;

use tracing::{debug, instrument};

use weft_core::application::{ApplicationError, BlockPatch, Hookup, HookupContext};
use weft_core::domain::marker::remove_blocks;
use weft_core::domain::{Anchor, Language, MarkerKey};
use weft_core::error::WeftResult;

use super::{failed, resolve};

/// The table header, with an optional trailing comment.
const DEPENDENCIES_HEADER: &str = r"^\s*\[dependencies\]\s*(#.*)?$";

/// Where a dependency comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    Version(String),
    /// Relative path, itself a `{placeholder}` template.
    Path(String),
    Workspace,
}

#[derive(Debug, Clone)]
pub struct CargoDependency {
    name: String,
    manifest: String,
    source: DependencySource,
}

impl CargoDependency {
    /// `manifest` is the workspace-relative `Cargo.toml` path template.
    pub fn new(manifest: impl Into<String>, name: impl Into<String>, source: DependencySource) -> Self {
        Self {
            name: name.into(),
            manifest: manifest.into(),
            source,
        }
    }

    pub fn version(manifest: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(manifest, name, DependencySource::Version(version.into()))
    }

    pub fn path(manifest: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(manifest, name, DependencySource::Path(path.into()))
    }

    fn entry(&self, ctx: &HookupContext<'_>, name: &str) -> WeftResult<String> {
        let value = match &self.source {
            DependencySource::Version(version) => toml::Value::String(version.clone()).to_string(),
            DependencySource::Path(path) => format!(
                "{{ path = {} }}",
                toml::Value::String(resolve(ctx, path)?)
            ),
            DependencySource::Workspace => "{ workspace = true }".to_string(),
        };
        Ok(format!("{name} = {value}\n"))
    }
}

impl Hookup for CargoDependency {
    fn name(&self) -> &str {
        "cargo-dependency"
    }

    #[instrument(skip_all, fields(dependency = %self.name, manifest = %self.manifest))]
    fn apply(&self, ctx: &HookupContext<'_>) -> WeftResult<()> {
        let name = resolve(ctx, &self.name)?;
        let path = PathBuf::from(resolve(ctx, &self.manifest)?);
        let full = ctx.root().join(&path);
        let fs = ctx.patcher.filesystem();
        if !fs.exists(&full) {
            return Err(ApplicationError::PatchTargetMissing { path }.into());
        }

        let text = fs.read_file(&full)?;
        let key = MarkerKey::new(ctx.scope, format!("dep-{name}"))?;
        // Judge the file as the user wrote it, without this block.
        let (hand_written, _) = remove_blocks(&text, |k| *k != key)?;
        let parsed: toml::Table = hand_written
            .parse()
            .map_err(|e: toml::de::Error| failed(self.name(), format!("{}: {e}", path.display())))?;
        let dependencies = parsed.get("dependencies").and_then(toml::Value::as_table);

        if dependencies.is_some_and(|deps| deps.contains_key(&name)) {
            debug!("dependency declared by hand; leaving it");
            return Ok(());
        }

        let entry = self.entry(ctx, &name)?;
        let patch = match dependencies {
            Some(_) => BlockPatch::new(path, key, entry)
                .anchor(Anchor::After(DEPENDENCIES_HEADER.to_string())),
            None => BlockPatch::new(path, key, format!("[dependencies]\n{entry}")),
        }
        .language(Language::Toml);
        ctx.patcher.ensure_block(&patch)?;
        Ok(())
    }
}
