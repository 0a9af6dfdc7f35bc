//! Ensure a key in a `package.json` dependency table.
//!
//! JSON has no comments, so there is no marker block: the file is rewritten
//! only when the value differs. Key order is preserved.

use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use weft_core::application::{ApplicationError, Hookup, HookupContext};
use weft_core::error::WeftResult;

use super::{failed, resolve};

#[derive(Debug, Clone)]
pub struct JsonDependency {
    manifest: String,
    section: String,
    name: String,
    version: String,
}

impl JsonDependency {
    pub fn new(manifest: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            section: "dependencies".into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Target another table, such as `devDependencies`.
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }
}

impl Hookup for JsonDependency {
    fn name(&self) -> &str {
        "json-dependency"
    }

    #[instrument(skip_all, fields(dependency = %self.name, manifest = %self.manifest))]
    fn apply(&self, ctx: &HookupContext<'_>) -> WeftResult<()> {
        let name = resolve(ctx, &self.name)?;
        let version = resolve(ctx, &self.version)?;
        let path = PathBuf::from(resolve(ctx, &self.manifest)?);
        let full = ctx.root().join(&path);
        let fs = ctx.patcher.filesystem();
        if !fs.exists(&full) {
            return Err(ApplicationError::PatchTargetMissing { path }.into());
        }

        let mut doc: Value = serde_json::from_str(&fs.read_file(&full)?)
            .map_err(|e| failed(self.name(), format!("{}: {e}", path.display())))?;
        let root = doc
            .as_object_mut()
            .ok_or_else(|| failed(self.name(), format!("{} is not a JSON object", path.display())))?;
        let table = root
            .entry(self.section.clone())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| failed(self.name(), format!("`{}` is not an object", self.section)))?;

        if table.get(&name).and_then(Value::as_str) == Some(version.as_str()) {
            debug!("dependency already present");
            return Ok(());
        }
        table.insert(name, Value::String(version));

        let mut text = serde_json::to_string_pretty(&doc)
            .map_err(|e| failed(self.name(), e.to_string()))?;
        text.push('\n');
        ctx.patcher.write_file(&path, &text)?;
        Ok(())
    }
}
