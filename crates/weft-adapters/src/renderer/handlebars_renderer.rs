//! Handlebars renderer.
//!
//! Templates are registered under a language-neutral id. Loading a directory
//! registers every `*.hbs` file under its path relative to that directory,
//! without the extension and with `/` separators:
//!
//! ```text
//! templates/
//! ├── jni/
//! │   └── bridge.rs.hbs      → "jni/bridge.rs"
//! └── plugin/
//!     └── commands.ts.hbs    → "plugin/commands.ts"
//! ```
//!
//! Output is never HTML-escaped. Case helpers are registered up front:
//! `snake`, `kebab`, `pascal`, `camel` and `screaming`.

use std::path::Path;

use handlebars::{Handlebars, handlebars_helper, no_escape};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use weft_core::application::ApplicationError;
use weft_core::application::ports::TemplateRenderer;
use weft_core::domain::RenderContext;
use weft_core::domain::naming::{
    to_camel_case, to_kebab_case, to_pascal_case, to_screaming_snake_case, to_snake_case,
};
use weft_core::error::WeftResult;

use crate::filesystem::map_io_error;

/// Extension stripped from template files when loading a directory.
pub const TEMPLATE_EXTENSION: &str = "hbs";

handlebars_helper!(snake: |s: str| to_snake_case(s));
handlebars_helper!(kebab: |s: str| to_kebab_case(s));
handlebars_helper!(pascal: |s: str| to_pascal_case(s));
handlebars_helper!(camel: |s: str| to_camel_case(s));
handlebars_helper!(screaming: |s: str| to_screaming_snake_case(s));

pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for HandlebarsRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlebarsRenderer")
            .field("templates", &self.template_ids())
            .finish()
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("snake", Box::new(snake));
        registry.register_helper("kebab", Box::new(kebab));
        registry.register_helper("pascal", Box::new(pascal));
        registry.register_helper("camel", Box::new(camel));
        registry.register_helper("screaming", Box::new(screaming));
        Self { registry }
    }

    /// Fail on references to missing fields instead of rendering them empty.
    pub fn strict(mut self, strict: bool) -> Self {
        self.registry.set_strict_mode(strict);
        self
    }

    /// Register (or replace) a template from source text.
    ///
    /// # Errors
    ///
    /// `RenderingFailed` if the source does not parse.
    pub fn register(&mut self, id: impl AsRef<str>, source: impl AsRef<str>) -> WeftResult<()> {
        let id = id.as_ref();
        self.registry
            .register_template_string(id, source.as_ref())
            .map_err(|e| ApplicationError::RenderingFailed {
                template: id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub fn with_template(mut self, id: impl AsRef<str>, source: impl AsRef<str>) -> WeftResult<Self> {
        self.register(id, source)?;
        Ok(self)
    }

    /// Register every `*.hbs` file under `dir`. Returns how many were loaded.
    ///
    /// # Errors
    ///
    /// `FilesystemError` if `dir` is missing or a file cannot be read;
    /// `RenderingFailed` if a template does not parse.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn load_dir(&mut self, dir: &Path) -> WeftResult<usize> {
        if !dir.is_dir() {
            return Err(ApplicationError::FilesystemError {
                path: dir.to_path_buf(),
                reason: "templates directory not found".into(),
            }
            .into());
        }

        let mut count = 0;
        for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| ApplicationError::FilesystemError {
                path: dir.to_path_buf(),
                reason: format!("directory walk error: {e}"),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION)
            {
                continue;
            }

            let Some(id) = template_id(dir, path) else {
                warn!(path = %path.display(), "skipping template with a non UTF-8 path");
                continue;
            };
            let source =
                std::fs::read_to_string(path).map_err(|e| map_io_error(path, e, "read template"))?;
            self.register(&id, source)?;
            debug!(id = %id, "registered template");
            count += 1;
        }
        Ok(count)
    }

    pub fn from_dir(dir: &Path) -> WeftResult<Self> {
        let mut renderer = Self::new();
        renderer.load_dir(dir)?;
        Ok(renderer)
    }

    /// Registered ids, sorted.
    pub fn template_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry.get_templates().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// `dir/jni/bridge.rs.hbs` → `jni/bridge.rs`.
fn template_id(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?.with_extension("");
    let parts: Option<Vec<&str>> = relative.iter().map(|p| p.to_str()).collect();
    Some(parts?.join("/"))
}

impl TemplateRenderer for HandlebarsRenderer {
    #[instrument(skip(self, context), fields(template = %id))]
    fn render(&self, id: &str, context: &RenderContext) -> WeftResult<String> {
        if !self.registry.has_template(id) {
            return Err(ApplicationError::TemplateNotFound { id: id.to_string() }.into());
        }
        Ok(self
            .registry
            .render(id, context)
            .map_err(|e| ApplicationError::RenderingFailed {
                template: id.to_string(),
                reason: e.to_string(),
            })?)
    }

    fn has_template(&self, id: &str) -> bool {
        self.registry.has_template(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use weft_core::domain::DataBag;

    fn context() -> RenderContext {
        RenderContext::new(
            DataBag::from([
                ("export".to_string(), json!("app-android")),
                ("outer".to_string(), json!({ "name": "android" })),
            ]),
            Vec::new(),
        )
    }

    #[test]
    fn renders_without_escaping_and_with_case_helpers() {
        let renderer = HandlebarsRenderer::new()
            .with_template("t", "pub const A: &str = \"<{{export}}>\"; // {{pascal export}} {{snake outer.name}}")
            .unwrap();
        let out = renderer.render("t", &context()).unwrap();
        assert_eq!(out, "pub const A: &str = \"<app-android>\"; // AppAndroid android");
    }

    #[test]
    fn unknown_template_is_not_found() {
        let err = HandlebarsRenderer::new().render("nope", &context()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn strict_mode_rejects_missing_fields() {
        let renderer = HandlebarsRenderer::new()
            .strict(true)
            .with_template("t", "{{missing}}")
            .unwrap();
        assert!(renderer.render("t", &context()).is_err());
    }

    #[test]
    fn loads_nested_directory_by_relative_id() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("jni")).unwrap();
        fs::write(temp.path().join("jni/bridge.rs.hbs"), "// {{export}}").unwrap();
        fs::write(temp.path().join("README.md"), "ignored").unwrap();

        let renderer = HandlebarsRenderer::from_dir(temp.path()).unwrap();
        assert_eq!(renderer.template_ids(), vec!["jni/bridge.rs".to_string()]);
        assert_eq!(
            renderer.render("jni/bridge.rs", &context()).unwrap(),
            "// app-android"
        );
    }

    #[test]
    fn parse_errors_name_the_template() {
        let err = HandlebarsRenderer::new()
            .with_template("broken", "{{#if}}")
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
