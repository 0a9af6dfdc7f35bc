//! Renderer backed by closures, for templates defined in code.

use std::collections::HashMap;
use std::fmt;

use weft_core::application::ApplicationError;
use weft_core::application::ports::TemplateRenderer;
use weft_core::domain::RenderContext;
use weft_core::error::WeftResult;

type RenderFn = dyn Fn(&RenderContext) -> WeftResult<String> + Send + Sync;

#[derive(Default)]
pub struct FnRenderer {
    templates: HashMap<String, Box<RenderFn>>,
}

impl FnRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: impl Into<String>,
        render: impl Fn(&RenderContext) -> WeftResult<String> + Send + Sync + 'static,
    ) {
        self.templates.insert(id.into(), Box::new(render));
    }

    pub fn with(
        mut self,
        id: impl Into<String>,
        render: impl Fn(&RenderContext) -> WeftResult<String> + Send + Sync + 'static,
    ) -> Self {
        self.register(id, render);
        self
    }

    /// A template that ignores its context.
    pub fn with_static(self, id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        self.with(id, move |_| Ok(text.clone()))
    }
}

impl fmt::Debug for FnRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.templates.keys().collect();
        ids.sort();
        f.debug_struct("FnRenderer").field("templates", &ids).finish()
    }
}

impl TemplateRenderer for FnRenderer {
    fn render(&self, id: &str, context: &RenderContext) -> WeftResult<String> {
        let render = self
            .templates
            .get(id)
            .ok_or_else(|| ApplicationError::TemplateNotFound { id: id.to_string() })?;
        render(context)
    }

    fn has_template(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_closures() {
        let renderer = FnRenderer::new()
            .with_static("header", "// generated\n")
            .with("count", |ctx| Ok(ctx.methods.len().to_string()));

        assert!(renderer.has_template("header"));
        assert_eq!(
            renderer.render("count", &RenderContext::default()).unwrap(),
            "0"
        );
        assert!(renderer.render("missing", &RenderContext::default()).is_err());
    }
}
