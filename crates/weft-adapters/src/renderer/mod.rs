//! Template renderer adapters.

mod function;
mod handlebars_renderer;

pub use function::FnRenderer;
pub use handlebars_renderer::{HandlebarsRenderer, TEMPLATE_EXTENSION};
