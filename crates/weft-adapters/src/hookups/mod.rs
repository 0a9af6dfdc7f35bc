//! Structured phase-3 hookups.
//!
//! Both hookups take their manifest path and dependency name as
//! `{placeholder}` templates resolved against the task's data bag, so one
//! hookup instance serves every ring a treadle matches.

mod cargo;
mod json;

pub use cargo::{CargoDependency, DependencySource};
pub use json::JsonDependency;

use weft_core::application::{ApplicationError, HookupContext};
use weft_core::domain::interpolate;
use weft_core::error::WeftResult;

fn resolve(ctx: &HookupContext<'_>, template: &str) -> WeftResult<String> {
    Ok(interpolate(template, ctx.data)?)
}

fn failed(hookup: &str, reason: impl Into<String>) -> ApplicationError {
    ApplicationError::HookupFailed {
        hookup: hookup.to_string(),
        reason: reason.into(),
    }
}
