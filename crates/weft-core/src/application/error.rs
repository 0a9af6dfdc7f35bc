//! Application layer errors.
//!
//! These errors represent failures in orchestration, not weaving logic.
//! Logic errors are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur while running generators and applying their output.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    /// A generator failed for one task. Recorded, the weave continues.
    #[error("Generation failed for {task}: {reason}")]
    GenerationFailure { task: String, reason: String },

    /// A patch spec points at a file that does not exist and may not be created.
    #[error("Patch target does not exist: {path}")]
    PatchTargetMissing { path: PathBuf },

    /// A generated path is absolute or climbs out of the workspace root.
    #[error("Path escapes the workspace root: {path}")]
    PathOutsideRoot { path: PathBuf },

    /// Template rendering failed.
    #[error("Rendering template '{template}' failed: {reason}")]
    RenderingFailed { template: String, reason: String },

    /// Template id not registered with the renderer.
    #[error("Template not found: {id}")]
    TemplateNotFound { id: String },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// A phase-3 hookup failed.
    #[error("Hookup '{hookup}' failed: {reason}")]
    HookupFailed { hookup: String, reason: String },

    /// The persisted marker manifest could not be read or written.
    #[error("Marker manifest error at {path}: {reason}")]
    ManifestError { path: PathBuf, reason: String },

    /// Shared state lock was poisoned by a panicking task.
    #[error("Weave state lock poisoned")]
    StoreLockError,

    /// Port/Adapter not configured.
    #[error("Required adapter not configured: {name}")]
    AdapterNotConfigured { name: &'static str },

    /// Validation failed (application-level, not domain).
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::GenerationFailure { task, .. } => vec![
                format!("Task {task} failed; other tasks still ran"),
                "Re-run with -vv to see the generator's log output".into(),
            ],
            Self::PatchTargetMissing { path } => vec![
                format!("Create {} by hand, or", path.display()),
                "set create_if_missing on the patch spec".into(),
            ],
            Self::PathOutsideRoot { path } => vec![
                format!("'{}' resolves outside the workspace", path.display()),
                "Use workspace-relative paths without '..' in outputs, patches and hookups".into(),
            ],
            Self::TemplateNotFound { id } => vec![
                format!("No template registered under '{id}'"),
                "Check the templates directory in your weft config".into(),
            ],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
            ],
            Self::ManifestError { path, .. } => vec![
                format!("Inspect or delete {}", path.display()),
                "Deleting it only disables orphan cleanup for blocks from earlier runs".into(),
            ],
            Self::StoreLockError => vec![
                "A generator panicked while holding shared state".into(),
                "Re-run the weave; it is idempotent".into(),
            ],
            Self::AdapterNotConfigured { name } => vec![
                format!("Required component not configured: {name}"),
                "This is likely a configuration error".into(),
            ],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::GenerationFailure { .. } | Self::RenderingFailed { .. } => {
                ErrorCategory::Generation
            }
            Self::PatchTargetMissing { .. } | Self::TemplateNotFound { .. } => {
                ErrorCategory::NotFound
            }
            Self::ManifestError { .. } => ErrorCategory::Corruption,
            Self::FilesystemError { .. }
            | Self::HookupFailed { .. }
            | Self::StoreLockError => ErrorCategory::Internal,
            Self::AdapterNotConfigured { .. } => ErrorCategory::Configuration,
            Self::ValidationFailed(_) | Self::PathOutsideRoot { .. } => ErrorCategory::Validation,
        }
    }
}
