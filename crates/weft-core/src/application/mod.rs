//! Application layer for Weft.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (WeaveService, the patch engine,
//!   the treadle compiler)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Generators**: What the matrix dispatches to, and the environment
//!   they write through
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer. Weaving rules that
//! need no I/O live in `crate::domain`.

pub mod error;
pub mod generator;
pub mod manifest;
pub mod ports;
pub mod report;
pub mod services;
pub mod treadle;

// Re-export main services
pub use services::{
    BlockPatch, CompiledTreadle, PatchEngine, WeaveConfig, WeaveService, WeaveSession,
};

// Re-export port traits (for adapter implementation)
pub use ports::{Filesystem, ManifestStore, TemplateRenderer};

pub use error::ApplicationError;
pub use generator::{FnGenerator, GeneratedFile, Generator, Matrix, TaskEnv};
pub use manifest::MarkerManifest;
pub use report::{FileReport, FileStatus, RemovedBlock, TaskError, WeaveReport};
pub use treadle::{
    CustomHookup, Hookup, HookupContext, OutputSpec, PatchSpec, SkipIf, TreadleDefinition,
};
