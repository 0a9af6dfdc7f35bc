//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "weave the workspace" or "ensure this block".

pub mod patch_engine;
pub mod treadle_compiler;
pub mod weave_service;

pub use patch_engine::{BlockPatch, PatchEngine, SessionOutcome, WeaveSession};
pub use treadle_compiler::CompiledTreadle;
pub use weave_service::{DEFAULT_MANIFEST_PATH, WeaveConfig, WeaveService};
