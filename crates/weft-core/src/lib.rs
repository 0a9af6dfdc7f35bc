//! Weft Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers of the Weft
//! weaving engine: one declared set of capabilities, woven into glue code
//! for every ring of a layered architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             weft-cli (CLI)              │
//! │       (Implements Driving Ports)        │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │          Application Services           │
//! │  (WeaveService, PatchEngine, Treadles)  │
//! │          Orchestrates Use Cases         │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        Application Ports (Traits)       │
//! │ (Driven: Filesystem, Renderer, Manifest)│
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │       weft-adapters (Infrastructure)    │
//! │  (LocalFilesystem, HandlebarsRenderer)  │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │  (Rings, Plan, Pipeline, Emission,      │
//! │   Marker blocks)                        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use weft_core::prelude::*;
//!
//! // 1. Describe the rings
//! let core = Ring::core("engine");
//! let android = Ring::builder(RingKind::Android, "android")
//!     .export("app-android")
//!     .wraps(&core)
//!     .build()
//!     .unwrap();
//! let graph = RingGraph::new().with_root("mobile", &android);
//!
//! // 2. Register generators
//! let mut matrix = Matrix::new();
//! CompiledTreadle::compile(
//!     TreadleDefinition::builder("jni")
//!         .matches(RingKind::Android, RingKind::Core)
//!         .prefix_methods()
//!         .output(OutputSpec::new("jni/bridge.rs", "{export}/src/bridge.rs"))
//!         .build()
//!         .unwrap(),
//! )
//! .unwrap()
//! .register(&mut matrix);
//!
//! // 3. Weave (with injected adapters)
//! let service = WeaveService::new(filesystem, renderer, manifest);
//! let report = service.weave(&graph, &capabilities, &matrix, &WeaveConfig::new("."));
//! ```

// Re-export domain layer (stable, well-defined API)
pub mod domain;

// Re-export application layer (orchestration logic)
pub mod application;

// Re-export error types
pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        CompiledTreadle, FnGenerator, GeneratedFile, Generator, Matrix, OutputSpec, PatchSpec,
        TreadleDefinition, WeaveConfig, WeaveReport, WeaveService,
        ports::{Filesystem, ManifestStore, TemplateRenderer},
    };
    pub use crate::domain::{
        Anchor, Capability, CapabilityMethod, EmitTarget, GenerationTask, Language, MarkerKey,
        MethodParam, Reach, ReachLevel, RenderContext, Ring, RingGraph, RingKind,
    };
    pub use crate::error::{WeftError, WeftResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
