// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for Weft.
//!
//! Pure weaving logic: the ring graph, capability declarations, plan
//! building, generator dispatch, the method pipeline, type emission and the
//! text side of marker blocks. Nothing in here touches the filesystem; all
//! I/O goes through the ports defined in the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, network, or external calls
//! - **Immutable graph**: Rings are shared, never mutated after construction
//! - **Pure stages**: Pipeline stages are `Vec<Method> -> Vec<Method>`

pub mod capability;
pub mod context;
pub mod emission;
pub mod error;
pub mod language;
pub mod marker;
pub mod matrix;
pub mod method;
pub mod naming;
pub mod pipeline;
pub mod plan;
pub mod ring;

pub use capability::{
    Capability, CapabilityMethod, FieldWrapper, LinkMetadata, MethodParam, Reach, ReachLevel,
};
pub use context::{DataBag, RenderContext, interpolate};
pub use emission::{EmitTarget, EmittedMethod, EmittedParam, emit_method, emit_methods, map_type};
pub use error::{DomainError, ErrorCategory};
pub use language::{CommentStyle, Language};
pub use marker::{Anchor, BlockSpan, MarkerKey, PatchOutcome};
pub use matrix::{GeneratorMatrix, KindPair};
pub use method::{CrudOp, CrudShape, Method};
pub use pipeline::{MethodPipeline, Stage, exclude_tagged, prefix_methods, restructure_crud};
pub use plan::{
    DraftPlan, GenerationTask, PlanBuilder, PlanHandle, PlanIndex, RingEdge, WeavingPlan,
};
pub use ring::{Ring, RingBuilder, RingGraph, RingId, RingKind, RingRole};
