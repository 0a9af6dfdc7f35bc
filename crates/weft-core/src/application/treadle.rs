//! Declarative generator definitions ("treadles").
//!
//! A [`TreadleDefinition`] says which ring-kind pairs it applies to, how to
//! shape the method list, which files to write wholesale, which marker
//! blocks to maintain in existing files, and which hookups to run last. It
//! is compiled into a generator by `services::treadle_compiler`.
//!
//! ```rust
//! use weft_core::application::treadle::{OutputSpec, PatchSpec, TreadleDefinition};
//! use weft_core::domain::{EmitTarget, RingKind};
//!
//! let jni = TreadleDefinition::builder("jni-bridge")
//!     .matches(RingKind::Android, RingKind::Core)
//!     .prefix_methods()
//!     .restructure_crud()
//!     .exclude_tag("desktop-only")
//!     .target(EmitTarget::RustJni)
//!     .output(OutputSpec::new("jni/bridge.rs", "{export}/src/jni.rs"))
//!     .patch(PatchSpec::new("jni/mod-decl.rs", "{export}/src/lib.rs", "mod-decl"))
//!     .build()
//!     .unwrap();
//! assert_eq!(jni.name(), "jni-bridge");
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::application::services::patch_engine::PatchEngine;
use crate::domain::{
    Anchor, DataBag, DomainError, EmitTarget, GenerationTask, KindPair, Language, Method,
    ReachLevel, RingKind, Stage,
};
use crate::error::WeftResult;

// ── Callbacks ────────────────────────────────────────────────────────────────

/// Returns false to reject a task; treated like an unmatched edge.
pub type Validator = Arc<dyn Fn(&GenerationTask) -> bool + Send + Sync>;

/// Extra data-bag entries. Overrides built-in entries of the same name.
pub type DataBuilder = Arc<dyn Fn(&GenerationTask, &[Method]) -> DataBag + Send + Sync>;

/// What a dynamic spec source can see.
pub struct SpecScope<'a> {
    pub task: &'a GenerationTask,
    pub methods: &'a [Method],
    pub data: &'a DataBag,
}

pub type OutputSource = Arc<dyn Fn(&SpecScope<'_>) -> Vec<OutputSpec> + Send + Sync>;
pub type PatchSource = Arc<dyn Fn(&SpecScope<'_>) -> Vec<PatchSpec> + Send + Sync>;

// ── Method configuration ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MethodConfig {
    pub prefix: bool,
    pub crud: bool,
    /// Reach level override. Defaults to the outer ring's level.
    pub level: Option<ReachLevel>,
    pub exclude_tags: BTreeSet<String>,
    /// Custom stages, run after the built-in ones.
    pub stages: Vec<Stage>,
    /// Definition-level transform applied to the pipeline output.
    pub transform: Option<Stage>,
}

impl fmt::Debug for MethodConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodConfig")
            .field("prefix", &self.prefix)
            .field("crud", &self.crud)
            .field("level", &self.level)
            .field("exclude_tags", &self.exclude_tags)
            .field("stages", &self.stages.len())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

// ── Output and patch specs ───────────────────────────────────────────────────

/// When a spec is skipped for a task.
#[derive(Clone)]
pub enum SkipIf {
    /// The target file already exists (write-once scaffolding).
    Exists,
    /// The transformed method list is empty.
    NoMethods,
    /// A data-bag key is absent, `false`, `null` or an empty string.
    Falsy(String),
    Custom(Arc<dyn Fn(&SpecScope<'_>) -> bool + Send + Sync>),
}

impl fmt::Debug for SkipIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => f.write_str("Exists"),
            Self::NoMethods => f.write_str("NoMethods"),
            Self::Falsy(key) => f.debug_tuple("Falsy").field(key).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Phase 1: a file written wholesale from a template.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub template: String,
    /// Workspace-relative path with `{placeholder}`s.
    pub path: String,
    pub target: Option<EmitTarget>,
    /// Entries layered over the data bag for this output only.
    pub context: DataBag,
    /// Restrict the methods to one capability (per-capability fan-out).
    pub capability: Option<String>,
    pub skip_if: Option<SkipIf>,
}

impl OutputSpec {
    pub fn new(template: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            path: path.into(),
            target: None,
            context: DataBag::new(),
            capability: None,
            skip_if: None,
        }
    }

    pub fn target(mut self, target: EmitTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn for_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn skip_if(mut self, condition: SkipIf) -> Self {
        self.skip_if = Some(condition);
        self
    }
}

/// Phase 2: a marker block kept in sync inside a (possibly hand-written) file.
#[derive(Debug, Clone)]
pub struct PatchSpec {
    pub template: String,
    pub path: String,
    /// Block id, may contain `{placeholder}`s. The scope is the treadle name.
    pub block: String,
    pub language: Option<Language>,
    pub target: Option<EmitTarget>,
    pub anchor: Anchor,
    pub create_if_missing: bool,
    pub context: DataBag,
    pub capability: Option<String>,
    pub skip_if: Option<SkipIf>,
}

impl PatchSpec {
    pub fn new(template: impl Into<String>, path: impl Into<String>, block: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            path: path.into(),
            block: block.into(),
            language: None,
            target: None,
            anchor: Anchor::EndOfFile,
            create_if_missing: false,
            context: DataBag::new(),
            capability: None,
            skip_if: None,
        }
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn target(mut self, target: EmitTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn create_if_missing(mut self) -> Self {
        self.create_if_missing = true;
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn for_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn skip_if(mut self, condition: SkipIf) -> Self {
        self.skip_if = Some(condition);
        self
    }
}

// ── Hookups ──────────────────────────────────────────────────────────────────

/// What a hookup can see and touch.
pub struct HookupContext<'a> {
    pub task: &'a GenerationTask,
    pub data: &'a DataBag,
    /// Marker scope of the owning treadle.
    pub scope: &'a str,
    pub patcher: PatchEngine<'a>,
}

impl HookupContext<'_> {
    pub fn root(&self) -> &Path {
        self.patcher.root()
    }
}

/// Phase 3: wiring outside the generated files (dependency entries,
/// registrations). Must be idempotent.
pub trait Hookup: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, ctx: &HookupContext<'_>) -> WeftResult<()>;
}

type HookupFn = dyn Fn(&HookupContext<'_>) -> WeftResult<()> + Send + Sync;

/// Hookup from a closure.
pub struct CustomHookup {
    name: String,
    run: Box<HookupFn>,
}

impl CustomHookup {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&HookupContext<'_>) -> WeftResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }
}

impl Hookup for CustomHookup {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, ctx: &HookupContext<'_>) -> WeftResult<()> {
        (self.run)(ctx)
    }
}

// ── Definition ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct TreadleDefinition {
    name: String,
    matches: Vec<KindPair>,
    methods: MethodConfig,
    target: Option<EmitTarget>,
    outputs: Vec<OutputSpec>,
    output_sources: Vec<OutputSource>,
    patches: Vec<PatchSpec>,
    patch_sources: Vec<PatchSource>,
    hookups: Vec<Arc<dyn Hookup>>,
    validate: Option<Validator>,
    data: Option<DataBuilder>,
}

impl fmt::Debug for TreadleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreadleDefinition")
            .field("name", &self.name)
            .field("matches", &self.matches)
            .field("methods", &self.methods)
            .field("target", &self.target)
            .field("outputs", &self.outputs)
            .field("output_sources", &self.output_sources.len())
            .field("patches", &self.patches)
            .field("patch_sources", &self.patch_sources.len())
            .field(
                "hookups",
                &self.hookups.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TreadleDefinition {
    pub fn builder(name: impl Into<String>) -> TreadleBuilder {
        TreadleBuilder {
            def: TreadleDefinition {
                name: name.into(),
                matches: Vec::new(),
                methods: MethodConfig::default(),
                target: None,
                outputs: Vec::new(),
                output_sources: Vec::new(),
                patches: Vec::new(),
                patch_sources: Vec::new(),
                hookups: Vec::new(),
                validate: None,
                data: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self) -> &[KindPair] {
        &self.matches
    }

    pub fn matches_pair(&self, outer: RingKind, inner: RingKind) -> bool {
        self.matches.contains(&(outer, inner))
    }

    pub fn method_config(&self) -> &MethodConfig {
        &self.methods
    }

    pub fn target(&self) -> Option<EmitTarget> {
        self.target
    }

    pub fn outputs(&self) -> &[OutputSpec] {
        &self.outputs
    }

    pub fn output_sources(&self) -> &[OutputSource] {
        &self.output_sources
    }

    pub fn patches(&self) -> &[PatchSpec] {
        &self.patches
    }

    pub fn patch_sources(&self) -> &[PatchSource] {
        &self.patch_sources
    }

    pub fn hookups(&self) -> &[Arc<dyn Hookup>] {
        &self.hookups
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validate.as_ref()
    }

    pub fn data_builder(&self) -> Option<&DataBuilder> {
        self.data.as_ref()
    }

    /// # Errors
    ///
    /// `InvalidTreadle` for an empty or whitespace name (it becomes the
    /// marker scope), no match patterns, or empty template/path fields.
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |reason: String| DomainError::InvalidTreadle {
            name: self.name.clone(),
            reason,
        };

        if self.name.is_empty() || self.name.contains(':') || self.name.contains(char::is_whitespace)
        {
            return Err(invalid(
                "name must be non-empty without ':' or whitespace".into(),
            ));
        }
        if self.matches.is_empty() {
            return Err(invalid("at least one match pattern is required".into()));
        }
        for output in &self.outputs {
            if output.template.is_empty() || output.path.is_empty() {
                return Err(invalid("outputs need a template and a path".into()));
            }
        }
        for patch in &self.patches {
            if patch.template.is_empty() || patch.path.is_empty() || patch.block.is_empty() {
                return Err(invalid("patches need a template, a path and a block id".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct TreadleBuilder {
    def: TreadleDefinition,
}

impl TreadleBuilder {
    pub fn matches(mut self, outer: RingKind, inner: RingKind) -> Self {
        if !self.def.matches.contains(&(outer, inner)) {
            self.def.matches.push((outer, inner));
        }
        self
    }

    pub fn prefix_methods(mut self) -> Self {
        self.def.methods.prefix = true;
        self
    }

    pub fn restructure_crud(mut self) -> Self {
        self.def.methods.crud = true;
        self
    }

    pub fn level(mut self, level: ReachLevel) -> Self {
        self.def.methods.level = Some(level);
        self
    }

    pub fn exclude_tag(mut self, tag: impl Into<String>) -> Self {
        self.def.methods.exclude_tags.insert(tag.into());
        self
    }

    pub fn stage(mut self, stage: impl Fn(Vec<Method>) -> Vec<Method> + Send + Sync + 'static) -> Self {
        self.def.methods.stages.push(Arc::new(stage));
        self
    }

    pub fn transform(
        mut self,
        transform: impl Fn(Vec<Method>) -> Vec<Method> + Send + Sync + 'static,
    ) -> Self {
        self.def.methods.transform = Some(Arc::new(transform));
        self
    }

    pub fn target(mut self, target: EmitTarget) -> Self {
        self.def.target = Some(target);
        self
    }

    pub fn output(mut self, spec: OutputSpec) -> Self {
        self.def.outputs.push(spec);
        self
    }

    pub fn outputs_from(
        mut self,
        source: impl Fn(&SpecScope<'_>) -> Vec<OutputSpec> + Send + Sync + 'static,
    ) -> Self {
        self.def.output_sources.push(Arc::new(source));
        self
    }

    pub fn patch(mut self, spec: PatchSpec) -> Self {
        self.def.patches.push(spec);
        self
    }

    pub fn patches_from(
        mut self,
        source: impl Fn(&SpecScope<'_>) -> Vec<PatchSpec> + Send + Sync + 'static,
    ) -> Self {
        self.def.patch_sources.push(Arc::new(source));
        self
    }

    pub fn hookup(mut self, hookup: impl Hookup + 'static) -> Self {
        self.def.hookups.push(Arc::new(hookup));
        self
    }

    pub fn shared_hookup(mut self, hookup: Arc<dyn Hookup>) -> Self {
        self.def.hookups.push(hookup);
        self
    }

    pub fn validate(mut self, check: impl Fn(&GenerationTask) -> bool + Send + Sync + 'static) -> Self {
        self.def.validate = Some(Arc::new(check));
        self
    }

    pub fn data(
        mut self,
        builder: impl Fn(&GenerationTask, &[Method]) -> DataBag + Send + Sync + 'static,
    ) -> Self {
        self.def.data = Some(Arc::new(builder));
        self
    }

    pub fn build(self) -> Result<TreadleDefinition, DomainError> {
        self.def.validate()?;
        Ok(self.def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_deduplicates_matches() {
        let def = TreadleDefinition::builder("ipc")
            .matches(RingKind::Plugin, RingKind::Desktop)
            .matches(RingKind::Plugin, RingKind::Desktop)
            .build()
            .unwrap();
        assert_eq!(def.matches().len(), 1);
        assert!(def.matches_pair(RingKind::Plugin, RingKind::Desktop));
        assert!(!def.matches_pair(RingKind::Desktop, RingKind::Plugin));
    }

    #[test]
    fn rejects_definitions_without_matches() {
        let err = TreadleDefinition::builder("lonely").build().unwrap_err();
        assert!(matches!(err, DomainError::InvalidTreadle { .. }));
    }

    #[test]
    fn rejects_names_unusable_as_scope() {
        for name in ["", "a:b", "two words"] {
            let result = TreadleDefinition::builder(name)
                .matches(RingKind::Android, RingKind::Core)
                .build();
            assert!(result.is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn patch_needs_block_id() {
        let result = TreadleDefinition::builder("t")
            .matches(RingKind::Android, RingKind::Core)
            .patch(PatchSpec::new("tpl", "lib.rs", ""))
            .build();
        assert!(result.is_err());
    }
}
