//! Declarative Generator Compiler - turns a `TreadleDefinition` into a
//! [`Generator`].
//!
//! For each task the compiled treadle runs a fixed sequence:
//!
//! 1. Match and validate. A kind pair outside the match patterns, or a
//!    rejecting validator, produces no output at all.
//! 2. Method pipeline (prefix, CRUD, custom stages, exclusion last), then the
//!    definition's own transform.
//! 3. Data bag: built-in entries, then the definition's data builder.
//! 4. Phase 1: outputs, written wholesale.
//! 5. Phase 2: patches, handed to the patch engine under the treadle's scope.
//! 6. Phase 3: hookups.
//!
//! A later phase may rely on an earlier one, for instance a patch into a
//! file an output just created.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::application::generator::{Generator, Matrix, TaskEnv};
use crate::application::services::patch_engine::BlockPatch;
use crate::application::treadle::{
    HookupContext, OutputSpec, PatchSpec, SkipIf, SpecScope, TreadleDefinition,
};
use crate::domain::naming::{to_kebab_case, to_pascal_case, to_snake_case};
use crate::domain::{
    DataBag, DomainError, EmitTarget, GenerationTask, MarkerKey, Method, MethodPipeline,
    RenderContext, Ring, emit_methods, interpolate, prefix_methods, restructure_crud,
};
use crate::error::{WeftError, WeftResult};

/// Emit target used when neither the spec nor the definition names one.
pub const DEFAULT_TARGET: EmitTarget = EmitTarget::Rust;

#[derive(Debug, Clone)]
pub struct CompiledTreadle {
    def: TreadleDefinition,
}

impl CompiledTreadle {
    /// # Errors
    ///
    /// `InvalidTreadle` if the definition fails validation.
    pub fn compile(def: TreadleDefinition) -> Result<Self, DomainError> {
        def.validate()?;
        Ok(Self { def })
    }

    pub fn definition(&self) -> &TreadleDefinition {
        &self.def
    }

    pub fn shared(self) -> Arc<dyn Generator> {
        Arc::new(self)
    }

    /// Register under every pair the definition matches.
    pub fn register(self, matrix: &mut Matrix) {
        let pairs = self.def.matches().to_vec();
        let generator = self.shared();
        for (outer, inner) in pairs {
            matrix.register(outer, inner, Arc::clone(&generator));
        }
    }

    fn pipeline(&self, task: &GenerationTask) -> MethodPipeline {
        let config = self.def.method_config();
        let level = config.level.unwrap_or_else(|| task.reach_level());
        let mut pipeline = MethodPipeline::new(level);
        if config.prefix {
            pipeline = pipeline.stage(prefix_methods);
        }
        if config.crud {
            pipeline = pipeline.stage(restructure_crud);
        }
        for stage in &config.stages {
            pipeline = pipeline.shared_stage(Arc::clone(stage));
        }
        pipeline.exclude_tags(config.exclude_tags.iter().cloned())
    }

    /// Step 2: the transformed method list for `task`.
    pub fn methods(&self, task: &GenerationTask) -> WeftResult<Vec<Method>> {
        let plan = task.plan()?;
        let methods = self.pipeline(task).run(plan.capabilities());
        Ok(match &self.def.method_config().transform {
            Some(transform) => transform(methods),
            None => methods,
        })
    }

    /// Step 3: built-in entries, then the definition's builder.
    pub fn data_bag(&self, task: &GenerationTask, methods: &[Method]) -> WeftResult<DataBag> {
        let plan = task.plan()?;
        let level = self
            .def
            .method_config()
            .level
            .unwrap_or_else(|| task.reach_level());

        let mut data = DataBag::new();
        data.insert("treadle".into(), json!(self.def.name()));
        data.insert("export".into(), json!(task.export));
        data.insert("export_snake".into(), json!(to_snake_case(&task.export)));
        data.insert("export_kebab".into(), json!(to_kebab_case(&task.export)));
        data.insert("export_pascal".into(), json!(to_pascal_case(&task.export)));
        data.insert("outer".into(), ring_value(&task.outer));
        data.insert("inner".into(), ring_value(&task.inner));
        data.insert("reach_level".into(), json!(level.as_str()));
        data.insert("method_count".into(), json!(methods.len()));
        data.insert(
            "capabilities".into(),
            Value::Array(
                plan.capabilities_at(level)
                    .into_iter()
                    .map(|c| {
                        json!({
                            "name": c.name(),
                            "prefix": c.prefix(),
                            "entity": c.entity(),
                            "reach": c.reach().as_str(),
                        })
                    })
                    .collect(),
            ),
        );

        if let Some(builder) = self.def.data_builder() {
            data.extend(builder(task, methods));
        }
        Ok(data)
    }

    fn context_for(
        &self,
        methods: &[Method],
        data: &DataBag,
        target: Option<EmitTarget>,
        capability: Option<&str>,
        overrides: &DataBag,
    ) -> WeftResult<RenderContext> {
        let target = target.or(self.def.target()).unwrap_or(DEFAULT_TARGET);
        let selected: Vec<Method> = match capability {
            Some(name) => methods
                .iter()
                .filter(|m| m.capability == name)
                .cloned()
                .collect(),
            None => methods.to_vec(),
        };
        let emitted = emit_methods(&selected, target)?;
        Ok(RenderContext::new(data.clone(), emitted)
            .with("target", target.as_str())
            .merged(overrides))
    }

    fn skipped(
        &self,
        condition: Option<&SkipIf>,
        scope: &SpecScope<'_>,
        ctx: &RenderContext,
        path: &std::path::Path,
        env: &TaskEnv<'_>,
    ) -> bool {
        match condition {
            None => false,
            Some(SkipIf::Exists) => env.patcher().filesystem().exists(&env.root().join(path)),
            Some(SkipIf::NoMethods) => ctx.methods.is_empty(),
            Some(SkipIf::Falsy(key)) => match ctx.get(key) {
                None | Some(Value::Null) | Some(Value::Bool(false)) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            },
            Some(SkipIf::Custom(check)) => check(scope),
        }
    }

    fn run_output(
        &self,
        spec: &OutputSpec,
        scope: &SpecScope<'_>,
        env: &TaskEnv<'_>,
    ) -> WeftResult<()> {
        let ctx = self.context_for(
            scope.methods,
            scope.data,
            spec.target,
            spec.capability.as_deref(),
            &spec.context,
        )?;
        let path = interpolate(&spec.path, &ctx.data)?;
        if self.skipped(spec.skip_if.as_ref(), scope, &ctx, path.as_ref(), env) {
            debug!(path = %path, "output skipped");
            return Ok(());
        }
        let content = env.render(&spec.template, &ctx)?;
        let outcome = env.write_file(path.as_ref(), &content)?;
        debug!(path = %path, outcome = ?outcome, "output written");
        Ok(())
    }

    fn run_patch(&self, spec: &PatchSpec, scope: &SpecScope<'_>, env: &TaskEnv<'_>) -> WeftResult<()> {
        let ctx = self.context_for(
            scope.methods,
            scope.data,
            spec.target,
            spec.capability.as_deref(),
            &spec.context,
        )?;
        let path = interpolate(&spec.path, &ctx.data)?;
        if self.skipped(spec.skip_if.as_ref(), scope, &ctx, path.as_ref(), env) {
            debug!(path = %path, "patch skipped");
            return Ok(());
        }
        let block = interpolate(&spec.block, &ctx.data)?;
        let key = MarkerKey::new(self.def.name(), block)?;
        let content = env.render(&spec.template, &ctx)?;

        let mut patch = BlockPatch::new(path, key, content)
            .anchor(spec.anchor.clone())
            .create_if_missing(spec.create_if_missing);
        if let Some(language) = spec.language {
            patch = patch.language(language);
        }
        env.ensure_block(&patch)?;
        Ok(())
    }
}

fn ring_value(ring: &Ring) -> Value {
    json!({
        "name": ring.name(),
        "kind": ring.kind().as_str(),
        "export": ring.export(),
        "name_snake": to_snake_case(ring.name()),
        "name_pascal": to_pascal_case(ring.name()),
    })
}

impl Generator for CompiledTreadle {
    fn name(&self) -> &str {
        self.def.name()
    }

    fn scope(&self) -> Option<&str> {
        Some(self.def.name())
    }

    #[instrument(skip_all, fields(treadle = %self.def.name(), task = %task.label()))]
    fn generate(&self, task: &GenerationTask, env: &TaskEnv<'_>) -> WeftResult<()> {
        if !self.def.matches_pair(task.outer_kind, task.inner_kind) {
            debug!("kind pair not among match patterns");
            return Ok(());
        }
        if let Some(validate) = self.def.validator() {
            if !validate(task) {
                debug!("validation rejected task");
                return Ok(());
            }
        }

        let methods = self.methods(task)?;
        let data = self.data_bag(task, &methods)?;
        let scope = SpecScope {
            task,
            methods: &methods,
            data: &data,
        };

        // Phase 1
        let dynamic_outputs: Vec<OutputSpec> = self
            .def
            .output_sources()
            .iter()
            .flat_map(|source| source(&scope))
            .collect();
        for spec in self.def.outputs().iter().chain(&dynamic_outputs) {
            self.run_output(spec, &scope, env)?;
        }

        // Phase 2
        let dynamic_patches: Vec<PatchSpec> = self
            .def
            .patch_sources()
            .iter()
            .flat_map(|source| source(&scope))
            .collect();
        for spec in self.def.patches().iter().chain(&dynamic_patches) {
            self.run_patch(spec, &scope, env)?;
        }

        // Phase 3
        let ctx = HookupContext {
            task,
            data: &data,
            scope: self.def.name(),
            patcher: env.patcher(),
        };
        for hookup in self.def.hookups() {
            debug!(hookup = hookup.name(), "running hookup");
            hookup.apply(&ctx).map_err(|e| match e {
                WeftError::Application(_) | WeftError::Domain(_) => e,
                other => crate::application::ApplicationError::HookupFailed {
                    hookup: hookup.name().to_string(),
                    reason: other.to_string(),
                }
                .into(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockFilesystem, MockTemplateRenderer};
    use crate::application::services::patch_engine::{PatchEngine, WeaveSession};
    use crate::application::treadle::CustomHookup;
    use crate::domain::{
        Capability, CapabilityMethod, GeneratorMatrix, MethodParam, PlanBuilder, Reach, RingGraph,
        RingKind,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    fn plan_task(caps: Vec<Capability>) -> GenerationTask {
        let core = Ring::core("engine");
        let android = Ring::builder(RingKind::Android, "android")
            .export("app-android")
            .wraps(&core)
            .build()
            .unwrap();
        let graph = RingGraph::new().with_root("mobile", &android);
        let matrix = GeneratorMatrix::new().with(RingKind::Android, RingKind::Core, ());
        let plan = PlanBuilder::new(&graph, &caps).build(&matrix).finalize();
        plan.tasks()[0].clone()
    }

    fn bookmarks() -> Capability {
        Capability::declare(
            "BookmarkMgmt",
            Reach::Global,
            vec![
                CapabilityMethod::new("addBookmark")
                    .param(MethodParam::new("url", "string"))
                    .tag("crud:create"),
                CapabilityMethod::new("internalSync").tag("internal"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn methods_and_data_bag() {
        let task = plan_task(vec![bookmarks()]);
        let compiled = CompiledTreadle::compile(
            TreadleDefinition::builder("jni")
                .matches(RingKind::Android, RingKind::Core)
                .prefix_methods()
                .restructure_crud()
                .exclude_tag("internal")
                .data(|_, _| DataBag::from([("export".to_string(), json!("override"))]))
                .build()
                .unwrap(),
        )
        .unwrap();

        let methods = compiled.methods(&task).unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "bookmark_add_bookmark");

        let data = compiled.data_bag(&task, &methods).unwrap();
        assert_eq!(data["export"], "override");
        assert_eq!(data["export_pascal"], "AppAndroid");
        assert_eq!(data["outer"]["kind"], "android");
        assert_eq!(data["capabilities"][0]["prefix"], "bookmark");
    }

    #[test]
    fn phases_run_in_order() {
        let task = plan_task(vec![bookmarks()]);
        let calls = Arc::new(Mutex::new(Vec::<String>::new()));

        let mut renderer = MockTemplateRenderer::new();
        let seen = Arc::clone(&calls);
        renderer.expect_render().returning(move |id, _| {
            seen.lock().unwrap().push(format!("render:{id}"));
            Ok(format!("// {id}\n"))
        });

        // The patch target only exists once phase 1 has written it.
        let written = Arc::new(Mutex::new(Vec::<PathBuf>::new()));
        let mut fs = MockFilesystem::new();
        let w = Arc::clone(&written);
        fs.expect_exists()
            .returning(move |p| p == Path::new("/ws") || w.lock().unwrap().iter().any(|x| x == p));
        let w = Arc::clone(&written);
        let seen = Arc::clone(&calls);
        fs.expect_write_file().returning(move |p, _| {
            seen.lock().unwrap().push(format!("write:{}", p.display()));
            w.lock().unwrap().push(p.to_path_buf());
            Ok(())
        });
        fs.expect_read_file().returning(|_| Ok("// out.rs\n".to_string()));
        fs.expect_create_dir_all().returning(|_| Ok(()));

        let seen = Arc::clone(&calls);
        let compiled = CompiledTreadle::compile(
            TreadleDefinition::builder("jni")
                .matches(RingKind::Android, RingKind::Core)
                .output(OutputSpec::new("out.rs", "{export}/out.rs"))
                .patch(PatchSpec::new("block.rs", "{export}/out.rs", "methods"))
                .hookup(CustomHookup::new("record", move |_| {
                    seen.lock().unwrap().push("hookup".into());
                    Ok(())
                }))
                .build()
                .unwrap(),
        )
        .unwrap();

        let session = WeaveSession::new();
        let env = TaskEnv::new(PatchEngine::new(Path::new("/ws"), &fs, &session), &renderer);
        compiled.generate(&task, &env).unwrap();

        let calls = calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "render:out.rs".to_string(),
                "write:/ws/app-android/out.rs".to_string(),
                "render:block.rs".to_string(),
                "write:/ws/app-android/out.rs".to_string(),
                "hookup".to_string(),
            ]
        );
        assert!(session.was_touched(
            Path::new("app-android/out.rs"),
            &"jni:methods".parse().unwrap()
        ));
    }

    #[test]
    fn rejected_task_produces_nothing() {
        let task = plan_task(vec![bookmarks()]);
        let compiled = CompiledTreadle::compile(
            TreadleDefinition::builder("never")
                .matches(RingKind::Android, RingKind::Core)
                .validate(|_| false)
                .output(OutputSpec::new("x", "x.rs"))
                .build()
                .unwrap(),
        )
        .unwrap();

        let fs = MockFilesystem::new();
        let renderer = MockTemplateRenderer::new();
        let session = WeaveSession::new();
        let env = TaskEnv::new(PatchEngine::new(Path::new("/ws"), &fs, &session), &renderer);
        compiled.generate(&task, &env).unwrap();
    }

    #[test]
    fn unmapped_type_fails_the_task() {
        let cap = Capability::declare(
            "ClockMgmt",
            Reach::Global,
            vec![CapabilityMethod::new("now").returns("instant")],
        )
        .unwrap();
        let task = plan_task(vec![cap]);
        let compiled = CompiledTreadle::compile(
            TreadleDefinition::builder("kt")
                .matches(RingKind::Android, RingKind::Core)
                .target(EmitTarget::Kotlin)
                .output(OutputSpec::new("x", "x.kt"))
                .build()
                .unwrap(),
        )
        .unwrap();

        let fs = MockFilesystem::new();
        let renderer = MockTemplateRenderer::new();
        let session = WeaveSession::new();
        let env = TaskEnv::new(PatchEngine::new(Path::new("/ws"), &fs, &session), &renderer);
        let err = compiled.generate(&task, &env).unwrap_err();
        assert!(matches!(
            err,
            WeftError::Domain(DomainError::UnmappedType { .. })
        ));
    }
}
