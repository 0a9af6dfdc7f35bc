//! Weave Service - main application orchestrator.
//!
//! One weave is:
//! 1. Build the draft plan and finalize it before any task runs
//! 2. Drop tasks outside the package filter
//! 3. Dispatch every task to its generator, sequentially or in parallel
//! 4. Consume the session: orphan sweep, manifest update, file statuses
//!
//! A failing task is recorded and the run carries on. The report is always
//! produced.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, error, info, info_span, instrument};

use crate::application::generator::{Matrix, TaskEnv};
use crate::application::ports::{Filesystem, ManifestStore, TemplateRenderer};
use crate::application::report::{TaskError, WeaveReport};
use crate::application::services::patch_engine::{PatchEngine, WeaveSession};
use crate::domain::{Capability, GenerationTask, PlanBuilder, RingGraph, WeavingPlan};

/// Default location of the marker manifest, relative to the workspace root.
pub const DEFAULT_MANIFEST_PATH: &str = ".weft/markers.json";

/// Settings for one weave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaveConfig {
    pub root: PathBuf,
    /// Only run tasks whose export (or outer ring name) equals this.
    pub package: Option<String>,
    pub verbose: bool,
    pub parallel: bool,
    /// Remove untouched blocks at the end of the run.
    pub sweep: bool,
    pub manifest_path: PathBuf,
}

impl WeaveConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            package: None,
            verbose: false,
            parallel: false,
            sweep: true,
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
        }
    }

    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn sweep(mut self, sweep: bool) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Manifest location resolved against the root.
    pub fn resolved_manifest_path(&self) -> PathBuf {
        if self.manifest_path.is_absolute() {
            self.manifest_path.clone()
        } else {
            self.root.join(&self.manifest_path)
        }
    }

    /// The sweep only runs on a full, unfiltered pass.
    pub fn sweep_enabled(&self) -> bool {
        self.sweep && self.package.is_none()
    }

    fn selects(&self, task: &GenerationTask) -> bool {
        match &self.package {
            Some(package) => task.export == *package || task.outer.name() == package,
            None => true,
        }
    }
}

/// Main weave service.
///
/// Holds the adapters; the graph, capabilities and matrix are per call.
pub struct WeaveService {
    filesystem: Box<dyn Filesystem>,
    renderer: Box<dyn TemplateRenderer>,
    manifest: Box<dyn ManifestStore>,
}

impl WeaveService {
    /// Create a new weave service with the given adapters.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use weft_core::application::{WeaveService, ports::*};
    ///
    /// let service = WeaveService::new(
    ///     filesystem, // impl Filesystem
    ///     renderer,   // impl TemplateRenderer
    ///     manifest,   // impl ManifestStore
    /// );
    /// ```
    pub fn new(
        filesystem: Box<dyn Filesystem>,
        renderer: Box<dyn TemplateRenderer>,
        manifest: Box<dyn ManifestStore>,
    ) -> Self {
        Self {
            filesystem,
            renderer,
            manifest,
        }
    }

    /// Build and finalize the plan without running anything.
    #[instrument(skip_all)]
    pub fn plan(
        &self,
        graph: &RingGraph,
        capabilities: &[Capability],
        matrix: &Matrix,
    ) -> WeavingPlan {
        let plan = PlanBuilder::new(graph, capabilities)
            .build(matrix)
            .finalize();
        info!(
            edges = plan.edges().len(),
            tasks = plan.tasks().len(),
            "plan finalized"
        );
        plan
    }

    /// Run a full weave.
    pub fn weave(
        &self,
        graph: &RingGraph,
        capabilities: &[Capability],
        matrix: &Matrix,
        config: &WeaveConfig,
    ) -> WeaveReport {
        let session = WeaveSession::new();
        let run_id = session.run_id();
        let span = info_span!("weave", %run_id, root = %config.root.display());
        let _enter = span.enter();

        let plan = self.plan(graph, capabilities, matrix);
        let total = plan.tasks().len();
        let tasks: Vec<GenerationTask> = plan
            .into_tasks()
            .into_iter()
            .filter(|task| config.selects(task))
            .collect();

        let mut report = WeaveReport {
            run_id: run_id.to_string(),
            tasks_run: tasks.len(),
            tasks_filtered: total - tasks.len(),
            ..WeaveReport::default()
        };
        if let Some(package) = &config.package {
            info!(package = %package, selected = tasks.len(), total, "package filter applied");
        }

        let env = TaskEnv::new(
            PatchEngine::new(&config.root, self.filesystem.as_ref(), &session),
            self.renderer.as_ref(),
        );
        let run = |task: &GenerationTask| run_task(task, matrix, &env, &session);
        let errors: Vec<TaskError> = if config.parallel {
            tasks.par_iter().filter_map(run).collect()
        } else {
            tasks.iter().filter_map(run).collect()
        };
        report.errors = errors;

        let outcome = session.finish(
            &config.root,
            self.filesystem.as_ref(),
            self.manifest.as_ref(),
            config.sweep_enabled(),
        );
        for (path, status) in outcome.files {
            if config.verbose {
                info!(path = %path.display(), %status, "file");
            }
            report.push_file(path, status);
        }
        report.removed_blocks = outcome.removed;
        report.sweep_skipped = outcome.sweep_skipped;
        report.errors.extend(outcome.errors);

        info!(
            generated = report.files_generated,
            modified = report.files_modified,
            unchanged = report.files_unchanged,
            removed = report.removed_blocks.len(),
            errors = report.errors.len(),
            "weave finished"
        );
        report
    }
}

fn run_task(
    task: &GenerationTask,
    matrix: &Matrix,
    env: &TaskEnv<'_>,
    session: &WeaveSession,
) -> Option<TaskError> {
    let label = task.label();
    let Some(generator) = matrix.lookup(task.outer_kind, task.inner_kind) else {
        debug!(task = %label, "generator no longer registered");
        return None;
    };

    debug!(task = %label, generator = generator.name(), "running task");
    match generator.generate(task, env) {
        Ok(()) => None,
        Err(e) => {
            error!(task = %label, generator = generator.name(), error = %e, "task failed");
            if let Some(scope) = generator.scope() {
                if let Err(lock) = session.mark_scope_failed(scope) {
                    return Some(TaskError::new(label, lock));
                }
            }
            Some(TaskError::new(label, e))
        }
    }
}
