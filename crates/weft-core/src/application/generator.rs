//! Generators and the environment they run in.
//!
//! A generator is whatever the matrix maps an ordered ring-kind pair to. Two
//! kinds ship with the crate: [`FnGenerator`], a plain function returning
//! whole files, and the compiled treadle from
//! `services::treadle_compiler`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::ports::TemplateRenderer;
use crate::application::services::patch_engine::{BlockPatch, PatchEngine};
use crate::domain::{GenerationTask, GeneratorMatrix, PatchOutcome, RenderContext};
use crate::error::WeftResult;

/// A whole file produced by a generator. `path` is workspace-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Everything a task may touch. Shared by reference across tasks.
#[derive(Clone, Copy)]
pub struct TaskEnv<'a> {
    patcher: PatchEngine<'a>,
    renderer: &'a dyn TemplateRenderer,
}

impl<'a> TaskEnv<'a> {
    pub fn new(patcher: PatchEngine<'a>, renderer: &'a dyn TemplateRenderer) -> Self {
        Self { patcher, renderer }
    }

    pub fn root(&self) -> &Path {
        self.patcher.root()
    }

    pub fn patcher(&self) -> PatchEngine<'a> {
        self.patcher
    }

    pub fn render(&self, template: &str, context: &RenderContext) -> WeftResult<String> {
        self.renderer.render(template, context)
    }

    pub fn write_file(&self, path: &Path, content: &str) -> WeftResult<PatchOutcome> {
        self.patcher.write_file(path, content)
    }

    pub fn ensure_block(&self, patch: &BlockPatch) -> WeftResult<PatchOutcome> {
        self.patcher.ensure_block(patch)
    }
}

pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    /// Run for one task. Errors are recorded against the task; the weave
    /// carries on with the others.
    fn generate(&self, task: &GenerationTask, env: &TaskEnv<'_>) -> WeftResult<()>;

    /// Marker scope owned by this generator, if it writes blocks.
    fn scope(&self) -> Option<&str> {
        None
    }
}

/// The matrix as the weave service uses it.
pub type Matrix = GeneratorMatrix<Arc<dyn Generator>>;

type GenerateFn = dyn Fn(&GenerationTask) -> WeftResult<Vec<GeneratedFile>> + Send + Sync;

/// Generator from a plain function. Returned files overwrite wholesale.
pub struct FnGenerator {
    name: String,
    run: Box<GenerateFn>,
}

impl FnGenerator {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&GenerationTask) -> WeftResult<Vec<GeneratedFile>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn shared(self) -> Arc<dyn Generator> {
        Arc::new(self)
    }
}

impl fmt::Debug for FnGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGenerator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Generator for FnGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, task: &GenerationTask, env: &TaskEnv<'_>) -> WeftResult<()> {
        for file in (self.run)(task)? {
            env.write_file(&file.path, &file.content)?;
        }
        Ok(())
    }
}
