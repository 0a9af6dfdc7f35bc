//! Idempotent Patch Engine - file writes, marker blocks and orphan cleanup.
//!
//! Two pieces:
//!
//! - [`PatchEngine`]: the per-task view used by generators. Writes whole
//!   files and ensures marker blocks, serializing access per file.
//! - [`WeaveSession`]: the run-scoped registry. Records the original content
//!   of every file before its first write and every `(path, scope, block)`
//!   touched. [`WeaveSession::finish`] consumes it, so the sweep runs
//!   exactly once per weave.
//!
//! All paths given to the engine are workspace-relative.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::ApplicationError;
use crate::application::manifest::MarkerManifest;
use crate::application::ports::{Filesystem, ManifestStore};
use crate::application::report::{FileStatus, RemovedBlock, TaskError};
use crate::domain::marker::{apply_block, remove_blocks, scan_blocks};
use crate::domain::{Anchor, DomainError, Language, MarkerKey, PatchOutcome};
use crate::error::WeftResult;

// ── Requests ─────────────────────────────────────────────────────────────────

/// One `ensure_block` request.
#[derive(Debug, Clone)]
pub struct BlockPatch {
    pub path: PathBuf,
    pub key: MarkerKey,
    /// Comment syntax. Detected from the extension when absent.
    pub language: Option<Language>,
    pub content: String,
    pub anchor: Anchor,
    pub create_if_missing: bool,
}

impl BlockPatch {
    pub fn new(path: impl Into<PathBuf>, key: MarkerKey, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key,
            language: None,
            content: content.into(),
            anchor: Anchor::EndOfFile,
            create_if_missing: false,
        }
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    fn resolve_language(&self) -> WeftResult<Language> {
        self.language
            .or_else(|| Language::detect(&self.path))
            .ok_or_else(|| {
                DomainError::UnknownLanguage(format!(
                    "cannot infer comment syntax for {}",
                    self.path.display()
                ))
                .into()
            })
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SessionState {
    touched: BTreeMap<PathBuf, BTreeSet<MarkerKey>>,
    /// Content before this run's first write. `None` if the file was absent.
    originals: BTreeMap<PathBuf, Option<String>>,
    failed_scopes: BTreeSet<String>,
}

/// Run-scoped block registry. Built per weave, shared by reference with
/// every task, consumed by [`WeaveSession::finish`].
#[derive(Debug)]
pub struct WeaveSession {
    run_id: Uuid,
    state: Mutex<SessionState>,
    file_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Default for WeaveSession {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> ApplicationError {
    ApplicationError::StoreLockError
}

/// Reject paths that would resolve outside the root once joined to it.
fn confine(path: &Path) -> Result<(), ApplicationError> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(ApplicationError::PathOutsideRoot {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

impl WeaveSession {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: Mutex::new(SessionState::default()),
            file_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn state(&self) -> WeftResult<MutexGuard<'_, SessionState>> {
        Ok(self.state.lock().map_err(poisoned)?)
    }

    fn file_lock(&self, path: &Path) -> WeftResult<Arc<Mutex<()>>> {
        let mut locks = self.file_locks.lock().map_err(poisoned)?;
        Ok(Arc::clone(locks.entry(path.to_path_buf()).or_default()))
    }

    fn remember_original(&self, path: &Path, content: Option<&str>) -> WeftResult<()> {
        self.state()?
            .originals
            .entry(path.to_path_buf())
            .or_insert_with(|| content.map(str::to_string));
        Ok(())
    }

    fn touch(&self, path: &Path, key: &MarkerKey) -> WeftResult<()> {
        self.state()?
            .touched
            .entry(path.to_path_buf())
            .or_default()
            .insert(key.clone());
        Ok(())
    }

    /// Blocks of `scope` survive this run's sweep even if untouched.
    pub fn mark_scope_failed(&self, scope: &str) -> WeftResult<()> {
        self.state()?.failed_scopes.insert(scope.to_string());
        Ok(())
    }

    pub fn was_touched(&self, path: &Path, key: &MarkerKey) -> bool {
        self.state()
            .map(|s| s.touched.get(path).is_some_and(|keys| keys.contains(key)))
            .unwrap_or(false)
    }

    /// End the run: sweep orphan blocks (when `sweep` is set), update the
    /// manifest and compute the status of every file this run wrote.
    #[instrument(skip_all, fields(run_id = %self.run_id, sweep = sweep))]
    pub fn finish(
        self,
        root: &Path,
        fs: &dyn Filesystem,
        store: &dyn ManifestStore,
        sweep: bool,
    ) -> SessionOutcome {
        let run_id = self.run_id;
        let mut state = match self.state.into_inner() {
            Ok(state) => state,
            Err(poison) => poison.into_inner(),
        };
        let mut outcome = SessionOutcome::default();

        let previous = match store.load() {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(error = %e, "marker manifest unreadable; orphan cleanup limited to touched files");
                outcome.errors.push(TaskError::new("sweep", e));
                None
            }
        };
        let base = previous.clone().unwrap_or_default();

        let manifest = if sweep {
            sweep_orphans(root, fs, &base, &mut state, &mut outcome)
        } else {
            info!("orphan sweep skipped; merging touched blocks into manifest");
            outcome.sweep_skipped = true;
            let mut merged = base.clone();
            for (path, keys) in &state.touched {
                merged.merge(path.clone(), keys.iter().cloned());
            }
            merged
        };

        // An unreadable manifest is left for the user to inspect.
        if previous.as_ref().is_some_and(|prev| *prev != manifest) {
            if let Err(e) = store.save(&manifest) {
                warn!(error = %e, "failed to save marker manifest");
                outcome.errors.push(TaskError::new("sweep", e));
            }
        }

        for (path, original) in &state.originals {
            let current = fs.read_file(&root.join(path)).ok();
            let status = match (original, current) {
                (None, _) => FileStatus::Generated,
                (Some(before), Some(after)) if *before == after => FileStatus::Unchanged,
                (Some(_), _) => FileStatus::Modified,
            };
            outcome.files.push((path.clone(), status));
        }

        debug!(%run_id, files = outcome.files.len(), removed = outcome.removed.len(), "session finished");
        outcome
    }
}

/// What [`WeaveSession::finish`] found.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    pub files: Vec<(PathBuf, FileStatus)>,
    pub removed: Vec<RemovedBlock>,
    pub sweep_skipped: bool,
    pub errors: Vec<TaskError>,
}

fn sweep_orphans(
    root: &Path,
    fs: &dyn Filesystem,
    previous: &MarkerManifest,
    state: &mut SessionState,
    outcome: &mut SessionOutcome,
) -> MarkerManifest {
    let mut manifest = MarkerManifest::new();
    let candidates: BTreeSet<PathBuf> = previous
        .paths()
        .map(Path::to_path_buf)
        .chain(state.touched.keys().cloned())
        .collect();

    for path in candidates {
        let full = root.join(&path);
        if !fs.exists(&full) {
            debug!(path = %path.display(), "manifest file no longer exists");
            continue;
        }
        let text = match fs.read_file(&full) {
            Ok(text) => text,
            Err(e) => {
                outcome.errors.push(TaskError::new("sweep", e));
                keep_previous(&mut manifest, previous, &path);
                continue;
            }
        };

        let touched = state.touched.get(&path);
        let failed = &state.failed_scopes;
        let keep = |key: &MarkerKey| {
            touched.is_some_and(|keys| keys.contains(key)) || failed.contains(key.scope())
        };

        let (swept, removed) = match remove_blocks(&text, keep) {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt markers; file left untouched by sweep");
                outcome
                    .errors
                    .push(TaskError::new(format!("sweep:{}", path.display()), e));
                keep_previous(&mut manifest, previous, &path);
                continue;
            }
        };

        if !removed.is_empty() {
            state
                .originals
                .entry(path.clone())
                .or_insert_with(|| Some(text.clone()));
            if let Err(e) = fs.write_file(&full, &swept) {
                outcome.errors.push(TaskError::new("sweep", e));
                keep_previous(&mut manifest, previous, &path);
                continue;
            }
            for block in removed {
                info!(path = %path.display(), block = %block, "removed orphan block");
                outcome.removed.push(RemovedBlock {
                    path: path.clone(),
                    block,
                });
            }
        }

        // Well-formed after a successful removal, so this cannot fail.
        let remaining = scan_blocks(&swept)
            .map(|spans| spans.into_iter().map(|s| s.key).collect())
            .unwrap_or_default();
        manifest.set(path, remaining);
    }
    manifest
}

fn keep_previous(manifest: &mut MarkerManifest, previous: &MarkerManifest, path: &Path) {
    if let Some(blocks) = previous.blocks(path) {
        manifest.set(path.to_path_buf(), blocks.clone());
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// File writes and block patches for one task.
#[derive(Clone, Copy)]
pub struct PatchEngine<'a> {
    root: &'a Path,
    fs: &'a dyn Filesystem,
    session: &'a WeaveSession,
}

impl<'a> PatchEngine<'a> {
    pub fn new(root: &'a Path, fs: &'a dyn Filesystem, session: &'a WeaveSession) -> Self {
        Self { root, fs, session }
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    pub fn filesystem(&self) -> &'a dyn Filesystem {
        self.fs
    }

    pub fn session(&self) -> &'a WeaveSession {
        self.session
    }

    fn read_existing(&self, full: &Path) -> WeftResult<Option<String>> {
        if self.fs.exists(full) {
            self.fs.read_file(full).map(Some)
        } else {
            Ok(None)
        }
    }

    fn ensure_parent(&self, full: &Path) -> WeftResult<()> {
        match full.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !self.fs.exists(parent) => {
                self.fs.create_dir_all(parent)
            }
            _ => Ok(()),
        }
    }

    /// Overwrite a whole file. Skips the write when content is identical.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn write_file(&self, path: &Path, content: &str) -> WeftResult<PatchOutcome> {
        confine(path)?;
        let full = self.root.join(path);
        let lock = self.session.file_lock(path)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let existing = self.read_existing(&full)?;
        self.session.remember_original(path, existing.as_deref())?;

        match existing {
            Some(current) if current == content => {
                debug!("file unchanged");
                Ok(PatchOutcome::Unchanged)
            }
            Some(_) => {
                self.fs.write_file(&full, content)?;
                Ok(PatchOutcome::Updated)
            }
            None => {
                self.ensure_parent(&full)?;
                self.fs.write_file(&full, content)?;
                Ok(PatchOutcome::Inserted)
            }
        }
    }

    /// Insert or replace the block described by `patch` and register it as
    /// touched for this run.
    ///
    /// # Errors
    ///
    /// - `PathOutsideRoot` if the path is absolute or contains `..`
    /// - `PatchTargetMissing` if the file is absent and creation is not allowed
    /// - `MarkerCorruption` if the file's markers are malformed; the file is not written
    /// - `AnchorNotFound` if the anchor pattern matches no line
    #[instrument(skip_all, fields(path = %patch.path.display(), block = %patch.key))]
    pub fn ensure_block(&self, patch: &BlockPatch) -> WeftResult<PatchOutcome> {
        confine(&patch.path)?;
        let language = patch.resolve_language()?;
        let full = self.root.join(&patch.path);
        let lock = self.session.file_lock(&patch.path)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let existing = self.read_existing(&full)?;
        if existing.is_none() && !patch.create_if_missing {
            return Err(ApplicationError::PatchTargetMissing {
                path: patch.path.clone(),
            }
            .into());
        }

        let text = existing.as_deref().unwrap_or("");
        let (updated, outcome) = apply_block(text, &patch.key, language, &patch.content, &patch.anchor)?;

        self.session.remember_original(&patch.path, existing.as_deref())?;
        self.session.touch(&patch.path, &patch.key)?;

        if outcome.changed() || existing.is_none() {
            if existing.is_none() {
                self.ensure_parent(&full)?;
            }
            self.fs.write_file(&full, &updated)?;
        }
        debug!(outcome = ?outcome, "block ensured");
        Ok(outcome)
    }
}
