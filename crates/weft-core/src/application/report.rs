//! Weave results.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::MarkerKey;
use crate::error::{ErrorCategory, WeftError};

/// What a run did to one file, judged by its content before the run
/// against its content after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Did not exist before the run.
    Generated,
    /// Existed and its content changed.
    Modified,
    /// Written to or patched, but byte-identical at the end.
    Unchanged,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generated => "generated",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedBlock {
    pub path: PathBuf,
    pub block: MarkerKey,
}

/// A failure attributed to one task (or to the sweep).
#[derive(Debug, Clone, Serialize)]
pub struct TaskError {
    pub task: String,
    pub message: String,
    #[serde(skip)]
    pub error: WeftError,
}

impl TaskError {
    pub fn new(task: impl Into<String>, error: impl Into<WeftError>) -> Self {
        let error = error.into();
        Self {
            task: task.into(),
            message: error.to_string(),
            error,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.message)
    }
}

/// Aggregate result of one weave. Always produced, even when tasks fail.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaveReport {
    pub run_id: String,
    pub files_generated: usize,
    pub files_modified: usize,
    pub files_unchanged: usize,
    pub tasks_run: usize,
    /// Tasks excluded by the package filter.
    pub tasks_filtered: usize,
    pub files: Vec<FileReport>,
    pub removed_blocks: Vec<RemovedBlock>,
    pub sweep_skipped: bool,
    pub errors: Vec<TaskError>,
}

impl WeaveReport {
    pub fn push_file(&mut self, path: PathBuf, status: FileStatus) {
        match status {
            FileStatus::Generated => self.files_generated += 1,
            FileStatus::Modified => self.files_modified += 1,
            FileStatus::Unchanged => self.files_unchanged += 1,
        }
        self.files.push(FileReport { path, status });
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Files whose content changed in this run.
    pub fn changed(&self) -> usize {
        self.files_generated + self.files_modified
    }
}
