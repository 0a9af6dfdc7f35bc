//! Implementation of the `weft weave` command.
//!
//! Responsibility: turn CLI arguments and config into a `WeaveConfig`, wire
//! the local adapters, run the weave and print its report. No weaving logic
//! lives here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use weft_adapters::{HandlebarsRenderer, JsonManifestStore, LocalFilesystem};
use weft_core::application::{FileStatus, WeaveConfig, WeaveReport, WeaveService};

use crate::{
    cli::{GlobalArgs, Verbosity, WeaveArgs},
    commands::workspace,
    config::AppConfig,
    error::{CliError, CliResult},
    output::{OutputManager, Tone},
};

/// JSON document printed by `weft weave --json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    started_at: DateTime<Utc>,
    elapsed_ms: i64,
    #[serde(flatten)]
    report: &'a WeaveReport,
}

/// Execute the `weft weave` command.
///
/// Exits non-zero when any task failed, after the full report was printed.
#[instrument(skip_all, fields(root = %args.workspace.root.display()))]
pub fn execute(
    args: WeaveArgs,
    global: &GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let ws = workspace::load(&args.workspace, &config)?;

    let templates = AppConfig::resolve(
        &ws.root,
        args.templates.as_deref().unwrap_or(&config.weave.templates),
    );
    let renderer = if templates.is_dir() {
        HandlebarsRenderer::from_dir(&templates)?
    } else {
        warn!(dir = %templates.display(), "templates directory not found");
        HandlebarsRenderer::new()
    };

    let mut weave_config = WeaveConfig::new(&ws.root)
        .parallel(args.parallel || config.weave.parallel)
        .sweep(!args.no_sweep && config.weave.sweep)
        .verbose(global.verbosity() >= Verbosity::Verbose)
        .manifest_path(&config.weave.markers);
    if let Some(package) = args.package {
        weave_config = weave_config.package(package);
    }

    let matrix = ws.manifest.matrix()?;
    let service = WeaveService::new(
        Box::new(LocalFilesystem::new()),
        Box::new(renderer),
        Box::new(JsonManifestStore::new(
            weave_config.resolved_manifest_path(),
        )),
    );

    let started_at = Utc::now();
    let report = service.weave(
        &ws.manifest.graph,
        &ws.manifest.capabilities,
        &matrix,
        &weave_config,
    );
    let elapsed_ms = (Utc::now() - started_at).num_milliseconds();
    info!(elapsed_ms, run_id = %report.run_id, "weave complete");

    if args.workspace.json || output.wants_json() {
        output.json(&JsonReport {
            started_at,
            elapsed_ms,
            report: &report,
        })?;
    } else {
        print_report(&report, &weave_config, global.verbosity(), &output)?;
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::WeaveFailed {
            failed: report.errors.len(),
            tasks: report.tasks_run,
        })
    }
}

// ── Human report ──────────────────────────────────────────────────────────────

fn print_report(
    report: &WeaveReport,
    config: &WeaveConfig,
    verbosity: Verbosity,
    output: &OutputManager,
) -> CliResult<()> {
    output.header(&format!("Weaving {}", config.root.display()))?;
    if let Some(package) = &config.package {
        output.info(&format!(
            "package '{package}': {} task(s) run, {} filtered out",
            report.tasks_run, report.tasks_filtered
        ))?;
    }

    for file in report.files.iter().filter(|f| verbosity.shows(f.status)) {
        let tone = match file.status {
            FileStatus::Generated => Tone::Good,
            FileStatus::Modified => Tone::Warn,
            FileStatus::Unchanged => Tone::Neutral,
        };
        output.status(&file.status.to_string(), tone, &file.path.display().to_string())?;
    }
    for removed in &report.removed_blocks {
        output.status(
            "removed",
            Tone::Warn,
            &format!("{} [{}]", removed.path.display(), removed.block),
        )?;
    }
    for error in &report.errors {
        output.error(&error.to_string())?;
    }

    if report.sweep_skipped {
        output.info("orphan sweep skipped")?;
    }

    let summary = format!(
        "{} generated, {} modified, {} unchanged, {} block(s) removed",
        report.files_generated,
        report.files_modified,
        report.files_unchanged,
        report.removed_blocks.len()
    );
    if report.is_success() {
        output.success(&summary)?;
    } else {
        output.warning(&summary)?;
    }
    Ok(())
}
