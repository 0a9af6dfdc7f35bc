//! Implementation of the `weft plan` command.

use serde::Serialize;
use tracing::instrument;

use weft_core::application::Generator as _;
use weft_core::domain::PlanBuilder;

use crate::{
    cli::PlanArgs,
    commands::workspace,
    config::AppConfig,
    error::CliResult,
    output::{OutputManager, Tone},
};

#[derive(Debug, Serialize)]
struct PlanView {
    edges: Vec<String>,
    tasks: Vec<TaskView>,
    capabilities: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TaskView {
    label: String,
    generator: String,
    export: String,
}

/// Build and print the plan without running any generator.
#[instrument(skip_all, fields(root = %args.workspace.root.display()))]
pub fn execute(args: PlanArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let ws = workspace::load(&args.workspace, &config)?;
    let matrix = ws.manifest.matrix()?;
    let plan = PlanBuilder::new(&ws.manifest.graph, &ws.manifest.capabilities)
        .build(&matrix)
        .finalize();

    let view = PlanView {
        edges: plan.edges().iter().map(|e| e.label()).collect(),
        tasks: plan
            .tasks()
            .iter()
            .map(|task| TaskView {
                label: task.label(),
                generator: matrix
                    .lookup(task.outer_kind, task.inner_kind)
                    .map(|g| g.name().to_string())
                    .unwrap_or_default(),
                export: task.export.clone(),
            })
            .collect(),
        capabilities: plan
            .capabilities()
            .iter()
            .map(|c| format!("{} ({})", c.name(), c.reach()))
            .collect(),
    };

    if args.workspace.json || output.wants_json() {
        output.json(&view)?;
        return Ok(());
    }

    output.header(&format!("Plan for {}", ws.manifest_path.display()))?;
    output.print(&format!("Edges ({}):", view.edges.len()))?;
    for edge in &view.edges {
        output.print(&format!("  {edge}"))?;
    }
    output.print(&format!("Tasks ({}):", view.tasks.len()))?;
    for task in &view.tasks {
        output.status(&task.generator, Tone::Neutral, &task.label)?;
    }
    if view.tasks.is_empty() {
        output.warning("no edge matched a registered treadle")?;
    }
    output.print(&format!("Capabilities: {}", view.capabilities.join(", ")))?;
    Ok(())
}
