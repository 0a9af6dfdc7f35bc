//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod global;
pub use global::{GlobalArgs, OutputFormat, Verbosity};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "weft",
    bin_name = "weft",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Weave glue code between the rings of a layered application",
    long_about = "Weft reads a ring graph and capability declarations from \
                  weft.toml and generates the bridging code each ring needs, \
                  patching hand-written files through idempotent marker blocks.",
    after_help = "EXAMPLES:\n\
        \x20 weft plan\n\
        \x20 weft weave\n\
        \x20 weft weave --package app-android --json\n\
        \x20 weft init --local",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every matched generator and patch the workspace.
    #[command(
        visible_alias = "w",
        about = "Weave the workspace",
        after_help = "EXAMPLES:\n\
            \x20 weft weave\n\
            \x20 weft weave --root ../app --parallel\n\
            \x20 weft weave --package plugin --no-sweep\n\
            \x20 weft weave --json > report.json"
    )]
    Weave(WeaveArgs),

    /// Print the plan without writing anything.
    #[command(
        visible_alias = "p",
        about = "Show edges and tasks",
        after_help = "EXAMPLES:\n\
            \x20 weft plan\n\
            \x20 weft plan --json"
    )]
    Plan(PlanArgs),

    /// Initialise a Weft configuration file.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 weft init           # default location\n\
            \x20 weft init --local   # .weftrc.toml in CWD\n\
            \x20 weft init --manifest  # also write a starter weft.toml"
    )]
    Init(InitArgs),

    /// Inspect the Weft configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 weft config get weave.templates\n\
            \x20 weft config list\n\
            \x20 weft config path"
    )]
    Config(ConfigCommands),
}

// ── shared ────────────────────────────────────────────────────────────────────

/// Where the workspace and its manifest live.
#[derive(Debug, Args)]
pub struct WorkspaceArgs {
    /// Workspace root.
    #[arg(
        short = 'r',
        long = "root",
        value_name = "DIR",
        default_value = ".",
        help = "Workspace root"
    )]
    pub root: PathBuf,

    /// Architecture manifest, relative to the root.
    #[arg(
        short = 'm',
        long = "manifest",
        value_name = "FILE",
        help = "Architecture manifest (default: weft.toml)"
    )]
    pub manifest: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long = "json", help = "Print JSON")]
    pub json: bool,
}

// ── weave ─────────────────────────────────────────────────────────────────────

/// Arguments for `weft weave`.
#[derive(Debug, Args)]
pub struct WeaveArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Templates directory, relative to the root.
    #[arg(
        short = 't',
        long = "templates",
        value_name = "DIR",
        help = "Templates directory (default: templates)"
    )]
    pub templates: Option<PathBuf>,

    /// Only run tasks for this export or ring.
    #[arg(
        short = 'p',
        long = "package",
        value_name = "NAME",
        help = "Only weave one package (disables the sweep)"
    )]
    pub package: Option<String>,

    /// Run tasks on a thread pool.
    #[arg(long = "parallel", help = "Run tasks in parallel")]
    pub parallel: bool,

    /// Keep blocks no generator touched.
    #[arg(long = "no-sweep", help = "Do not remove orphaned marker blocks")]
    pub no_sweep: bool,
}

// ── plan ──────────────────────────────────────────────────────────────────────

/// Arguments for `weft plan`.
#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

// ── init ──────────────────────────────────────────────────────────────────────

/// Arguments for `weft init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Write to the global config location.
    #[arg(
        long = "global",
        conflicts_with = "local",
        help = "Create global configuration"
    )]
    pub global: bool,

    /// Write to `.weftrc.toml` in the current directory.
    #[arg(
        long = "local",
        help = "Create local configuration in current directory"
    )]
    pub local: bool,

    /// Also write a starter `weft.toml`.
    #[arg(long = "manifest", help = "Also create a starter weft.toml")]
    pub manifest: bool,

    /// Overwrite existing files.
    #[arg(short = 'f', long = "force", help = "Overwrite existing files")]
    pub force: bool,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `weft config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `weave.templates`.
        key: String,
    },
    /// Print all configuration values.
    List,
    /// Print the path to the active configuration file.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_weave_command() {
        let cli = Cli::parse_from([
            "weft",
            "weave",
            "--root",
            "ws",
            "--package",
            "plugin",
            "--parallel",
            "--no-sweep",
        ]);
        let Commands::Weave(args) = cli.command else {
            panic!("expected Weave command");
        };
        assert_eq!(args.workspace.root, PathBuf::from("ws"));
        assert_eq!(args.package.as_deref(), Some("plugin"));
        assert!(args.parallel);
        assert!(args.no_sweep);
        assert!(!args.workspace.json);
    }

    #[test]
    fn root_defaults_to_cwd() {
        let cli = Cli::parse_from(["weft", "plan", "--json"]);
        let Commands::Plan(args) = cli.command else {
            panic!("expected Plan command");
        };
        assert_eq!(args.workspace.root, PathBuf::from("."));
        assert!(args.workspace.json);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["weft", "weave", "-vv", "--no-color"]);
        assert_eq!(cli.global.verbose, 2);
        assert!(cli.global.no_color);
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["weft", "--quiet", "--verbose", "plan"]);
        assert!(result.is_err());
    }

    #[test]
    fn init_global_and_local_conflict() {
        let result = Cli::try_parse_from(["weft", "init", "--global", "--local"]);
        assert!(result.is_err());
    }
}
