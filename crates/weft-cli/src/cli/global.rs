//! Flags shared by every subcommand, and the [`Verbosity`] they resolve to.
//!
//! Verbosity drives two things at once: the tracing filter installed by
//! `logging` and how much of a weave report is printed.

use std::path::PathBuf;

use clap::{ArgAction, Args, ValueEnum};
use weft_core::application::FileStatus;

#[derive(Debug, Args)]
pub struct GlobalArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help = "More output: -v lists unchanged files, -vv debug logs, -vvv trace"
    )]
    pub verbose: u8,

    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Only errors; JSON documents are still printed"
    )]
    pub quiet: bool,

    /// Honours `NO_COLOR` (<https://no-color.org>).
    #[arg(long = "no-color", global = true, env = "NO_COLOR", value_parser = clap::builder::FalseyValueParser::new(), help = "Disable colored output")]
    pub no_color: bool,

    #[arg(
        short = 'c',
        long = "config",
        global = true,
        value_name = "FILE",
        help = "Read settings from FILE instead of .weftrc.toml or the user config"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long = "output-format",
        global = true,
        value_enum,
        default_value = "auto",
        help = "Report format"
    )]
    pub output_format: OutputFormat,
}

impl GlobalArgs {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            return Verbosity::Quiet;
        }
        match self.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            2 => Verbosity::Debug,
            _ => Verbosity::Trace,
        }
    }
}

/// How the CLI renders its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human on a terminal, plain when piped.
    #[default]
    Auto,
    Human,
    Plain,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
    Trace,
}

impl Verbosity {
    /// Tracing level for the weft crates.
    pub fn level(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Whether a weave report line for a file with `status` is printed.
    /// Changed files always are; unchanged ones from `-v` up.
    pub fn shows(self, status: FileStatus) -> bool {
        match status {
            FileStatus::Generated | FileStatus::Modified => self > Self::Quiet,
            FileStatus::Unchanged => self >= Self::Verbose,
        }
    }

    /// Error messages carry their source chain.
    pub fn detailed_errors(self) -> bool {
        self >= Self::Verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(verbose: u8, quiet: bool) -> GlobalArgs {
        GlobalArgs {
            verbose,
            quiet,
            no_color: true,
            config: None,
            output_format: OutputFormat::Auto,
        }
    }

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(args(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(args(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(args(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(args(2, false).verbosity(), Verbosity::Debug);
        assert_eq!(args(9, false).verbosity(), Verbosity::Trace);
        // quiet wins when both are set programmatically
        assert_eq!(args(3, true).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn unchanged_files_need_verbose() {
        assert!(Verbosity::Normal.shows(FileStatus::Modified));
        assert!(!Verbosity::Normal.shows(FileStatus::Unchanged));
        assert!(Verbosity::Verbose.shows(FileStatus::Unchanged));
        assert!(!Verbosity::Quiet.shows(FileStatus::Generated));
    }

    #[test]
    fn levels() {
        assert_eq!(Verbosity::Quiet.level(), "error");
        assert_eq!(Verbosity::Normal.level(), "warn");
        assert_eq!(Verbosity::Trace.level(), "trace");
        assert!(!Verbosity::Normal.detailed_errors());
        assert!(Verbosity::Debug.detailed_errors());
    }
}
