//! Tracing subscriber for the `weft` binary.
//!
//! The library crates only emit events; this installs the one subscriber.
//! `RUST_LOG` replaces the computed filter entirely.

use std::io::IsTerminal as _;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{GlobalArgs, Verbosity};

/// Crates whose events reach the terminal. Dependencies stay silent.
const WEFT_TARGETS: [&str; 3] = ["weft", "weft_core", "weft_adapters"];

fn directives(verbosity: Verbosity) -> String {
    let level = verbosity.level();
    WEFT_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Fails if a subscriber is already installed in this process.
pub fn init_logging(args: &GlobalArgs) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(args.verbosity())));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(args.verbosity() >= Verbosity::Debug)
        .with_ansi(!args.no_color && std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise tracing: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_weft_crate_gets_the_level() {
        assert_eq!(
            directives(Verbosity::Normal),
            "weft=warn,weft_core=warn,weft_adapters=warn"
        );
        assert_eq!(
            directives(Verbosity::Debug),
            "weft=debug,weft_core=debug,weft_adapters=debug"
        );
    }

    #[test]
    fn directives_parse_as_a_filter() {
        for verbosity in [Verbosity::Quiet, Verbosity::Verbose, Verbosity::Trace] {
            assert!(EnvFilter::try_new(directives(verbosity)).is_ok());
        }
    }
}
