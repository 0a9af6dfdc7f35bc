//! `weft init`: create a default configuration file and, on request, a
//! starter `weft.toml`.

use std::path::{Path, PathBuf};

use tracing::debug;

use weft_adapters::MANIFEST_FILE;

use crate::{
    cli::InitArgs,
    config::{AppConfig, LOCAL_CONFIG_FILE},
    error::{CliError, CliResult, IntoCli},
    output::OutputManager,
};

/// Starter manifest: one core ring wrapped by one platform ring, one
/// capability and a treadle that keeps a module list in `lib.rs`.
pub const STARTER_MANIFEST: &str = r#"# Weft architecture manifest.

[[rings]]
name = "engine"
kind = "core"

[[rings]]
name = "app"
kind = "desktop"
export = "app"
wraps = ["engine"]

[[capabilities]]
name = "GreetingMgmt"
reach = "local"

[[capabilities.methods]]
name = "greet"
params = [{ name = "name", type = "string" }]
returns = "string"

[[treadles]]
name = "direct"
match = ["desktop->core"]
prefix = true

[[treadles.patches]]
template = "direct/methods.rs"
path = "{export}/src/lib.rs"
block = "methods"
"#;

/// Create the configuration file (and optionally the manifest).
pub fn execute(args: InitArgs, output: OutputManager) -> CliResult<()> {
    let config_path = if args.local {
        PathBuf::from(LOCAL_CONFIG_FILE)
    } else {
        AppConfig::global_config_path()
    };
    debug!(path = %config_path.display(), global = args.global || !args.local, "init");

    output.info("Initialising configuration...")?;
    let toml = toml::to_string_pretty(&AppConfig::default()).map_err(|e| CliError::ConfigError {
        message: format!("Failed to serialise default config: {e}"),
        source: Some(Box::new(e)),
    })?;
    write_new(&config_path, &toml, args.force)?;
    output.success(&format!("Configuration created at {}", config_path.display()))?;

    if args.manifest {
        let manifest = Path::new(MANIFEST_FILE);
        write_new(manifest, STARTER_MANIFEST, args.force)?;
        output.success(&format!("Starter manifest created at {}", manifest.display()))?;
    }
    Ok(())
}

fn write_new(path: &Path, content: &str, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(CliError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_cli_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_cli_context(|| format!("Failed to write '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn starter_manifest_is_valid() {
        let manifest = weft_adapters::parse_manifest(STARTER_MANIFEST).unwrap();
        assert_eq!(manifest.rings.len(), 2);
        assert_eq!(manifest.matrix().unwrap().len(), 1);
    }

    #[test]
    fn write_new_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        write_new(&path, "a = 1\n", false).unwrap();
        assert!(matches!(
            write_new(&path, "a = 2\n", false),
            Err(CliError::AlreadyExists { .. })
        ));
        write_new(&path, "a = 2\n", true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a = 2\n");
    }
}
