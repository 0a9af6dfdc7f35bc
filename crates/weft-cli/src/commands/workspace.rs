//! Locating and loading the workspace a command operates on.

use std::path::PathBuf;

use tracing::{debug, instrument};

use weft_adapters::{ManifestLoader, WeaveManifest};

use crate::{
    cli::WorkspaceArgs,
    config::AppConfig,
    error::{CliError, CliResult},
};

/// A workspace root and its loaded architecture manifest.
pub struct Workspace {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: WeaveManifest,
}

#[instrument(skip_all, fields(root = %args.root.display()))]
pub fn load(args: &WorkspaceArgs, config: &AppConfig) -> CliResult<Workspace> {
    if !args.root.is_dir() {
        return Err(CliError::InvalidInput {
            message: format!("workspace root '{}' is not a directory", args.root.display()),
            source: None,
        });
    }
    let root = args.root.clone();
    let manifest_path = AppConfig::resolve(
        &root,
        args.manifest.as_deref().unwrap_or(&config.weave.manifest),
    );
    if !manifest_path.is_file() {
        return Err(CliError::ManifestNotFound {
            path: manifest_path,
        });
    }

    let manifest = ManifestLoader::new(&manifest_path).load()?;
    debug!(
        path = %manifest_path.display(),
        rings = manifest.rings.len(),
        treadles = manifest.treadles.len(),
        "workspace loaded"
    );
    Ok(Workspace {
        root,
        manifest_path,
        manifest,
    })
}
