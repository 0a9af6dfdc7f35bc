//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate only sees the [`WeaveConfig`] built
//! from it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables: `WEFT_<SECTION>__<KEY>`, e.g.
//!    `WEFT_WEAVE__PARALLEL=true`
//! 3. Config file: `--config`, else `.weftrc.toml` in the current directory,
//!    else the per-user file
//! 4. Built-in defaults (always present)
//!
//! [`WeaveConfig`]: weft_core::application::WeaveConfig

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use weft_core::application::services::DEFAULT_MANIFEST_PATH;

/// Local config file name, looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".weftrc.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "WEFT";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Weave defaults.
    pub weave: WeaveSettings,
    /// Output settings.
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveSettings {
    /// Architecture manifest, relative to the workspace root.
    pub manifest: PathBuf,
    /// Handlebars templates directory, relative to the workspace root.
    pub templates: PathBuf,
    /// Marker manifest, relative to the workspace root.
    pub markers: PathBuf,
    pub parallel: bool,
    pub sweep: bool,
}

impl Default for WeaveSettings {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from(weft_adapters::MANIFEST_FILE),
            templates: PathBuf::from("templates"),
            markers: PathBuf::from(DEFAULT_MANIFEST_PATH),
            parallel: false,
            sweep: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            no_color: false,
            format: "human".into(),
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the config file, then `WEFT_*`
    /// environment variables.
    ///
    /// An explicit `config_file` must exist; the implicit locations are
    /// optional.
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        let defaults = toml::to_string(&Self::default())?;
        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path.clone()).format(FileFormat::Toml)),
            None => {
                let path = Self::config_path();
                debug!(path = %path.display(), "looking for config file");
                builder.add_source(
                    File::from(path)
                        .format(FileFormat::Toml)
                        .required(false),
                )
            }
        };

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// The config file in effect: `.weftrc.toml` in the current directory
    /// if present, else the per-user file.
    pub fn config_path() -> PathBuf {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            local
        } else {
            Self::global_config_path()
        }
    }

    /// Per-user config file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to the local file name.
    pub fn global_config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "weft", "weft")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve(root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    /// Value of a dotted key, rendered for display.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "weave.manifest" => self.weave.manifest.display().to_string(),
            "weave.templates" => self.weave.templates.display().to_string(),
            "weave.markers" => self.weave.markers.display().to_string(),
            "weave.parallel" => self.weave.parallel.to_string(),
            "weave.sweep" => self.weave.sweep.to_string(),
            "output.no_color" => self.output.no_color.to_string(),
            "output.format" => self.output.format.clone(),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_point_at_conventional_files() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.weave.manifest, PathBuf::from("weft.toml"));
        assert_eq!(cfg.weave.markers, PathBuf::from(".weft/markers.json"));
        assert!(cfg.weave.sweep);
        assert!(!cfg.weave.parallel);
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("weft.config.toml");
        std::fs::write(&path, "[weave]\ntemplates = \"tpl\"\nparallel = true\n").unwrap();

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.weave.templates, PathBuf::from("tpl"));
        assert!(cfg.weave.parallel);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.weave.manifest, PathBuf::from("weft.toml"));
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.toml");
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn get_known_and_unknown_keys() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.get("weave.templates").as_deref(), Some("templates"));
        assert_eq!(cfg.get("output.no_color").as_deref(), Some("false"));
        assert_eq!(cfg.get("does.not.exist"), None);
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let root = Path::new("/ws");
        assert_eq!(
            AppConfig::resolve(root, Path::new("weft.toml")),
            PathBuf::from("/ws/weft.toml")
        );
        assert_eq!(
            AppConfig::resolve(root, Path::new("/etc/weft.toml")),
            PathBuf::from("/etc/weft.toml")
        );
    }

    #[test]
    fn default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }
}
