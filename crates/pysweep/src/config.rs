use anyhow::{Context, Result, anyhow};
use indexmap::IndexSet;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::combine::Combine;
use crate::dirs::{CONFIG_FILE, system_config_file, user_pysweep_config_dir};

const DEFAULT_PYTHON: &str = "python3";
const DEFAULT_UNINSTALL_COMMAND: [&str; 3] = ["pip", "uninstall", "-y"];
const DEFAULT_TARGET_VERSION: &str = "py310";

/// Fully resolved configuration for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Package metadata directories to scan. Empty means discover them.
    pub site_packages: Vec<PathBuf>,

    /// Package names that are never reported, on top of the built-in packaging tools
    pub exclude: IndexSet<String>,

    /// Python interpreter queried for its site-packages directories
    pub python: String,

    /// Command prefix used to remove packages; package names are appended
    pub uninstall_command: Vec<String>,

    /// Target Python version for standard library checks ("py38" .. "py313")
    pub target_version: String,
}

impl Default for Config {
    fn default() -> Self {
        ConfigLayer::default().into_config()
    }
}

/// One source of configuration: a config file or the `PYSWEEP_*` environment.
///
/// Absent keys stay `None` so that a lower precedence layer can fill them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigLayer {
    pub site_packages: Option<Vec<PathBuf>>,
    pub exclude: Option<IndexSet<String>>,
    pub python: Option<String>,
    pub uninstall_command: Option<Vec<String>>,
    pub target_version: Option<String>,
}

impl Combine for ConfigLayer {
    fn combine(self, other: Self) -> Self {
        Self {
            site_packages: self.site_packages.combine(other.site_packages),
            exclude: self.exclude.combine(other.exclude),
            python: self.python.combine(other.python),
            uninstall_command: self.uninstall_command.combine(other.uninstall_command),
            target_version: self.target_version.combine(other.target_version),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

impl ConfigLayer {
    /// Load configuration from environment variables with PYSWEEP_ prefix
    pub fn from_env() -> Self {
        let mut layer = Self::default();

        // PYSWEEP_SITE_PACKAGES - platform path list (':' on Unix, ';' on Windows)
        if let Some(value) = env::var_os("PYSWEEP_SITE_PACKAGES") {
            let paths: Vec<PathBuf> = env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !paths.is_empty() {
                layer.site_packages = Some(paths);
            }
        }

        // PYSWEEP_EXCLUDE - comma-separated package names
        if let Some(exclude_str) = non_empty_var("PYSWEEP_EXCLUDE") {
            let names: IndexSet<String> = exclude_str
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
            if !names.is_empty() {
                layer.exclude = Some(names);
            }
        }

        layer.python = non_empty_var("PYSWEEP_PYTHON");

        // PYSWEEP_UNINSTALL_COMMAND - whitespace separated, e.g. "uv pip uninstall"
        layer.uninstall_command = non_empty_var("PYSWEEP_UNINSTALL_COMMAND")
            .map(|command| command.split_whitespace().map(ToOwned::to_owned).collect());

        layer.target_version = non_empty_var("PYSWEEP_TARGET_VERSION");

        layer
    }

    /// Load a single config file from a path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let layer: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        if let Some(target_version) = &layer.target_version {
            Config::parse_target_version(target_version).with_context(|| {
                format!("Invalid target-version in config file: {}", target_version)
            })?;
        }

        if layer.uninstall_command.as_ref().is_some_and(Vec::is_empty) {
            return Err(anyhow!(
                "uninstall-command in {:?} must name at least a program",
                path
            ));
        }

        Ok(layer)
    }

    /// Fill every absent value with its built-in default
    pub fn into_config(self) -> Config {
        Config {
            site_packages: self.site_packages.unwrap_or_default(),
            exclude: self.exclude.unwrap_or_default(),
            python: self.python.unwrap_or_else(|| DEFAULT_PYTHON.to_owned()),
            uninstall_command: self.uninstall_command.unwrap_or_else(|| {
                DEFAULT_UNINSTALL_COMMAND
                    .iter()
                    .map(|part| (*part).to_owned())
                    .collect()
            }),
            target_version: self
                .target_version
                .unwrap_or_else(|| DEFAULT_TARGET_VERSION.to_owned()),
        }
    }

    fn try_load_and_combine<P: AsRef<Path>>(self, path: P, context: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(self);
        }
        log::debug!("Loading {} from: {:?}", context, path);
        let loaded = Self::load_from_file(path)
            .with_context(|| format!("Failed to load {} from {:?}", context, path))?;
        Ok(loaded.combine(self))
    }
}

impl Config {
    /// Parse a Ruff-style target version string to the Python 3 minor version
    pub fn parse_target_version(version_str: &str) -> Result<u8> {
        match version_str {
            "py38" => Ok(8),
            "py39" => Ok(9),
            "py310" => Ok(10),
            "py311" => Ok(11),
            "py312" => Ok(12),
            "py313" => Ok(13),
            _ => Err(anyhow!(
                "Invalid target version '{}'. Supported versions: py38, py39, py310, py311, py312, py313",
                version_str
            )),
        }
    }

    pub fn python_version(&self) -> Result<u8> {
        Self::parse_target_version(&self.target_version)
    }

    pub fn set_target_version(&mut self, version: String) -> Result<()> {
        Self::parse_target_version(&version)?;
        self.target_version = version;
        Ok(())
    }

    /// Load configuration with hierarchical precedence:
    /// 1. CLI-provided config path (highest precedence)
    /// 2. Environment variables (PYSWEEP_*)
    /// 3. Project config (pysweep.toml in current directory)
    /// 4. User config (~/.config/pysweep/pysweep.toml)
    /// 5. System config (/etc/pysweep/pysweep.toml or equivalent)
    /// 6. Default values (lowest precedence)
    pub fn load(cli_config_path: Option<&Path>) -> Result<Self> {
        let mut layer = ConfigLayer::default();

        if let Some(system_config_path) = system_config_file() {
            layer = layer.try_load_and_combine(&system_config_path, "system config")?;
        }

        if let Some(user_config_dir) = user_pysweep_config_dir() {
            let user_config_path = user_config_dir.join(CONFIG_FILE);
            layer = layer.try_load_and_combine(&user_config_path, "user config")?;
        }

        layer = layer.try_load_and_combine(CONFIG_FILE, "project config")?;

        layer = ConfigLayer::from_env().combine(layer);

        if let Some(cli_config_path) = cli_config_path {
            if !cli_config_path.exists() {
                return Err(anyhow!("Config file not found: {:?}", cli_config_path));
            }
            layer = layer.try_load_and_combine(cli_config_path, "CLI config")?;
        }

        let config = layer.into_config();
        config.python_version().with_context(|| {
            format!(
                "Invalid target-version in final config: {}",
                config.target_version
            )
        })?;

        Ok(config)
    }

    /// Extra exclusions, lowercased for comparison with normalized package names
    pub fn normalized_exclusions(&self) -> IndexSet<String> {
        use cow_utils::CowUtils;
        self.exclude
            .iter()
            .map(|name| name.trim().cow_to_lowercase().into_owned())
            .filter(|name| !name.is_empty())
            .collect()
    }
}
