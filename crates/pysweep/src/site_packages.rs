use indexmap::IndexSet;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::Config;

/// Directory names probed in the current directory when no environment is active
const COMMON_VENV_NAMES: [&str; 5] = [".venv", "venv", "env", ".virtualenv", "virtualenv"];

/// Prints one site-packages directory per line, user site last
const SITE_QUERY: &str =
    "import site; print('\\n'.join(site.getsitepackages() + [site.getusersitepackages()]))";

/// A scoped guard for safely setting and cleaning up the VIRTUAL_ENV environment variable.
///
/// The original value is restored when the guard is dropped, even if a panic occurs
/// during testing.
///
/// # Example
///
/// ```rust
/// use pysweep::site_packages::VirtualEnvGuard;
/// let _guard = VirtualEnvGuard::new("/path/to/venv");
/// // VIRTUAL_ENV is now set to "/path/to/venv"
/// // When _guard goes out of scope, VIRTUAL_ENV is restored to its original value
/// ```
#[must_use = "VirtualEnvGuard must be held in scope to ensure cleanup"]
#[derive(Debug)]
pub struct VirtualEnvGuard {
    /// The original value of VIRTUAL_ENV, if it was set
    original_value: Option<String>,
}

impl VirtualEnvGuard {
    /// Set VIRTUAL_ENV to `new_value` until the guard is dropped.
    pub fn new(new_value: &str) -> Self {
        let original_value = std::env::var("VIRTUAL_ENV").ok();

        // SAFETY: This is safe in test contexts where we control the environment
        // and ensure proper cleanup via the Drop trait.
        unsafe {
            std::env::set_var("VIRTUAL_ENV", new_value);
        }

        Self { original_value }
    }

    /// Remove VIRTUAL_ENV until the guard is dropped.
    pub fn unset() -> Self {
        let original_value = std::env::var("VIRTUAL_ENV").ok();

        // SAFETY: see `VirtualEnvGuard::new`
        unsafe {
            std::env::remove_var("VIRTUAL_ENV");
        }

        Self { original_value }
    }
}

impl Drop for VirtualEnvGuard {
    fn drop(&mut self) {
        // Never panic while unwinding
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            // SAFETY: restores the environment to its original state
            unsafe {
                match self.original_value.take() {
                    Some(original) => std::env::set_var("VIRTUAL_ENV", original),
                    None => std::env::remove_var("VIRTUAL_ENV"),
                }
            }
        }));
    }
}

/// Locates the directories holding installed distribution metadata.
#[derive(Debug)]
pub struct SitePackagesLocator<'a> {
    config: &'a Config,
    virtualenv_override: Option<String>,
}

impl<'a> SitePackagesLocator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self::new_with_virtualenv(config, None)
    }

    /// Create a locator with an optional VIRTUAL_ENV override for testing
    pub fn new_with_virtualenv(config: &'a Config, virtualenv_override: Option<&str>) -> Self {
        Self {
            config,
            virtualenv_override: virtualenv_override.map(ToOwned::to_owned),
        }
    }

    /// Returns deduplicated site-packages directories, first source that yields any wins:
    /// configured directories, the active virtualenv, the interpreter's own `site` module,
    /// then conventional virtualenv directories under the current directory.
    pub fn discover(&self) -> Vec<PathBuf> {
        if !self.config.site_packages.is_empty() {
            debug!("Using configured site-packages: {:?}", self.config.site_packages);
            return dedup_directories(self.config.site_packages.iter().cloned());
        }

        let explicit_virtualenv = self
            .virtualenv_override
            .clone()
            .or_else(|| std::env::var("VIRTUAL_ENV").ok())
            .filter(|v| !v.is_empty());

        if let Some(venv) = explicit_virtualenv {
            let dirs = virtualenv_site_packages(Path::new(&venv));
            if dirs.is_empty() {
                warn!("VIRTUAL_ENV {venv:?} has no site-packages directory");
            } else {
                debug!("Using site-packages of virtualenv {venv:?}");
                return dedup_directories(dirs);
            }
        }

        let dirs = self.interpreter_site_packages();
        if !dirs.is_empty() {
            return dedup_directories(dirs);
        }

        let venvs = self.detect_fallback_virtualenv_paths();
        dedup_directories(venvs.iter().flat_map(|venv| virtualenv_site_packages(venv)))
    }

    /// Ask the configured interpreter for `site.getsitepackages()` and the user site
    fn interpreter_site_packages(&self) -> Vec<PathBuf> {
        let output = match Command::new(&self.config.python)
            .args(["-c", SITE_QUERY])
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    "Could not run {:?} to locate site-packages: {}",
                    self.config.python, err
                );
                return Vec::new();
            }
        };

        if !output.status.success() {
            warn!(
                "{:?} failed to report site-packages ({}): {}",
                self.config.python,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Vec::new();
        }

        let dirs = parse_site_query_output(&String::from_utf8_lossy(&output.stdout));
        debug!("Interpreter {:?} reported {:?}", self.config.python, dirs);
        dirs
    }

    /// Detect common virtual environment directory names in the current working directory
    fn detect_fallback_virtualenv_paths(&self) -> Vec<PathBuf> {
        match std::env::current_dir() {
            Ok(dir) => scan_common_venv_names(&dir),
            Err(_) => Vec::new(),
        }
    }
}

fn parse_site_query_output(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Virtualenv roots under `dir` that actually contain a site-packages directory
fn scan_common_venv_names(dir: &Path) -> Vec<PathBuf> {
    COMMON_VENV_NAMES
        .iter()
        .map(|name| dir.join(name))
        .filter(|candidate| candidate.is_dir())
        .filter(|candidate| !virtualenv_site_packages(candidate).is_empty())
        .collect()
}

/// Site-packages directories of a virtual environment root
///
/// `Lib/site-packages` on Windows, `lib/python*/site-packages` elsewhere.
pub fn virtualenv_site_packages(venv_root: &Path) -> Vec<PathBuf> {
    if !venv_root.is_dir() {
        return Vec::new();
    }

    if cfg!(windows) {
        let site_packages = venv_root.join("Lib").join("site-packages");
        return if site_packages.is_dir() {
            vec![site_packages]
        } else {
            Vec::new()
        };
    }

    let lib_dir = venv_root.join("lib");
    let Ok(entries) = std::fs::read_dir(&lib_dir) else {
        return Vec::new();
    };

    let mut site_packages_dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("python"))
        })
        .map(|path| path.join("site-packages"))
        .filter(|path| path.is_dir())
        .collect();
    site_packages_dirs.sort();
    site_packages_dirs
}

fn dedup_directories(dirs: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let unique: IndexSet<PathBuf> = dirs
        .into_iter()
        .map(|dir| dir.canonicalize().unwrap_or(dir))
        .collect();
    unique.into_iter().collect()
}
