//! Installed distribution metadata: which packages exist and which top-level
//! modules each one makes importable.

use anyhow::{Context, Result};
use cow_utils::CowUtils;
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Packaging and build tooling that is never reported as unused.
pub const DEFAULT_EXCLUDED_PACKAGES: &[&str] = &[
    "pip",
    "setuptools",
    "wheel",
    "python",
    "python_version",
    "poetry",
    "poetry-core",
];

const METADATA_SUFFIXES: [&str; 2] = [".dist-info", ".egg-info"];

/// Declares the importable top-level modules of a distribution
const TOP_LEVEL_FILE: &str = "top_level.txt";

/// Installed packages keyed by normalized name, each with the module names it provides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledPackages {
    packages: IndexMap<String, IndexSet<String>>,
}

impl InstalledPackages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `modules` as provided by `package`, merging with earlier entries
    pub fn insert<I, S>(&mut self, package: &str, modules: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self
            .packages
            .entry(package.cow_to_lowercase().into_owned())
            .or_default();
        entry.extend(
            modules
                .into_iter()
                .map(|module| module.as_ref().trim().cow_to_lowercase().into_owned())
                .filter(|module| !module.is_empty()),
        );
    }

    pub fn modules(&self, package: &str) -> Option<&IndexSet<String>> {
        self.packages.get(package)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexSet<String>)> {
        self.packages.iter()
    }

    /// Whether any installed package provides `module`
    pub fn provides(&self, module: &str) -> bool {
        self.packages.values().any(|modules| modules.contains(module))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Normalized package name from a `*.dist-info` / `*.egg-info` entry name.
///
/// `Requests-2.31.0.dist-info` becomes `requests`; names without a version keep
/// everything before the suffix.
pub fn package_name_from_metadata_dir(entry_name: &str) -> Option<String> {
    let stem = METADATA_SUFFIXES
        .iter()
        .find_map(|suffix| entry_name.strip_suffix(suffix))?;
    let name = stem.split('-').next().unwrap_or(stem).trim();
    if name.is_empty() {
        return None;
    }
    Some(name.cow_to_lowercase().into_owned())
}

/// The built-in exclusions plus `extra`, all lowercased
pub fn exclusion_set(extra: &IndexSet<String>) -> IndexSet<String> {
    DEFAULT_EXCLUDED_PACKAGES
        .iter()
        .map(|name| (*name).to_owned())
        .chain(extra.iter().map(|name| name.cow_to_lowercase().into_owned()))
        .collect()
}

/// Scan metadata directories for installed packages.
///
/// Missing directories are skipped; unreadable directories and entries are logged
/// and skipped.
pub fn scan_installed_packages<P: AsRef<Path>>(
    dirs: &[P],
    exclusions: &IndexSet<String>,
) -> InstalledPackages {
    let mut installed = InstalledPackages::new();

    for dir in dirs {
        let dir = dir.as_ref();
        if !dir.exists() {
            debug!("Skipping missing metadata directory {:?}", dir);
            continue;
        }
        if let Err(err) = scan_directory(dir, exclusions, &mut installed) {
            warn!("Error scanning {}: {:#}", dir.display(), err);
        }
    }

    installed
}

fn scan_directory(
    dir: &Path,
    exclusions: &IndexSet<String>,
    installed: &mut InstalledPackages,
) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read metadata directory: {:?}", dir))?;

    // read_dir order is platform dependent
    let mut metadata_entries: Vec<_> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(err) => {
                warn!("Error reading entry in {}: {}", dir.display(), err);
                None
            }
        })
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let package = package_name_from_metadata_dir(name)?;
            Some((package, path))
        })
        .collect();
    metadata_entries.sort();

    for (package, path) in metadata_entries {
        if exclusions.contains(&package) {
            debug!("Skipping excluded package {package}");
            continue;
        }

        match read_top_level_modules(&path) {
            Ok(Some(modules)) => installed.insert(&package, modules),
            Ok(None) => installed.insert(&package, [package.as_str()]),
            Err(err) => warn!("Error processing {}: {:#}", path.display(), err),
        }
    }

    Ok(())
}

/// Module names listed in `top_level.txt`, or `None` when the file is absent
fn read_top_level_modules(metadata_path: &Path) -> Result<Option<Vec<String>>> {
    let top_level = metadata_path.join(TOP_LEVEL_FILE);
    if !top_level.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&top_level)
        .with_context(|| format!("Failed to read {:?}", top_level))?;
    let modules: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    Ok(Some(modules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn dist_info(site_packages: &Path, name: &str, top_level: Option<&str>) {
        let dir = site_packages.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("METADATA"), "Metadata-Version: 2.1\n").unwrap();
        if let Some(top_level) = top_level {
            fs::write(dir.join(TOP_LEVEL_FILE), top_level).unwrap();
        }
    }

    fn modules(installed: &InstalledPackages, package: &str) -> Vec<String> {
        installed
            .modules(package)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_package_name_from_metadata_dir() {
        assert_eq!(
            package_name_from_metadata_dir("Requests-2.31.0.dist-info").as_deref(),
            Some("requests")
        );
        assert_eq!(
            package_name_from_metadata_dir("zope.interface-6.0.dist-info").as_deref(),
            Some("zope.interface")
        );
        assert_eq!(
            package_name_from_metadata_dir("mypkg.egg-info").as_deref(),
            Some("mypkg")
        );
        assert_eq!(package_name_from_metadata_dir("requests"), None);
        assert_eq!(package_name_from_metadata_dir("-1.0.dist-info"), None);
    }

    #[test]
    fn test_top_level_and_fallback_names() {
        let temp = TempDir::new().unwrap();
        let sp = temp.path();
        dist_info(sp, "PyYAML-6.0.1.dist-info", Some("_yaml\nYaml\n\n"));
        dist_info(sp, "Flask-3.0.0.dist-info", None);
        fs::write(sp.join("legacy-1.0.egg-info"), "Name: legacy\n").unwrap();
        fs::create_dir_all(sp.join("requests")).unwrap();

        let installed = scan_installed_packages(&[sp], &exclusion_set(&IndexSet::new()));

        assert_eq!(installed.len(), 3);
        assert_eq!(modules(&installed, "pyyaml"), vec!["_yaml", "yaml"]);
        assert_eq!(modules(&installed, "flask"), vec!["flask"]);
        assert_eq!(modules(&installed, "legacy"), vec!["legacy"]);
        assert!(installed.provides("yaml"));
        assert!(!installed.provides("requests"));
    }

    #[test]
    fn test_exclusions_are_skipped() {
        let temp = TempDir::new().unwrap();
        let sp = temp.path();
        dist_info(sp, "pip-24.0.dist-info", Some("pip\n"));
        dist_info(sp, "setuptools-69.0.dist-info", Some("setuptools\npkg_resources\n"));
        dist_info(sp, "Black-24.1.dist-info", Some("black\n"));
        dist_info(sp, "rich-13.0.dist-info", None);

        let extra: IndexSet<String> = ["BLACK".to_owned()].into_iter().collect();
        let installed = scan_installed_packages(&[sp], &exclusion_set(&extra));

        let names: Vec<_> = installed.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["rich"]);
    }

    #[test]
    fn test_duplicate_metadata_merges_and_missing_dirs_skip() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        dist_info(first.path(), "attrs-23.1.0.dist-info", Some("attr\n"));
        dist_info(second.path(), "attrs-22.2.0.dist-info", Some("attrs\n"));

        let dirs: Vec<PathBuf> = vec![
            first.path().to_path_buf(),
            PathBuf::from("/nonexistent/site-packages"),
            second.path().to_path_buf(),
        ];
        let installed = scan_installed_packages(&dirs, &exclusion_set(&IndexSet::new()));

        assert_eq!(modules(&installed, "attrs"), vec!["attr", "attrs"]);
    }
}
