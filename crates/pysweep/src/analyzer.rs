use anyhow::Result;
use indexmap::IndexSet;
use log::info;
use ruff_python_stdlib::sys::is_known_standard_library;
use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::imports::collect_used_imports;
use crate::metadata::{InstalledPackages, exclusion_set, scan_installed_packages};
use crate::site_packages::SitePackagesLocator;

/// Installed packages none of whose modules are imported, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnusedReport {
    packages: Vec<String>,
}

impl UnusedReport {
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl fmt::Display for UnusedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.packages.is_empty() {
            return write!(f, "No unused dependencies were found.");
        }
        write!(f, "Found unused packages:")?;
        for package in &self.packages {
            write!(f, "\n  - {package}")?;
        }
        Ok(())
    }
}

/// Packages whose provided modules are disjoint from `used`.
pub fn find_unused(installed: &InstalledPackages, used: &IndexSet<String>) -> UnusedReport {
    let mut packages: Vec<String> = installed
        .iter()
        .filter(|(_, modules)| !modules.iter().any(|module| used.contains(module)))
        .map(|(package, _)| package.clone())
        .collect();
    packages.sort();
    packages.dedup();
    UnusedReport { packages }
}

/// Imports that are neither standard library nor provided by an installed package
pub fn find_unresolved(
    installed: &InstalledPackages,
    used: &IndexSet<String>,
    python_version: u8,
) -> Vec<String> {
    let mut unresolved: Vec<String> = used
        .iter()
        .filter(|module| !is_known_standard_library(python_version, module))
        .filter(|module| !installed.provides(module))
        .cloned()
        .collect();
    unresolved.sort();
    unresolved
}

/// Outcome of one analysis run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub report: UnusedReport,
    /// Imports no installed package (and not the standard library) accounts for.
    /// First-party modules of the scanned project show up here too.
    pub unresolved: Vec<String>,
    pub installed_count: usize,
}

/// Resolve unused packages for `files` against the environment described by `config`.
pub fn analyze_dependencies<P: AsRef<Path>>(files: &[P], config: &Config) -> Result<Analysis> {
    let site_packages = SitePackagesLocator::new(config).discover();
    analyze_with_site_packages(files, &site_packages, config)
}

/// Same as [`analyze_dependencies`] with the metadata directories already known.
pub fn analyze_with_site_packages<P: AsRef<Path>, D: AsRef<Path>>(
    files: &[P],
    site_packages: &[D],
    config: &Config,
) -> Result<Analysis> {
    let python_version = config.python_version()?;

    info!("Analyzing Python files...");
    let used = collect_used_imports(files);

    info!("Scanning installed packages...");
    for dir in site_packages {
        info!("Metadata directory: {}", dir.as_ref().display());
    }
    let exclusions = exclusion_set(&config.normalized_exclusions());
    let mut installed = scan_installed_packages(site_packages, &exclusions);
    let installed_count = installed.len();
    info!("Found {} installed packages", installed_count);

    let report = find_unused(&installed, &used);

    // Excluded tooling is installed even though it is never reported
    for excluded in &exclusions {
        installed.insert(excluded, [excluded.as_str()]);
    }
    let unresolved = find_unresolved(&installed, &used, python_version);
    if !unresolved.is_empty() {
        info!(
            "Imports not provided by any installed package: {}",
            unresolved.join(", ")
        );
    }

    Ok(Analysis {
        report,
        unresolved,
        installed_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn used(names: &[&str]) -> IndexSet<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[test]
    fn test_unused_is_set_difference() {
        let mut installed = InstalledPackages::new();
        installed.insert("a", ["a"]);
        installed.insert("c", ["c"]);

        let report = find_unused(&installed, &used(&["a", "b"]));
        assert_eq!(report.packages(), ["c".to_owned()]);
    }

    #[test]
    fn test_any_provided_module_marks_package_used() {
        let mut installed = InstalledPackages::new();
        installed.insert("pyyaml", ["_yaml", "yaml"]);
        installed.insert("Beautifulsoup4", ["BS4"]);
        installed.insert("zeta", ["zeta"]);
        installed.insert("alpha", ["alpha"]);

        let report = find_unused(&installed, &used(&["yaml", "bs4"]));
        assert_eq!(report.packages(), ["alpha".to_owned(), "zeta".to_owned()]);
    }

    #[test]
    fn test_find_unused_is_idempotent() {
        let mut installed = InstalledPackages::new();
        installed.insert("requests", ["requests"]);
        installed.insert("idna", ["idna"]);
        let imports = used(&["requests"]);

        assert_eq!(find_unused(&installed, &imports), find_unused(&installed, &imports));
    }

    #[test]
    fn test_unresolved_skips_stdlib_and_installed() {
        let mut installed = InstalledPackages::new();
        installed.insert("requests", ["requests"]);

        let unresolved = find_unresolved(&installed, &used(&["os", "requests", "mylib", "json"]), 10);
        assert_eq!(unresolved, vec!["mylib"]);
    }

    #[test]
    fn test_report_rendering() {
        assert_snapshot!(UnusedReport::default().to_string(), @"No unused dependencies were found.");

        let report = UnusedReport {
            packages: vec!["colorama".to_owned(), "tqdm".to_owned()],
        };
        assert_snapshot!(report.to_string(), @r"
        Found unused packages:
          - colorama
          - tqdm
        ");
    }
}
