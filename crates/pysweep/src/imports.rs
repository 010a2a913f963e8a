use anyhow::{Context, Result};
use cow_utils::CowUtils;
use indexmap::IndexSet;
use log::{debug, trace, warn};
use std::fs;
use std::path::Path;

use crate::visitors::ImportDiscoveryVisitor;

/// Lowercased top-level module names imported by a single Python source.
///
/// Relative imports contribute the root of their module path; `from . import x` adds nothing.
pub fn collect_file_imports(source: &str) -> Result<IndexSet<String>> {
    let parsed = ruff_python_parser::parse_module(source)
        .map_err(|err| anyhow::anyhow!("invalid Python syntax: {err}"))?;

    let mut visitor = ImportDiscoveryVisitor::new();
    visitor.visit_module(parsed.syntax());

    let mut roots = IndexSet::new();
    for import in visitor.into_imports() {
        let Some(root) = import.root_module() else {
            continue;
        };
        if !import.scope.is_empty() {
            trace!("Nested import of {root} in {}", import.scope.join("."));
        }
        roots.insert(root.cow_to_lowercase().into_owned());
    }
    Ok(roots)
}

fn read_file_imports(path: &Path) -> Result<IndexSet<String>> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {:?}", path))?;
    collect_file_imports(&source).with_context(|| format!("Failed to parse {:?}", path))
}

/// Union of top-level imports across `files`.
///
/// Unreadable or unparsable files are logged and skipped.
pub fn collect_used_imports<P: AsRef<Path>>(files: &[P]) -> IndexSet<String> {
    let mut used = IndexSet::new();

    for path in files {
        let path = path.as_ref();
        match read_file_imports(path) {
            Ok(roots) => {
                debug!("{:?} imports {:?}", path, roots);
                used.extend(roots);
            }
            Err(err) => warn!("Error analyzing {}: {:#}", path.display(), err),
        }
    }

    used
}
