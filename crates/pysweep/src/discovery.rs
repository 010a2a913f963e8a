//! Expansion of command line file patterns into the Python files to analyze.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use indexmap::IndexSet;
use log::{debug, warn};
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const GLOB_CHARS: [char; 3] = ['*', '?', '['];

/// Marker file present at the root of every virtual environment
const PYVENV_CFG: &str = "pyvenv.cfg";

fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(GLOB_CHARS)
}

/// Resolve patterns to a sorted, deduplicated list of files.
///
/// Globs are expanded (`**` only crosses directories when `recursive`), directories
/// contribute their `*.py` files, plain files are taken as given. Patterns that match
/// nothing are logged and skipped.
pub fn expand_file_patterns<S: AsRef<str>>(patterns: &[S], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = IndexSet::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        if is_glob_pattern(pattern) {
            let matched = expand_glob(pattern, recursive)?;
            if matched.is_empty() {
                warn!("No files match pattern '{pattern}'");
            }
            files.extend(matched.into_iter().map(without_leading_cur_dir));
            continue;
        }

        let path = Path::new(pattern);
        if path.is_dir() {
            files.extend(python_files_in(path, recursive).into_iter().map(without_leading_cur_dir));
        } else if path.exists() {
            files.insert(without_leading_cur_dir(path.to_path_buf()));
        } else {
            warn!("Path does not exist: {pattern}");
        }
    }

    let mut files: Vec<PathBuf> = files.into_iter().collect();
    files.sort();
    debug!("Expanded {} patterns into {} files", patterns.len(), files.len());
    Ok(files)
}

/// `./app.py` and `app.py` must deduplicate to one entry
fn without_leading_cur_dir(path: PathBuf) -> PathBuf {
    let mut components = path.components();
    if components.next() == Some(Component::CurDir) && components.clone().next().is_some() {
        components.as_path().to_path_buf()
    } else {
        path
    }
}

/// Hidden directories, `__pycache__` and virtual environments are never descended into
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "__pycache__" || entry.path().join(PYVENV_CFG).is_file()
}

fn walker(root: &Path, max_depth: Option<usize>) -> impl Iterator<Item = DirEntry> {
    let mut walk = WalkDir::new(root).follow_links(true);
    if let Some(depth) = max_depth {
        walk = walk.max_depth(depth);
    }
    walk.into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Error walking directory: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
}

/// `*.py` files under `dir`; direct children only unless `recursive`
fn python_files_in(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { None } else { Some(1) };
    walker(dir, max_depth)
        .map(DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "py"))
        .collect()
}

/// Split a glob into its literal leading directory and the pattern below it
fn split_glob(pattern: &str) -> (PathBuf, Vec<String>) {
    let mut base = PathBuf::new();
    let mut rest = Vec::new();

    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        let literal = matches!(
            component,
            Component::Prefix(_) | Component::RootDir | Component::CurDir | Component::ParentDir
        ) || !is_glob_pattern(&text);

        if rest.is_empty() && literal {
            base.push(component);
        } else {
            rest.push(text.into_owned());
        }
    }

    if base.as_os_str().is_empty() {
        base.push(".");
    }
    (base, rest)
}

fn expand_glob(pattern: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let (base, rest) = split_glob(pattern);
    let crosses_directories = recursive && rest.iter().any(|part| part == "**");

    let relative_pattern = rest
        .iter()
        .map(|part| {
            if recursive {
                part.clone()
            } else {
                part.replace("**", "*")
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    let matcher: GlobMatcher = GlobBuilder::new(&relative_pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid glob pattern: {pattern}"))?
        .compile_matcher();

    let max_depth = if crosses_directories {
        None
    } else {
        Some(rest.len())
    };

    let matched = walker(&base, max_depth)
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(&base)
                .is_ok_and(|relative| matcher.is_match(relative))
        })
        .map(DirEntry::into_path)
        .collect();
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "import os\n").unwrap();
        path
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "app.py");
        touch(root, "README.md");
        touch(root, "pkg/__init__.py");
        touch(root, "pkg/sub/models.py");
        touch(root, "pkg/__pycache__/models.cpython-311.py");
        touch(root, ".hidden/secret.py");
        touch(root, "venv/lib/python3.11/site-packages/six.py");
        fs::write(root.join("venv").join(PYVENV_CFG), "home = /usr/bin\n").unwrap();
        temp
    }

    fn relative(root: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .into_iter()
            .map(|f| {
                f.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_leading_cur_dir_is_stripped() {
        assert_eq!(without_leading_cur_dir(PathBuf::from("./app.py")), PathBuf::from("app.py"));
        assert_eq!(
            without_leading_cur_dir(PathBuf::from("./pkg/sub/models.py")),
            PathBuf::from("pkg/sub/models.py")
        );
        assert_eq!(without_leading_cur_dir(PathBuf::from("app.py")), PathBuf::from("app.py"));
        assert_eq!(without_leading_cur_dir(PathBuf::from(".")), PathBuf::from("."));
        assert_eq!(
            without_leading_cur_dir(PathBuf::from("/srv/./app.py")),
            PathBuf::from("/srv/app.py")
        );
    }

    #[test]
    fn test_split_glob() {
        let (base, rest) = split_glob("src/app/**/*.py");
        assert_eq!(base, PathBuf::from("src/app"));
        assert_eq!(rest, vec!["**", "*.py"]);

        let (base, rest) = split_glob("*.py");
        assert_eq!(base, PathBuf::from("."));
        assert_eq!(rest, vec!["*.py"]);
    }

    #[test]
    fn test_directory_expansion() {
        let temp = project();
        let root = temp.path();
        let dir = root.to_string_lossy().into_owned();

        let recursive = expand_file_patterns(&[dir.as_str()], true).unwrap();
        assert_eq!(
            relative(root, recursive),
            vec!["app.py", "pkg/__init__.py", "pkg/sub/models.py"]
        );

        let shallow = expand_file_patterns(&[dir.as_str()], false).unwrap();
        assert_eq!(relative(root, shallow), vec!["app.py"]);
    }

    #[test]
    fn test_glob_expansion() {
        let temp = project();
        let root = temp.path();

        let recursive = format!("{}/**/*.py", root.display());
        assert_eq!(
            relative(root, expand_file_patterns(&[recursive.as_str()], true).unwrap()),
            vec!["app.py", "pkg/__init__.py", "pkg/sub/models.py"]
        );

        let one_level = format!("{}/pkg/*.py", root.display());
        assert_eq!(
            relative(root, expand_file_patterns(&[one_level.as_str()], true).unwrap()),
            vec!["pkg/__init__.py"]
        );

        let markdown = format!("{}/*.md", root.display());
        assert_eq!(
            relative(root, expand_file_patterns(&[markdown.as_str()], false).unwrap()),
            vec!["README.md"]
        );
    }

    #[test]
    fn test_files_deduplicate_and_missing_paths_warn() {
        let temp = project();
        let root = temp.path();
        let app = root.join("app.py").to_string_lossy().into_owned();
        let missing = root.join("missing.py").to_string_lossy().into_owned();
        let no_match = format!("{}/*.rs", root.display());

        let patterns = [app.as_str(), app.as_str(), missing.as_str(), no_match.as_str()];
        let files = expand_file_patterns(&patterns, true).unwrap();
        assert_eq!(relative(root, files), vec!["app.py"]);
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        assert!(expand_file_patterns(&["src/[a-.py"], true).is_err());
    }
}
