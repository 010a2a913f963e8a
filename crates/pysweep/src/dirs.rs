use std::{
    env,
    path::{Path, PathBuf},
};

use etcetera::BaseStrategy;

/// Configuration directory name
pub(crate) const CONFIG_DIR: &str = "pysweep";

/// Configuration file name, also looked up in the current directory
pub const CONFIG_FILE: &str = "pysweep.toml";

/// Returns the path to the user's `pysweep` configuration directory.
///
/// On Windows this is e.g. `C:\Users\Alice\AppData\Roaming\pysweep`;
/// on Linux and macOS `$XDG_CONFIG_HOME/pysweep` or `$HOME/.config/pysweep`.
pub fn user_pysweep_config_dir() -> Option<PathBuf> {
    let dirs = etcetera::choose_base_strategy().ok()?;
    Some(dirs.config_dir().join(CONFIG_DIR))
}

#[cfg(not(windows))]
fn locate_system_config_xdg(value: Option<&str>) -> Option<PathBuf> {
    let config_dirs = value.filter(|s| !s.is_empty()).unwrap_or("/etc/xdg");

    config_dirs
        .split(':')
        .take_while(|s| !s.is_empty())
        .map(|dir| Path::new(dir).join(CONFIG_DIR).join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

#[cfg(windows)]
fn locate_system_config_windows(system_drive: impl AsRef<Path>) -> Option<PathBuf> {
    let candidate = system_drive
        .as_ref()
        .join("ProgramData")
        .join(CONFIG_DIR)
        .join(CONFIG_FILE);
    candidate.as_path().is_file().then_some(candidate)
}

/// Returns the path to the system configuration file, if one exists.
///
/// Unix: `$XDG_CONFIG_DIRS/pysweep/pysweep.toml` (default `/etc/xdg`), then
/// `/etc/pysweep/pysweep.toml`. Windows: `%SYSTEMDRIVE%\ProgramData\pysweep\pysweep.toml`.
pub fn system_config_file() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        env::var("SYSTEMDRIVE")
            .ok()
            .and_then(|system_drive| locate_system_config_windows(PathBuf::from(system_drive)))
    }

    #[cfg(not(windows))]
    {
        let xdg_config_dirs = env::var("XDG_CONFIG_DIRS").ok();
        if let Some(path) = locate_system_config_xdg(xdg_config_dirs.as_deref()) {
            return Some(path);
        }

        let candidate = Path::new("/etc").join(CONFIG_DIR).join(CONFIG_FILE);
        match candidate.try_exists() {
            Ok(true) => Some(candidate),
            Ok(false) => None,
            Err(err) => {
                log::warn!("Failed to query system configuration file: {err}");
                None
            }
        }
    }
}
