use anyhow::{Context, Result, anyhow};
use log::{error, info};
use std::process::Command;

/// Run `command` followed by `packages`, e.g. `pip uninstall -y colorama tqdm`.
///
/// Does nothing when `packages` is empty.
pub fn run_uninstall(command: &[String], packages: &[String]) -> Result<()> {
    if packages.is_empty() {
        return Ok(());
    }
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("Uninstall command is empty"))?;

    info!("Uninstalling packages: {}", packages.join(", "));
    let status = Command::new(program)
        .args(args)
        .args(packages)
        .status()
        .with_context(|| format!("Failed to run {:?}", program))?;

    if !status.success() {
        return Err(anyhow!(
            "Command '{}' exited with {}",
            command.join(" "),
            status
        ));
    }
    Ok(())
}

/// Remove `packages`, logging failures instead of propagating them.
///
/// Returns whether the removal command succeeded.
pub fn uninstall_packages(command: &[String], packages: &[String]) -> bool {
    match run_uninstall(command, packages) {
        Ok(()) => true,
        Err(err) => {
            error!("Error uninstalling packages: {err:#}");
            false
        }
    }
}
