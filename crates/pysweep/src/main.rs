use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use std::path::PathBuf;
use std::process::ExitCode;

use pysweep::analyzer::analyze_dependencies;
use pysweep::config::Config;
use pysweep::discovery::expand_file_patterns;
use pysweep::uninstall::uninstall_packages;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Find and optionally remove unused dependencies",
    long_about = None
)]
struct Cli {
    /// Python files, directories or glob patterns to analyze
    #[arg(short, long, num_args = 1.., default_value = ".")]
    files: Vec<String>,

    /// Recursively search directories (the default)
    #[arg(short, long, overrides_with = "no_recursive")]
    recursive: bool,

    /// Only analyze files directly inside the given directories
    #[arg(long, overrides_with = "recursive")]
    no_recursive: bool,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Uninstall unused packages
    #[arg(short, long)]
    uninstall: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Package metadata directory to scan instead of discovering them (repeatable)
    #[arg(long = "site-packages", value_name = "DIR")]
    site_packages: Vec<PathBuf>,

    /// Python interpreter asked for its site-packages directories
    #[arg(long)]
    python: Option<String>,

    /// Target Python version (e.g., py38, py39, py310, py311, py312, py313)
    #[arg(long, alias = "python-version")]
    target_version: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    debug!(
        "Verbosity level: {} (log level: {})",
        cli.verbose, log_level
    );

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            if cli.verbose > 0 {
                eprintln!("{err:?}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(target_version) = &cli.target_version {
        config.set_target_version(target_version.clone())?;
    }
    if let Some(python) = &cli.python {
        config.python.clone_from(python);
    }
    if !cli.site_packages.is_empty() {
        config.site_packages.clone_from(&cli.site_packages);
    }
    debug!("Configuration: {:?}", config);

    let recursive = cli.recursive || !cli.no_recursive;
    let python_files = expand_file_patterns(&cli.files, recursive)?;
    if python_files.is_empty() {
        eprintln!("Error: No Python files found");
        return Ok(ExitCode::FAILURE);
    }
    info!("Found {} Python files", python_files.len());

    let analysis = analyze_dependencies(&python_files, &config)?;
    println!("{}", analysis.report);

    if cli.uninstall && !analysis.report.is_empty() {
        uninstall_packages(&config.uninstall_command, analysis.report.packages());
    }

    Ok(ExitCode::SUCCESS)
}
