pub mod analyzer;
pub mod combine;
pub mod config;
pub mod discovery;
pub mod dirs;
pub mod imports;
pub mod metadata;
pub mod site_packages;
pub mod uninstall;
pub mod visitors;

pub use analyzer::{Analysis, UnusedReport, analyze_dependencies};
pub use config::Config;
