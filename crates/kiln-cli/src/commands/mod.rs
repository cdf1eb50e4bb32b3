//! CLI command implementations

pub mod build;
pub mod check;
pub mod list;

use anyhow::Result;
use kiln_pipeline::BuildSettings;
use std::path::{Path, PathBuf};

/// Store root from the command line, else from the build settings of `project`.
/// Relative settings paths are taken from the project directory.
pub fn store_dir(explicit: Option<&str>, project: &Path, settings: &BuildSettings) -> PathBuf {
    match explicit {
        Some(dir) => PathBuf::from(dir),
        None if settings.store_dir.is_absolute() => settings.store_dir.clone(),
        None => project.join(&settings.store_dir),
    }
}

pub fn load_settings(project: &Path) -> Result<BuildSettings> {
    Ok(BuildSettings::load(project)?)
}
