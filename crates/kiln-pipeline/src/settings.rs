//! Layered build settings
//!
//! Settings are loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `KILN_WORKERS`, `KILN_STORE_DIR`, `KILN_MISSING_ASSETS`
//! 2. Project-local: `<project>/.kiln/config.toml`
//! 3. Global: `~/.kiln/config.toml`

use kiln_asset::ResolutionStrategy;
use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `[build]` table of a settings file; every key is optional so layers can merge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    #[serde(default)]
    pub missing_assets: Option<ResolutionStrategy>,
}

/// Settings file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub build: BuildSection,
}

/// Resolved build settings
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    /// Size of the per-source worker pool
    pub workers: usize,
    /// Root of the content store
    pub store_dir: PathBuf,
    /// What to do when a referenced texture cannot be loaded
    pub missing_assets: ResolutionStrategy,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            store_dir: PathBuf::from(".kiln/store"),
            missing_assets: ResolutionStrategy::Strict,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl BuildSettings {
    /// Load settings with layered precedence: global < project < env vars
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut file = SettingsFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                Self::merge_into(&mut file, Self::load_file(&global_path)?);
            }
        }

        let local_path = project_dir.join(".kiln").join("config.toml");
        if local_path.exists() {
            Self::merge_into(&mut file, Self::load_file(&local_path)?);
        }

        Self::apply_env_overrides(&mut file)?;
        Ok(Self::resolve(file))
    }

    /// Load settings from a specific file path only (plus env vars)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut file = Self::load_file(path)?;
        Self::apply_env_overrides(&mut file)?;
        Ok(Self::resolve(file))
    }

    fn resolve(file: SettingsFile) -> Self {
        let defaults = Self::default();
        Self {
            workers: file.build.workers.filter(|&n| n > 0).unwrap_or(defaults.workers),
            store_dir: file.build.store_dir.unwrap_or(defaults.store_dir),
            missing_assets: file.build.missing_assets.unwrap_or(defaults.missing_assets),
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".kiln").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<SettingsFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            KilnError::ConfigError(format!("Failed to parse settings {}: {}", path.display(), e))
        })
    }

    fn merge_into(base: &mut SettingsFile, overlay: SettingsFile) {
        if overlay.build.workers.is_some() {
            base.build.workers = overlay.build.workers;
        }
        if overlay.build.store_dir.is_some() {
            base.build.store_dir = overlay.build.store_dir;
        }
        if overlay.build.missing_assets.is_some() {
            base.build.missing_assets = overlay.build.missing_assets;
        }
    }

    fn apply_env_overrides(file: &mut SettingsFile) -> Result<()> {
        if let Ok(workers) = std::env::var("KILN_WORKERS") {
            let n = workers.trim().parse::<usize>().map_err(|_| {
                KilnError::ConfigError(format!("KILN_WORKERS must be a number, got '{}'", workers))
            })?;
            file.build.workers = Some(n);
        }
        if let Ok(dir) = std::env::var("KILN_STORE_DIR") {
            file.build.store_dir = Some(PathBuf::from(dir));
        }
        if let Ok(mode) = std::env::var("KILN_MISSING_ASSETS") {
            let strategy = ResolutionStrategy::parse(&mode).ok_or_else(|| {
                KilnError::ConfigError(format!(
                    "KILN_MISSING_ASSETS must be 'strict' or 'placeholder', got '{}'",
                    mode
                ))
            })?;
            file.build.missing_assets = Some(strategy);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_settings(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiln_settings_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    // Env vars are process-wide; the tests touching them run in one function.
    #[test]
    fn test_file_and_env_layers() {
        std::env::remove_var("KILN_WORKERS");
        std::env::remove_var("KILN_STORE_DIR");
        std::env::remove_var("KILN_MISSING_ASSETS");

        let path = temp_settings(
            r#"
[build]
workers = 3
store_dir = "out/store"
missing_assets = "placeholder"
"#,
        );

        let settings = BuildSettings::load_from_file(&path).unwrap();
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.store_dir, PathBuf::from("out/store"));
        assert_eq!(settings.missing_assets, ResolutionStrategy::Placeholder);

        std::env::set_var("KILN_WORKERS", "7");
        std::env::set_var("KILN_MISSING_ASSETS", "strict");
        let settings = BuildSettings::load_from_file(&path).unwrap();
        assert_eq!(settings.workers, 7);
        assert_eq!(settings.missing_assets, ResolutionStrategy::Strict);
        assert_eq!(settings.store_dir, PathBuf::from("out/store"));

        std::env::set_var("KILN_WORKERS", "many");
        let err = BuildSettings::load_from_file(&path).unwrap_err();
        assert!(err.is_config_error());

        std::env::remove_var("KILN_WORKERS");
        std::env::remove_var("KILN_MISSING_ASSETS");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_project_layer_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("kiln_settings_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join(".kiln")).unwrap();
        std::fs::write(dir.join(".kiln/config.toml"), "[build]\nstore_dir = \"custom\"\n").unwrap();

        let mut file = SettingsFile::default();
        BuildSettings::merge_into(&mut file, BuildSettings::load_file(&dir.join(".kiln/config.toml")).unwrap());
        let settings = BuildSettings::resolve(file);
        assert_eq!(settings.store_dir, PathBuf::from("custom"));
        assert_eq!(settings.missing_assets, ResolutionStrategy::Strict);
        assert!(settings.workers >= 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_workers_falls_back() {
        let mut file = SettingsFile::default();
        file.build.workers = Some(0);
        assert!(BuildSettings::resolve(file).workers >= 1);
    }

    #[test]
    fn test_bad_settings_file_is_config_error() {
        let path = temp_settings("[build]\nworkers = \"lots\"\n");
        let err = BuildSettings::load_file(&path).unwrap_err();
        assert!(matches!(err, KilnError::ConfigError(_)));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
