//! Catalog of stored artifacts, built from store sidecars

use crate::types::{ArtifactKind, AssetFile, AssetMeta, AssetUrl};
use kiln_core::{KilnError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Index of stored artifacts and their metadata
#[derive(Debug, Default)]
pub struct AssetCatalog {
    /// Artifacts indexed by content URL
    assets: BTreeMap<AssetUrl, AssetMeta>,
    /// Name to URLs index; different sources may produce same-named artifacts
    name_index: HashMap<String, Vec<AssetUrl>>,
}

impl AssetCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load artifact metadata from `.asset.toml` sidecar files in a directory tree
    pub fn load_from_directory<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut catalog = Self::new();
        Self::scan_directory(&mut catalog, path.as_ref())?;
        Ok(catalog)
    }

    fn scan_directory(catalog: &mut AssetCatalog, dir: &Path) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                Self::scan_directory(catalog, &path)?;
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".asset.toml"))
                .unwrap_or(false)
            {
                let content = fs::read_to_string(&path)?;
                let file: AssetFile = toml::from_str(&content).map_err(|e| {
                    KilnError::AssetError(format!("Failed to parse {}: {}", path.display(), e))
                })?;
                catalog.register(file.asset);
            }
        }

        Ok(())
    }

    /// Register an artifact in the catalog
    pub fn register(&mut self, meta: AssetMeta) {
        let urls = self.name_index.entry(meta.name.clone()).or_default();
        if !urls.contains(&meta.url) {
            urls.push(meta.url.clone());
        }
        self.assets.insert(meta.url.clone(), meta);
    }

    /// Get artifact metadata by content URL
    pub fn get(&self, url: &AssetUrl) -> Option<&AssetMeta> {
        self.assets.get(url)
    }

    /// All artifacts with the given name
    pub fn by_name(&self, name: &str) -> Vec<&AssetMeta> {
        self.name_index
            .get(name)
            .map(|urls| urls.iter().filter_map(|u| self.assets.get(u)).collect())
            .unwrap_or_default()
    }

    /// Get all artifacts of a given kind
    pub fn by_kind(&self, kind: ArtifactKind) -> Vec<&AssetMeta> {
        self.assets.values().filter(|a| a.kind == kind).collect()
    }

    /// Get all artifacts with a given tag
    pub fn by_tag(&self, tag: &str) -> Vec<&AssetMeta> {
        self.assets
            .values()
            .filter(|a| a.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Artifacts filed under a category path or any of its sub-categories
    pub fn by_category(&self, prefix: &[&str]) -> Vec<&AssetMeta> {
        self.assets
            .values()
            .filter(|a| {
                a.categories.iter().any(|path| {
                    path.len() >= prefix.len() && path.iter().zip(prefix).all(|(p, q)| p == q)
                })
            })
            .collect()
    }

    /// All artifacts, ordered by URL
    pub fn iter(&self) -> impl Iterator<Item = &AssetMeta> {
        self.assets.values()
    }

    /// Get the number of registered artifacts
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
