//! Deferred asset reference resolution

use crate::store::ContentStore;
use crate::types::AssetUrl;
use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Strategy for handling unresolved asset references
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// Fail on missing assets
    #[default]
    Strict,
    /// Carry on without the asset; consumers fall back to defaults
    Placeholder,
}

impl ResolutionStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Some(ResolutionStrategy::Strict),
            "placeholder" => Some(ResolutionStrategy::Placeholder),
            _ => None,
        }
    }
}

/// Result of attempting to resolve an asset reference
#[derive(Debug, Clone)]
pub enum ResolveResult {
    /// Asset bytes were found
    Found(Vec<u8>),
    /// Asset not found, caller should substitute its default
    Placeholder { url: AssetUrl },
    /// Asset not found with no fallback
    Missing { url: AssetUrl, reason: String },
}

impl ResolveResult {
    /// Check if the asset was found
    pub fn is_found(&self) -> bool {
        matches!(self, ResolveResult::Found(_))
    }

    /// Bytes if found, `None` for a placeholder, error if missing
    pub fn into_bytes(self) -> Result<Option<Vec<u8>>> {
        match self {
            ResolveResult::Found(bytes) => Ok(Some(bytes)),
            ResolveResult::Placeholder { .. } => Ok(None),
            ResolveResult::Missing { url, reason } => {
                Err(KilnError::AssetError(format!("Unresolved asset '{}': {}", url, reason)))
            }
        }
    }
}

/// Resolves `AssetUrl`s to bytes on demand.
///
/// `sha256:` URLs are read from the content store; anything else is treated
/// as a path relative to the base directory. Remote URLs are never fetched.
pub struct AssetResolver {
    base_dir: PathBuf,
    store: Option<ContentStore>,
    strategy: ResolutionStrategy,
}

impl AssetResolver {
    /// Create a new resolver rooted at `base_dir`
    pub fn new<P: AsRef<Path>>(base_dir: P, strategy: ResolutionStrategy) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            store: None,
            strategy,
        }
    }

    /// Also resolve content URLs from a store
    pub fn with_store(mut self, store: ContentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    /// Resolve an asset reference
    pub fn resolve(&self, url: &AssetUrl) -> ResolveResult {
        match self.lookup(url) {
            Ok(bytes) => ResolveResult::Found(bytes),
            Err(reason) => match self.strategy {
                ResolutionStrategy::Strict => ResolveResult::Missing {
                    url: url.clone(),
                    reason,
                },
                ResolutionStrategy::Placeholder => {
                    tracing::warn!(url = %url, %reason, "asset missing, using placeholder");
                    ResolveResult::Placeholder { url: url.clone() }
                }
            },
        }
    }

    fn lookup(&self, url: &AssetUrl) -> std::result::Result<Vec<u8>, String> {
        if url.is_content_addressed() {
            let store = self
                .store
                .as_ref()
                .ok_or_else(|| "no content store configured".to_string())?;
            return store.read(url).map_err(|e| e.to_string());
        }

        let raw = url.as_str();
        if raw.contains("://") && !raw.starts_with("file://") {
            return Err("remote URLs are not fetched during a build".to_string());
        }
        let rel = raw.strip_prefix("file://").unwrap_or(raw);
        let rel_path = Path::new(rel);
        if rel_path.is_absolute() || rel_path.components().any(|c| c == Component::ParentDir) {
            return Err("path escapes the pipeline directory".to_string());
        }

        std::fs::read(self.base_dir.join(rel_path)).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AssetStore;
    use crate::types::{Artifact, ArtifactKind};
    use std::fs;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiln_resolver_test_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_resolve_relative_path() {
        let dir = temp_dir();
        fs::create_dir_all(dir.join("textures")).unwrap();
        fs::write(dir.join("textures/bark.png"), b"png bytes").unwrap();

        let resolver = AssetResolver::new(&dir, ResolutionStrategy::Strict);
        let result = resolver.resolve(&AssetUrl::new("textures/bark.png"));
        assert!(result.is_found());
        assert_eq!(result.into_bytes().unwrap().unwrap(), b"png bytes");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_resolve_strict_missing() {
        let dir = temp_dir();
        let resolver = AssetResolver::new(&dir, ResolutionStrategy::Strict);
        let result = resolver.resolve(&AssetUrl::new("textures/none.png"));
        assert!(matches!(result, ResolveResult::Missing { .. }));
        assert!(result.into_bytes().is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_resolve_placeholder_missing() {
        let dir = temp_dir();
        let resolver = AssetResolver::new(&dir, ResolutionStrategy::Placeholder);
        let result = resolver.resolve(&AssetUrl::new("textures/none.png"));
        assert!(matches!(result, ResolveResult::Placeholder { .. }));
        assert!(result.into_bytes().unwrap().is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_resolve_content_url_from_store() {
        let dir = temp_dir();
        let store_dir = dir.join("store");
        let artifact = Artifact::new(ArtifactKind::Texture, "moss", "moss.png", "png", b"moss".to_vec());
        let url = ContentStore::new(&store_dir).put(&artifact).unwrap();

        let resolver = AssetResolver::new(&dir, ResolutionStrategy::Strict)
            .with_store(ContentStore::new(&store_dir));
        assert_eq!(resolver.resolve(&url).into_bytes().unwrap().unwrap(), b"moss");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_remote_and_escaping_urls_are_missing() {
        let dir = temp_dir();
        let resolver = AssetResolver::new(&dir, ResolutionStrategy::Strict);
        assert!(!resolver.resolve(&AssetUrl::new("https://cdn.example.com/a.png")).is_found());
        assert!(!resolver.resolve(&AssetUrl::new("../secrets.png")).is_found());
        fs::remove_dir_all(&dir).ok();
    }
}
