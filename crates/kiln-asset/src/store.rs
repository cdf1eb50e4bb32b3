//! Content-addressed artifact storage

use crate::types::{Artifact, AssetFile, AssetUrl};
use kiln_core::{ContentHash, KilnError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Destination for finished build artifacts.
///
/// `put` must be idempotent: storing identical content twice yields the
/// same URL and leaves the store unchanged.
pub trait AssetStore: Send + Sync {
    fn put(&self, artifact: &Artifact) -> Result<AssetUrl>;
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Content-addressed file storage
///
/// Stores payloads at `<root>/<first-2-hex>/<full-hash>.<ext>` with a
/// `<full-hash>.asset.toml` metadata sidecar next to each one.
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Create a new content store at the given root directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the payload path for a hash
    pub fn get(&self, hash: &ContentHash) -> Option<PathBuf> {
        let hex = hash.to_hex();
        let dir = self.root.join(&hex[..2]);

        let entries = fs::read_dir(&dir).ok()?;
        entries
            .flatten()
            .map(|entry| entry.path())
            .find(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                name.starts_with(&hex) && !name.ends_with(".asset.toml") && !name.ends_with(".tmp")
            })
    }

    /// Check if a hash exists in the store
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.get(hash).is_some()
    }

    /// Read a stored payload back
    pub fn read(&self, url: &AssetUrl) -> Result<Vec<u8>> {
        let hash = url
            .content_hash()
            .ok_or_else(|| KilnError::AssetError(format!("Not a content URL: {}", url)))?;
        let path = self
            .get(&hash)
            .ok_or_else(|| KilnError::AssetError(format!("Not in store: {}", url)))?;
        Ok(fs::read(path)?)
    }

    /// List all stored payload hashes
    pub fn list(&self) -> Result<Vec<ContentHash>> {
        let mut hashes = Vec::new();

        if !self.root.exists() {
            return Ok(hashes);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            for file_entry in fs::read_dir(entry.path())? {
                let name = file_entry?.file_name();
                let name = name.to_string_lossy();
                if name.ends_with(".asset.toml") || name.ends_with(".tmp") {
                    continue;
                }
                if let Some(hash) = name.split('.').next().and_then(ContentHash::from_hex) {
                    hashes.push(hash);
                }
            }
        }

        hashes.sort();
        Ok(hashes)
    }

    fn payload_path(&self, hash: &ContentHash, extension: &str) -> PathBuf {
        let hex = hash.to_hex();
        let ext = if extension.is_empty() { "bin" } else { extension };
        self.root.join(&hex[..2]).join(format!("{}.{}", hex, ext))
    }

    fn sidecar_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[..2]).join(format!("{}.asset.toml", hex))
    }
}

impl AssetStore for ContentStore {
    fn put(&self, artifact: &Artifact) -> Result<AssetUrl> {
        let hash = artifact.hash();
        let url = AssetUrl::from_hash(&hash);

        let dest = self.payload_path(&hash, &artifact.extension);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if !self.contains(&hash) {
            write_atomic(&dest, &artifact.payload)?;
            tracing::debug!(url = %url, kind = %artifact.kind, "stored artifact");
        }

        let sidecar = self.sidecar_path(&hash);
        if !sidecar.exists() {
            let file = AssetFile {
                asset: artifact.meta(),
            };
            let content = toml::to_string_pretty(&file)?;
            write_atomic(&sidecar, content.as_bytes())?;
        }

        Ok(url)
    }
}

/// Write to a temp file in the same directory, then rename into place
fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| KilnError::AssetError(format!("Bad store path: {}", dest.display())))?;
    let tmp = dest.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, dest) {
        fs::remove_file(&tmp).ok();
        return Err(e.into());
    }
    Ok(())
}
