//! Collaborator capabilities consumed by the dispatcher
//!
//! Decoders, transcoders and encoders sit behind these traits so the
//! engine only orchestrates. Shipped implementations live in
//! [`crate::importers`], [`crate::audio`] and [`crate::texture`].

use crate::config::{MaterialSpec, ModelImporterKind};
use image::RgbaImage;
use kiln_asset::AssetUrl;
use kiln_core::Result;
use kiln_import::RawScene;
use std::path::{Path, PathBuf};

/// A matched input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the pipeline directory, `/`-separated; used for
    /// glob matching and reporting
    pub name: String,
    /// Where the file actually lives
    pub path: PathBuf,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// File name without directories or extension
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
            .to_string()
    }
}

/// Decoder hints from the pipeline document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportHints {
    pub use_prefabs: bool,
    pub force_assimp: bool,
}

impl ImportHints {
    pub fn for_importer(kind: &ModelImporterKind, force_assimp: bool) -> Self {
        Self {
            use_prefabs: matches!(kind, ModelImporterKind::UnityModels { use_prefabs: true }),
            force_assimp,
        }
    }
}

/// Turns a model source into a raw scene
pub trait ModelImporter: Send + Sync {
    fn import(
        &self,
        source: &SourceFile,
        kind: &ModelImporterKind,
        hints: ImportHints,
    ) -> Result<RawScene>;
}

/// Extracts standalone materials from a source (Quixel exports)
pub trait MaterialImporter: Send + Sync {
    fn import(&self, source: &SourceFile) -> Result<Vec<MaterialSpec>>;
}

/// Transcoded audio ready for the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    /// Container/codec the bytes are in, used as the stored extension
    pub format: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f32,
    pub bytes: Vec<u8>,
}

pub trait AudioTranscoder: Send + Sync {
    fn transcode(&self, source: &SourceFile) -> Result<AudioAsset>;
}

/// Loads textures referenced by materials.
///
/// `Ok(None)` means the texture is missing but the build may continue
/// without it.
pub trait TextureSource: Send + Sync {
    fn load(&self, url: &AssetUrl) -> Result<Option<RgbaImage>>;
}

/// Final GPU-ready texture encoding
pub trait TextureCompressor: Send + Sync {
    /// Extension of the encoded payload
    fn extension(&self) -> &str;
    fn compress(&self, image: &RgbaImage) -> Result<Vec<u8>>;
}

/// Every collaborator one run needs
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub models: &'a dyn ModelImporter,
    pub materials: &'a dyn MaterialImporter,
    pub audio: &'a dyn AudioTranscoder,
    pub textures: &'a dyn TextureSource,
    pub compressor: &'a dyn TextureCompressor,
}
