//! Kiln Pipeline - Declarative asset import pipelines
//!
//! A `pipeline.json` document selects one of three pipeline kinds (Models,
//! Materials, Audio) and the sources it applies to. The [`Dispatcher`] runs
//! it over matching source files, producing content-addressed artifacts:
//! prefabs, meshes, materials, textures, animations, colliders, decals and
//! audio. Format decoding sits behind the traits in [`capability`]; the
//! shipped implementations live in [`importers`], [`audio`] and [`texture`].

pub mod audio;
pub mod capability;
pub mod collider;
pub mod config;
pub mod dispatcher;
pub mod importers;
pub mod material;
pub mod report;
pub mod settings;
pub mod texture;
pub mod transform;

#[cfg(test)]
mod fixtures;

pub use audio::WavTranscoder;
pub use capability::{
    AudioAsset, AudioTranscoder, Collaborators, ImportHints, MaterialImporter, ModelImporter,
    SourceFile, TextureCompressor, TextureSource,
};
pub use config::{
    Collider, ColliderType, MaterialFilter, MaterialImporterKind, MaterialOverride, MaterialSpec,
    MaterialsPipeline, ModelImporterKind, ModelsPipeline, PipelineConfig, PipelineKind,
    TextureSizeCap, Transform,
};
pub use dispatcher::{match_sources, persist, CancelToken, Dispatcher};
pub use importers::{GltfImporter, ResolverTextureSource, UnavailableMaterialImporter};
pub use report::{BuildOutput, SourceFailure};
pub use settings::BuildSettings;
pub use texture::PngTextureEncoder;

/// File name of a pipeline document
pub const PIPELINE_FILE: &str = "pipeline.json";
