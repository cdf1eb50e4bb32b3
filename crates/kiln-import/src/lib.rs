//! Kiln Import - Raw scene decoding
//!
//! This crate defines the raw scene graph that model importers produce
//! (nodes, meshes, skins, animations, embedded materials and textures)
//! and a glTF/GLB decoder that builds one.

mod gltf_import;
mod types;

pub use gltf_import::{import_gltf, import_gltf_slice};
pub use types::{
    AlphaMode, AnimationChannel, AnimationClip, AnimationProperty, ImportedMaterial,
    ImportedMesh, ImportedSkin, ImportedTexture, Keyframe, MeshBounds, NodeTransform, RawScene,
    SceneNode,
};
