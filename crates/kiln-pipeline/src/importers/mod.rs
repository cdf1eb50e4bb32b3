//! Shipped collaborator implementations for model, material and texture input

mod gltf_model;
mod quixel;
mod textures;

pub use gltf_model::GltfImporter;
pub use quixel::UnavailableMaterialImporter;
pub use textures::ResolverTextureSource;
