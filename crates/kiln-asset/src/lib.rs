//! Kiln Asset - Content-addressed artifact storage
//!
//! This crate provides the opaque `AssetUrl` reference type, build artifacts,
//! the `AssetStore` capability with a filesystem-backed `ContentStore`,
//! a sidecar metadata catalog, and deferred resolution of asset references.

mod catalog;
mod resolver;
mod store;
mod types;

pub use catalog::AssetCatalog;
pub use resolver::{AssetResolver, ResolutionStrategy, ResolveResult};
pub use store::{AssetStore, ContentStore};
pub use types::{Artifact, ArtifactKind, AssetMeta, AssetUrl};
