//! Asset and artifact type definitions

use kiln_core::{ContentHash, HASH_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An opaque asset identifier.
///
/// At config time this is whatever string the author wrote (a relative path,
/// a `sha256:` content URL, or something only a collaborator understands).
/// Nothing is loaded until a resolver is asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetUrl(String);

impl AssetUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The content URL of a hashed payload
    pub fn from_hash(hash: &ContentHash) -> Self {
        Self(hash.to_prefixed_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Content hash, if this is a `sha256:` URL
    pub fn content_hash(&self) -> Option<ContentHash> {
        ContentHash::from_prefixed_hex(&self.0)
    }

    pub fn is_content_addressed(&self) -> bool {
        self.0.starts_with(HASH_PREFIX)
    }
}

impl fmt::Display for AssetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetUrl {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Kinds of artifact a build can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Prefab,
    Mesh,
    Material,
    Texture,
    Animation,
    Collider,
    Decal,
    Audio,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 8] = [
        ArtifactKind::Prefab,
        ArtifactKind::Mesh,
        ArtifactKind::Material,
        ArtifactKind::Texture,
        ArtifactKind::Animation,
        ArtifactKind::Collider,
        ArtifactKind::Decal,
        ArtifactKind::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Prefab => "prefab",
            ArtifactKind::Mesh => "mesh",
            ArtifactKind::Material => "material",
            ArtifactKind::Texture => "texture",
            ArtifactKind::Animation => "animation",
            ArtifactKind::Collider => "collider",
            ArtifactKind::Decal => "decal",
            ArtifactKind::Audio => "audio",
        }
    }

    /// Parse the lowercase name used on the command line and in sidecars
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One build output: a payload plus the labels it is filed under
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub name: String,
    /// Source file (or aggregate label) the artifact was built from
    pub source: String,
    /// File extension used when the payload is stored
    pub extension: String,
    pub payload: Vec<u8>,
    pub tags: BTreeSet<String>,
    pub categories: Vec<Vec<String>>,
}

impl Artifact {
    pub fn new(
        kind: ArtifactKind,
        name: impl Into<String>,
        source: impl Into<String>,
        extension: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            source: source.into(),
            extension: extension.into(),
            payload,
            tags: BTreeSet::new(),
            categories: Vec::new(),
        }
    }

    pub fn hash(&self) -> ContentHash {
        ContentHash::from_bytes(&self.payload)
    }

    /// Content URL the store will file this artifact under
    pub fn url(&self) -> AssetUrl {
        AssetUrl::from_hash(&self.hash())
    }

    /// Add tags (set union)
    pub fn add_tags<'a>(&mut self, tags: impl IntoIterator<Item = &'a String>) {
        self.tags.extend(tags.into_iter().cloned());
    }

    /// Append a category path unless it is already present
    pub fn add_category(&mut self, path: &[String]) {
        if !self.categories.iter().any(|c| c.as_slice() == path) {
            self.categories.push(path.to_vec());
        }
    }

    /// Sidecar metadata describing this artifact
    pub fn meta(&self) -> AssetMeta {
        AssetMeta {
            name: self.name.clone(),
            kind: self.kind,
            url: self.url(),
            source: Some(self.source.clone()),
            extension: self.extension.clone(),
            size: self.payload.len() as u64,
            tags: self.tags.iter().cloned().collect(),
            categories: self.categories.clone(),
        }
    }
}

/// Metadata for a stored artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub url: AssetUrl,
    #[serde(default)]
    pub source: Option<String>,
    pub extension: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<Vec<String>>,
}

/// TOML sidecar file format for artifact metadata
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssetFile {
    pub asset: AssetMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_meta_sidecar_parse() {
        let toml_str = r#"
[asset]
name = "barrel"
type = "prefab"
url = "sha256:a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2"
source = "props/barrel.glb"
extension = "json"
tags = ["props"]
categories = [["Props", "Containers"]]
"#;

        let file: AssetFile = toml::from_str(toml_str).unwrap();
        assert_eq!(file.asset.name, "barrel");
        assert_eq!(file.asset.kind, ArtifactKind::Prefab);
        assert!(file.asset.url.is_content_addressed());
        assert_eq!(file.asset.categories, vec![vec!["Props", "Containers"]]);
    }

    #[test]
    fn test_artifact_url_is_payload_hash() {
        let a = Artifact::new(ArtifactKind::Mesh, "hull", "ship.glb", "json", b"[1,2,3]".to_vec());
        let b = Artifact::new(ArtifactKind::Mesh, "other", "boat.glb", "json", b"[1,2,3]".to_vec());
        assert_eq!(a.url(), b.url());
        assert_eq!(a.url().content_hash(), Some(a.hash()));
    }

    #[test]
    fn test_tags_are_a_set() {
        let mut a = Artifact::new(ArtifactKind::Audio, "hit", "hit.wav", "wav", vec![]);
        let tags = vec!["sfx".to_string(), "combat".to_string(), "sfx".to_string()];
        a.add_tags(&tags);
        a.add_tags(&tags);
        assert_eq!(a.tags.len(), 2);
    }

    #[test]
    fn test_categories_not_duplicated() {
        let mut a = Artifact::new(ArtifactKind::Decal, "moss", "moss", "json", vec![]);
        let path = vec!["Nature".to_string(), "Moss".to_string()];
        a.add_category(&path);
        a.add_category(&path);
        assert_eq!(a.categories.len(), 1);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(ArtifactKind::parse("collider"), Some(ArtifactKind::Collider));
        assert_eq!(ArtifactKind::parse("Collider"), None);
        for kind in ArtifactKind::ALL {
            assert_eq!(ArtifactKind::parse(&kind.to_string()), Some(kind));
        }
    }

    #[test]
    fn test_plain_url_is_not_content_addressed() {
        let url = AssetUrl::new("textures/bark_albedo.png");
        assert!(!url.is_content_addressed());
        assert!(url.content_hash().is_none());
    }
}
