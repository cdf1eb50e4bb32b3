//! Pipeline document schema (`pipeline.json`)
//!
//! Variant-tagged fields map to internally tagged enums keyed on `"type"`.
//! Absent fields take their documented defaults at deserialization time;
//! config-time checks live in [`PipelineConfig::validate`] and run before
//! any source is touched.

use glam::{Vec3, Vec4};
use kiln_asset::AssetUrl;
use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Root of a pipeline document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub pipeline: PipelineKind,
    /// Glob patterns for accepted source files; empty accepts everything
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Category paths, each an ordered hierarchy
    #[serde(default)]
    pub categories: Vec<Vec<String>>,
}

/// The three mutually exclusive pipeline kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineKind {
    Models(ModelsPipeline),
    Materials(MaterialsPipeline),
    Audio,
}

impl PipelineKind {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::Models(_) => "Models",
            PipelineKind::Materials(_) => "Materials",
            PipelineKind::Audio => "Audio",
        }
    }
}

/// Settings for importing models into prefabs, meshes, materials and animations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsPipeline {
    #[serde(default)]
    pub importer: ModelImporterKind,
    /// Decoder hint passed through to the importer
    #[serde(default)]
    pub force_assimp: bool,
    #[serde(default)]
    pub collider: Collider,
    #[serde(default)]
    pub collider_type: Option<ColliderType>,
    #[serde(default)]
    pub cap_texture_sizes: Option<TextureSizeCap>,
    /// Treat every matched source as a variant of one aggregate output
    #[serde(default)]
    pub collection_of_variants: bool,
    #[serde(default = "default_true")]
    pub output_prefabs: bool,
    #[serde(default)]
    pub output_animations: bool,
    /// Static component data attached verbatim to generated prefabs
    #[serde(default)]
    pub prefab_components: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub material_overrides: Vec<MaterialOverride>,
    #[serde(default)]
    pub transforms: Vec<Transform>,
}

impl Default for ModelsPipeline {
    fn default() -> Self {
        Self {
            importer: ModelImporterKind::default(),
            force_assimp: false,
            collider: Collider::default(),
            collider_type: None,
            cap_texture_sizes: None,
            collection_of_variants: false,
            output_prefabs: true,
            output_animations: false,
            prefab_components: BTreeMap::new(),
            material_overrides: Vec::new(),
            transforms: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Which model importer to use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelImporterKind {
    #[default]
    Regular,
    UnityModels {
        use_prefabs: bool,
    },
    Quixel,
}

/// Settings for importing standalone materials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialsPipeline {
    pub importer: MaterialImporterKind,
    /// Also emit a decal for every material
    #[serde(default)]
    pub output_decals: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MaterialImporterKind {
    /// One material given literally; its asset references resolve during the build
    Single(MaterialSpec),
    Quixel,
}

/// A material description where every field is optional.
///
/// Absent fields fall back to the next layer during resolution and finally
/// to the PBR defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where the material came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color: Option<AssetUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<AssetUrl>,
    #[serde(default, rename = "normalmap", skip_serializing_if = "Option::is_none")]
    pub normal_map: Option<AssetUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic_roughness: Option<AssetUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color_factor: Option<Vec4>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive_factor: Option<Vec4>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_sided: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness: Option<f32>,
    /// Legacy (non-PBR) specular map, converted to metallic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular: Option<AssetUrl>,
    /// Legacy (non-PBR) specular exponent, converted to roughness
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular_exponent: Option<f32>,
}

/// A replacement material and the embedded materials it applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialOverride {
    pub filter: MaterialFilter,
    pub material: MaterialSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MaterialFilter {
    All,
    /// Exact, case-sensitive name match
    ByName { name: String },
}

impl MaterialFilter {
    pub fn matches(&self, material_name: &str) -> bool {
        match self {
            MaterialFilter::All => true,
            MaterialFilter::ByName { name } => name == material_name,
        }
    }
}

/// Physics collider to derive for a model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Collider {
    #[default]
    None,
    FromModel {
        #[serde(default)]
        flip_normals: bool,
        #[serde(default = "default_true")]
        reverse_indices: bool,
    },
    Character {
        #[serde(default)]
        radius: Option<f32>,
        #[serde(default)]
        height: Option<f32>,
    },
}

impl Collider {
    pub fn is_none(&self) -> bool {
        matches!(self, Collider::None)
    }
}

/// How a collider interacts with the physics scenes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColliderType {
    #[default]
    Static,
    Dynamic,
    TriggerArea,
    Picking,
}

impl ColliderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColliderType::Static => "Static",
            ColliderType::Dynamic => "Dynamic",
            ColliderType::TriggerArea => "TriggerArea",
            ColliderType::Picking => "Picking",
        }
    }

    /// Category path under which artifacts of this collider type are filed
    pub fn category(&self) -> Vec<String> {
        vec!["physics".to_string(), self.as_str().to_lowercase()]
    }
}

impl fmt::Display for ColliderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum texture dimension policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureSizeCap {
    X128,
    X256,
    X512,
    X1024,
    X2048,
    X4096,
    /// Should be a power of two; not enforced
    Custom(u32),
}

impl TextureSizeCap {
    /// Largest allowed width and height
    pub fn max_dimension(&self) -> u32 {
        match self {
            TextureSizeCap::X128 => 128,
            TextureSizeCap::X256 => 256,
            TextureSizeCap::X512 => 512,
            TextureSizeCap::X1024 => 1024,
            TextureSizeCap::X2048 => 2048,
            TextureSizeCap::X4096 => 4096,
            TextureSizeCap::Custom(size) => *size,
        }
    }
}

/// One step of the transform sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Transform {
    RotateYUpToZUp,
    RotateX { deg: f32 },
    RotateY { deg: f32 },
    RotateZ { deg: f32 },
    Scale { scale: f32 },
    Translate { translation: Vec3 },
    #[serde(rename = "ScaleAABB")]
    ScaleAabb { scale: f32 },
    ScaleAnimations { scale: f32 },
    SetRoot { name: String },
    Center,
}

impl Transform {
    /// Reject parameters no transform can apply meaningfully
    pub fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: String| Err(KilnError::InvalidTransform { index, reason });
        match self {
            Transform::RotateX { deg } | Transform::RotateY { deg } | Transform::RotateZ { deg }
                if !deg.is_finite() =>
            {
                invalid(format!("rotation must be finite, got {}", deg))
            }
            Transform::Scale { scale } if !scale.is_finite() || *scale == 0.0 => {
                invalid(format!("scale must be finite and non-zero, got {}", scale))
            }
            Transform::ScaleAabb { scale } | Transform::ScaleAnimations { scale }
                if !scale.is_finite() =>
            {
                invalid(format!("scale must be finite, got {}", scale))
            }
            Transform::Translate { translation } if !translation.is_finite() => {
                invalid(format!("translation must be finite, got {}", translation))
            }
            Transform::SetRoot { name } if name.is_empty() => {
                invalid("SetRoot requires a node name".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl PipelineConfig {
    /// Parse a pipeline document.
    ///
    /// Transform entries are decoded one at a time so a malformed or unknown
    /// entry is reported as `InvalidTransform` with its position.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut doc: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| KilnError::ConfigError(format!("Invalid pipeline document: {}", e)))?;

        let raw_transforms = doc
            .get_mut("pipeline")
            .and_then(|p| p.as_object_mut())
            .and_then(|p| p.remove("transforms"));

        let mut config: PipelineConfig = serde_json::from_value(doc)
            .map_err(|e| KilnError::ConfigError(format!("Invalid pipeline document: {}", e)))?;

        if let Some(raw) = raw_transforms {
            let entries = match raw {
                serde_json::Value::Array(entries) => entries,
                serde_json::Value::Null => Vec::new(),
                other => {
                    return Err(KilnError::ConfigError(format!(
                        "transforms must be a list, got {}",
                        other
                    )))
                }
            };

            let kind = config.pipeline.name();
            let PipelineKind::Models(models) = &mut config.pipeline else {
                return Err(KilnError::ConfigError(format!(
                    "transforms are only valid for the Models pipeline, not {}",
                    kind
                )));
            };

            for (index, entry) in entries.into_iter().enumerate() {
                let transform: Transform = serde_json::from_value(entry)
                    .map_err(|e| KilnError::InvalidTransform { index, reason: e.to_string() })?;
                models.transforms.push(transform);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load and validate a pipeline document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Config-time checks; nothing here touches a source file
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.sources {
            glob::Pattern::new(pattern).map_err(|e| {
                KilnError::ConfigError(format!("Invalid source pattern '{}': {}", pattern, e))
            })?;
        }

        if let PipelineKind::Models(models) = &self.pipeline {
            if models.collider.is_none() && models.collider_type.is_some() {
                return Err(KilnError::ColliderTypeWithoutCollider);
            }

            for (index, o) in models.material_overrides.iter().enumerate() {
                if matches!(&o.filter, MaterialFilter::ByName { name } if name.is_empty()) {
                    return Err(KilnError::InvalidOverrideFilter { index });
                }
            }

            for (index, transform) in models.transforms.iter().enumerate() {
                transform.validate(index)?;
            }

            if let Some(cap) = models.cap_texture_sizes {
                let size = cap.max_dimension();
                if size == 0 {
                    return Err(KilnError::ConfigError(
                        "cap_texture_sizes must be at least 1".to_string(),
                    ));
                }
                if !size.is_power_of_two() {
                    tracing::warn!(size, "texture size cap is not a power of two");
                }
            }
        }

        Ok(())
    }

    /// The effective collider type of a Models pipeline, if it derives a collider
    pub fn collider_type(&self) -> Option<ColliderType> {
        match &self.pipeline {
            PipelineKind::Models(models) if !models.collider.is_none() => {
                Some(models.collider_type.unwrap_or_default())
            }
            _ => None,
        }
    }

    /// Multi-line human readable description
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Pipeline: {}", self.pipeline.name())];
        match &self.pipeline {
            PipelineKind::Models(m) => {
                lines.push(format!("  Importer: {:?}", m.importer));
                lines.push(format!("  Collider: {:?}", m.collider));
                if let Some(t) = self.collider_type() {
                    lines.push(format!("  Collider type: {}", t));
                }
                if let Some(cap) = m.cap_texture_sizes {
                    lines.push(format!("  Texture cap: {}px", cap.max_dimension()));
                }
                lines.push(format!(
                    "  Outputs: prefabs={} animations={} variants={}",
                    m.output_prefabs, m.output_animations, m.collection_of_variants
                ));
                lines.push(format!("  Material overrides: {}", m.material_overrides.len()));
                lines.push(format!("  Transforms: {}", m.transforms.len()));
            }
            PipelineKind::Materials(m) => {
                let importer = match &m.importer {
                    MaterialImporterKind::Single(_) => "Single",
                    MaterialImporterKind::Quixel => "Quixel",
                };
                lines.push(format!("  Importer: {}", importer));
                lines.push(format!("  Decals: {}", m.output_decals));
            }
            PipelineKind::Audio => {}
        }
        if self.sources.is_empty() {
            lines.push("  Sources: (all files)".to_string());
        } else {
            lines.push(format!("  Sources: {}", self.sources.join(", ")));
        }
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            lines.push(format!("  Tags: {}", tags.join(", ")));
        }
        for path in &self.categories {
            lines.push(format!("  Category: {}", path.join(" / ")));
        }
        lines.join("\n")
    }
}
