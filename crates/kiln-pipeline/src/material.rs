//! Material resolution and materialization
//!
//! Resolution merges layers field by field: the winning override, then the
//! embedded material, then the PBR defaults. Texture references stay as
//! deferred [`AssetUrl`]s until [`materialize`] runs for the winning result,
//! so overridden-away textures are never loaded.

use crate::capability::{TextureCompressor, TextureSource};
use crate::config::{MaterialOverride, MaterialSpec, TextureSizeCap};
use crate::texture::{cap_texture, mean_luminance};
use glam::Vec4;
use image::RgbaImage;
use kiln_asset::{Artifact, ArtifactKind, AssetUrl};
use kiln_core::{KilnError, Result};
use kiln_import::{AlphaMode, ImportedMaterial, ImportedTexture};
use serde::Serialize;

/// A material with every field decided
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMaterial {
    pub name: String,
    pub source: Option<String>,
    pub base_color: Option<AssetUrl>,
    pub opacity: Option<AssetUrl>,
    pub normal_map: Option<AssetUrl>,
    pub metallic_roughness: Option<AssetUrl>,
    pub base_color_factor: Vec4,
    pub emissive_factor: Vec4,
    pub transparent: bool,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub metallic: f32,
    pub roughness: f32,
}

impl ResolvedMaterial {
    /// Apply the PBR defaults to whatever `spec` leaves unset
    pub fn from_spec(spec: MaterialSpec, fallback_name: &str) -> Self {
        Self {
            name: spec.name.unwrap_or_else(|| fallback_name.to_string()),
            source: spec.source,
            base_color: spec.base_color,
            opacity: spec.opacity,
            normal_map: spec.normal_map,
            metallic_roughness: spec.metallic_roughness,
            base_color_factor: spec.base_color_factor.unwrap_or(Vec4::ONE),
            emissive_factor: spec.emissive_factor.unwrap_or(Vec4::ZERO),
            transparent: spec.transparent.unwrap_or(false),
            alpha_cutoff: spec.alpha_cutoff.unwrap_or(0.5),
            double_sided: spec.double_sided.unwrap_or(false),
            metallic: spec.metallic.unwrap_or(1.0),
            roughness: spec.roughness.unwrap_or(1.0),
        }
    }
}

/// Legacy specular exponent to roughness. Higher exponents give smoother
/// surfaces; an exponent of 0 maps to fully rough.
pub fn roughness_from_specular_exponent(exponent: f32) -> f32 {
    (2.0 / (exponent.max(0.0) + 2.0)).sqrt()
}

/// Mean specular map luminance to metallic. 0.04 is the reflectance of a
/// typical dielectric; 0.5 and above reads as fully metallic.
pub fn metallic_from_specular_luminance(luminance: f32) -> f32 {
    ((luminance - 0.04) / 0.46).clamp(0.0, 1.0)
}

/// The first override whose filter matches `material_name`
pub fn select_override<'a>(
    material_name: &str,
    overrides: &'a [MaterialOverride],
) -> Option<&'a MaterialSpec> {
    overrides
        .iter()
        .find(|o| o.filter.matches(material_name))
        .map(|o| &o.material)
}

/// Resolve one material.
///
/// `base` is the embedded (or literal) material; the first matching
/// override is layered on top of it.
pub fn resolve(
    base: Option<&MaterialSpec>,
    overrides: &[MaterialOverride],
    textures: &dyn TextureSource,
) -> Result<ResolvedMaterial> {
    let base_name = base.and_then(|b| b.name.as_deref()).unwrap_or("");
    let winner = select_override(base_name, overrides);

    let mut merged = MaterialSpec::default();
    for layer in [winner, base].into_iter().flatten() {
        let layer = convert_legacy(layer, &merged, textures)?;
        merged = merge(merged, layer);
    }

    let fallback = if base_name.is_empty() { "material" } else { base_name };
    Ok(ResolvedMaterial::from_spec(merged, fallback))
}

/// Fill in metallic/roughness from a legacy specular map, but only where
/// neither this layer nor a higher one already decides them. A specular
/// exponent on its own converts nothing.
fn convert_legacy(
    layer: &MaterialSpec,
    above: &MaterialSpec,
    textures: &dyn TextureSource,
) -> Result<MaterialSpec> {
    let mut out = layer.clone();

    if let Some(url) = &layer.specular {
        if out.roughness.is_none() && above.roughness.is_none() {
            if let Some(exponent) = layer.specular_exponent {
                out.roughness = Some(roughness_from_specular_exponent(exponent));
            }
        }

        if out.metallic.is_none() && above.metallic.is_none() {
            if let Some(map) = textures.load(url)? {
                out.metallic = Some(metallic_from_specular_luminance(mean_luminance(&map)));
            }
        }
    }

    out.specular = None;
    out.specular_exponent = None;
    Ok(out)
}

/// Field-wise `high.or(low)`
fn merge(high: MaterialSpec, low: MaterialSpec) -> MaterialSpec {
    MaterialSpec {
        name: high.name.or(low.name),
        source: high.source.or(low.source),
        base_color: high.base_color.or(low.base_color),
        opacity: high.opacity.or(low.opacity),
        normal_map: high.normal_map.or(low.normal_map),
        metallic_roughness: high.metallic_roughness.or(low.metallic_roughness),
        base_color_factor: high.base_color_factor.or(low.base_color_factor),
        emissive_factor: high.emissive_factor.or(low.emissive_factor),
        transparent: high.transparent.or(low.transparent),
        alpha_cutoff: high.alpha_cutoff.or(low.alpha_cutoff),
        double_sided: high.double_sided.or(low.double_sided),
        metallic: high.metallic.or(low.metallic),
        roughness: high.roughness.or(low.roughness),
        specular: high.specular.or(low.specular),
        specular_exponent: high.specular_exponent.or(low.specular_exponent),
    }
}

/// View an embedded material as a resolution layer
pub fn spec_from_imported(material: &ImportedMaterial) -> MaterialSpec {
    MaterialSpec {
        name: Some(material.name.clone()),
        source: None,
        base_color: material.base_color_texture.as_deref().map(AssetUrl::from),
        opacity: material.opacity_texture.as_deref().map(AssetUrl::from),
        normal_map: material.normal_texture.as_deref().map(AssetUrl::from),
        metallic_roughness: material.metallic_roughness_texture.as_deref().map(AssetUrl::from),
        base_color_factor: material.base_color_factor.map(Vec4::from_array),
        emissive_factor: material.emissive_factor.map(Vec4::from_array),
        transparent: material.alpha_mode.map(|m| m == AlphaMode::Blend),
        alpha_cutoff: material.alpha_cutoff,
        double_sided: material.double_sided,
        metallic: material.metallic,
        roughness: material.roughness,
        specular: material.specular_texture.as_deref().map(AssetUrl::from),
        specular_exponent: material.specular_exponent,
    }
}

/// Texture lookup that tries a scene's embedded textures before `fallback`
pub struct SceneTextures<'a> {
    embedded: &'a [ImportedTexture],
    fallback: &'a dyn TextureSource,
}

impl<'a> SceneTextures<'a> {
    pub fn new(embedded: &'a [ImportedTexture], fallback: &'a dyn TextureSource) -> Self {
        Self { embedded, fallback }
    }
}

impl TextureSource for SceneTextures<'_> {
    fn load(&self, url: &AssetUrl) -> Result<Option<RgbaImage>> {
        match self.embedded.iter().find(|t| t.key == url.as_str()) {
            Some(texture) => RgbaImage::from_raw(texture.width, texture.height, texture.data.clone())
                .map(Some)
                .ok_or_else(|| {
                    KilnError::TextureError(format!(
                        "Embedded texture '{}' has {} bytes for {}x{}",
                        texture.name,
                        texture.data.len(),
                        texture.width,
                        texture.height
                    ))
                }),
            None => self.fallback.load(url),
        }
    }
}

/// Serialized material artifact; textures referenced by content URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub base_color: Option<AssetUrl>,
    pub opacity: Option<AssetUrl>,
    pub normal_map: Option<AssetUrl>,
    pub metallic_roughness: Option<AssetUrl>,
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 4],
    pub transparent: bool,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub metallic: f32,
    pub roughness: f32,
}

/// A material artifact plus the texture artifacts it references
#[derive(Debug, Clone)]
pub struct Materialized {
    pub material: Artifact,
    pub textures: Vec<Artifact>,
}

impl Materialized {
    pub fn url(&self) -> AssetUrl {
        self.material.url()
    }
}

/// Load, cap and encode a resolved material's textures and build its artifact
pub fn materialize(
    resolved: &ResolvedMaterial,
    source: &str,
    textures: &dyn TextureSource,
    cap: Option<TextureSizeCap>,
    compressor: &dyn TextureCompressor,
) -> Result<Materialized> {
    let mut emitted: Vec<Artifact> = Vec::new();

    let mut slot = |label: &str, url: &Option<AssetUrl>| -> Result<Option<AssetUrl>> {
        let Some(url) = url else { return Ok(None) };
        let Some(image) = textures.load(url)? else {
            tracing::warn!(material = %resolved.name, texture = %url, "texture missing, slot left empty");
            return Ok(None);
        };
        let image = match cap {
            Some(cap) => cap_texture(image, cap),
            None => image,
        };
        let artifact = Artifact::new(
            ArtifactKind::Texture,
            format!("{}_{}", resolved.name, label),
            source,
            compressor.extension(),
            compressor.compress(&image)?,
        );
        let content_url = artifact.url();
        if !emitted.iter().any(|a| a.url() == content_url) {
            emitted.push(artifact);
        }
        Ok(Some(content_url))
    };

    let payload = MaterialPayload {
        name: resolved.name.clone(),
        source: resolved.source.clone(),
        base_color: slot("base_color", &resolved.base_color)?,
        opacity: slot("opacity", &resolved.opacity)?,
        normal_map: slot("normalmap", &resolved.normal_map)?,
        metallic_roughness: slot("metallic_roughness", &resolved.metallic_roughness)?,
        base_color_factor: resolved.base_color_factor.to_array(),
        emissive_factor: resolved.emissive_factor.to_array(),
        transparent: resolved.transparent,
        alpha_cutoff: resolved.alpha_cutoff,
        double_sided: resolved.double_sided,
        metallic: resolved.metallic,
        roughness: resolved.roughness,
    };

    let material = Artifact::new(
        ArtifactKind::Material,
        resolved.name.clone(),
        source,
        "json",
        serde_json::to_vec(&payload)?,
    );

    Ok(Materialized {
        material,
        textures: emitted,
    })
}
