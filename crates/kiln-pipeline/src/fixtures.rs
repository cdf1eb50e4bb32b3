//! Scripted collaborators for pipeline tests

use crate::capability::{
    AudioAsset, AudioTranscoder, Collaborators, ImportHints, MaterialImporter, ModelImporter,
    SourceFile, TextureSource,
};
use crate::config::{MaterialSpec, ModelImporterKind};
use crate::texture::PngTextureEncoder;
use glam::Vec3;
use image::{Rgba, RgbaImage};
use kiln_asset::AssetUrl;
use kiln_core::{KilnError, Result};
use kiln_import::{
    AlphaMode, AnimationChannel, AnimationClip, AnimationProperty, ImportedMaterial, ImportedMesh,
    ImportedTexture, Keyframe, NodeTransform, RawScene, SceneNode,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory textures; unknown URLs load as missing (`Ok(None)`)
#[derive(Default)]
pub struct FakeTextures {
    images: HashMap<String, RgbaImage>,
    log: Mutex<Vec<String>>,
}

impl FakeTextures {
    pub fn with(mut self, url: &str, image: RgbaImage) -> Self {
        self.images.insert(url.to_string(), image);
        self
    }

    /// Number of load calls so far
    pub fn loads(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// URLs requested so far, in order
    pub fn loaded(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl TextureSource for FakeTextures {
    fn load(&self, url: &AssetUrl) -> Result<Option<RgbaImage>> {
        self.log.lock().unwrap().push(url.to_string());
        Ok(self.images.get(url.as_str()).cloned())
    }
}

/// Model importer returning prepared scenes by source name
#[derive(Default)]
pub struct ScriptedImporter {
    scenes: HashMap<String, RawScene>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, ImportHints)>>,
}

impl ScriptedImporter {
    pub fn with(mut self, source: &str, scene: RawScene) -> Self {
        self.scenes.insert(source.to_string(), scene);
        self
    }

    pub fn failing(mut self, source: &str) -> Self {
        self.failing.insert(source.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, ImportHints)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ModelImporter for ScriptedImporter {
    fn import(
        &self,
        source: &SourceFile,
        _kind: &ModelImporterKind,
        hints: ImportHints,
    ) -> Result<RawScene> {
        self.calls.lock().unwrap().push((source.name.clone(), hints));
        if self.failing.contains(&source.name) {
            return Err(KilnError::ImporterFailure {
                path: source.name.clone(),
                reason: "corrupt file".to_string(),
            });
        }
        self.scenes
            .get(&source.name)
            .cloned()
            .ok_or_else(|| KilnError::ImporterFailure {
                path: source.name.clone(),
                reason: "no scripted scene".to_string(),
            })
    }
}

/// Quixel-style material importer returning prepared materials
#[derive(Default)]
pub struct ScriptedMaterials {
    materials: HashMap<String, Vec<MaterialSpec>>,
}

impl ScriptedMaterials {
    pub fn with(mut self, source: &str, materials: Vec<MaterialSpec>) -> Self {
        self.materials.insert(source.to_string(), materials);
        self
    }
}

impl MaterialImporter for ScriptedMaterials {
    fn import(&self, source: &SourceFile) -> Result<Vec<MaterialSpec>> {
        self.materials
            .get(&source.name)
            .cloned()
            .ok_or_else(|| KilnError::ImporterFailure {
                path: source.name.clone(),
                reason: "not a material export".to_string(),
            })
    }
}

/// Transcoder that fails for any source whose name contains "bad"
#[derive(Default)]
pub struct ScriptedTranscoder;

impl AudioTranscoder for ScriptedTranscoder {
    fn transcode(&self, source: &SourceFile) -> Result<AudioAsset> {
        if source.name.contains("bad") {
            return Err(KilnError::AudioTranscodeError {
                path: source.name.clone(),
                reason: "unsupported codec".to_string(),
            });
        }
        Ok(AudioAsset {
            format: "ogg".to_string(),
            sample_rate: 48_000,
            channels: 1,
            duration_secs: 1.0,
            bytes: format!("audio:{}", source.name).into_bytes(),
        })
    }
}

/// One set of fakes wired together for a dispatcher
#[derive(Default)]
pub struct Fakes {
    pub models: ScriptedImporter,
    pub materials: ScriptedMaterials,
    pub audio: ScriptedTranscoder,
    pub textures: FakeTextures,
    pub compressor: PngTextureEncoder,
}

impl Fakes {
    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            models: &self.models,
            materials: &self.materials,
            audio: &self.audio,
            textures: &self.textures,
            compressor: &self.compressor,
        }
    }
}

pub fn sources(names: &[&str]) -> Vec<SourceFile> {
    names
        .iter()
        .map(|n| SourceFile::new(*n, format!("/fixtures/{}", n)))
        .collect()
}

/// A small asymmetric model: root "Body" with one mesh and a child "Head"
/// carrying a second mesh, one embedded "Skin" material with an embedded
/// 64x32 base color texture, and one animation clip.
///
/// `seed` shifts the geometry so different sources hash differently.
pub fn sample_scene(name: &str, seed: f32) -> RawScene {
    let body = ImportedMesh {
        name: "body".to_string(),
        positions: vec![
            [0.0 + seed, 0.0, 0.0],
            [1.0 + seed, 0.0, 0.0],
            [1.0 + seed, 1.0, 0.0],
            [0.0 + seed, 1.0, 2.0],
        ],
        normals: vec![[0.0, 0.0, 1.0]; 4],
        indices: vec![0, 1, 2, 0, 2, 3],
        material: Some(0),
        ..Default::default()
    };
    let head = ImportedMesh {
        name: "head".to_string(),
        positions: vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [0.0, 0.5, 0.5]],
        indices: vec![0, 1, 2],
        material: Some(0),
        ..Default::default()
    };

    let mut scene = RawScene {
        name: name.to_string(),
        nodes: vec![
            SceneNode {
                name: "Body".to_string(),
                transform: NodeTransform::IDENTITY,
                children: vec![1],
                meshes: vec![0],
                skin: None,
            },
            SceneNode {
                name: "Head".to_string(),
                transform: NodeTransform {
                    translation: Vec3::new(0.0, 0.0, 3.0),
                    ..NodeTransform::IDENTITY
                },
                children: vec![],
                meshes: vec![1],
                skin: None,
            },
        ],
        roots: vec![0],
        meshes: vec![body, head],
        skins: vec![],
        animations: vec![AnimationClip {
            name: "nod".to_string(),
            duration: 1.0,
            channels: vec![AnimationChannel {
                node: 1,
                property: AnimationProperty::Translation,
                interpolation: "Linear".to_string(),
                keyframes: vec![
                    Keyframe { time: 0.0, value: vec![0.0, 0.0, 3.0] },
                    Keyframe { time: 1.0, value: vec![0.0, 0.2, 3.0] },
                ],
            }],
        }],
        materials: vec![ImportedMaterial {
            name: "Skin".to_string(),
            base_color_factor: Some([1.0, 0.8, 0.7, 1.0]),
            emissive_factor: Some([0.0, 0.0, 0.0, 0.0]),
            metallic: Some(0.0),
            roughness: Some(0.6),
            alpha_mode: Some(AlphaMode::Opaque),
            double_sided: Some(false),
            base_color_texture: Some("embedded:0".to_string()),
            ..Default::default()
        }],
        textures: vec![ImportedTexture {
            key: "embedded:0".to_string(),
            name: "skin_albedo".to_string(),
            width: 64,
            height: 32,
            data: RgbaImage::from_pixel(64, 32, Rgba([200, 150, 120, 255])).into_raw(),
        }],
        aabb: None,
    };
    scene.aabb = scene.geometry_bounds();
    scene
}
