//! Pipeline dispatch
//!
//! Matches sources against the pipeline's patterns and runs the per-kind
//! build for each one on a bounded rayon pool. Results come back in source
//! order. A failing source is recorded in the [`BuildOutput`] and the rest
//! keep going, except for aggregates (`collection_of_variants`), which are
//! all-or-nothing, and Quixel material imports, which abort the run.

use crate::capability::{Collaborators, ImportHints, SourceFile};
use crate::collider::{self, ColliderPayload};
use crate::config::{
    ColliderType, MaterialImporterKind, MaterialsPipeline, ModelsPipeline, PipelineConfig,
    PipelineKind,
};
use crate::material::{self, SceneTextures};
use crate::report::{BuildOutput, SourceFailure};
use crate::transform;
use kiln_asset::{Artifact, ArtifactKind, AssetStore, AssetUrl};
use kiln_core::{KilnError, Result};
use kiln_import::{AnimationProperty, Keyframe, MeshBounds, NodeTransform, RawScene};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, checked before each source and between steps
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(KilnError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Sources whose name matches at least one pattern; no patterns matches all
pub fn match_sources(patterns: &[String], sources: &[SourceFile]) -> Result<Vec<SourceFile>> {
    let patterns = patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| KilnError::ConfigError(format!("Invalid source pattern '{}': {}", p, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(sources
        .iter()
        .filter(|s| patterns.is_empty() || patterns.iter().any(|p| p.matches(&s.name)))
        .cloned()
        .collect())
}

/// Store every artifact of a finished run, in order
pub fn persist(
    output: &BuildOutput,
    store: &dyn AssetStore,
    cancel: &CancelToken,
) -> Result<Vec<AssetUrl>> {
    let mut urls = Vec::with_capacity(output.artifacts.len());
    for artifact in &output.artifacts {
        cancel.check()?;
        let url = store.put(artifact)?;
        tracing::debug!(kind = %artifact.kind, name = %artifact.name, %url, "stored artifact");
        urls.push(url);
    }
    Ok(urls)
}

/// Runs pipeline documents against source files
pub struct Dispatcher<'a> {
    collab: Collaborators<'a>,
    workers: usize,
    cancel: CancelToken,
}

impl<'a> Dispatcher<'a> {
    pub fn new(collab: Collaborators<'a>) -> Self {
        Self {
            collab,
            workers: 0,
            cancel: CancelToken::default(),
        }
    }

    /// Bound the worker pool; 0 uses one worker per CPU
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Build every matching source of one pipeline document
    pub fn run(&self, config: &PipelineConfig, sources: &[SourceFile]) -> Result<BuildOutput> {
        self.cancel.check()?;
        config.validate()?;
        let kind = config.pipeline.name();
        let matched = match_sources(&config.sources, sources)?;
        tracing::info!(pipeline = kind, matched = matched.len(), of = sources.len(), "running pipeline");

        if matched.is_empty() {
            return match config.pipeline {
                PipelineKind::Audio => Ok(BuildOutput::new(kind, 0)),
                _ => Err(KilnError::NoMatchingSources {
                    pipeline: kind.to_string(),
                }),
            };
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| KilnError::ConfigError(format!("Failed to start worker pool: {}", e)))?;

        let mut output = pool.install(|| match &config.pipeline {
            PipelineKind::Models(models) => self.run_models(models, &matched),
            PipelineKind::Materials(materials) => self.run_materials(materials, &matched),
            PipelineKind::Audio => self.run_audio(&matched),
        })?;
        self.cancel.check()?;

        for artifact in &mut output.artifacts {
            artifact.add_tags(&config.tags);
            for category in &config.categories {
                artifact.add_category(category);
            }
        }

        tracing::info!(
            pipeline = kind,
            artifacts = output.artifacts.len(),
            failures = output.failures.len(),
            "pipeline finished"
        );
        Ok(output)
    }

    fn run_models(&self, models: &ModelsPipeline, sources: &[SourceFile]) -> Result<BuildOutput> {
        let results: Vec<Result<BuiltModel>> = sources
            .par_iter()
            .map(|source| self.build_model(models, source))
            .collect();

        if results.iter().any(|r| matches!(r, Err(KilnError::Cancelled))) {
            return Err(KilnError::Cancelled);
        }

        let mut output = BuildOutput::new("Models", sources.len());

        if models.collection_of_variants {
            let mut built = Vec::with_capacity(results.len());
            let mut failed: Vec<(String, KilnError)> = Vec::new();
            for (source, result) in sources.iter().zip(results) {
                match result {
                    Ok(model) => built.push(model),
                    Err(error) => failed.push((source.name.clone(), error)),
                }
            }

            if !failed.is_empty() {
                let names: Vec<String> = failed.iter().map(|(n, _)| n.clone()).collect();
                let reason = failed
                    .iter()
                    .map(|(_, e)| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                tracing::warn!(failed = %names.join(", "), "variant collection discarded");
                output.failures.push(SourceFailure {
                    source: names.join(", "),
                    error: KilnError::PartialAggregateFailure {
                        failed: names,
                        reason,
                    },
                });
                return Ok(output);
            }

            let name = aggregate_name(sources);
            let physics = built.iter().find_map(|m| m.collider_type());
            let mut variants = Vec::with_capacity(built.len());
            for model in built {
                for artifact in model.artifacts {
                    push_unique(&mut output.artifacts, artifact);
                }
                variants.push(model.prefab);
            }
            if models.output_prefabs {
                let payload = VariantsPayload {
                    name: &name,
                    variants,
                    components: &models.prefab_components,
                };
                let mut prefab = Artifact::new(
                    ArtifactKind::Prefab,
                    name.as_str(),
                    "collection_of_variants",
                    "json",
                    serde_json::to_vec(&payload)?,
                );
                if let Some(collider_type) = physics {
                    prefab.add_category(&collider_type.category());
                }
                output.artifacts.push(prefab);
            }
            return Ok(output);
        }

        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(mut model) => {
                    output.artifacts.append(&mut model.artifacts);
                    if models.output_prefabs {
                        model.prefab.components = models.prefab_components.clone();
                        let mut prefab = Artifact::new(
                            ArtifactKind::Prefab,
                            model.prefab.name.as_str(),
                            source.name.as_str(),
                            "json",
                            serde_json::to_vec(&model.prefab)?,
                        );
                        if let Some(collider_type) = model.collider_type() {
                            prefab.add_category(&collider_type.category());
                        }
                        output.artifacts.push(prefab);
                    }
                }
                Err(error) => {
                    tracing::warn!(source = %source.name, %error, "source failed");
                    output.failures.push(SourceFailure {
                        source: source.name.clone(),
                        error,
                    });
                }
            }
        }
        Ok(output)
    }

    /// Import, transform, then derive collider, materials, meshes and
    /// animations for one model source
    fn build_model(&self, models: &ModelsPipeline, source: &SourceFile) -> Result<BuiltModel> {
        self.cancel.check()?;
        let hints = ImportHints::for_importer(&models.importer, models.force_assimp);
        let scene = self
            .collab
            .models
            .import(source, &models.importer, hints)
            .map_err(|e| importer_failure(source, e))?;

        self.cancel.check()?;
        let scene = transform::apply(scene, &models.transforms)?;
        let stem = source.stem();
        let mut artifacts = Vec::new();

        self.cancel.check()?;
        let collider = match collider::derive(&models.collider, &scene) {
            Some(shape) => {
                let collider_type = models.collider_type.unwrap_or_default();
                let payload = ColliderPayload {
                    collider_type,
                    shape: &shape,
                };
                let artifact = Artifact::new(
                    ArtifactKind::Collider,
                    format!("{}_collider", stem),
                    source.name.as_str(),
                    "json",
                    serde_json::to_vec(&payload)?,
                );
                let url = artifact.url();
                artifacts.push(artifact);
                Some(PrefabCollider { url, collider_type })
            }
            None => None,
        };

        self.cancel.check()?;
        let textures = SceneTextures::new(&scene.textures, self.collab.textures);
        let mut material_urls = Vec::with_capacity(scene.materials.len());
        for imported in &scene.materials {
            let spec = material::spec_from_imported(imported);
            let resolved = material::resolve(Some(&spec), &models.material_overrides, &textures)?;
            let built = material::materialize(
                &resolved,
                &source.name,
                &textures,
                models.cap_texture_sizes,
                self.collab.compressor,
            )?;
            material_urls.push(built.url());
            for texture in built.textures {
                push_unique(&mut artifacts, texture);
            }
            push_unique(&mut artifacts, built.material);
        }

        self.cancel.check()?;
        let mut mesh_refs = Vec::with_capacity(scene.meshes.len());
        for (index, mesh) in scene.meshes.iter().enumerate() {
            let material = mesh.material.and_then(|m| material_urls.get(m).cloned());
            let name = if mesh.name.is_empty() {
                format!("{}_mesh{}", stem, index)
            } else {
                mesh.name.clone()
            };
            let payload = MeshPayload {
                name: &name,
                positions: &mesh.positions,
                normals: &mesh.normals,
                uvs: &mesh.uvs,
                indices: &mesh.indices,
                joints: mesh.joints.as_deref(),
                weights: mesh.weights.as_deref(),
                bounds: mesh.bounds(),
                material: material.clone(),
            };
            let artifact = Artifact::new(
                ArtifactKind::Mesh,
                name.as_str(),
                source.name.as_str(),
                "json",
                serde_json::to_vec(&payload)?,
            );
            mesh_refs.push(PrefabMesh {
                mesh: artifact.url(),
                material,
            });
            push_unique(&mut artifacts, artifact);
        }

        if models.output_animations {
            for clip in &scene.animations {
                let payload = animation_payload(&scene, clip);
                artifacts.push(Artifact::new(
                    ArtifactKind::Animation,
                    clip.name.as_str(),
                    source.name.as_str(),
                    "json",
                    serde_json::to_vec(&payload)?,
                ));
            }
        }

        // Only sources that actually produced a collider get the physics category
        if let Some(c) = &collider {
            let category = c.collider_type.category();
            for artifact in &mut artifacts {
                artifact.add_category(&category);
            }
        }

        tracing::debug!(source = %source.name, artifacts = artifacts.len(), "model built");
        Ok(BuiltModel {
            prefab: prefab_payload(&scene, stem, &source.name, &mesh_refs, collider),
            artifacts,
        })
    }

    fn run_materials(
        &self,
        materials: &MaterialsPipeline,
        sources: &[SourceFile],
    ) -> Result<BuildOutput> {
        let mut output = BuildOutput::new("Materials", sources.len());

        match &materials.importer {
            MaterialImporterKind::Single(spec) => {
                self.cancel.check()?;
                let resolved = material::resolve(Some(spec), &[], self.collab.textures)?;
                let label = resolved.source.clone().unwrap_or_else(|| "Single".to_string());
                output.artifacts = self.emit_material(&resolved, &label, materials.output_decals)?;
            }
            MaterialImporterKind::Quixel => {
                let results: Vec<Result<Vec<Artifact>>> = sources
                    .par_iter()
                    .map(|source| {
                        self.cancel.check()?;
                        let specs = self
                            .collab
                            .materials
                            .import(source)
                            .map_err(|e| importer_failure(source, e))?;
                        let mut artifacts = Vec::new();
                        for spec in &specs {
                            self.cancel.check()?;
                            let resolved = material::resolve(Some(spec), &[], self.collab.textures)?;
                            artifacts.extend(self.emit_material(
                                &resolved,
                                &source.name,
                                materials.output_decals,
                            )?);
                        }
                        Ok(artifacts)
                    })
                    .collect();

                // Any Quixel import failure aborts the run
                for result in results {
                    for artifact in result? {
                        push_unique(&mut output.artifacts, artifact);
                    }
                }
            }
        }
        Ok(output)
    }

    fn emit_material(
        &self,
        resolved: &material::ResolvedMaterial,
        source: &str,
        decal: bool,
    ) -> Result<Vec<Artifact>> {
        let built =
            material::materialize(resolved, source, self.collab.textures, None, self.collab.compressor)?;
        let material_url = built.url();
        let mut artifacts = built.textures;
        artifacts.push(built.material);
        if decal {
            let payload = DecalPayload {
                name: &resolved.name,
                material: material_url,
            };
            artifacts.push(Artifact::new(
                ArtifactKind::Decal,
                format!("{}_decal", resolved.name),
                source,
                "json",
                serde_json::to_vec(&payload)?,
            ));
        }
        Ok(artifacts)
    }

    fn run_audio(&self, sources: &[SourceFile]) -> Result<BuildOutput> {
        let results: Vec<Result<Artifact>> = sources
            .par_iter()
            .map(|source| {
                self.cancel.check()?;
                let asset = self.collab.audio.transcode(source).map_err(|e| match e {
                    KilnError::AudioTranscodeError { .. } | KilnError::Cancelled => e,
                    other => KilnError::AudioTranscodeError {
                        path: source.name.clone(),
                        reason: other.to_string(),
                    },
                })?;
                tracing::debug!(
                    source = %source.name,
                    format = %asset.format,
                    sample_rate = asset.sample_rate,
                    channels = asset.channels,
                    duration = asset.duration_secs,
                    "audio transcoded"
                );
                Ok(Artifact::new(
                    ArtifactKind::Audio,
                    source.stem(),
                    source.name.as_str(),
                    asset.format,
                    asset.bytes,
                ))
            })
            .collect();

        let mut output = BuildOutput::new("Audio", sources.len());
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(artifact) => output.artifacts.push(artifact),
                Err(KilnError::Cancelled) => return Err(KilnError::Cancelled),
                Err(error) => {
                    tracing::warn!(source = %source.name, %error, "source failed");
                    output.failures.push(SourceFailure {
                        source: source.name.clone(),
                        error,
                    });
                }
            }
        }
        Ok(output)
    }
}

fn importer_failure(source: &SourceFile, error: KilnError) -> KilnError {
    match error {
        KilnError::ImporterFailure { .. } | KilnError::Cancelled => error,
        other => KilnError::ImporterFailure {
            path: source.name.clone(),
            reason: other.to_string(),
        },
    }
}

/// Identical payloads collapse to one artifact
fn push_unique(artifacts: &mut Vec<Artifact>, artifact: Artifact) {
    let url = artifact.url();
    if !artifacts
        .iter()
        .any(|a| a.kind == artifact.kind && a.url() == url)
    {
        artifacts.push(artifact);
    }
}

/// Longest common stem prefix of the variants, e.g. `rock_01`, `rock_02` -> `rock`
fn aggregate_name(sources: &[SourceFile]) -> String {
    let stems: Vec<String> = sources.iter().map(|s| s.stem()).collect();
    let Some(first) = stems.first() else {
        return "variants".to_string();
    };
    let mut prefix_len = first.len();
    for stem in &stems[1..] {
        prefix_len = first
            .char_indices()
            .zip(stem.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, c), _)| i + c.len_utf8())
            .unwrap_or(0)
            .min(prefix_len);
    }
    let name = first[..prefix_len].trim_end_matches(|c: char| c == '_' || c == '-' || c == ' ' || c.is_ascii_digit());
    if name.is_empty() {
        "variants".to_string()
    } else {
        name.to_string()
    }
}

struct BuiltModel {
    artifacts: Vec<Artifact>,
    prefab: PrefabPayload,
}

impl BuiltModel {
    fn collider_type(&self) -> Option<ColliderType> {
        self.prefab.collider.as_ref().map(|c| c.collider_type)
    }
}

#[derive(Debug, Clone, Serialize)]
struct PrefabMesh {
    mesh: AssetUrl,
    material: Option<AssetUrl>,
}

#[derive(Debug, Clone, Serialize)]
struct PrefabCollider {
    url: AssetUrl,
    collider_type: ColliderType,
}

#[derive(Debug, Serialize)]
struct PrefabNode {
    name: String,
    transform: NodeTransform,
    children: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    meshes: Vec<PrefabMesh>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skin: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PrefabSkin {
    name: String,
    joints: Vec<usize>,
    inverse_bind_matrices: Vec<[f32; 16]>,
}

#[derive(Debug, Serialize)]
struct PrefabPayload {
    name: String,
    source: String,
    roots: Vec<usize>,
    nodes: Vec<PrefabNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skins: Vec<PrefabSkin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collider: Option<PrefabCollider>,
    aabb: Option<MeshBounds>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    components: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct VariantsPayload<'a> {
    name: &'a str,
    variants: Vec<PrefabPayload>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    components: &'a BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct MeshPayload<'a> {
    name: &'a str,
    positions: &'a [[f32; 3]],
    normals: &'a [[f32; 3]],
    uvs: &'a [[f32; 2]],
    indices: &'a [u32],
    #[serde(skip_serializing_if = "Option::is_none")]
    joints: Option<&'a [[u16; 4]]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weights: Option<&'a [[f32; 4]]>,
    bounds: Option<MeshBounds>,
    material: Option<AssetUrl>,
}

#[derive(Serialize)]
struct ChannelPayload<'a> {
    target: &'a str,
    property: AnimationProperty,
    interpolation: &'a str,
    keyframes: &'a [Keyframe],
}

#[derive(Serialize)]
struct AnimationPayload<'a> {
    name: &'a str,
    duration: f32,
    channels: Vec<ChannelPayload<'a>>,
}

#[derive(Serialize)]
struct DecalPayload<'a> {
    name: &'a str,
    material: AssetUrl,
}

fn animation_payload<'a>(scene: &'a RawScene, clip: &'a kiln_import::AnimationClip) -> AnimationPayload<'a> {
    AnimationPayload {
        name: &clip.name,
        duration: clip.duration,
        channels: clip
            .channels
            .iter()
            .filter_map(|c| {
                let node = scene.nodes.get(c.node)?;
                Some(ChannelPayload {
                    target: &node.name,
                    property: c.property,
                    interpolation: &c.interpolation,
                    keyframes: &c.keyframes,
                })
            })
            .collect(),
    }
}

fn prefab_payload(
    scene: &RawScene,
    name: String,
    source: &str,
    mesh_refs: &[PrefabMesh],
    collider: Option<PrefabCollider>,
) -> PrefabPayload {
    PrefabPayload {
        name,
        source: source.to_string(),
        roots: scene.roots.clone(),
        nodes: scene
            .nodes
            .iter()
            .map(|n| PrefabNode {
                name: n.name.clone(),
                transform: n.transform,
                children: n.children.clone(),
                meshes: n.meshes.iter().filter_map(|&m| mesh_refs.get(m).cloned()).collect(),
                skin: n.skin,
            })
            .collect(),
        skins: scene
            .skins
            .iter()
            .map(|s| PrefabSkin {
                name: s.name.clone(),
                joints: s.joints.clone(),
                inverse_bind_matrices: s.inverse_bind_matrices.iter().map(|m| m.to_cols_array()).collect(),
            })
            .collect(),
        collider,
        aabb: scene.aabb,
        components: BTreeMap::new(),
    }
}
