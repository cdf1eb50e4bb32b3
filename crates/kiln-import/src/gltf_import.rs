//! glTF/GLB file importer

use crate::types::{
    AlphaMode, AnimationChannel, AnimationClip, AnimationProperty, ImportedMaterial,
    ImportedMesh, ImportedSkin, ImportedTexture, Keyframe, NodeTransform, RawScene, SceneNode,
};
use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use kiln_core::{KilnError, Result};
use std::path::Path;

/// Import a glTF or GLB file into a raw scene
pub fn import_gltf<P: AsRef<Path>>(path: P) -> Result<RawScene> {
    let path = path.as_ref();
    let (document, buffers, images) = gltf::import(path).map_err(|e| KilnError::ImporterFailure {
        path: path.display().to_string(),
        reason: format!("Failed to import glTF: {}", e),
    })?;

    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();

    Ok(build_scene(name, &document, &buffers, &images))
}

/// Import an in-memory glTF or GLB document
pub fn import_gltf_slice(bytes: &[u8], name: &str) -> Result<RawScene> {
    let (document, buffers, images) =
        gltf::import_slice(bytes).map_err(|e| KilnError::ImporterFailure {
            path: name.to_string(),
            reason: format!("Failed to import glTF: {}", e),
        })?;

    Ok(build_scene(name.to_string(), &document, &buffers, &images))
}

fn build_scene(
    name: String,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
) -> RawScene {
    let mut meshes = Vec::new();
    // glTF mesh index -> indices of its primitives in `meshes`
    let mut primitive_map: Vec<Vec<usize>> = Vec::new();

    for mesh in document.meshes() {
        let mesh_name = mesh
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("mesh_{}", mesh.index()));

        let mut slots = Vec::new();
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .map(|iter| iter.collect())
                .unwrap_or_default();

            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_default();

            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().collect())
                .unwrap_or_default();

            let indices: Vec<u32> = reader
                .read_indices()
                .map(|iter| iter.into_u32().collect())
                .unwrap_or_default();

            let joints: Option<Vec<[u16; 4]>> =
                reader.read_joints(0).map(|iter| iter.into_u16().collect());
            let weights: Option<Vec<[f32; 4]>> =
                reader.read_weights(0).map(|iter| iter.into_f32().collect());

            slots.push(meshes.len());
            meshes.push(ImportedMesh {
                name: mesh_name.clone(),
                positions,
                normals,
                uvs,
                indices,
                material: primitive.material().index(),
                joints,
                weights,
            });
        }
        primitive_map.push(slots);
    }

    let nodes: Vec<SceneNode> = document
        .nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            SceneNode {
                name: node
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("node_{}", node.index())),
                transform: NodeTransform {
                    translation: Vec3::from_array(translation),
                    rotation: Quat::from_array(rotation),
                    scale: Vec3::from_array(scale),
                },
                children: node.children().map(|c| c.index()).collect(),
                meshes: node
                    .mesh()
                    .and_then(|m| primitive_map.get(m.index()).cloned())
                    .unwrap_or_default(),
                skin: node.skin().map(|s| s.index()),
            }
        })
        .collect();

    let roots = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => {
            let mut has_parent = vec![false; nodes.len()];
            for node in &nodes {
                for &child in &node.children {
                    if let Some(flag) = has_parent.get_mut(child) {
                        *flag = true;
                    }
                }
            }
            (0..nodes.len()).filter(|&i| !has_parent[i]).collect()
        }
    };

    let skins = document
        .skins()
        .map(|skin| {
            let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let inverse_bind_matrices = reader
                .read_inverse_bind_matrices()
                .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);
            ImportedSkin {
                name: skin
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("skin_{}", skin.index())),
                joints,
                inverse_bind_matrices,
            }
        })
        .collect();

    let animations = document
        .animations()
        .map(|anim| read_animation(&anim, buffers))
        .collect();

    let materials = document.materials().map(|m| read_material(&m)).collect();

    let textures = images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let name = document
                .images()
                .nth(i)
                .and_then(|img| img.name().map(String::from))
                .unwrap_or_else(|| format!("texture_{}", i));
            ImportedTexture {
                key: embedded_key(i),
                name,
                width: image.width,
                height: image.height,
                data: to_rgba8(image),
            }
        })
        .collect();

    let mut scene = RawScene {
        name,
        nodes,
        roots,
        meshes,
        skins,
        animations,
        materials,
        textures,
        aabb: None,
    };
    scene.aabb = scene.geometry_bounds();

    tracing::debug!(
        scene = %scene.name,
        nodes = scene.nodes.len(),
        meshes = scene.meshes.len(),
        materials = scene.materials.len(),
        "decoded glTF"
    );

    scene
}

fn read_animation(anim: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> AnimationClip {
    let mut channels = Vec::new();
    let mut duration = 0.0f32;

    for channel in anim.channels() {
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
        let times: Vec<f32> = match reader.read_inputs() {
            Some(iter) => iter.collect(),
            None => continue,
        };

        let (property, values): (AnimationProperty, Vec<Vec<f32>>) = match reader.read_outputs() {
            Some(ReadOutputs::Translations(iter)) => {
                (AnimationProperty::Translation, iter.map(|v| v.to_vec()).collect())
            }
            Some(ReadOutputs::Rotations(rot)) => (
                AnimationProperty::Rotation,
                rot.into_f32().map(|v| v.to_vec()).collect(),
            ),
            Some(ReadOutputs::Scales(iter)) => {
                (AnimationProperty::Scale, iter.map(|v| v.to_vec()).collect())
            }
            // Morph target weights are not carried
            _ => continue,
        };

        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Linear => "Linear",
            gltf::animation::Interpolation::Step => "Step",
            gltf::animation::Interpolation::CubicSpline => "CubicSpline",
        };

        // Cubic spline outputs are (in-tangent, value, out-tangent) triples
        let stride = if interpolation == "CubicSpline" { 3 } else { 1 };
        let keyframes: Vec<Keyframe> = times
            .iter()
            .enumerate()
            .filter_map(|(i, &time)| {
                let value = values.get(i * stride + (stride / 2))?.clone();
                Some(Keyframe { time, value })
            })
            .collect();

        if let Some(last) = times.last() {
            duration = duration.max(*last);
        }

        channels.push(AnimationChannel {
            node: channel.target().node().index(),
            property,
            interpolation: interpolation.to_string(),
            keyframes,
        });
    }

    AnimationClip {
        name: anim
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("animation_{}", anim.index())),
        duration,
        channels,
    }
}

fn read_material(material: &gltf::Material) -> ImportedMaterial {
    let name = material
        .name()
        .map(String::from)
        .unwrap_or_else(|| format!("material_{}", material.index().unwrap_or(0)));

    let pbr = material.pbr_metallic_roughness();
    let [er, eg, eb] = material.emissive_factor();
    let alpha_mode = match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        gltf::material::AlphaMode::Mask => AlphaMode::Mask,
        gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    };
    let base_color_texture = pbr
        .base_color_texture()
        .map(|info| embedded_key(info.texture().source().index()));

    ImportedMaterial {
        name,
        base_color_factor: Some(pbr.base_color_factor()),
        emissive_factor: Some([er, eg, eb, 0.0]),
        metallic: Some(pbr.metallic_factor()),
        roughness: Some(pbr.roughness_factor()),
        alpha_mode: Some(alpha_mode),
        alpha_cutoff: material.alpha_cutoff(),
        double_sided: Some(material.double_sided()),
        // glTF keeps opacity in the base color alpha channel
        opacity_texture: match alpha_mode {
            AlphaMode::Opaque => None,
            _ => base_color_texture.clone(),
        },
        base_color_texture,
        normal_texture: material
            .normal_texture()
            .map(|info| embedded_key(info.texture().source().index())),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture()
            .map(|info| embedded_key(info.texture().source().index())),
        specular_texture: None,
        specular_exponent: None,
    }
}

fn embedded_key(image_index: usize) -> String {
    format!("embedded:{}", image_index)
}

/// Expand any glTF pixel format to tightly packed RGBA8
fn to_rgba8(image: &gltf::image::Data) -> Vec<u8> {
    use gltf::image::Format;

    let px = &image.pixels;
    let count = (image.width * image.height) as usize;
    let mut out = Vec::with_capacity(count * 4);

    let u16_at = |i: usize| -> u8 {
        let v = u16::from_le_bytes([px[i], px[i + 1]]);
        (v >> 8) as u8
    };
    let f32_at = |i: usize| -> u8 {
        let v = f32::from_le_bytes([px[i], px[i + 1], px[i + 2], px[i + 3]]);
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    };

    for p in 0..count {
        let rgba = match image.format {
            Format::R8 => [px[p], px[p], px[p], 255],
            Format::R8G8 => [px[p * 2], px[p * 2 + 1], 0, 255],
            Format::R8G8B8 => [px[p * 3], px[p * 3 + 1], px[p * 3 + 2], 255],
            Format::R8G8B8A8 => [px[p * 4], px[p * 4 + 1], px[p * 4 + 2], px[p * 4 + 3]],
            Format::R16 => {
                let v = u16_at(p * 2);
                [v, v, v, 255]
            }
            Format::R16G16 => [u16_at(p * 4), u16_at(p * 4 + 2), 0, 255],
            Format::R16G16B16 => [u16_at(p * 6), u16_at(p * 6 + 2), u16_at(p * 6 + 4), 255],
            Format::R16G16B16A16 => [
                u16_at(p * 8),
                u16_at(p * 8 + 2),
                u16_at(p * 8 + 4),
                u16_at(p * 8 + 6),
            ],
            Format::R32G32B32FLOAT => [f32_at(p * 12), f32_at(p * 12 + 4), f32_at(p * 12 + 8), 255],
            Format::R32G32B32A32FLOAT => [
                f32_at(p * 16),
                f32_at(p * 16 + 4),
                f32_at(p * 16 + 8),
                f32_at(p * 16 + 12),
            ],
        };
        out.extend_from_slice(&rgba);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack a glTF JSON document and binary buffer into a GLB container
    fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json_bytes = json.as_bytes().to_vec();
        while json_bytes.len() % 4 != 0 {
            json_bytes.push(b' ');
        }
        let mut bin_bytes = bin.to_vec();
        while bin_bytes.len() % 4 != 0 {
            bin_bytes.push(0);
        }

        let total = 12 + 8 + json_bytes.len() + 8 + bin_bytes.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&0x4654_6C67u32.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
        out.extend_from_slice(&json_bytes);
        out.extend_from_slice(&(bin_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
        out.extend_from_slice(&bin_bytes);
        out
    }

    fn triangle_bin() -> Vec<u8> {
        [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            .iter()
            .flat_map(|p| p.iter().flat_map(|c| c.to_le_bytes()))
            .collect()
    }

    const TRIANGLE_JSON: &str = r#"{
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [
            {"name": "Root", "translation": [1.0, 0.0, 0.0], "children": [1]},
            {"name": "Leaf", "mesh": 0}
        ],
        "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0}, "material": 0}]}],
        "materials": [{
            "name": "Bark",
            "emissiveFactor": [1.0, 0.5, 0.0],
            "alphaMode": "MASK",
            "alphaCutoff": 0.3,
            "doubleSided": true
        }],
        "buffers": [{"byteLength": 36}],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }]
    }"#;

    #[test]
    fn test_import_glb_scene_graph() {
        let scene = import_gltf_slice(&glb(TRIANGLE_JSON, &triangle_bin()), "tri").unwrap();

        assert_eq!(scene.name, "tri");
        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.roots, vec![0]);
        assert_eq!(scene.nodes[0].children, vec![1]);
        assert_eq!(scene.nodes[1].meshes, vec![0]);
        assert_eq!(scene.meshes[0].positions.len(), 3);
        assert_eq!(scene.meshes[0].material, Some(0));

        let aabb = scene.aabb.unwrap();
        assert_eq!(aabb.min, [1.0, 0.0, 0.0]);
        assert_eq!(aabb.max, [2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_import_glb_material() {
        let scene = import_gltf_slice(&glb(TRIANGLE_JSON, &triangle_bin()), "tri").unwrap();
        let mat = &scene.materials[0];

        assert_eq!(mat.name, "Bark");
        assert_eq!(mat.emissive_factor, Some([1.0, 0.5, 0.0, 0.0]));
        assert_eq!(mat.alpha_mode, Some(AlphaMode::Mask));
        assert_eq!(mat.alpha_cutoff, Some(0.3));
        assert_eq!(mat.double_sided, Some(true));
        assert!(mat.base_color_texture.is_none());
    }

    #[test]
    fn test_import_garbage_fails() {
        let err = import_gltf_slice(b"not a model", "junk.glb").unwrap_err();
        assert!(matches!(err, KilnError::ImporterFailure { ref path, .. } if path == "junk.glb"));
    }

    #[test]
    fn test_rgba_expansion() {
        let image = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        assert_eq!(to_rgba8(&image), vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }
}
