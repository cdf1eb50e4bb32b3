//! Physics collider derivation

use crate::config::{Collider, ColliderType};
use glam::Vec3;
use kiln_import::RawScene;
use serde::Serialize;

const DEFAULT_CHARACTER_RADIUS: f32 = 0.5;
const DEFAULT_CHARACTER_HEIGHT: f32 = 2.0;

/// A derived collision shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape")]
pub enum ColliderShape {
    /// World-space triangles baked from the render meshes
    TriangleMesh {
        vertices: Vec<[f32; 3]>,
        triangles: Vec<[u32; 3]>,
        /// One normal per triangle
        normals: Vec<[f32; 3]>,
    },
    /// Upright (Z) capsule; `height` is the full height including caps
    Capsule { radius: f32, height: f32 },
    Sphere { radius: f32 },
}

/// Serialized collider artifact
#[derive(Debug, Clone, Serialize)]
pub struct ColliderPayload<'a> {
    pub collider_type: ColliderType,
    #[serde(flatten)]
    pub shape: &'a ColliderShape,
}

/// Derive the collider for a transformed scene. `None` for `Collider::None`
/// or when the scene has no geometry to extract.
pub fn derive(spec: &Collider, scene: &RawScene) -> Option<ColliderShape> {
    match *spec {
        Collider::None => None,
        Collider::FromModel {
            flip_normals,
            reverse_indices,
        } => from_model(scene, flip_normals, reverse_indices),
        Collider::Character { radius, height } => Some(character(scene, radius, height)),
    }
}

fn from_model(scene: &RawScene, flip_normals: bool, reverse_indices: bool) -> Option<ColliderShape> {
    let mut vertices: Vec<[f32; 3]> = Vec::new();
    let mut triangles: Vec<[u32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();

    for (_, mesh_index, world) in scene.mesh_instances() {
        let mesh = &scene.meshes[mesh_index];
        let base = vertices.len() as u32;
        vertices.extend(
            mesh.positions
                .iter()
                .map(|p| world.transform_point3(Vec3::from_array(*p)).to_array()),
        );

        for tri in mesh.triangle_indices().chunks_exact(3) {
            if tri.iter().any(|&i| i as usize >= mesh.positions.len()) {
                continue;
            }
            let [a, b, c] = [tri[0] + base, tri[1] + base, tri[2] + base];

            let pa = Vec3::from_array(vertices[a as usize]);
            let pb = Vec3::from_array(vertices[b as usize]);
            let pc = Vec3::from_array(vertices[c as usize]);
            let mut normal = (pb - pa).cross(pc - pa).normalize_or_zero();
            if flip_normals {
                normal = -normal;
            }
            normals.push(normal.to_array());

            triangles.push(if reverse_indices { [a, c, b] } else { [a, b, c] });
        }
    }

    if triangles.is_empty() {
        tracing::warn!(scene = %scene.name, "no triangles to build a collider from");
        return None;
    }

    Some(ColliderShape::TriangleMesh {
        vertices,
        triangles,
        normals,
    })
}

/// Character collider; missing dimensions come from the broad-phase AABB
/// (Z is up)
fn character(scene: &RawScene, radius: Option<f32>, height: Option<f32>) -> ColliderShape {
    let bounds = scene.aabb.or_else(|| scene.geometry_bounds());
    let derived_radius = bounds
        .map(|b| {
            let s = b.size();
            s[0].max(s[1]) * 0.5
        })
        .filter(|r| *r > 0.0)
        .unwrap_or(DEFAULT_CHARACTER_RADIUS);
    let derived_height = bounds
        .map(|b| b.size()[2])
        .filter(|h| *h > 0.0)
        .unwrap_or(DEFAULT_CHARACTER_HEIGHT);

    let radius = radius.unwrap_or(derived_radius);
    let height = height.unwrap_or(derived_height);

    if height <= radius * 2.0 {
        ColliderShape::Sphere { radius }
    } else {
        ColliderShape::Capsule { radius, height }
    }
}
