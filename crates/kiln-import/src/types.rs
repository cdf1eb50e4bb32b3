//! Raw scene types produced by model importers

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A decoded model before any pipeline processing
#[derive(Debug, Clone, Default)]
pub struct RawScene {
    /// Name of the model, usually the source file stem
    pub name: String,
    /// Scene graph nodes with local transforms
    pub nodes: Vec<SceneNode>,
    /// Indices of top-level (root) nodes in the scene graph
    pub roots: Vec<usize>,
    /// Mesh primitives, referenced by nodes
    pub meshes: Vec<ImportedMesh>,
    /// Skins (joint sets with inverse bind matrices)
    pub skins: Vec<ImportedSkin>,
    /// Animation clips targeting nodes
    pub animations: Vec<AnimationClip>,
    /// Embedded materials
    pub materials: Vec<ImportedMaterial>,
    /// Embedded textures, decoded to RGBA8
    pub textures: Vec<ImportedTexture>,
    /// Broad-phase bounding box used for culling and physics.
    ///
    /// Initialised from geometry at import; only `ScaleAABB` changes it afterwards.
    pub aabb: Option<MeshBounds>,
}

impl RawScene {
    /// Index of the node with exactly this name
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Parent of every node, derived from child lists
    pub fn parents(&self) -> Vec<Option<usize>> {
        let mut parents = vec![None; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                if let Some(slot) = parents.get_mut(child) {
                    *slot = Some(index);
                }
            }
        }
        parents
    }

    /// World transform of every node reachable from the roots.
    ///
    /// Unreachable nodes get their local transform.
    pub fn world_transforms(&self) -> Vec<Mat4> {
        let mut world: Vec<Mat4> = self.nodes.iter().map(|n| n.transform.to_mat4()).collect();
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> = self
            .roots
            .iter()
            .filter(|&&r| r < self.nodes.len())
            .map(|&r| (r, Mat4::IDENTITY))
            .collect();

        while let Some((index, parent_world)) = stack.pop() {
            if visited[index] {
                continue;
            }
            visited[index] = true;
            let node_world = parent_world * self.nodes[index].transform.to_mat4();
            world[index] = node_world;
            for &child in &self.nodes[index].children {
                if child < self.nodes.len() {
                    stack.push((child, node_world));
                }
            }
        }

        world
    }

    /// Every (node, mesh, world transform) triple reachable from the roots
    pub fn mesh_instances(&self) -> Vec<(usize, usize, Mat4)> {
        let world = self.world_transforms();
        let reachable = self.reachable();
        let mut instances = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if !reachable[index] {
                continue;
            }
            for &mesh in &node.meshes {
                if mesh < self.meshes.len() {
                    instances.push((index, mesh, world[index]));
                }
            }
        }
        instances
    }

    /// World-space bounds of all mesh geometry reachable from the roots
    pub fn geometry_bounds(&self) -> Option<MeshBounds> {
        self.mesh_instances()
            .into_iter()
            .filter_map(|(_, mesh, world)| {
                let positions: Vec<[f32; 3]> = self.meshes[mesh]
                    .positions
                    .iter()
                    .map(|p| world.transform_point3(Vec3::from_array(*p)).to_array())
                    .collect();
                MeshBounds::from_positions(&positions)
            })
            .reduce(|a, b| a.union(&b))
    }

    fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = self.roots.clone();
        while let Some(index) = stack.pop() {
            if index >= self.nodes.len() || seen[index] {
                continue;
            }
            seen[index] = true;
            stack.extend(self.nodes[index].children.iter().copied());
        }
        seen
    }
}

/// Local translation / rotation / scale of a node (applied scale first)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl NodeTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decompose an affine matrix; shear is lost
    pub fn from_mat4(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }
}

/// A node from the scene graph
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: String,
    pub transform: NodeTransform,
    /// Indices into `RawScene::nodes`
    pub children: Vec<usize>,
    /// Indices into `RawScene::meshes`
    pub meshes: Vec<usize>,
    /// Index into `RawScene::skins`
    pub skin: Option<usize>,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl MeshBounds {
    /// Compute bounds from a set of vertex positions
    pub fn from_positions(positions: &[[f32; 3]]) -> Option<Self> {
        let first = *positions.first()?;
        let mut bounds = Self { min: first, max: first };
        for p in positions.iter().skip(1) {
            for i in 0..3 {
                bounds.min[i] = bounds.min[i].min(p[i]);
                bounds.max[i] = bounds.max[i].max(p[i]);
            }
        }
        Some(bounds)
    }

    /// Size along each axis
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Scale both corners about the origin, keeping min <= max
    pub fn scaled(&self, factor: f32) -> MeshBounds {
        let a = self.min.map(|v| v * factor);
        let b = self.max.map(|v| v * factor);
        MeshBounds {
            min: [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])],
            max: [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])],
        }
    }

    /// Merge with another bounds to get the union
    pub fn union(&self, other: &MeshBounds) -> MeshBounds {
        MeshBounds {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }
}

impl std::fmt::Display for MeshBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.size();
        write!(
            f,
            "{:.2} x {:.2} x {:.2} (min [{:.2}, {:.2}, {:.2}], max [{:.2}, {:.2}, {:.2}])",
            s[0], s[1], s[2],
            self.min[0], self.min[1], self.min[2],
            self.max[0], self.max[1], self.max[2],
        )
    }
}

/// An imported mesh primitive with vertex data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    /// Index into `RawScene::materials`
    pub material: Option<usize>,
    /// Per-vertex joint indices (4 per vertex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joints: Option<Vec<[u16; 4]>>,
    /// Per-vertex joint weights (4 per vertex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<[f32; 4]>>,
}

impl ImportedMesh {
    /// Compute the axis-aligned bounding box of this mesh's vertices
    pub fn bounds(&self) -> Option<MeshBounds> {
        MeshBounds::from_positions(&self.positions)
    }

    /// Triangle index list; non-indexed meshes get a sequential one
    pub fn triangle_indices(&self) -> Vec<u32> {
        if self.indices.is_empty() {
            (0..self.positions.len() as u32).collect()
        } else {
            self.indices.clone()
        }
    }
}

/// Joints of a skin, as node indices, with their inverse bind matrices
#[derive(Debug, Clone, Default)]
pub struct ImportedSkin {
    pub name: String,
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// Which node property a channel animates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationProperty {
    Translation,
    Rotation,
    Scale,
}

/// A single keyframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    /// 3 floats for translation/scale, 4 for rotation (quaternion xyzw)
    pub value: Vec<f32>,
}

/// An animation channel targeting one node property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationChannel {
    /// Index into `RawScene::nodes`
    pub node: usize,
    pub property: AnimationProperty,
    pub interpolation: String,
    pub keyframes: Vec<Keyframe>,
}

/// A complete animation clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<AnimationChannel>,
}

/// glTF-style alpha rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    /// Binary alpha test (discard below cutoff)
    Mask,
    Blend,
}

/// A material as the source file describes it.
///
/// Fields are optional because decoders differ in what they carry; the
/// pipeline resolves absent fields to defaults in one place.
#[derive(Debug, Clone, Default)]
pub struct ImportedMaterial {
    pub name: String,
    pub base_color_factor: Option<[f32; 4]>,
    pub emissive_factor: Option<[f32; 4]>,
    pub metallic: Option<f32>,
    pub roughness: Option<f32>,
    pub alpha_mode: Option<AlphaMode>,
    pub alpha_cutoff: Option<f32>,
    pub double_sided: Option<bool>,
    /// Texture keys, either embedded (`embedded:<n>`) or external paths
    pub base_color_texture: Option<String>,
    pub opacity_texture: Option<String>,
    pub normal_texture: Option<String>,
    pub metallic_roughness_texture: Option<String>,
    /// Legacy (non-PBR) specular inputs
    pub specular_texture: Option<String>,
    pub specular_exponent: Option<f32>,
}

/// A decoded texture
#[derive(Debug, Clone)]
pub struct ImportedTexture {
    /// Key materials use to reference this texture
    pub key: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, translation: Vec3, children: Vec<usize>, meshes: Vec<usize>) -> SceneNode {
        SceneNode {
            name: name.to_string(),
            transform: NodeTransform {
                translation,
                ..NodeTransform::IDENTITY
            },
            children,
            meshes,
            skin: None,
        }
    }

    fn unit_quad() -> ImportedMesh {
        ImportedMesh {
            name: "quad".to_string(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..Default::default()
        }
    }

    #[test]
    fn test_world_transforms_compose() {
        let scene = RawScene {
            nodes: vec![
                node("root", Vec3::new(1.0, 0.0, 0.0), vec![1], vec![]),
                node("child", Vec3::new(0.0, 2.0, 0.0), vec![], vec![0]),
            ],
            roots: vec![0],
            meshes: vec![unit_quad()],
            ..Default::default()
        };

        let world = scene.world_transforms();
        let p = world[1].transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
        assert_eq!(scene.parents(), vec![None, Some(0)]);
    }

    #[test]
    fn test_geometry_bounds_in_world_space() {
        let scene = RawScene {
            nodes: vec![node("root", Vec3::new(10.0, 0.0, 0.0), vec![], vec![0])],
            roots: vec![0],
            meshes: vec![unit_quad()],
            ..Default::default()
        };

        let bounds = scene.geometry_bounds().unwrap();
        assert_eq!(bounds.min, [10.0, 0.0, 0.0]);
        assert_eq!(bounds.max, [11.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unreachable_nodes_excluded_from_bounds() {
        let scene = RawScene {
            nodes: vec![
                node("root", Vec3::ZERO, vec![], vec![]),
                node("orphan", Vec3::ZERO, vec![], vec![0]),
            ],
            roots: vec![0],
            meshes: vec![unit_quad()],
            ..Default::default()
        };
        assert!(scene.geometry_bounds().is_none());
    }

    #[test]
    fn test_bounds_scaled_about_origin() {
        let b = MeshBounds {
            min: [-2.0, 0.0, -1.0],
            max: [2.0, 4.0, 1.0],
        };
        let s = b.scaled(0.5);
        assert_eq!(s.min, [-1.0, 0.0, -0.5]);
        assert_eq!(s.max, [1.0, 2.0, 0.5]);

        let flipped = b.scaled(-1.0);
        assert_eq!(flipped.min, [-2.0, -4.0, -1.0]);
        assert_eq!(flipped.max, [2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_node_transform_matrix_roundtrip() {
        let t = NodeTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let back = NodeTransform::from_mat4(t.to_mat4());
        assert!((back.translation - t.translation).length() < 1e-5);
        assert!((back.scale - t.scale).length() < 1e-5);
        assert!(back.rotation.angle_between(t.rotation) < 1e-4);
    }
}
