//! Transform sequencer
//!
//! Applies the configured transforms to a raw scene strictly in order; each
//! step sees the scene the previous one produced.
//!
//! Channels touched by each transform:
//! - rotations, `Translate`, `Center` and `SetRoot` move every root (and the
//!   animation keys of root-targeted channels) plus the broad-phase AABB
//! - `Scale` bakes into vertex positions and node translations only
//! - `ScaleAABB` touches only the broad-phase AABB
//! - `ScaleAnimations` touches only translation keyframes

use crate::config::Transform;
use glam::{Mat4, Quat, Vec3};
use kiln_core::{KilnError, Result};
use kiln_import::{AnimationProperty, MeshBounds, NodeTransform, RawScene};

/// Apply `transforms` to `scene` in listed order
pub fn apply(mut scene: RawScene, transforms: &[Transform]) -> Result<RawScene> {
    for (index, transform) in transforms.iter().enumerate() {
        transform.validate(index)?;
        apply_one(&mut scene, transform)?;
        tracing::debug!(scene = %scene.name, index, ?transform, "applied transform");
    }
    Ok(scene)
}

fn apply_one(scene: &mut RawScene, transform: &Transform) -> Result<()> {
    match transform {
        Transform::RotateYUpToZUp => rotate(scene, Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
        Transform::RotateX { deg } => rotate(scene, Quat::from_rotation_x(deg.to_radians())),
        Transform::RotateY { deg } => rotate(scene, Quat::from_rotation_y(deg.to_radians())),
        Transform::RotateZ { deg } => rotate(scene, Quat::from_rotation_z(deg.to_radians())),
        Transform::Scale { scale } => scale_geometry(scene, *scale),
        Transform::Translate { translation } => translate(scene, *translation),
        Transform::ScaleAabb { scale } => {
            scene.aabb = scene.aabb.map(|b| b.scaled(*scale));
        }
        Transform::ScaleAnimations { scale } => scale_animations(scene, *scale),
        Transform::SetRoot { name } => set_root(scene, name)?,
        Transform::Center => center(scene),
    }
    Ok(())
}

fn rotate(scene: &mut RawScene, rotation: Quat) {
    premultiply_roots(scene, Mat4::from_quat(rotation));
}

fn translate(scene: &mut RawScene, offset: Vec3) {
    premultiply_roots(scene, Mat4::from_translation(offset));
}

fn center(scene: &mut RawScene) {
    let Some(bounds) = scene.geometry_bounds().or(scene.aabb) else {
        tracing::debug!(scene = %scene.name, "nothing to center");
        return;
    };
    translate(scene, -Vec3::from_array(bounds.center()));
}

/// Left-multiply every root's local transform (and its animation keys)
/// by `m`, moving the whole scene in its parent space.
fn premultiply_roots(scene: &mut RawScene, m: Mat4) {
    let roots = scene.roots.clone();
    for &root in &roots {
        if let Some(node) = scene.nodes.get_mut(root) {
            node.transform = NodeTransform::from_mat4(m * node.transform.to_mat4());
        }
    }
    rebake_animations(scene, &roots, m);
    scene.aabb = scene.aabb.map(|b| transform_bounds(&b, m));
}

/// Re-express translation and rotation keys of channels targeting `nodes`
fn rebake_animations(scene: &mut RawScene, nodes: &[usize], m: Mat4) {
    let (_, rotation, _) = m.to_scale_rotation_translation();
    for clip in &mut scene.animations {
        for channel in clip.channels.iter_mut().filter(|c| nodes.contains(&c.node)) {
            for key in &mut channel.keyframes {
                match channel.property {
                    AnimationProperty::Translation if key.value.len() >= 3 => {
                        let p = m.transform_point3(Vec3::new(key.value[0], key.value[1], key.value[2]));
                        key.value[..3].copy_from_slice(&p.to_array());
                    }
                    AnimationProperty::Rotation if key.value.len() >= 4 => {
                        let q = Quat::from_xyzw(key.value[0], key.value[1], key.value[2], key.value[3]);
                        key.value[..4].copy_from_slice(&(rotation * q).normalize().to_array());
                    }
                    _ => {}
                }
            }
        }
    }
}

fn scale_geometry(scene: &mut RawScene, factor: f32) {
    for mesh in &mut scene.meshes {
        for p in &mut mesh.positions {
            *p = p.map(|c| c * factor);
        }
        // A uniform negative scale mirrors, which flips normals
        let sign = factor.signum();
        for n in &mut mesh.normals {
            let v = Vec3::from_array(*n) * sign;
            *n = v.normalize_or_zero().to_array();
        }
    }

    for node in &mut scene.nodes {
        node.transform.translation *= factor;
    }

    // Joint bind poses had their translations scaled; keep the inverses in step
    for skin in &mut scene.skins {
        for ibm in &mut skin.inverse_bind_matrices {
            ibm.w_axis.x *= factor;
            ibm.w_axis.y *= factor;
            ibm.w_axis.z *= factor;
        }
    }
}

fn scale_animations(scene: &mut RawScene, factor: f32) {
    for clip in &mut scene.animations {
        for channel in &mut clip.channels {
            if channel.property == AnimationProperty::Translation {
                for key in &mut channel.keyframes {
                    for v in &mut key.value {
                        *v *= factor;
                    }
                }
            }
        }
    }
}

/// Make the named node the single root.
///
/// The node gets an identity transform; every former root is re-parented
/// under it with `inverse(world(node)) * local(root)` so the scene is
/// re-expressed in the node's frame.
///
/// Animation channels driving the new root are dropped. Translation and
/// rotation keys of former roots are re-baked; their scale keys are left
/// as authored, so they drift when `world(node)` carries scale.
fn set_root(scene: &mut RawScene, name: &str) -> Result<()> {
    let target = scene
        .find_node(name)
        .ok_or_else(|| KilnError::NodeNotFound(name.to_string()))?;

    let world = scene.world_transforms();
    let inverse = world[target].inverse();

    if let Some(parent) = scene.parents()[target] {
        scene.nodes[parent].children.retain(|&c| c != target);
    }

    let former_roots: Vec<usize> = scene.roots.iter().copied().filter(|&r| r != target).collect();
    for &root in &former_roots {
        let node = &mut scene.nodes[root];
        node.transform = NodeTransform::from_mat4(inverse * node.transform.to_mat4());
    }
    rebake_animations(scene, &former_roots, inverse);

    // The new root sits at the origin; its own motion no longer applies
    for clip in &mut scene.animations {
        let before = clip.channels.len();
        clip.channels.retain(|c| c.node != target);
        let dropped = before - clip.channels.len();
        if dropped > 0 {
            tracing::debug!(clip = %clip.name, node = name, dropped, "dropped channels of new root");
        }
    }

    let node = &mut scene.nodes[target];
    node.transform = NodeTransform::IDENTITY;
    for &root in &former_roots {
        if !node.children.contains(&root) {
            node.children.push(root);
        }
    }

    scene.roots = vec![target];
    scene.aabb = scene.aabb.map(|b| transform_bounds(&b, inverse));
    Ok(())
}

/// Bounds of the eight transformed corners of `bounds`
fn transform_bounds(bounds: &MeshBounds, m: Mat4) -> MeshBounds {
    let corners: Vec<[f32; 3]> = (0..8)
        .map(|i| {
            let corner = Vec3::new(
                if i & 1 == 0 { bounds.min[0] } else { bounds.max[0] },
                if i & 2 == 0 { bounds.min[1] } else { bounds.max[1] },
                if i & 4 == 0 { bounds.min[2] } else { bounds.max[2] },
            );
            m.transform_point3(corner).to_array()
        })
        .collect();
    MeshBounds::from_positions(&corners).unwrap_or(*bounds)
}
