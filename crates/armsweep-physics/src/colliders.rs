//! Collision shapes for arm links and scene primitives.

use armsweep_ir::{ArmModel, LinkDef};
use nalgebra::{Point3, Vector3};
use parry3d::shape::SharedShape;

use crate::joints::link_extent;

/// Capsule covering one link, in the link's own frame.
///
/// The segment runs from the frame origin to the link's far end.
pub fn link_shape(link: &LinkDef) -> SharedShape {
    let end = link_extent(link);
    SharedShape::capsule(
        Point3::origin(),
        Point3::new(end.x as f32, end.y as f32, end.z as f32),
        link.radius as f32,
    )
}

/// One capsule per link of `model`.
pub fn arm_shapes(model: &ArmModel) -> Vec<SharedShape> {
    model.links.iter().map(link_shape).collect()
}

/// Cuboid centered on its frame origin.
pub fn box_shape(half_extents: [f64; 3]) -> SharedShape {
    let h = Vector3::new(half_extents[0], half_extents[1], half_extents[2]).map(|v| v as f32);
    SharedShape::cuboid(h.x, h.y, h.z)
}
