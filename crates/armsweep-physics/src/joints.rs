//! Revolute chain kinematics for armsweep arm models.

use armsweep_ir::{ArmModel, BasePose, LinkDef, Vec3};
use nalgebra::{Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};

fn to_vector(v: &Vec3) -> Vector3<f64> {
    Vector3::new(v.x, v.y, v.z)
}

/// Convert a base pose (`[x, y, z, w]` quaternion) to an isometry.
pub fn base_isometry(pose: &BasePose) -> Isometry3<f64> {
    let [x, y, z, w] = pose.orientation;
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
    let translation = Translation3::new(pose.position.x, pose.position.y, pose.position.z);
    Isometry3::from_parts(translation, rotation)
}

/// Rotation of a link's joint by `angle` radians.
pub fn joint_rotation(link: &LinkDef, angle: f64) -> Isometry3<f64> {
    let axis = Unit::new_normalize(to_vector(&link.axis));
    Isometry3::from_parts(
        Translation3::identity(),
        UnitQuaternion::from_axis_angle(&axis, angle),
    )
}

/// Far end of a link, expressed in the link's own frame.
pub fn link_extent(link: &LinkDef) -> Vector3<f64> {
    to_vector(&link.direction).normalize() * link.length
}

/// World frames of every link of `model` posed at `config`.
///
/// Returns `model.frame_count()` frames. Frame `i < dof` is the link frame
/// after joint `i` has turned; the last frame is the tip. Missing trailing
/// joint values are treated as zero.
pub fn link_frames(model: &ArmModel, base: &Isometry3<f64>, config: &[f64]) -> Vec<Isometry3<f64>> {
    let mut frames = Vec::with_capacity(model.frame_count());
    let mut frame = *base;

    for (i, link) in model.links.iter().enumerate() {
        let angle = config.get(i).copied().unwrap_or(0.0);
        frame = frame * joint_rotation(link, angle);
        frames.push(frame);
        frame = frame * Isometry3::from_parts(Translation3::from(link_extent(link)), UnitQuaternion::identity());
    }
    frames.push(frame);

    frames
}

/// Narrow an f64 isometry to the f32 precision Rapier works in.
pub fn to_physics(iso: &Isometry3<f64>) -> Isometry3<f32> {
    let t = iso.translation.vector;
    let q = iso.rotation.quaternion();
    Isometry3::from_parts(
        Translation3::new(t.x as f32, t.y as f32, t.z as f32),
        UnitQuaternion::new_normalize(Quaternion::new(q.w as f32, q.i as f32, q.j as f32, q.k as f32)),
    )
}
