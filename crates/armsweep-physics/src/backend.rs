//! Contract between the validity core and a collision backend.
//!
//! The core only ever poses bodies, runs a collision pass, asks whether a
//! body came out clear and reads link positions. Scene construction lives in
//! a separate trait so that checking code cannot add or move bases.

use armsweep_ir::{ArmModel, BasePose};
use nalgebra::Point3;

use crate::error::Result;

/// Handle of a body registered with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub usize);

/// A contact reported by the last collision pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// First body in contact.
    pub body_a: BodyId,
    /// Second body in contact.
    pub body_b: BodyId,
    /// World-space contact point on `body_a`.
    pub point: Point3<f64>,
    /// Penetration depth (zero when merely touching).
    pub depth: f64,
}

impl ContactPoint {
    /// Whether this contact touches `body`.
    pub fn involves(&self, body: BodyId) -> bool {
        self.body_a == body || self.body_b == body
    }
}

/// Posing and collision queries the validity core depends on.
pub trait CollisionBackend {
    /// Number of controllable joints of `body`.
    fn joint_count(&self, body: BodyId) -> Result<usize>;

    /// Number of link frames of `body`, tip included.
    fn link_count(&self, body: BodyId) -> Result<usize>;

    /// Set every joint of `body`. Does not run collision detection.
    fn set_configuration(&mut self, body: BodyId, config: &[f64]) -> Result<()>;

    /// Run one collision pass over every posed body.
    fn detect_collisions(&mut self);

    /// True iff the last pass found no contact touching `body`.
    fn is_body_clear(&self, body: BodyId) -> bool;

    /// World position of a link frame origin under the current pose.
    fn link_world_position(&self, body: BodyId, link: usize) -> Result<Point3<f64>>;
}

/// Scene construction, used once per environment and per problem instance.
pub trait SceneBuilder {
    /// Register a fixed-base arm at `base`, all joints at zero.
    fn load_arm(&mut self, model: &ArmModel, base: &BasePose) -> Result<BodyId>;

    /// Register a static box (scene dressing).
    fn add_static_box(&mut self, half_extents: [f64; 3], position: [f64; 3]) -> Result<BodyId>;

    /// Move a body's base, keeping its joint configuration.
    fn set_base_pose(&mut self, body: BodyId, pose: &BasePose) -> Result<()>;
}
