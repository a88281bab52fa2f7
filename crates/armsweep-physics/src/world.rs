//! Collision backend built on Rapier colliders and Parry contact queries.

use armsweep_ir::{ArmModel, BasePose};
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};
use parry3d::query;
use rapier3d::geometry::{ColliderBuilder, ColliderHandle, ColliderSet};

use crate::backend::{BodyId, CollisionBackend, ContactPoint, SceneBuilder};
use crate::colliders::{arm_shapes, box_shape};
use crate::error::{PlanError, Result};
use crate::joints::{base_isometry, link_frames, to_physics};

enum BodyKind {
    Arm(ArmModel),
    StaticBox,
}

struct BodyRecord {
    kind: BodyKind,
    base: Isometry3<f64>,
    config: Vec<f64>,
    /// World frames; for an arm, one per link plus the tip.
    frames: Vec<Isometry3<f64>>,
    colliders: Vec<ColliderHandle>,
}

impl BodyRecord {
    fn joint_count(&self) -> usize {
        match &self.kind {
            BodyKind::Arm(model) => model.dof(),
            BodyKind::StaticBox => 0,
        }
    }
}

/// Kinematic collision world.
///
/// Bodies are posed directly from joint values (no dynamics). Each arm link
/// is a capsule collider; links of the same body never collide with each
/// other. A collision pass tests every pair of colliders that belong to
/// different bodies.
pub struct CollisionWorld {
    colliders: ColliderSet,
    bodies: Vec<BodyRecord>,
    contacts: Vec<ContactPoint>,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self {
            colliders: ColliderSet::new(),
            bodies: Vec::new(),
            contacts: Vec::new(),
        }
    }

    /// Number of registered bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Contacts found by the last collision pass.
    pub fn contacts(&self) -> &[ContactPoint] {
        &self.contacts
    }

    /// Current joint values of a body.
    pub fn configuration(&self, body: BodyId) -> Result<&[f64]> {
        Ok(&self.body(body)?.config)
    }

    fn body(&self, body: BodyId) -> Result<&BodyRecord> {
        self.bodies.get(body.0).ok_or(PlanError::UnknownBody(body))
    }

    fn insert_collider(&mut self, body: BodyId, collider: ColliderBuilder) -> ColliderHandle {
        self.colliders
            .insert(collider.user_data(body.0 as u128).build())
    }

    /// Recompute frames of `body` and move its colliders there.
    fn sync(&mut self, body: BodyId) {
        let Some(record) = self.bodies.get_mut(body.0) else {
            return;
        };

        record.frames = match &record.kind {
            BodyKind::Arm(model) => link_frames(model, &record.base, &record.config),
            BodyKind::StaticBox => vec![record.base],
        };

        for (handle, frame) in record.colliders.iter().zip(&record.frames) {
            if let Some(collider) = self.colliders.get_mut(*handle) {
                collider.set_position(to_physics(frame));
            }
        }
    }
}

impl SceneBuilder for CollisionWorld {
    fn load_arm(&mut self, model: &ArmModel, base: &BasePose) -> Result<BodyId> {
        model.validate()?;
        let id = BodyId(self.bodies.len());

        let colliders = arm_shapes(model)
            .into_iter()
            .map(|shape| self.insert_collider(id, ColliderBuilder::new(shape)))
            .collect();

        self.bodies.push(BodyRecord {
            kind: BodyKind::Arm(model.clone()),
            base: base_isometry(base),
            config: vec![0.0; model.dof()],
            frames: Vec::new(),
            colliders,
        });
        self.sync(id);

        tracing::debug!(body = id.0, model = %model.name, dof = model.dof(), "loaded arm");
        Ok(id)
    }

    fn add_static_box(&mut self, half_extents: [f64; 3], position: [f64; 3]) -> Result<BodyId> {
        if half_extents.iter().any(|h| !(*h > 0.0)) {
            return Err(PlanError::InvalidConfig(format!(
                "box half extents must be positive, got {half_extents:?}"
            )));
        }
        let id = BodyId(self.bodies.len());
        let handle = self.insert_collider(id, ColliderBuilder::new(box_shape(half_extents)));

        self.bodies.push(BodyRecord {
            kind: BodyKind::StaticBox,
            base: Isometry3::from_parts(
                Translation3::new(position[0], position[1], position[2]),
                UnitQuaternion::identity(),
            ),
            config: Vec::new(),
            frames: Vec::new(),
            colliders: vec![handle],
        });
        self.sync(id);
        Ok(id)
    }

    fn set_base_pose(&mut self, body: BodyId, pose: &BasePose) -> Result<()> {
        let record = self
            .bodies
            .get_mut(body.0)
            .ok_or(PlanError::UnknownBody(body))?;
        record.base = base_isometry(pose);
        self.sync(body);
        Ok(())
    }
}

impl CollisionBackend for CollisionWorld {
    fn joint_count(&self, body: BodyId) -> Result<usize> {
        Ok(self.body(body)?.joint_count())
    }

    fn link_count(&self, body: BodyId) -> Result<usize> {
        Ok(self.body(body)?.frames.len())
    }

    fn set_configuration(&mut self, body: BodyId, config: &[f64]) -> Result<()> {
        let record = self
            .bodies
            .get_mut(body.0)
            .ok_or(PlanError::UnknownBody(body))?;
        let expected = record.joint_count();
        if config.len() != expected {
            return Err(PlanError::DimensionMismatch {
                expected,
                actual: config.len(),
            });
        }
        record.config.clear();
        record.config.extend_from_slice(config);
        self.sync(body);
        Ok(())
    }

    fn detect_collisions(&mut self) {
        self.contacts.clear();
        let colliders: Vec<_> = self.colliders.iter().map(|(_, c)| c).collect();

        for (i, c1) in colliders.iter().enumerate() {
            for c2 in &colliders[i + 1..] {
                if c1.user_data == c2.user_data {
                    continue;
                }
                // Unsupported shape pairs cannot occur with capsules and cuboids.
                if let Ok(Some(contact)) =
                    query::contact(c1.position(), c1.shape(), c2.position(), c2.shape(), 0.0)
                {
                    self.contacts.push(ContactPoint {
                        body_a: BodyId(c1.user_data as usize),
                        body_b: BodyId(c2.user_data as usize),
                        point: Point3::new(
                            contact.point1.x as f64,
                            contact.point1.y as f64,
                            contact.point1.z as f64,
                        ),
                        depth: (-contact.dist).max(0.0) as f64,
                    });
                }
            }
        }
    }

    fn is_body_clear(&self, body: BodyId) -> bool {
        !self.contacts.iter().any(|c| c.involves(body))
    }

    fn link_world_position(&self, body: BodyId, link: usize) -> Result<Point3<f64>> {
        let frame = self
            .body(body)?
            .frames
            .get(link)
            .ok_or(PlanError::UnknownLink { body, link })?;
        Ok(Point3::from(frame.translation.vector))
    }
}
