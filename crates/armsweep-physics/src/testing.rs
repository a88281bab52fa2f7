//! Call-recording backend for unit tests.

use armsweep_ir::{ArmModel, BasePose};
use nalgebra::Point3;

use crate::backend::{BodyId, CollisionBackend, SceneBuilder};
use crate::error::{PlanError, Result};

type Contacts = Box<dyn Fn(&[Vec<f64>]) -> Vec<BodyId>>;

/// Backend whose collisions are decided by a predicate over joint values.
///
/// Every collision pass snapshots all body configurations into `passes`.
/// Link `i` of a body sits at `(sum of its first i joints, i, body index)`.
pub(crate) struct ScriptedBackend {
    joints: Vec<usize>,
    poses: Vec<Vec<f64>>,
    bases: Vec<BasePose>,
    contacts: Contacts,
    in_contact: Vec<BodyId>,
    pub passes: Vec<Vec<Vec<f64>>>,
}

impl ScriptedBackend {
    /// No body ever collides.
    pub fn free() -> Self {
        Self::with_contacts(|_| Vec::new())
    }

    pub fn with_contacts(contacts: impl Fn(&[Vec<f64>]) -> Vec<BodyId> + 'static) -> Self {
        Self {
            joints: Vec::new(),
            poses: Vec::new(),
            bases: Vec::new(),
            contacts: Box::new(contacts),
            in_contact: Vec::new(),
            passes: Vec::new(),
        }
    }

    /// Body 0 collides whenever `|body0[0] - body1[0]| < gap`.
    pub fn first_joint_gap(gap: f64) -> Self {
        Self::with_contacts(move |poses| {
            if (poses[0][0] - poses[1][0]).abs() < gap {
                vec![BodyId(0), BodyId(1)]
            } else {
                Vec::new()
            }
        })
    }

    pub fn add_body(&mut self, joints: usize) -> BodyId {
        self.joints.push(joints);
        self.poses.push(vec![0.0; joints]);
        self.bases.push(BasePose::default());
        BodyId(self.joints.len() - 1)
    }

    pub fn base(&self, body: BodyId) -> BasePose {
        self.bases[body.0]
    }

    /// Value of joint `joint` of `body` at every collision pass.
    pub fn joint_history(&self, body: BodyId, joint: usize) -> Vec<f64> {
        self.passes.iter().map(|p| p[body.0][joint]).collect()
    }

    fn check(&self, body: BodyId) -> Result<usize> {
        self.joints
            .get(body.0)
            .copied()
            .ok_or(PlanError::UnknownBody(body))
    }
}

impl CollisionBackend for ScriptedBackend {
    fn joint_count(&self, body: BodyId) -> Result<usize> {
        self.check(body)
    }

    fn link_count(&self, body: BodyId) -> Result<usize> {
        Ok(self.check(body)? + 1)
    }

    fn set_configuration(&mut self, body: BodyId, config: &[f64]) -> Result<()> {
        let expected = self.check(body)?;
        if config.len() != expected {
            return Err(PlanError::DimensionMismatch {
                expected,
                actual: config.len(),
            });
        }
        self.poses[body.0] = config.to_vec();
        Ok(())
    }

    fn detect_collisions(&mut self) {
        self.passes.push(self.poses.clone());
        self.in_contact = (self.contacts)(&self.poses);
    }

    fn is_body_clear(&self, body: BodyId) -> bool {
        !self.in_contact.contains(&body)
    }

    fn link_world_position(&self, body: BodyId, link: usize) -> Result<Point3<f64>> {
        let joints = self.check(body)?;
        if link > joints {
            return Err(PlanError::UnknownLink { body, link });
        }
        let x: f64 = self.poses[body.0][..link].iter().sum();
        Ok(Point3::new(x, link as f64, body.0 as f64))
    }
}

impl SceneBuilder for ScriptedBackend {
    fn load_arm(&mut self, model: &ArmModel, base: &BasePose) -> Result<BodyId> {
        let id = self.add_body(model.dof());
        self.bases[id.0] = *base;
        Ok(id)
    }

    fn add_static_box(&mut self, _half_extents: [f64; 3], position: [f64; 3]) -> Result<BodyId> {
        let id = self.add_body(0);
        self.bases[id.0].position = armsweep_ir::Vec3::new(position[0], position[1], position[2]);
        Ok(id)
    }

    fn set_base_pose(&mut self, body: BodyId, pose: &BasePose) -> Result<()> {
        self.check(body)?;
        self.bases[body.0] = *pose;
        Ok(())
    }
}
