//! Intermediate representation for the armsweep testbed.
//!
//! This crate defines the declarative data shared between problem generators,
//! planners and the collision core: revolute arm models, base poses, batches
//! of problem instances and batches of RL point sets.
//!
//! Everything here is plain data. Posing, forward kinematics and collision
//! checking are handled by `armsweep-physics`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding or validating IR data.
#[derive(Error, Debug)]
pub enum IrError {
    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An arm model is malformed.
    #[error("invalid arm model `{name}`: {reason}")]
    Model {
        /// Model name.
        name: String,
        /// Reason for rejection.
        reason: String,
    },

    /// A batch has inconsistent array shapes.
    #[error("malformed {batch} batch: {reason}")]
    Shape {
        /// Which batch kind was rejected.
        batch: &'static str,
        /// Reason for rejection.
        reason: String,
    },
}

/// 3D vector with f64 components (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Build from a slice of at least three values.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x, y, z, ..] => Some(Self::new(*x, *y, *z)),
            _ => None,
        }
    }
}

/// World placement of an articulated body's base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasePose {
    /// Base position in meters.
    pub position: Vec3,
    /// Base orientation as a quaternion `[x, y, z, w]`.
    pub orientation: [f64; 4],
}

impl Default for BasePose {
    fn default() -> Self {
        Self {
            position: Vec3::default(),
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl BasePose {
    /// Pose at `position` with identity orientation.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Decode the `obstacle`-th pose from concatenated position/orientation
    /// arrays (3 resp. 4 reals per obstacle).
    pub fn from_concatenated(positions: &[f64], orientations: &[f64], obstacle: usize) -> Option<Self> {
        let position = Vec3::from_slice(positions.get(obstacle * 3..obstacle * 3 + 3)?)?;
        let q = orientations.get(obstacle * 4..obstacle * 4 + 4)?;
        Some(Self {
            position,
            orientation: [q[0], q[1], q[2], q[3]],
        })
    }
}

/// One revolute link of a serial arm.
///
/// The joint rotates about `axis` (parent frame) at the link frame origin.
/// The link body is a capsule from that origin along `direction` for
/// `length` meters; the next link frame sits at its far end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDef {
    /// Link name.
    pub name: String,
    /// Joint rotation axis.
    pub axis: Vec3,
    /// Direction the link extends in, in its own frame.
    pub direction: Vec3,
    /// Link length in meters.
    pub length: f64,
    /// Capsule radius in meters.
    pub radius: f64,
}

/// A fixed-base serial arm made of revolute links.
///
/// An arm with `n` links has `n` joints and exposes `n + 1` link frames; the
/// last frame is the tip (end effector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmModel {
    /// Model name.
    pub name: String,
    /// Links from base to tip.
    pub links: Vec<LinkDef>,
}

impl ArmModel {
    /// Planar arm in the XY plane: every joint turns about +Z and every link
    /// extends along +X.
    pub fn planar(name: &str, lengths: &[f64], radius: f64) -> Self {
        let links = lengths
            .iter()
            .enumerate()
            .map(|(i, &length)| LinkDef {
                name: format!("{name}_link{i}"),
                axis: Vec3::new(0.0, 0.0, 1.0),
                direction: Vec3::new(1.0, 0.0, 0.0),
                length,
                radius,
            })
            .collect();
        Self {
            name: name.to_string(),
            links,
        }
    }

    /// Number of joints.
    pub fn dof(&self) -> usize {
        self.links.len()
    }

    /// Number of link frames, tip included.
    pub fn frame_count(&self) -> usize {
        self.links.len() + 1
    }

    /// Check that every link is usable for kinematics and collision.
    pub fn validate(&self) -> Result<(), IrError> {
        let reject = |reason: String| IrError::Model {
            name: self.name.clone(),
            reason,
        };
        if self.links.is_empty() {
            return Err(reject("model has no links".to_string()));
        }
        for link in &self.links {
            if link.axis.norm() < 1e-12 {
                return Err(reject(format!("link `{}` has a zero joint axis", link.name)));
            }
            if link.direction.norm() < 1e-12 {
                return Err(reject(format!("link `{}` has a zero direction", link.name)));
            }
            if !(link.length > 0.0 && link.length.is_finite()) {
                return Err(reject(format!("link `{}` length must be positive", link.name)));
            }
            if !(link.radius > 0.0 && link.radius.is_finite()) {
                return Err(reject(format!("link `{}` radius must be positive", link.name)));
            }
        }
        Ok(())
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string and validate.
    pub fn from_json(json: &str) -> Result<Self, IrError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }
}

/// A batch of problem instances stored as parallel arrays.
///
/// Instance `i` is `(init_states[i], goal_states[i], obs_pos[i], obs_ori[i],
/// obs_traj[i])`. With several obstacle arms, their positions, orientations
/// and per-tick configurations are concatenated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProblemSet {
    /// Start configuration of the controlled arm.
    pub init_states: Vec<Vec<f64>>,
    /// Goal configuration of the controlled arm.
    pub goal_states: Vec<Vec<f64>>,
    /// Obstacle base positions, 3 reals per obstacle.
    pub obs_pos: Vec<Vec<f64>>,
    /// Obstacle base orientations `[x, y, z, w]`, 4 reals per obstacle.
    pub obs_ori: Vec<Vec<f64>>,
    /// Obstacle trajectories, one configuration per tick.
    pub obs_traj: Vec<Vec<Vec<f64>>>,
}

impl ProblemSet {
    /// Number of instances.
    pub fn len(&self) -> usize {
        self.init_states.len()
    }

    /// Whether the batch holds no instances.
    pub fn is_empty(&self) -> bool {
        self.init_states.is_empty()
    }

    /// Check array lengths against the arm dimensions.
    pub fn validate(&self, config_dim: usize, obstacle_count: usize) -> Result<(), IrError> {
        let reject = |reason: String| IrError::Shape {
            batch: "problem",
            reason,
        };
        let n = self.len();
        if n == 0 {
            return Err(reject("no instances".to_string()));
        }
        for (key, len) in [
            ("goal_states", self.goal_states.len()),
            ("obs_pos", self.obs_pos.len()),
            ("obs_ori", self.obs_ori.len()),
            ("obs_traj", self.obs_traj.len()),
        ] {
            if len != n {
                return Err(reject(format!("{key} has {len} entries, expected {n}")));
            }
        }

        let obs_dim = config_dim * obstacle_count;
        for i in 0..n {
            check_len(&self.init_states[i], config_dim, "init_states", i).map_err(reject)?;
            check_len(&self.goal_states[i], config_dim, "goal_states", i).map_err(reject)?;
            check_len(&self.obs_pos[i], 3 * obstacle_count, "obs_pos", i).map_err(reject)?;
            check_len(&self.obs_ori[i], 4 * obstacle_count, "obs_ori", i).map_err(reject)?;

            let traj = &self.obs_traj[i];
            if traj.len() < 2 {
                return Err(reject(format!(
                    "obs_traj[{i}] has {} ticks, need at least 2",
                    traj.len()
                )));
            }
            for (t, config) in traj.iter().enumerate() {
                check_len(config, obs_dim, "obs_traj tick", t).map_err(reject)?;
            }
        }
        Ok(())
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A batch of RL problems: per problem, a fixed point set and its edges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RlProblemSet {
    /// Candidate configurations; point 0 is the episode start.
    pub points: Vec<Vec<Vec<f64>>>,
    /// Directed edges `[from, to]` between point indices.
    pub edge_index: Vec<Vec<[usize; 2]>>,
}

impl RlProblemSet {
    /// Number of problems.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the batch holds no problems.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Check point dimensions and edge endpoints.
    pub fn validate(&self, config_dim: usize) -> Result<(), IrError> {
        let reject = |reason: String| IrError::Shape { batch: "RL", reason };
        if self.points.len() != self.edge_index.len() {
            return Err(reject(format!(
                "{} point sets but {} edge lists",
                self.points.len(),
                self.edge_index.len()
            )));
        }
        for (i, (points, edges)) in self.points.iter().zip(&self.edge_index).enumerate() {
            if points.is_empty() {
                return Err(reject(format!("problem {i} has no points")));
            }
            for (j, point) in points.iter().enumerate() {
                check_len(point, config_dim, "point", j).map_err(reject)?;
            }
            if let Some(edge) = edges.iter().find(|e| e[0] >= points.len() || e[1] >= points.len()) {
                return Err(reject(format!(
                    "problem {i} edge {edge:?} references a missing point"
                )));
            }
        }
        Ok(())
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn check_len(values: &[f64], expected: usize, key: &str, index: usize) -> Result<(), String> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "{key}[{index}] has {} values, expected {expected}",
            values.len()
        ))
    }
}
