#![warn(missing_docs)]

//! Motion validity checking for an arm moving among scripted obstacle arms.
//!
//! The controlled arm and one or more obstacle arms share a scene. Obstacles
//! follow a fixed, tick-indexed schedule; the controlled arm moves along
//! straight configuration-space edges. An edge is valid when every
//! interpolated sub-step is collision-free against the obstacle pose at the
//! matching tick.
//!
//! # Features
//!
//! - Kinematic collision world on Rapier colliders and Parry contact queries
//! - Time-synchronized edge checking with per-problem statistics
//! - Problem batches with obstacle schedules and base poses
//! - Gym-style episode controller over a fixed roadmap
//!
//! # Example
//!
//! ```ignore
//! use armsweep_physics::{PlanningEnv, ProblemSource};
//!
//! let mut env = PlanningEnv::from_config_file("env.toml".as_ref())?;
//! env.init_new_problem(Some(ProblemSource::File("problems.json".into())), None)?;
//!
//! let init = env.init_state()?.clone();
//! let goal = env.goal_state()?.clone();
//! let ok = env.edge_feasible(init.as_slice(), goal.as_slice(), 0)?;
//! ```

mod backend;
mod colliders;
mod config;
mod env;
mod error;
mod gym;
mod joints;
mod trajectory;
mod validity;
mod world;

#[cfg(test)]
mod testing;

/// A point in an arm's joint space.
pub type Configuration = nalgebra::DVector<f64>;

pub use backend::{BodyId, CollisionBackend, ContactPoint, SceneBuilder};
pub use colliders::{arm_shapes, box_shape, link_shape};
pub use config::EnvConfig;
pub use env::{PlanningEnv, ProblemSource, SAMPLING_BUDGET};
pub use error::{PlanError, Result};
pub use gym::{
    goal_distance_policy, EdgeRewardMatrix, EpisodeController, EpisodePhase, StepOutcome,
    COLLISION_PENALTY, NO_EDGE,
};
pub use joints::link_frames;
pub use trajectory::{pose_obstacles, ObstacleTrajectory, WorkspacePointCloud};
pub use validity::{distance, distances, step_count, CollisionStats, MotionValidityEngine};
pub use world::CollisionWorld;
