//! Time-synchronized motion validity checking.
//!
//! An edge is a straight segment in the controlled arm's configuration space.
//! It is discretized into `K = ceil(d / speed)` sub-steps, and sub-step `k`
//! is checked against the obstacle posed at tick `cur_time + k`. The arm and
//! the obstacle advance in lockstep by tick count, so any planner can query
//! arbitrary edges against one shared obstacle schedule.

use crate::backend::{BodyId, CollisionBackend};
use crate::error::{PlanError, Result};
use crate::trajectory::{pose_obstacles, ObstacleTrajectory, WorkspacePointCloud};
use crate::Configuration;

/// Collision-check bookkeeping, reset with every problem instance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CollisionStats {
    /// Calls to `edge_feasible`.
    pub edge_queries: u64,
    /// Collision passes issued to the backend.
    pub collision_passes: u64,
    /// Edge queries plus `floor(d / cc_eps)` per edge when a resolution is set.
    pub weighted_checks: f64,
}

/// Euclidean distance between two configurations.
pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (y - x) * (y - x))
        .sum::<f64>()
        .sqrt()
}

/// Distance from every configuration in `batch` to `to`.
pub fn distances(batch: &[Configuration], to: &[f64]) -> Vec<f64> {
    batch.iter().map(|c| distance(c.as_slice(), to)).collect()
}

/// Sub-steps needed to cover distance `d`; never less than one.
pub fn step_count(d: f64, speed: f64) -> usize {
    if d == 0.0 {
        return 1;
    }
    ((d / speed).ceil() as usize).max(1)
}

/// Validity oracle for one controlled arm among scripted obstacle arms.
///
/// Owns the backend: every query poses the bodies it depends on and then
/// checks, so callers never see a half-updated scene.
pub struct MotionValidityEngine<B> {
    backend: B,
    mine: BodyId,
    obstacles: Vec<BodyId>,
    speed: f64,
    cc_eps: Option<f64>,
    trajectory: Option<ObstacleTrajectory>,
    stats: CollisionStats,
}

impl<B: CollisionBackend> MotionValidityEngine<B> {
    /// Create an engine for `mine` moving among `obstacles`.
    ///
    /// `speed` is the configuration distance the controlled arm may cover per
    /// obstacle tick.
    pub fn new(backend: B, mine: BodyId, obstacles: Vec<BodyId>, speed: f64) -> Result<Self> {
        if !(speed > 0.0 && speed.is_finite()) {
            return Err(PlanError::InvalidConfig(format!(
                "speed must be positive and finite, got {speed}"
            )));
        }
        if obstacles.is_empty() {
            return Err(PlanError::InvalidConfig("no obstacle bodies".to_string()));
        }
        backend.joint_count(mine)?;
        for &body in &obstacles {
            backend.joint_count(body)?;
        }

        Ok(Self {
            backend,
            mine,
            obstacles,
            speed,
            cc_eps: None,
            trajectory: None,
            stats: CollisionStats::default(),
        })
    }

    /// Count `floor(d / cc_eps)` extra checks per edge in the statistics.
    pub fn with_resolution(mut self, cc_eps: Option<f64>) -> Self {
        self.cc_eps = cc_eps;
        self
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend, for scene construction.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Controlled body.
    pub fn mine(&self) -> BodyId {
        self.mine
    }

    /// Obstacle bodies, in configuration order.
    pub fn obstacles(&self) -> &[BodyId] {
        &self.obstacles
    }

    /// Distance per tick.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Sub-steps for an edge between `a` and `b`.
    pub fn steps_between(&self, a: &[f64], b: &[f64]) -> usize {
        step_count(distance(a, b), self.speed)
    }

    /// Install the obstacle schedule for a new problem instance.
    pub fn set_trajectory(&mut self, configs: Vec<Configuration>) -> Result<()> {
        let trajectory = ObstacleTrajectory::precompute(&mut self.backend, &self.obstacles, configs)?;
        self.trajectory = Some(trajectory);
        Ok(())
    }

    /// Installed obstacle schedule.
    pub fn trajectory(&self) -> Option<&ObstacleTrajectory> {
        self.trajectory.as_ref()
    }

    /// Statistics since the last reset.
    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    /// Return the statistics and start counting from zero.
    pub fn take_stats(&mut self) -> CollisionStats {
        std::mem::take(&mut self.stats)
    }

    /// Zero the statistics.
    pub fn reset_stats(&mut self) {
        self.stats = CollisionStats::default();
    }

    fn check_mine(&mut self) -> bool {
        self.backend.detect_collisions();
        self.stats.collision_passes += 1;
        self.backend.is_body_clear(self.mine)
    }

    /// Pose the obstacles at tick `t` (clamped); returns the tick used.
    pub fn pose_obstacles_at(&mut self, t: usize) -> Result<usize> {
        let trajectory = self.trajectory.as_ref().ok_or(PlanError::NoTrajectory)?;
        let tick = trajectory.clamp(t);
        pose_obstacles(
            &mut self.backend,
            &self.obstacles,
            trajectory.configuration_at(tick).as_slice(),
        )?;
        Ok(tick)
    }

    /// Whether `config` is collision-free for the controlled arm.
    ///
    /// Obstacles stay where the last query left them.
    pub fn static_feasible(&mut self, config: &[f64]) -> Result<bool> {
        self.backend.set_configuration(self.mine, config)?;
        Ok(self.check_mine())
    }

    /// Whether moving from `state` to `new_state`, starting at obstacle tick
    /// `cur_time`, stays collision-free.
    ///
    /// The start pose is checked against tick `cur_time`, then sub-step `k`
    /// of `K` against tick `cur_time + k` (clamped). A zero-length edge still
    /// checks once at `cur_time + 1`. Returns on the first collision.
    pub fn edge_feasible(&mut self, state: &[f64], new_state: &[f64], cur_time: usize) -> Result<bool> {
        if state.len() != new_state.len() {
            return Err(PlanError::DimensionMismatch {
                expected: state.len(),
                actual: new_state.len(),
            });
        }

        let d = distance(state, new_state);
        let steps = step_count(d, self.speed);
        self.stats.edge_queries += 1;
        self.stats.weighted_checks += 1.0;

        self.backend.set_configuration(self.mine, state)?;
        let tick = self.pose_obstacles_at(cur_time)?;
        if !self.check_mine() {
            tracing::trace!(tick, "edge start in collision");
            return Ok(false);
        }
        // Only edges that pass the start check are weighted by length.
        if let Some(cc_eps) = self.cc_eps {
            self.stats.weighted_checks += (d / cc_eps).floor();
        }

        let mut pose = vec![0.0; state.len()];
        for k in 1..=steps {
            let s = k as f64 / steps as f64;
            for (p, (a, b)) in pose.iter_mut().zip(state.iter().zip(new_state)) {
                *p = a + s * (b - a);
            }
            self.backend.set_configuration(self.mine, &pose)?;
            let tick = self.pose_obstacles_at(cur_time + k)?;

            if !self.check_mine() {
                tracing::trace!(step = k, steps, tick, "edge rejected");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Whether `state` is within `eps` of `goal` and collision-free.
    pub fn in_goal_region(&mut self, state: &[f64], goal: &[f64], eps: f64) -> Result<bool> {
        if distance(state, goal) >= eps {
            return Ok(false);
        }
        self.static_feasible(state)
    }

    /// Whether `body` stays clear of the obstacles along the whole schedule.
    ///
    /// Consecutive ticks are interpolated with `max(1, ceil(|delta| / speed))`
    /// sub-steps each.
    pub fn trajectory_clear(&mut self, body: BodyId) -> Result<bool> {
        let configs = self
            .trajectory
            .as_ref()
            .ok_or(PlanError::NoTrajectory)?
            .configurations()
            .to_vec();

        pose_obstacles(&mut self.backend, &self.obstacles, configs[0].as_slice())?;
        if !self.check_body(body) {
            return Ok(false);
        }

        for pair in configs.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            let steps = step_count(distance(from.as_slice(), to.as_slice()), self.speed);
            for k in 1..=steps {
                let pose = from.lerp(to, k as f64 / steps as f64);
                pose_obstacles(&mut self.backend, &self.obstacles, pose.as_slice())?;
                if !self.check_body(body) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn check_body(&mut self, body: BodyId) -> bool {
        self.backend.detect_collisions();
        self.stats.collision_passes += 1;
        self.backend.is_body_clear(body)
    }

    /// Link positions of the controlled arm at `config`.
    pub fn workspace_points_mine(&mut self, config: &[f64]) -> Result<WorkspacePointCloud> {
        self.backend.set_configuration(self.mine, config)?;
        WorkspacePointCloud::capture(&self.backend, &[self.mine])
    }

    /// Link positions of every obstacle at a concatenated `config`.
    pub fn workspace_points_obstacles(&mut self, config: &[f64]) -> Result<WorkspacePointCloud> {
        pose_obstacles(&mut self.backend, &self.obstacles, config)?;
        WorkspacePointCloud::capture(&self.backend, &self.obstacles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use approx::assert_relative_eq;

    /// Single-joint arm and single-joint obstacle, obstacle script
    /// `10, 11, 12, 13, 14`.
    fn engine(backend: ScriptedBackend, speed: f64) -> MotionValidityEngine<ScriptedBackend> {
        let mut backend = backend;
        let mine = backend.add_body(1);
        let obs = backend.add_body(1);
        let mut engine = MotionValidityEngine::new(backend, mine, vec![obs], speed).unwrap();
        let script = (10..15).map(|v| Configuration::from_vec(vec![v as f64])).collect();
        engine.set_trajectory(script).unwrap();
        engine.backend_mut().passes.clear();
        engine
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = [0.3, -1.2, 2.0];
        let b = [1.0, 0.5, -0.5];
        assert_eq!(distance(&a, &a), 0.0);
        assert_eq!(distance(&a, &b), distance(&b, &a));
        assert_relative_eq!(distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }

    #[test]
    fn batched_distances() {
        let batch = vec![
            Configuration::from_vec(vec![0.0, 0.0]),
            Configuration::from_vec(vec![3.0, 4.0]),
        ];
        assert_eq!(distances(&batch, &[0.0, 0.0]), vec![0.0, 5.0]);
    }

    #[test]
    fn step_count_is_at_least_one() {
        assert_eq!(step_count(0.0, 0.1), 1);
        assert_eq!(step_count(1e-9, 0.1), 1);
        assert_eq!(step_count(3.0, 1.0), 3);
        assert_eq!(step_count(3.5, 1.0), 4);
    }

    #[test]
    fn three_step_edge_checks_four_times() {
        let mut engine = engine(ScriptedBackend::free(), 1.0);
        let mine = engine.mine();
        let obs = engine.obstacles()[0];

        assert!(engine.edge_feasible(&[0.0], &[3.0], 0).unwrap());

        let backend = engine.backend();
        assert_eq!(backend.passes.len(), 4);
        assert_eq!(backend.joint_history(mine, 0), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(backend.joint_history(obs, 0), vec![10.0, 11.0, 12.0, 13.0]);
        assert_eq!(engine.stats().collision_passes, 4);
        assert_eq!(engine.stats().edge_queries, 1);
    }

    #[test]
    fn obstacle_ticks_clamp_at_trajectory_end() {
        let mut engine = engine(ScriptedBackend::free(), 1.0);
        let obs = engine.obstacles()[0];

        assert!(engine.edge_feasible(&[0.0], &[3.0], 2).unwrap());
        assert_eq!(engine.backend().joint_history(obs, 0), vec![12.0, 13.0, 14.0, 14.0]);
    }

    #[test]
    fn zero_length_edge_checks_start_and_next_tick() {
        let mut engine = engine(ScriptedBackend::free(), 1.0);
        let mine = engine.mine();
        let obs = engine.obstacles()[0];

        assert!(engine.edge_feasible(&[0.5], &[0.5], 1).unwrap());
        let backend = engine.backend();
        assert_eq!(backend.passes.len(), 2);
        assert_eq!(backend.joint_history(mine, 0), vec![0.5, 0.5]);
        assert_eq!(backend.joint_history(obs, 0), vec![11.0, 12.0]);
    }

    #[test]
    fn waiting_in_place_sees_obstacle_arrive() {
        // Arm parked at 12; the obstacle reaches it on the next tick.
        let mut engine = engine(ScriptedBackend::first_joint_gap(0.5), 1.0);
        assert!(!engine.edge_feasible(&[12.0], &[12.0], 1).unwrap());
        assert_eq!(engine.backend().passes.len(), 2);
    }

    #[test]
    fn start_in_collision_short_circuits() {
        let mut engine = engine(ScriptedBackend::first_joint_gap(0.5), 1.0);
        assert!(!engine.edge_feasible(&[10.0], &[0.0], 0).unwrap());
        assert_eq!(engine.backend().passes.len(), 1);
    }

    #[test]
    fn collision_midway_stops_remaining_steps() {
        // Arm runs from 0 to 40 in 4 steps; at step 1 it is at 10 while the
        // obstacle is at 11.
        let mut engine = engine(ScriptedBackend::first_joint_gap(1.5), 10.0);
        assert!(!engine.edge_feasible(&[0.0], &[40.0], 0).unwrap());
        assert_eq!(engine.backend().passes.len(), 2);
    }

    #[test]
    fn edge_requires_trajectory() {
        let mut backend = ScriptedBackend::free();
        let mine = backend.add_body(1);
        let obs = backend.add_body(1);
        let mut engine = MotionValidityEngine::new(backend, mine, vec![obs], 1.0).unwrap();
        assert!(matches!(
            engine.edge_feasible(&[0.0], &[1.0], 0),
            Err(PlanError::NoTrajectory)
        ));
    }

    #[test]
    fn edge_rejects_mismatched_dimensions() {
        let mut engine = engine(ScriptedBackend::free(), 1.0);
        assert!(matches!(
            engine.edge_feasible(&[0.0], &[1.0, 2.0], 0),
            Err(PlanError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn goal_region_requires_feasibility() {
        let mut engine = engine(ScriptedBackend::first_joint_gap(0.5), 1.0);
        engine.edge_feasible(&[0.0], &[0.0], 0).unwrap();
        // Obstacle now parked at 11.
        assert!(!engine.in_goal_region(&[11.0], &[11.0], 1.0).unwrap());
        assert!(engine.in_goal_region(&[5.0], &[5.2], 1.0).unwrap());
        assert!(!engine.in_goal_region(&[5.0], &[7.0], 1.0).unwrap());
    }

    #[test]
    fn far_from_goal_skips_collision_check() {
        let mut engine = engine(ScriptedBackend::free(), 1.0);
        assert!(!engine.in_goal_region(&[0.0], &[5.0], 1.0).unwrap());
        assert!(engine.backend().passes.is_empty());
    }

    #[test]
    fn weighted_checks_follow_resolution() {
        let mut engine = engine(ScriptedBackend::free(), 1.0).with_resolution(Some(0.5));
        engine.edge_feasible(&[0.0], &[2.0], 0).unwrap();
        engine.edge_feasible(&[0.0], &[0.0], 0).unwrap();

        let stats = engine.take_stats();
        assert_eq!(stats.edge_queries, 2);
        assert_relative_eq!(stats.weighted_checks, 2.0 + 4.0);
        assert_eq!(engine.stats(), CollisionStats::default());
    }

    #[test]
    fn blocked_start_is_weighted_once() {
        // The obstacle starts at 10, on top of the arm.
        let mut engine =
            engine(ScriptedBackend::first_joint_gap(0.5), 1.0).with_resolution(Some(0.5));
        assert!(!engine.edge_feasible(&[10.0], &[12.0], 0).unwrap());

        let stats = engine.stats();
        assert_eq!(stats.edge_queries, 1);
        assert_relative_eq!(stats.weighted_checks, 1.0);
        assert_eq!(engine.backend().passes.len(), 1);
    }

    #[test]
    fn trajectory_sweep_interpolates_between_ticks() {
        let mut backend = ScriptedBackend::with_contacts(|poses| {
            // Body 2 is a pillar at 12.5 hit by the obstacle (body 1).
            if (poses[1][0] - 12.5).abs() < 0.3 {
                vec![crate::backend::BodyId(1), crate::backend::BodyId(2)]
            } else {
                Vec::new()
            }
        });
        let mine = backend.add_body(1);
        let obs = backend.add_body(1);
        let pillar = backend.add_body(0);

        // Coarse speed: ticks 12 and 13 are never sampled in between.
        let mut engine = MotionValidityEngine::new(backend, mine, vec![obs], 1.0).unwrap();
        engine
            .set_trajectory((10..15).map(|v| Configuration::from_vec(vec![v as f64])).collect())
            .unwrap();
        assert!(engine.trajectory_clear(pillar).unwrap());
        assert!(engine.trajectory_clear(mine).unwrap());

        // Fine speed: the sweep hits 12.5.
        engine.speed = 0.5;
        assert!(!engine.trajectory_clear(pillar).unwrap());
    }

    #[test]
    fn workspace_points_follow_pose() {
        let mut engine = engine(ScriptedBackend::free(), 1.0);
        let cloud = engine.workspace_points_mine(&[2.5]).unwrap();
        assert_eq!(cloud.point_count(), 2);
        assert_eq!(cloud.point(1).unwrap().x, 2.5);

        let obs = engine.workspace_points_obstacles(&[13.0]).unwrap();
        assert_eq!(obs, *engine.trajectory().unwrap().point_cloud_at(3));
    }

    #[test]
    fn rejects_bad_speed() {
        let mut backend = ScriptedBackend::free();
        let mine = backend.add_body(1);
        let obs = backend.add_body(1);
        assert!(MotionValidityEngine::new(backend, mine, vec![obs], 0.0).is_err());
    }
}
