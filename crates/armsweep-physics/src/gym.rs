//! Gym-style episode controller over a fixed point set.
//!
//! An episode walks between the points of a roadmap. Each step asks the
//! validity engine whether the edge to the chosen point is collision-free
//! at the current obstacle tick, pays a reward from an edge-reward matrix,
//! and advances the tick by the edge's sub-step count.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::backend::CollisionBackend;
use crate::error::{PlanError, Result};
use crate::validity::{distance, MotionValidityEngine};
use crate::Configuration;

/// Reward-matrix entry marking a missing edge.
pub const NO_EDGE: f64 = -1.0;

/// Reward paid for a step along an edge in collision.
pub const COLLISION_PENALTY: f64 = -10.0;

/// Square matrix over the point set.
///
/// The diagonal holds each point's distance-to-goal heuristic; off-diagonal
/// entries other than [`NO_EDGE`] mark eligible transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRewardMatrix(DMatrix<f64>);

impl EdgeRewardMatrix {
    /// Wrap a square matrix.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        if !matrix.is_square() {
            return Err(PlanError::DimensionMismatch {
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            });
        }
        Ok(Self(matrix))
    }

    /// Number of points covered.
    pub fn size(&self) -> usize {
        self.0.nrows()
    }

    /// Raw entry.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.0.get((row, col)).copied()
    }

    /// Distance-to-goal heuristic of point `i`.
    pub fn heuristic(&self, i: usize) -> Option<f64> {
        self.get(i, i)
    }

    /// Columns of `row` that are not [`NO_EDGE`].
    pub fn candidates(&self, row: usize) -> Vec<usize> {
        if row >= self.size() {
            return Vec::new();
        }
        self.0
            .row(row)
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != NO_EDGE)
            .map(|(col, _)| col)
            .collect()
    }

    /// Underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.0
    }
}

/// Reward policy built from a goal configuration.
///
/// Diagonal entries hold the point's distance to `goal`; every listed edge
/// holds its length in both directions; everything else is [`NO_EDGE`].
pub fn goal_distance_policy(
    goal: Configuration,
) -> impl FnOnce(&[Configuration], &[[usize; 2]]) -> EdgeRewardMatrix {
    move |points: &[Configuration], edges: &[[usize; 2]]| {
        let n = points.len();
        let mut m = DMatrix::from_element(n, n, NO_EDGE);
        for (i, p) in points.iter().enumerate() {
            m[(i, i)] = distance(p.as_slice(), goal.as_slice());
        }
        for &[a, b] in edges {
            if a < n && b < n && a != b {
                let d = distance(points[a].as_slice(), points[b].as_slice());
                m[(a, b)] = d;
                m[(b, a)] = d;
            }
        }
        EdgeRewardMatrix(m)
    }
}

/// Lifecycle of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// No episode started yet.
    Idle,
    /// Accepting steps.
    Running,
    /// The last step reached the goal region.
    Done,
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Point index after the step.
    pub index: usize,
    /// Reward earned.
    pub reward: f64,
    /// Whether the goal region was reached.
    pub done: bool,
    /// Whether the edge was collision-free.
    pub feasible: bool,
}

/// Episode state machine for one RL problem.
pub struct EpisodeController {
    points: Vec<Configuration>,
    rewards: EdgeRewardMatrix,
    goal: Configuration,
    goal_eps: f64,
    phase: EpisodePhase,
    current_index: usize,
    current_time: usize,
    rng: fastrand::Rng,
}

impl EpisodeController {
    /// Create an idle controller; point 0 is the episode start.
    pub fn new(
        points: Vec<Configuration>,
        rewards: EdgeRewardMatrix,
        goal: Configuration,
        goal_eps: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(PlanError::InvalidConfig("empty point set".to_string()));
        }
        if rewards.size() != points.len() {
            return Err(PlanError::DimensionMismatch {
                expected: points.len(),
                actual: rewards.size(),
            });
        }
        let dim = points[0].len();
        if let Some(p) = points.iter().find(|p| p.len() != dim) {
            return Err(PlanError::DimensionMismatch {
                expected: dim,
                actual: p.len(),
            });
        }
        if goal.len() != dim {
            return Err(PlanError::DimensionMismatch {
                expected: dim,
                actual: goal.len(),
            });
        }
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Ok(Self {
            points,
            rewards,
            goal,
            goal_eps,
            phase: EpisodePhase::Idle,
            current_index: 0,
            current_time: 0,
            rng,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    /// Point the episode stands on.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Obstacle tick cursor.
    pub fn current_time(&self) -> usize {
        self.current_time
    }

    /// Point set.
    pub fn points(&self) -> &[Configuration] {
        &self.points
    }

    /// Reward matrix.
    pub fn rewards(&self) -> &EdgeRewardMatrix {
        &self.rewards
    }

    /// Goal configuration.
    pub fn goal(&self) -> &Configuration {
        &self.goal
    }

    /// Start a new episode at point 0, tick 0.
    pub fn reset(&mut self) -> usize {
        self.current_index = 0;
        self.current_time = 0;
        self.phase = EpisodePhase::Running;
        self.current_index
    }

    /// Uniformly pick an eligible transition from the current point.
    pub fn sample_random_candidate(&mut self) -> Result<usize> {
        let candidates = self.rewards.candidates(self.current_index);
        if candidates.is_empty() {
            return Err(PlanError::NoCandidates {
                index: self.current_index,
            });
        }
        Ok(candidates[self.rng.usize(..candidates.len())])
    }

    /// Attempt the transition to `target`.
    ///
    /// The index and tick advance even when the edge is in collision.
    pub fn step<B: CollisionBackend>(
        &mut self,
        engine: &mut MotionValidityEngine<B>,
        target: usize,
    ) -> Result<StepOutcome> {
        match self.phase {
            EpisodePhase::Idle => return Err(PlanError::NoEpisode),
            EpisodePhase::Done => return Err(PlanError::EpisodeDone),
            EpisodePhase::Running => {}
        }
        if target >= self.points.len() {
            return Err(PlanError::ProblemIndex {
                index: target,
                len: self.points.len(),
            });
        }

        let state = self.points[self.current_index].as_slice();
        let new_state = self.points[target].as_slice();

        let feasible = engine.edge_feasible(state, new_state, self.current_time)?;
        let done = feasible && engine.in_goal_region(new_state, self.goal.as_slice(), self.goal_eps)?;

        let reward = if feasible {
            let start = self.rewards.heuristic(0).unwrap_or(0.0);
            let here = self.rewards.heuristic(self.current_index).unwrap_or(0.0);
            start - here
        } else {
            COLLISION_PENALTY
        };

        self.current_time += engine.steps_between(state, new_state);
        self.current_index = target;
        if done {
            self.phase = EpisodePhase::Done;
        }

        tracing::trace!(
            index = target,
            time = self.current_time,
            reward,
            feasible,
            done,
            "episode step"
        );
        Ok(StepOutcome {
            index: target,
            reward,
            done,
            feasible,
        })
    }
}
