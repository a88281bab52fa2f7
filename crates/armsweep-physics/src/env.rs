//! Planning environment: problem batches, sampling and RL episodes.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use armsweep_ir::{ArmModel, BasePose, ProblemSet, RlProblemSet};

use crate::backend::{BodyId, CollisionBackend, SceneBuilder};
use crate::config::EnvConfig;
use crate::error::{PlanError, Result};
use crate::gym::{EdgeRewardMatrix, EpisodeController, StepOutcome};
use crate::trajectory::WorkspacePointCloud;
use crate::validity::{CollisionStats, MotionValidityEngine};
use crate::world::CollisionWorld;
use crate::Configuration;

/// Rejected draws `sample_free_configs` tolerates before giving up.
pub const SAMPLING_BUDGET: usize = 100_000;

/// Where `init_new_problem` reads its batch from.
#[derive(Debug, Clone)]
pub enum ProblemSource {
    /// JSON file holding a [`ProblemSet`].
    File(PathBuf),
    /// Batch already in memory.
    Inline(ProblemSet),
}

#[derive(Debug, Clone)]
struct Instance {
    index: usize,
    init: Configuration,
    goal: Configuration,
}

/// One controlled arm, scripted obstacle arms, and the active problem.
pub struct PlanningEnv<B> {
    config: EnvConfig,
    engine: MotionValidityEngine<B>,
    problems: Option<ProblemSet>,
    order: Vec<usize>,
    episode_i: usize,
    instance: Option<Instance>,
    rl_problems: Option<RlProblemSet>,
    episode: Option<EpisodeController>,
    voxels: Vec<BodyId>,
    /// Obstacle base poses currently applied to the backend.
    bases: Vec<BasePose>,
    rng: fastrand::Rng,
}

impl PlanningEnv<CollisionWorld> {
    /// Build a Rapier-backed environment from a TOML config file.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = EnvConfig::load(path)?;
        let model = ArmModel::from_json(&std::fs::read_to_string(&config.arm_file)?)?;
        Self::new(config, &model, CollisionWorld::new())
    }
}

impl<B: CollisionBackend + SceneBuilder> PlanningEnv<B> {
    /// Load the controlled arm and one obstacle arm per configured base.
    pub fn new(config: EnvConfig, model: &ArmModel, mut backend: B) -> Result<Self> {
        config.validate()?;
        if model.dof() != config.config_dim {
            return Err(PlanError::DimensionMismatch {
                expected: config.config_dim,
                actual: model.dof(),
            });
        }

        let mine = backend.load_arm(model, &config.mine_base)?;
        let obstacles = config
            .obstacle_bases
            .iter()
            .map(|base| backend.load_arm(model, base))
            .collect::<Result<Vec<_>>>()?;

        let speed = config.resolve_speed()?;
        let engine =
            MotionValidityEngine::new(backend, mine, obstacles, speed)?.with_resolution(config.cc_eps);
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let bases = config.obstacle_bases.clone();

        tracing::debug!(
            config_dim = config.config_dim,
            obstacles = config.obstacle_count(),
            speed,
            "created planning environment"
        );
        Ok(Self {
            config,
            engine,
            problems: None,
            order: Vec::new(),
            episode_i: 0,
            instance: None,
            rl_problems: None,
            episode: None,
            voxels: Vec::new(),
            bases,
            rng,
        })
    }

    /// Environment settings.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Validity engine.
    pub fn engine(&self) -> &MotionValidityEngine<B> {
        &self.engine
    }

    /// Mutable validity engine.
    pub fn engine_mut(&mut self) -> &mut MotionValidityEngine<B> {
        &mut self.engine
    }

    /// Collision statistics since the active problem was selected.
    pub fn stats(&self) -> CollisionStats {
        self.engine.stats()
    }

    /// Select the next problem instance.
    ///
    /// `source` replaces the loaded batch; `None` keeps it. `index` picks a
    /// slot directly; either way the rolling counter advances by one.
    /// Returns the instance's batch index. On error the active batch and
    /// instance are left as they were.
    pub fn init_new_problem(
        &mut self,
        source: Option<ProblemSource>,
        index: Option<usize>,
    ) -> Result<usize> {
        let staged = match source {
            Some(ProblemSource::File(path)) => {
                Some(ProblemSet::from_json(&std::fs::read_to_string(&path)?)?)
            }
            Some(ProblemSource::Inline(set)) => Some(set),
            None => None,
        };
        if let Some(set) = &staged {
            set.validate(self.config.config_dim, self.config.obstacle_count())?;
        }
        let problems = staged
            .as_ref()
            .or(self.problems.as_ref())
            .ok_or(PlanError::NoProblemSource)?;

        let len = problems.len();
        let order = match &staged {
            Some(_) => self.problem_order(len),
            None => self.order.clone(),
        };
        // A shorter batch may leave the counter past its end.
        let episode_i = self.episode_i % len;
        let slot = index.unwrap_or(episode_i);
        if slot >= len {
            return Err(PlanError::ProblemIndex { index: slot, len });
        }
        let pb = order[slot];

        let bases = (0..self.config.obstacle_count())
            .map(|j| {
                BasePose::from_concatenated(&problems.obs_pos[pb], &problems.obs_ori[pb], j)
                    .ok_or_else(|| {
                        PlanError::InvalidConfig(format!(
                            "problem {pb} has no base pose for obstacle {j}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let trajectory = problems.obs_traj[pb]
            .iter()
            .map(|c| Configuration::from_column_slice(c))
            .collect();
        let instance = Instance {
            index: pb,
            init: Configuration::from_column_slice(&problems.init_states[pb]),
            goal: Configuration::from_column_slice(&problems.goal_states[pb]),
        };

        self.pose_bases(&bases)?;
        if let Err(e) = self.engine.set_trajectory(trajectory) {
            let previous = self.bases.clone();
            self.pose_bases(&previous)?;
            return Err(e);
        }

        if let Some(set) = staged {
            tracing::debug!(problems = len, shuffled = self.config.shuffle_seed.is_some(), "loaded problem batch");
            self.problems = Some(set);
            self.order = order;
        }
        self.bases = bases;
        self.engine.reset_stats();
        self.instance = Some(instance);
        self.episode = None;
        self.episode_i = (episode_i + 1) % len;

        tracing::debug!(slot, problem = pb, "selected problem instance");
        Ok(pb)
    }

    fn problem_order(&self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        if let Some(seed) = self.config.shuffle_seed {
            fastrand::Rng::with_seed(seed).shuffle(&mut order);
        }
        order
    }

    fn pose_bases(&mut self, bases: &[BasePose]) -> Result<()> {
        for (&body, pose) in self.engine.obstacles().to_vec().iter().zip(bases) {
            self.engine.backend_mut().set_base_pose(body, pose)?;
        }
        Ok(())
    }

    fn instance(&self) -> Result<&Instance> {
        self.instance.as_ref().ok_or(PlanError::NoTrajectory)
    }

    /// Batch index of the active instance.
    pub fn problem_index(&self) -> Option<usize> {
        self.instance.as_ref().map(|i| i.index)
    }

    /// Rolling counter: slot of the next instance `init_new_problem` draws.
    pub fn episode_index(&self) -> usize {
        self.episode_i
    }

    /// Start configuration of the active instance.
    pub fn init_state(&self) -> Result<&Configuration> {
        Ok(&self.instance()?.init)
    }

    /// Goal configuration of the active instance.
    pub fn goal_state(&self) -> Result<&Configuration> {
        Ok(&self.instance()?.goal)
    }

    /// Precomputed obstacle point clouds, one per tick.
    pub fn obstacle_points(&self) -> Result<&[WorkspacePointCloud]> {
        Ok(self
            .engine
            .trajectory()
            .ok_or(PlanError::NoTrajectory)?
            .point_clouds())
    }

    /// Move the obstacles to tick `t` of the active schedule.
    pub fn seek_obstacles(&mut self, t: usize) -> Result<usize> {
        self.engine.pose_obstacles_at(t)
    }

    /// See [`MotionValidityEngine::static_feasible`].
    pub fn static_feasible(&mut self, config: &[f64]) -> Result<bool> {
        self.engine.static_feasible(config)
    }

    /// See [`MotionValidityEngine::edge_feasible`].
    pub fn edge_feasible(&mut self, state: &[f64], new_state: &[f64], cur_time: usize) -> Result<bool> {
        self.engine.edge_feasible(state, new_state, cur_time)
    }

    /// Whether `state` lies within `rrt_eps` of the goal and is collision-free.
    pub fn in_goal_region(&mut self, state: &[f64]) -> Result<bool> {
        let goal = self.instance()?.goal.clone();
        self.engine
            .in_goal_region(state, goal.as_slice(), self.config.rrt_eps)
    }

    fn draw(&mut self, n: usize, dim: usize) -> Vec<Configuration> {
        (0..n)
            .map(|_| Configuration::from_fn(dim, |_, _| self.rng.f64() * PI))
            .collect()
    }

    /// `n` configurations uniform in `[0, π]^config_dim`.
    pub fn uniform_sample(&mut self, n: usize) -> Vec<Configuration> {
        self.draw(n, self.config.config_dim)
    }

    /// `n` concatenated obstacle configurations uniform in `[0, π]`.
    pub fn uniform_sample_obstacle(&mut self, n: usize) -> Vec<Configuration> {
        self.draw(n, self.config.obstacle_dim())
    }

    /// `n` collision-free configurations against the scene as currently posed.
    pub fn sample_free_configs(&mut self, n: usize) -> Result<Vec<Configuration>> {
        let dim = self.config.config_dim;
        let mut found = Vec::with_capacity(n);
        let mut rejected = 0;
        while found.len() < n {
            let candidate = Configuration::from_fn(dim, |_, _| self.rng.f64() * PI);
            if self.engine.static_feasible(candidate.as_slice())? {
                found.push(candidate);
                continue;
            }
            rejected += 1;
            if rejected >= SAMPLING_BUDGET {
                tracing::warn!(found = found.len(), wanted = n, "free-space sampling exhausted");
                return Err(PlanError::SamplingExhausted { attempts: rejected });
            }
        }
        Ok(found)
    }

    /// Link positions of the controlled arm at `config`.
    pub fn workspace_points_mine(&mut self, config: &[f64]) -> Result<WorkspacePointCloud> {
        self.engine.workspace_points_mine(config)
    }

    /// Link positions of the obstacles at a concatenated `config`.
    pub fn workspace_points_obstacle(&mut self, config: &[f64]) -> Result<WorkspacePointCloud> {
        self.engine.workspace_points_obstacles(config)
    }

    /// Place a static box in the scene; it persists across problems.
    pub fn add_voxel(&mut self, half_extents: [f64; 3], position: [f64; 3]) -> Result<BodyId> {
        let body = self.engine.backend_mut().add_static_box(half_extents, position)?;
        self.voxels.push(body);
        Ok(body)
    }

    /// Static boxes added so far.
    pub fn voxels(&self) -> &[BodyId] {
        &self.voxels
    }

    /// Load a batch of RL problems from a JSON file.
    pub fn init_all_rl_problems(&mut self, path: &Path) -> Result<usize> {
        let set = RlProblemSet::from_json(&std::fs::read_to_string(path)?)?;
        self.set_rl_problems(set)
    }

    /// Install an in-memory batch of RL problems.
    pub fn set_rl_problems(&mut self, set: RlProblemSet) -> Result<usize> {
        set.validate(self.config.config_dim)?;
        if set.is_empty() {
            return Err(PlanError::InvalidConfig("RL batch holds no problems".to_string()));
        }
        let len = set.len();
        self.rl_problems = Some(set);
        self.episode = None;
        Ok(len)
    }

    /// Build the episode controller for RL problem `index`.
    ///
    /// `policy` turns the point set and edge list into the reward matrix.
    /// The goal is the active problem instance's goal state.
    pub fn init_rl_problem<F>(&mut self, index: usize, policy: F) -> Result<()>
    where
        F: FnOnce(&[Configuration], &[[usize; 2]]) -> EdgeRewardMatrix,
    {
        let goal = self.instance()?.goal.clone();
        let set = self.rl_problems.as_ref().ok_or(PlanError::NoProblemSource)?;
        if index >= set.len() {
            return Err(PlanError::ProblemIndex {
                index,
                len: set.len(),
            });
        }

        let points: Vec<Configuration> = set.points[index]
            .iter()
            .map(|p| Configuration::from_column_slice(p))
            .collect();
        let rewards = policy(&points[..], &set.edge_index[index][..]);
        let seed = self.config.seed.map(|s| s.wrapping_add(index as u64));
        self.episode = Some(EpisodeController::new(
            points,
            rewards,
            goal,
            self.config.rrt_eps,
            seed,
        )?);
        Ok(())
    }

    /// Active episode controller.
    pub fn episode(&self) -> Option<&EpisodeController> {
        self.episode.as_ref()
    }

    fn episode_mut(&mut self) -> Result<&mut EpisodeController> {
        self.episode.as_mut().ok_or(PlanError::NoEpisode)
    }

    /// Start an episode at point 0.
    pub fn reset(&mut self) -> Result<usize> {
        Ok(self.episode_mut()?.reset())
    }

    /// Random eligible transition from the current point.
    pub fn sample_random_action(&mut self) -> Result<usize> {
        self.episode_mut()?.sample_random_candidate()
    }

    /// Attempt the transition to `target`.
    pub fn step(&mut self, target: usize) -> Result<StepOutcome> {
        let episode = self.episode.as_mut().ok_or(PlanError::NoEpisode)?;
        episode.step(&mut self.engine, target)
    }
}
