//! Environment configuration loaded from TOML.

use std::path::{Path, PathBuf};

use armsweep_ir::BasePose;
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// Settings of one planning environment.
///
/// Lives under the `[env]` table of a config file:
///
/// ```toml
/// [env]
/// config_dim = 2
/// arm_file = "stick.json"
/// traj_obs_len = 11
/// length = 1.0
/// rrt_eps = 0.5
///
/// [[env.obstacle_bases]]
/// position = { x = 1.0, y = 0.0, z = 0.0 }
/// orientation = [0.0, 0.0, 0.0, 1.0]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Joint count of every arm in the scene.
    pub config_dim: usize,
    /// Length of one obstacle point cloud; derived when omitted.
    #[serde(default)]
    pub workspace_dim: Option<usize>,
    /// Arm model JSON, relative to the config file.
    pub arm_file: PathBuf,
    /// Base pose of the controlled arm.
    #[serde(default)]
    pub mine_base: BasePose,
    /// Initial base pose of each obstacle arm.
    pub obstacle_bases: Vec<BasePose>,
    /// Configuration distance covered per tick.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Ticks in a full-length obstacle trajectory (with `length`).
    #[serde(default)]
    pub traj_obs_len: Option<usize>,
    /// Configuration distance matching `traj_obs_len` ticks.
    #[serde(default)]
    pub length: Option<f64>,
    /// Ticks per unit of configuration distance.
    #[serde(default)]
    pub unit_timestep: Option<usize>,
    /// Goal region radius.
    pub rrt_eps: f64,
    /// Resolution behind the weighted collision-check statistic.
    #[serde(default)]
    pub cc_eps: Option<f64>,
    /// Shuffles the problem order once when set.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
    /// Seed for sampling and random actions.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Deserialize)]
struct ConfigFile {
    env: EnvConfig,
}

impl EnvConfig {
    /// Parse the `[env]` table of a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        file.env.validate()?;
        Ok(file.env)
    }

    /// Load a config file; `arm_file` is resolved against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if config.arm_file.is_relative() {
            if let Some(dir) = path.parent() {
                config.arm_file = dir.join(&config.arm_file);
            }
        }
        Ok(config)
    }

    /// Number of obstacle arms.
    pub fn obstacle_count(&self) -> usize {
        self.obstacle_bases.len()
    }

    /// Length of the concatenated obstacle configuration.
    pub fn obstacle_dim(&self) -> usize {
        self.config_dim * self.obstacle_count()
    }

    /// Length of one obstacle point cloud: three reals per link frame.
    pub fn derived_workspace_dim(&self) -> usize {
        3 * (self.config_dim + 1) * self.obstacle_count()
    }

    /// Per-tick distance budget of the controlled arm.
    pub fn resolve_speed(&self) -> Result<f64> {
        let speed = match (self.speed, self.traj_obs_len, self.length, self.unit_timestep) {
            (Some(speed), None, None, None) => speed,
            (None, Some(ticks), Some(length), None) => {
                if ticks < 2 {
                    return Err(PlanError::InvalidConfig(format!(
                        "traj_obs_len must be at least 2, got {ticks}"
                    )));
                }
                length / (ticks - 1) as f64
            }
            (None, None, None, Some(unit)) => {
                if unit < 2 {
                    return Err(PlanError::InvalidConfig(format!(
                        "unit_timestep must be at least 2, got {unit}"
                    )));
                }
                1.0 / (unit - 1) as f64
            }
            _ => {
                return Err(PlanError::InvalidConfig(
                    "set exactly one of `speed`, `traj_obs_len` + `length`, or `unit_timestep`"
                        .to_string(),
                ))
            }
        };
        if !(speed > 0.0 && speed.is_finite()) {
            return Err(PlanError::InvalidConfig(format!(
                "speed must be positive and finite, got {speed}"
            )));
        }
        Ok(speed)
    }

    /// Reject settings the environment cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.config_dim == 0 {
            return Err(PlanError::InvalidConfig("config_dim must be positive".to_string()));
        }
        if self.obstacle_bases.is_empty() {
            return Err(PlanError::InvalidConfig(
                "at least one obstacle base is required".to_string(),
            ));
        }
        if !(self.rrt_eps > 0.0) {
            return Err(PlanError::InvalidConfig(format!(
                "rrt_eps must be positive, got {}",
                self.rrt_eps
            )));
        }
        if let Some(cc_eps) = self.cc_eps {
            if !(cc_eps > 0.0) {
                return Err(PlanError::InvalidConfig(format!(
                    "cc_eps must be positive, got {cc_eps}"
                )));
            }
        }
        if let Some(dim) = self.workspace_dim {
            let derived = self.derived_workspace_dim();
            if dim != derived {
                return Err(PlanError::InvalidConfig(format!(
                    "workspace_dim is {dim} but the arms expose {derived}"
                )));
            }
        }
        self.resolve_speed()?;
        Ok(())
    }
}
