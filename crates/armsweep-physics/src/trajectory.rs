//! Scripted obstacle motion and its precomputed workspace points.

use nalgebra::Point3;

use crate::backend::{BodyId, CollisionBackend};
use crate::error::{PlanError, Result};
use crate::Configuration;

/// Link frame origins of one or more arms, flattened to `[x0, y0, z0, x1, ...]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkspacePointCloud(Vec<f64>);

impl WorkspacePointCloud {
    /// Wrap flattened coordinates. The length must be a multiple of 3.
    pub fn from_flat(coords: Vec<f64>) -> Self {
        debug_assert_eq!(coords.len() % 3, 0);
        Self(coords)
    }

    /// Flattened coordinates.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of points.
    pub fn point_count(&self) -> usize {
        self.0.len() / 3
    }

    /// The `i`-th point.
    pub fn point(&self, i: usize) -> Option<Point3<f64>> {
        let c = self.0.get(i * 3..i * 3 + 3)?;
        Some(Point3::new(c[0], c[1], c[2]))
    }

    /// Iterate over points in link order.
    pub fn points(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.0.chunks_exact(3).map(|c| Point3::new(c[0], c[1], c[2]))
    }

    /// Read every link frame of `bodies`, in order, under their current pose.
    pub fn capture<B: CollisionBackend>(backend: &B, bodies: &[BodyId]) -> Result<Self> {
        let mut coords = Vec::new();
        for &body in bodies {
            for link in 0..backend.link_count(body)? {
                let p = backend.link_world_position(body, link)?;
                coords.extend_from_slice(&[p.x, p.y, p.z]);
            }
        }
        Ok(Self(coords))
    }
}

/// Pose several obstacle arms from one concatenated configuration.
///
/// Each obstacle takes the next `joint_count` values.
pub fn pose_obstacles<B: CollisionBackend>(
    backend: &mut B,
    obstacles: &[BodyId],
    config: &[f64],
) -> Result<()> {
    let mut offset = 0;
    for &body in obstacles {
        let n = backend.joint_count(body)?;
        let part = config
            .get(offset..offset + n)
            .ok_or(PlanError::DimensionMismatch {
                expected: offset + n,
                actual: config.len(),
            })?;
        backend.set_configuration(body, part)?;
        offset += n;
    }
    if offset != config.len() {
        return Err(PlanError::DimensionMismatch {
            expected: offset,
            actual: config.len(),
        });
    }
    Ok(())
}

/// Time-indexed obstacle configurations for one problem instance.
///
/// Tick `t` past the end reads the last entry: the obstacle stays parked
/// once its script runs out.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleTrajectory {
    configs: Vec<Configuration>,
    clouds: Vec<WorkspacePointCloud>,
}

impl ObstacleTrajectory {
    /// Pose the obstacles at every tick once and keep their link positions.
    pub fn precompute<B: CollisionBackend>(
        backend: &mut B,
        obstacles: &[BodyId],
        configs: Vec<Configuration>,
    ) -> Result<Self> {
        if configs.len() < 2 {
            return Err(PlanError::TrajectoryTooShort(configs.len()));
        }

        let mut clouds = Vec::with_capacity(configs.len());
        for config in &configs {
            pose_obstacles(backend, obstacles, config.as_slice())?;
            clouds.push(WorkspacePointCloud::capture(backend, obstacles)?);
        }

        tracing::debug!(
            ticks = configs.len(),
            points = clouds[0].point_count(),
            "precomputed obstacle point clouds"
        );
        Ok(Self { configs, clouds })
    }

    /// Number of ticks.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Always false; a trajectory has at least two ticks.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Clamp a tick to the last available index.
    pub fn clamp(&self, t: usize) -> usize {
        t.min(self.configs.len() - 1)
    }

    /// Obstacle configuration at tick `t` (clamped).
    pub fn configuration_at(&self, t: usize) -> &Configuration {
        &self.configs[self.clamp(t)]
    }

    /// Obstacle point cloud at tick `t` (clamped).
    pub fn point_cloud_at(&self, t: usize) -> &WorkspacePointCloud {
        &self.clouds[self.clamp(t)]
    }

    /// All configurations, tick order.
    pub fn configurations(&self) -> &[Configuration] {
        &self.configs
    }

    /// All point clouds, tick order.
    pub fn point_clouds(&self) -> &[WorkspacePointCloud] {
        &self.clouds
    }
}
