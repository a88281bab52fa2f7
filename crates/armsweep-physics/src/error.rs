//! Error types for motion validity checking.

use thiserror::Error;

use crate::backend::BodyId;

/// Errors that can occur while building scenes or checking motions.
#[derive(Error, Debug)]
pub enum PlanError {
    /// `init_new_problem` was given no problem source and none was loaded before.
    #[error("No problem source: supply a problem file or an inline problem set")]
    NoProblemSource,

    /// Problem or RL index outside the loaded batch.
    #[error("Index {index} out of range for batch of {len}")]
    ProblemIndex {
        /// Requested index.
        index: usize,
        /// Batch length.
        len: usize,
    },

    /// Rejection sampling ran out of attempts.
    #[error("Gave up sampling a collision-free configuration after {attempts} rejections")]
    SamplingExhausted {
        /// Rejected draws before giving up.
        attempts: usize,
    },

    /// The current node has no outgoing transition.
    #[error("Node {index} has no eligible transition")]
    NoCandidates {
        /// Node index whose reward row is empty.
        index: usize,
    },

    /// A configuration has the wrong number of joints.
    #[error("Configuration has {actual} values, expected {expected}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Body handle not registered with the backend.
    #[error("Body not found: {0:?}")]
    UnknownBody(BodyId),

    /// Link index past the body's last frame.
    #[error("Link {link} not found on body {body:?}")]
    UnknownLink {
        /// Body queried.
        body: BodyId,
        /// Requested link frame.
        link: usize,
    },

    /// Obstacle trajectory shorter than two ticks.
    #[error("Obstacle trajectory needs at least 2 ticks, got {0}")]
    TrajectoryTooShort(usize),

    /// No obstacle trajectory installed yet.
    #[error("No obstacle trajectory installed; call init_new_problem first")]
    NoTrajectory,

    /// Invalid environment configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// RL step requested before `reset`/`init_rl_problem`.
    #[error("No active episode")]
    NoEpisode,

    /// RL step requested after the goal was reached.
    #[error("Episode already reached the goal; call reset")]
    EpisodeDone,

    /// Malformed model or batch.
    #[error(transparent)]
    Ir(#[from] armsweep_ir::IrError),

    /// File access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decoding failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;
