//! Structural errors: programming mistakes or impossible requests.
//!
//! Tolerance failures are not errors; see [`crate::consistency`].

use crate::tcp::Dimension;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("index {index} out of range for plan of {len} points")]
    InvalidIndex { index: usize, len: usize },

    #[error("time {0} is not a finite non-negative value")]
    InvalidTime(f64),

    #[error("position is not finite")]
    InvalidPosition,

    #[error("time {time} is outside plan range [{start}, {end}]")]
    TimeOutOfRange { time: f64, start: f64, end: f64 },

    #[error("cannot merge two {dimension} {role} tags{}", at_index(.index))]
    MergeConflict {
        dimension: Dimension,
        role: &'static str,
        index: Option<usize>,
    },

    #[error("no {dimension} zone end found after index {index}")]
    MissingZoneEnd { dimension: Dimension, index: usize },

    #[error("index {index} does not open a {dimension} zone")]
    NotZoneBegin { dimension: Dimension, index: usize },

    #[error("{dimension} zone already open at time {time}")]
    ZoneOverlap { dimension: Dimension, time: f64 },

    #[error("acceleration zone of {distance:.1} m runs past the end of the plan")]
    ZoneExceedsPlan { distance: f64 },

    #[error("speed change is not achievable: {0}")]
    Infeasible(String),

    #[error("plan needs at least {needed} points, has {len}")]
    TooFewPoints { needed: usize, len: usize },
}

/// Why a plan fails [`crate::Plan::well_formed`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellFormedError {
    #[error("plan has {0} points, needs at least 2")]
    TooFewPoints(usize),

    #[error("time does not increase at index {index}")]
    NonIncreasingTime { index: usize },

    #[error("{dimension} zone opened at index {index} is never closed")]
    UnmatchedBegin { dimension: Dimension, index: usize },

    #[error("{dimension} zone closed at index {index} was never opened")]
    UnmatchedEnd { dimension: Dimension, index: usize },
}

fn at_index(index: &Option<usize>) -> String {
    index.map(|i| format!(" at index {i}")).unwrap_or_default()
}

impl PlanError {
    /// Attach the plan index at which a merge was attempted.
    pub fn at(self, ix: usize) -> Self {
        match self {
            PlanError::MergeConflict { dimension, role, .. } => PlanError::MergeConflict {
                dimension,
                role,
                index: Some(ix),
            },
            other => other,
        }
    }
}
