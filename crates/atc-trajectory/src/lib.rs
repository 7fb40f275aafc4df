//! Kinematic 4-D trajectory model.
//!
//! A [`Plan`] is a time-ordered list of vertices. Trajectory change points
//! (TCPs) open and close acceleration zones: turns, ground-speed changes and
//! vertical-speed changes. Positions are generic over [`Coordinate`] so the
//! same algorithms run on a local Euclidean frame or on the sphere.

pub mod config;
pub mod consistency;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod kinematics;
pub mod label;
pub mod plan;
pub mod revert;
pub mod sampler;
pub mod synth;
pub mod tcp;
pub mod trajgen;
pub mod units;

pub use config::{GenerationLimits, SamplerConfig, Tolerances};
pub use consistency::{CheckKind, ConsistencyChecker, ConsistencyReport, Finding};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{PlanError, WellFormedError};
pub use geometry::{Coordinate, LatLonAlt, Velocity, Waypoint, Xyz};
pub use label::LabelError;
pub use plan::{Plan, Redundancy, Vertex};
pub use revert::{
    revert_all, revert_all_with, revert_group, revert_group_with, revert_gs_with_previous_turn,
    revert_gs_zone, revert_one, revert_turn_zone, revert_vs_zone,
};
pub use synth::{
    add_gs_zone, feasibility_check, fix_gs_accel_at, rescale_gs, GsFeasibility,
    VerticalRegenerator,
};
pub use tcp::{Dimension, GsTag, Source, TcpMeta, TrkTag, VsTag, WayKind};
pub use trajgen::{
    generate_gs_tcps, generate_turn_tcps, make_kinematic_plan, make_marked_vs_constant,
    mark_vs_changes, VsVertexGenerator,
};
