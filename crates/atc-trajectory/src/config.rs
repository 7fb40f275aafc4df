//! Tolerances, generation limits and sampler settings.
//!
//! Every check and generator takes its values from the caller; unit tests and
//! operational re-planning use different ones.

use crate::units::{from_fpm, from_kn, KNOT_MPS};
use serde::{Deserialize, Serialize};
use std::env;

/// Tolerances for the consistency checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Max horizontal miss of a recomputed end-of-turn position (m)
    pub max_trk_dist: f64,
    /// Max along-path miss of a ground-speed zone (m)
    pub max_gs_dist: f64,
    /// Max altitude miss of a vertical-speed zone (m)
    pub max_vs_dist: f64,
    /// Max difference between stored and implied acceleration (m/s^2)
    pub accel_epsilon: f64,
    /// Track continuity tolerance (rad)
    pub trk_continuity: f64,
    /// Ground-speed continuity tolerance (m/s)
    pub gs_continuity: f64,
    /// Vertical-speed continuity tolerance (m/s)
    pub vs_continuity: f64,
    /// Ground speeds below this count as zero (m/s)
    pub near_zero_gs: f64,
    /// Minimum spacing between consecutive vertices (s)
    pub min_dt: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            max_trk_dist: 0.11, // ~1e-6 degree of arc
            max_gs_dist: 0.007,
            max_vs_dist: 0.001,
            accel_epsilon: 1e-3,
            trk_continuity: 1f64.to_radians(),
            gs_continuity: from_kn(10.0),
            vs_continuity: from_fpm(200.0),
            near_zero_gs: 1e-4,
            min_dt: 1e-5,
        }
    }
}

impl Tolerances {
    /// Looser values suitable for trajectories from external sources.
    pub fn weak() -> Self {
        Self {
            max_gs_dist: 0.05,
            max_vs_dist: 0.1,
            accel_epsilon: 1e-2,
            trk_continuity: 5f64.to_radians(),
            gs_continuity: from_kn(20.0),
            vs_continuity: from_fpm(300.0),
            near_zero_gs: 1e-2,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            max_trk_dist: env_f64("ATC_TRAJ_MAX_TRK_DIST_M").unwrap_or(base.max_trk_dist),
            max_gs_dist: env_f64("ATC_TRAJ_MAX_GS_DIST_M").unwrap_or(base.max_gs_dist),
            max_vs_dist: env_f64("ATC_TRAJ_MAX_VS_DIST_M").unwrap_or(base.max_vs_dist),
            accel_epsilon: env_f64("ATC_TRAJ_ACCEL_EPSILON").unwrap_or(base.accel_epsilon),
            ..base
        }
    }

    /// Parse tolerances from JSON; missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Thresholds and rates used when generating acceleration zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationLimits {
    /// Smallest track change that produces a turn (rad)
    pub min_trk_delta: f64,
    /// Smallest ground-speed change that produces a BGS/EGS pair (m/s)
    pub min_gs_delta: f64,
    /// Smallest vertical-speed change that produces a BVS/EVS pair (m/s)
    pub min_vs_delta: f64,
    /// Bank angle used when a vertex carries no explicit radius (rad)
    pub bank_angle: f64,
    /// Ground-speed acceleration magnitude (m/s^2)
    pub gs_accel: f64,
    /// Vertical acceleration magnitude (m/s^2)
    pub vs_accel: f64,
    /// Vertices closer than this after a revert are merged (s)
    pub min_dt: f64,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            min_trk_delta: 1f64.to_radians(),
            min_gs_delta: from_kn(10.0),
            min_vs_delta: from_fpm(200.0),
            bank_angle: 25f64.to_radians(),
            gs_accel: 2.0 * KNOT_MPS,
            vs_accel: 1.0,
            min_dt: 1e-5,
        }
    }
}

impl GenerationLimits {
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            bank_angle: env_f64("ATC_TRAJ_BANK_DEG")
                .map(f64::to_radians)
                .unwrap_or(base.bank_angle),
            gs_accel: env_f64("ATC_TRAJ_GS_ACCEL").unwrap_or(base.gs_accel),
            vs_accel: env_f64("ATC_TRAJ_VS_ACCEL").unwrap_or(base.vs_accel),
            min_dt: env_f64("ATC_TRAJ_MIN_DT").unwrap_or(base.min_dt),
            ..base
        }
    }
}

/// Limits for virtual-point densification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Bisection stops below this sub-interval length (s)
    pub min_dt: f64,
    /// Maximum recursion depth of zone bisection
    pub max_depth: u32,
    /// Lower bound on distance between inserted virtual points (m)
    pub min_leg_size: f64,
    /// Upper bound on the number of vertices a densified plan may reach
    pub max_points: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_dt: 1.0,
            max_depth: 8,
            min_leg_size: 500.0,
            max_points: 2000,
        }
    }
}

impl SamplerConfig {
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            min_dt: env_f64("ATC_TRAJ_SAMPLER_MIN_DT").unwrap_or(base.min_dt),
            min_leg_size: env_f64("ATC_TRAJ_SAMPLER_MIN_LEG_M").unwrap_or(base.min_leg_size),
            max_points: env::var("ATC_TRAJ_SAMPLER_MAX_POINTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.max_points),
            ..base
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_is_looser() {
        let strict = Tolerances::default();
        let weak = Tolerances::weak();
        assert!(weak.max_gs_dist > strict.max_gs_dist);
        assert!(weak.max_vs_dist > strict.max_vs_dist);
        assert_eq!(weak.max_trk_dist, strict.max_trk_dist);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let tol = Tolerances::from_json(r#"{"max_gs_dist": 0.5}"#).unwrap();
        assert_eq!(tol.max_gs_dist, 0.5);
        assert_eq!(tol.max_vs_dist, Tolerances::default().max_vs_dist);
    }
}
