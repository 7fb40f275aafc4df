//! Tolerance checks for kinematic plans.
//!
//! Failures here are findings, not errors: the checker never modifies the
//! plan and reports every miss with its magnitude.

use crate::config::Tolerances;
use crate::error::PlanError;
use crate::geometry::Coordinate;
use crate::kinematics::{dir_of, distance_after, turn_by_dist_2d, turn_delta};
use crate::plan::Plan;
use crate::tcp::Dimension;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Zone tags are not properly bracketed or a zone cannot be checked.
    Structure,
    TurnCenter,
    /// A vertex inside a turn is off the circle.
    TurnRadius,
    /// The recomputed end of turn misses the EOT vertex.
    TurnEnd,
    GsAccel,
    GsDistance,
    VsAccel,
    VsAltitude,
    TrkContinuity,
    GsContinuity,
    VsContinuity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub index: usize,
    pub kind: CheckKind,
    /// Magnitude of the miss in the check's unit (m, m/s, m/s^2 or rad).
    pub delta: f64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub findings: Vec<Finding>,
}

impl ConsistencyReport {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn of_kind(&self, kind: CheckKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    /// Largest delta among findings of `kind`.
    pub fn max_delta(&self, kind: CheckKind) -> Option<f64> {
        self.of_kind(kind).map(|f| f.delta).reduce(f64::max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsistencyChecker {
    pub tolerances: Tolerances,
    /// Suppress per-finding log output.
    pub silent: bool,
    /// Leave velocity continuity out of [`Self::check_plan`].
    pub skip_continuity: bool,
}

impl ConsistencyChecker {
    pub fn new(tolerances: Tolerances) -> Self {
        Self {
            tolerances,
            silent: false,
            skip_continuity: false,
        }
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn without_continuity(mut self) -> Self {
        self.skip_continuity = true;
        self
    }

    /// Check the turn opened at `bot`: every vertex of the zone lies on the
    /// circle and flying the arc length from the BOT lands on the EOT.
    pub fn check_turn<P: Coordinate>(
        &self,
        plan: &Plan<P>,
        bot: usize,
    ) -> Result<Vec<Finding>, PlanError> {
        let eot = zone_end(plan, Dimension::Trk, bot)?;
        let meta = plan.meta(bot);
        let Some(center) = meta.turn_center else {
            return Ok(vec![Finding {
                index: bot,
                kind: CheckKind::TurnCenter,
                delta: f64::INFINITY,
                message: "turn has no centre".into(),
            }]);
        };
        let radius = if meta.signed_radius != 0.0 {
            meta.signed_radius.abs()
        } else {
            center.distance_h(&plan.pos(bot))
        };
        let tol = self.tolerances.max_trk_dist;

        let mut findings = Vec::new();
        for i in bot..=eot {
            let delta = (plan.pos(i).distance_h(&center) - radius).abs();
            if delta > tol {
                findings.push(Finding {
                    index: i,
                    kind: CheckKind::TurnRadius,
                    delta,
                    message: format!("vertex is {delta:.3} m off the turn circle of radius {radius:.1} m"),
                });
            }
        }

        let arc = plan.path_distance_between(bot, eot);
        let (calc, _) = turn_by_dist_2d(&plan.pos(bot), &center, dir_of(meta.signed_radius), arc);
        let delta = calc.distance_h(&plan.pos(eot));
        if delta > tol {
            findings.push(Finding {
                index: eot,
                kind: CheckKind::TurnEnd,
                delta,
                message: format!("recomputed end of turn misses EOT by {delta:.3} m"),
            });
        }
        Ok(findings)
    }

    /// Check the ground-speed zone opened at `bgs`: stored acceleration
    /// matches the speed change and the kinematic distance matches the path.
    pub fn check_gs<P: Coordinate>(
        &self,
        plan: &Plan<P>,
        bgs: usize,
    ) -> Result<Vec<Finding>, PlanError> {
        let egs = zone_end(plan, Dimension::Gs, bgs)?;
        let dt = plan.t(egs) - plan.t(bgs);
        let a = plan.meta(bgs).gs_accel;
        let gs1 = plan.gs_out(bgs);
        let gs2 = plan.gs_out(egs);
        let mut findings = Vec::new();

        let implied = (gs2 - gs1) / dt;
        let delta = (implied - a).abs();
        if delta > self.tolerances.accel_epsilon {
            findings.push(Finding {
                index: bgs,
                kind: CheckKind::GsAccel,
                delta,
                message: format!("stored gs accel {a:.4} m/s^2 but speeds imply {implied:.4}"),
            });
        }

        let gs_end = gs1 + a * dt;
        if gs_end < -self.tolerances.near_zero_gs {
            findings.push(Finding {
                index: egs,
                kind: CheckKind::GsAccel,
                delta: -gs_end,
                message: format!("ground speed reaches {gs_end:.3} m/s inside the zone"),
            });
        }

        let ds = distance_after(gs1, a, dt);
        let path = plan.path_distance_between(bgs, egs);
        let delta = (ds - path).abs();
        if delta > self.tolerances.max_gs_dist {
            findings.push(Finding {
                index: egs,
                kind: CheckKind::GsDistance,
                delta,
                message: format!("kinematic distance {ds:.3} m vs path distance {path:.3} m"),
            });
        }
        Ok(findings)
    }

    /// Check the vertical zone opened at `bvs` the same way, using altitude.
    pub fn check_vs<P: Coordinate>(
        &self,
        plan: &Plan<P>,
        bvs: usize,
    ) -> Result<Vec<Finding>, PlanError> {
        let evs = zone_end(plan, Dimension::Vs, bvs)?;
        let dt = plan.t(evs) - plan.t(bvs);
        let a = plan.meta(bvs).vs_accel;
        let vs1 = plan.vs_out(bvs);
        let vs2 = plan.vs_out(evs);
        let mut findings = Vec::new();

        let implied = (vs2 - vs1) / dt;
        let delta = (implied - a).abs();
        if delta > self.tolerances.accel_epsilon {
            findings.push(Finding {
                index: bvs,
                kind: CheckKind::VsAccel,
                delta,
                message: format!("stored vs accel {a:.4} m/s^2 but speeds imply {implied:.4}"),
            });
        }

        let dz = distance_after(vs1, a, dt);
        let actual = plan.pos(evs).alt() - plan.pos(bvs).alt();
        let delta = (dz - actual).abs();
        if delta > self.tolerances.max_vs_dist {
            findings.push(Finding {
                index: evs,
                kind: CheckKind::VsAltitude,
                delta,
                message: format!("kinematic climb {dz:.3} m vs altitude change {actual:.3} m"),
            });
        }
        Ok(findings)
    }

    pub fn check_trk_continuity<P: Coordinate>(&self, plan: &Plan<P>, i: usize) -> Option<Finding> {
        if !interior(plan, i) {
            return None;
        }
        let near_zero = self.tolerances.near_zero_gs;
        if plan.gs_in(i) < near_zero || plan.gs_out(i) < near_zero {
            return None;
        }
        let delta = turn_delta(plan.trk_in(i), plan.trk_out(i)).abs();
        (delta > self.tolerances.trk_continuity).then(|| Finding {
            index: i,
            kind: CheckKind::TrkContinuity,
            delta,
            message: format!("track jumps {:.2} deg", delta.to_degrees()),
        })
    }

    pub fn check_gs_continuity<P: Coordinate>(&self, plan: &Plan<P>, i: usize) -> Option<Finding> {
        if !interior(plan, i) {
            return None;
        }
        let delta = (plan.gs_in(i) - plan.gs_out(i)).abs();
        (delta > self.tolerances.gs_continuity).then(|| Finding {
            index: i,
            kind: CheckKind::GsContinuity,
            delta,
            message: format!("ground speed jumps {delta:.3} m/s"),
        })
    }

    pub fn check_vs_continuity<P: Coordinate>(&self, plan: &Plan<P>, i: usize) -> Option<Finding> {
        if !interior(plan, i) {
            return None;
        }
        let delta = (plan.vs_in(i) - plan.vs_out(i)).abs();
        (delta > self.tolerances.vs_continuity).then(|| Finding {
            index: i,
            kind: CheckKind::VsContinuity,
            delta,
            message: format!("vertical speed jumps {delta:.3} m/s"),
        })
    }

    /// Run every zone check over the plan, and the continuity checks at each
    /// TCP. Non-TCP vertices are linear corners and may bend the path.
    pub fn check_plan<P: Coordinate>(&self, plan: &Plan<P>) -> ConsistencyReport {
        let mut findings = Vec::new();
        if let Err(err) = plan.well_formed() {
            findings.push(Finding {
                index: 0,
                kind: CheckKind::Structure,
                delta: 0.0,
                message: err.to_string(),
            });
        }

        for i in 0..plan.len() {
            let meta = plan.meta(i);
            let zone_checks = [
                (meta.is_bot(), Dimension::Trk),
                (meta.is_bgs(), Dimension::Gs),
                (meta.is_bvs(), Dimension::Vs),
            ];
            for (_, dim) in zone_checks.into_iter().filter(|(open, _)| *open) {
                let result = match dim {
                    Dimension::Trk => self.check_turn(plan, i),
                    Dimension::Gs => self.check_gs(plan, i),
                    Dimension::Vs => self.check_vs(plan, i),
                };
                match result {
                    Ok(found) => findings.extend(found),
                    Err(err) => findings.push(Finding {
                        index: i,
                        kind: CheckKind::Structure,
                        delta: 0.0,
                        message: err.to_string(),
                    }),
                }
            }
        }

        let tcps = (1..plan.len().saturating_sub(1)).filter(|&i| plan.meta(i).is_tcp());
        for i in tcps.filter(|_| !self.skip_continuity) {
            findings.extend(self.check_trk_continuity(plan, i));
            findings.extend(self.check_gs_continuity(plan, i));
            findings.extend(self.check_vs_continuity(plan, i));
        }

        if self.silent {
            tracing::debug!(plan = plan.name(), findings = findings.len(), "consistency check done");
        } else {
            for f in &findings {
                tracing::warn!(
                    plan = plan.name(),
                    index = f.index,
                    kind = ?f.kind,
                    delta = f.delta,
                    "{}",
                    f.message
                );
            }
        }
        ConsistencyReport { findings }
    }
}

fn zone_end<P: Coordinate>(plan: &Plan<P>, dim: Dimension, begin: usize) -> Result<usize, PlanError> {
    if !plan.tcp(begin).is_some_and(|m| m.is_begin(dim)) {
        return Err(PlanError::NotZoneBegin { dimension: dim, index: begin });
    }
    plan.next_end(dim, begin)
        .ok_or(PlanError::MissingZoneEnd { dimension: dim, index: begin })
}

fn interior<P: Coordinate>(plan: &Plan<P>, i: usize) -> bool {
    i > 0 && i + 1 < plan.len()
}
