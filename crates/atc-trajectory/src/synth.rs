//! Ground-speed zone synthesis and speed-change feasibility.

use crate::error::PlanError;
use crate::geometry::{Coordinate, Waypoint};
use crate::kinematics;
use crate::plan::Plan;
use crate::revert;
use crate::sampler;
use crate::tcp::{Dimension, TcpMeta};

/// Rebuilds vertical acceleration zones on a plan whose altitude profile is linear.
pub trait VerticalRegenerator {
    fn regenerate<P: Coordinate>(&self, plan: &Plan<P>, vs_accel: f64) -> Plan<P>;
}

/// Outcome of [`feasibility_check`]. `correction` is the time (s) to add to
/// vertex `i + 1` so the speed change fits; zero when feasible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GsFeasibility {
    pub feasible: bool,
    pub correction: f64,
}

impl GsFeasibility {
    const OK: GsFeasibility = GsFeasibility { feasible: true, correction: 0.0 };
}

/// Vertical accel of the first vertical zone touching `from`, reverting every
/// vertical zone from there on so horizontal edits see a linear altitude profile.
fn strip_vertical<P: Coordinate>(plan: &mut Plan<P>, from: usize) -> Result<Option<f64>, PlanError> {
    let from = plan.owning_begin(Dimension::Vs, from).unwrap_or(from);
    let vs_accel = (from..plan.len())
        .find(|&j| plan.meta(j).is_bvs())
        .map(|j| plan.meta(j).vs_accel.abs());
    if vs_accel.is_some() {
        revert::revert_vs_zones(plan, from)?;
    }
    Ok(vs_accel)
}

/// Copy of `plan` with a ground-speed change of `delta_gs` starting at `at_time`.
///
/// A BGS is placed at `at_time` (fusing with an EGS already there) and the EGS
/// where the acceleration completes. Every vertex from the BGS on is re-timed:
/// the zone at `gs_accel`, then constant `gs0 + delta_gs`, with any later gs
/// zone applying its own acceleration. Vertical zones in the affected span are
/// reverted and rebuilt by `regen`.
pub fn add_gs_zone<P: Coordinate, R: VerticalRegenerator>(
    plan: &Plan<P>,
    at_time: f64,
    delta_gs: f64,
    gs_accel: f64,
    regen: &R,
) -> Result<Plan<P>, PlanError> {
    let (Some(start), Some(end)) = (plan.first_time(), plan.last_time()) else {
        return Err(PlanError::TooFewPoints { needed: 2, len: plan.len() });
    };
    if !(start..end).contains(&at_time) {
        return Err(PlanError::TimeOutOfRange { time: at_time, start, end });
    }
    if plan.in_gs_change(at_time) {
        return Err(PlanError::ZoneOverlap { dimension: Dimension::Gs, time: at_time });
    }
    if delta_gs == 0.0 {
        return Ok(plan.clone());
    }
    if !(gs_accel.abs() > 0.0) {
        return Err(PlanError::Infeasible("ground-speed acceleration is zero".into()));
    }
    let a = gs_accel.abs().copysign(delta_gs);
    let gs0 = plan
        .velocity(at_time)
        .map(|v| v.gs)
        .ok_or(PlanError::TimeOutOfRange { time: at_time, start, end })?;
    let gs1 = gs0 + delta_gs;
    if gs1 < 0.0 {
        return Err(PlanError::Infeasible(format!(
            "target ground speed {gs1:.3} m/s is negative"
        )));
    }
    let accel_time = delta_gs / a;
    let dist = kinematics::distance_after(gs0, a, accel_time);

    let mut out = plan.clone();
    let seg = out
        .segment(at_time)
        .ok_or(PlanError::TimeOutOfRange { time: at_time, start, end })?;
    let vs_accel = strip_vertical(&mut out, seg)?;

    let seg = out
        .segment(at_time)
        .ok_or(PlanError::TimeOutOfRange { time: at_time, start, end })?;
    let so = out
        .position(at_time)
        .ok_or(PlanError::TimeOutOfRange { time: at_time, start, end })?;
    let (egs_pos, egs_seg) = sampler::advance_along_path(&out, at_time, dist)
        .ok_or(PlanError::ZoneExceedsPlan { distance: dist })?;
    let travelled = sampler::distance_into_segment(&out, seg, &so) + dist;
    let into_egs_seg = travelled - out.path_distance_between(seg, egs_seg);
    let landing = sampler::landing_vertex(&out, egs_seg, into_egs_seg);
    let overlapped = (seg + 1..=egs_seg).find(|&j| landing != Some(j) && out.meta(j).is_gs_tcp());
    if let Some(j) = overlapped {
        return Err(PlanError::ZoneOverlap { dimension: Dimension::Gs, time: out.t(j) });
    }
    let t_egs_old = match landing {
        Some(j) => out.t(j),
        None => {
            out.t(egs_seg)
                + out
                    .time_from_distance(egs_seg, into_egs_seg)
                    .ok_or_else(|| PlanError::Infeasible("segment cannot be flown".into()))?
        }
    };

    let bgs = match out.index_of(at_time) {
        Ok(i) => {
            out.tcp_mut(i).set_bgs(a);
            i
        }
        Err(_) => {
            let mut m = TcpMeta::new();
            m.set_bgs(a);
            out.add(Waypoint::new(so, at_time), m)?
        }
    };
    let mut end_meta = TcpMeta::new();
    end_meta.set_egs();
    let existing = landing
        .and_then(|_| out.index_of(t_egs_old).ok())
        .filter(|&j| j > bgs);
    let egs = match existing {
        Some(j) => {
            let merged = out.meta(j).merge(&end_meta).map_err(|e| e.at(j))?;
            *out.tcp_mut(j) = merged;
            j
        }
        None => out.add(Waypoint::new(egs_pos, t_egs_old), end_meta)?,
    };

    let mut t = out.t(bgs);
    let mut gs = gs0;
    let mut times = Vec::with_capacity(out.len() - bgs);
    for k in bgs..out.len() - 1 {
        if k == egs {
            gs = gs1;
        }
        let acc = out.gs_accel_at(k);
        let dt = kinematics::time_from_distance(gs, acc, out.path_distance(k)).ok_or_else(|| {
            PlanError::Infeasible(format!("segment {k} cannot be flown from {gs:.3} m/s"))
        })?;
        gs = (gs + acc * dt).max(0.0);
        t += dt;
        times.push(t);
    }
    for (k, t) in (bgs + 1..).zip(times) {
        out.set_time(k, t);
    }
    tracing::debug!(
        plan = out.name(),
        bgs = bgs,
        egs = egs,
        accel = a,
        "added gs zone"
    );

    Ok(match vs_accel {
        Some(vs_accel) => regen.regenerate(&out, vs_accel),
        None => out,
    })
}

/// Copy of `plan` flown at `new_gs` from vertex `from_ix` to the end.
pub fn rescale_gs<P: Coordinate, R: VerticalRegenerator>(
    plan: &Plan<P>,
    new_gs: f64,
    from_ix: usize,
    regen: &R,
) -> Result<Plan<P>, PlanError> {
    if from_ix >= plan.len() {
        return Err(PlanError::InvalidIndex { index: from_ix, len: plan.len() });
    }
    if !(new_gs > 0.0) {
        return Err(PlanError::Infeasible(format!(
            "ground speed {new_gs} m/s must be positive"
        )));
    }
    let t_from = plan.t(from_ix);
    let mut out = plan.clone();
    let vs_accel = strip_vertical(&mut out, from_ix)?;

    let from = out.segment(t_from).unwrap_or(0);
    let mut i = out.owning_begin(Dimension::Gs, from).unwrap_or(from);
    while i < out.len() {
        if out.meta(i).is_bgs() {
            revert::revert_gs_zone(&mut out, i)?;
        }
        i += 1;
    }
    let from = out.segment(t_from).unwrap_or(0);
    for k in from..out.len().saturating_sub(1) {
        out.mk_gs_out(k, new_gs);
    }
    tracing::debug!(plan = out.name(), from = from, gs = new_gs, "rescaled ground speed");

    Ok(match vs_accel {
        Some(vs_accel) => regen.regenerate(&out, vs_accel),
        None => out,
    })
}

/// Whether the ground-speed change at vertex `ix` fits in segment `ix` at
/// `max_accel`, keeping `margin` seconds of constant speed at both ends.
pub fn feasibility_check<P: Coordinate>(
    plan: &Plan<P>,
    ix: usize,
    max_accel: f64,
    margin: f64,
) -> GsFeasibility {
    if ix == 0 || ix + 1 >= plan.len() || !(max_accel > 0.0) {
        return GsFeasibility::OK;
    }
    let gs_in = plan.gs_in(ix);
    let gs_out = plan.gs_out(ix);
    let delta = gs_out - gs_in;
    if delta.abs() < 1e-9 {
        return GsFeasibility::OK;
    }
    let a = max_accel.copysign(delta);
    let dt_needed = delta / a + 2.0 * margin;
    let dist_needed = kinematics::distance_after(gs_in, a, dt_needed);
    let d = plan.path_distance(ix);
    if dist_needed <= d {
        return GsFeasibility::OK;
    }

    let b = 2.0 * (gs_in + a * margin);
    let c = 4.0 * gs_in * margin - 2.0 * d;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return GsFeasibility { feasible: false, correction: 0.0 };
    }
    let dtp = (-b + disc.sqrt()) / (2.0 * a);
    let available = plan.t(ix + 1) - plan.t(ix) - 2.0 * margin;
    GsFeasibility { feasible: false, correction: dtp - available }
}

/// Apply the [`feasibility_check`] correction at `ix` by shifting vertex
/// `ix + 1` and everything after it. With `skip_tcp` a TCP at `ix + 1` is not moved.
pub fn fix_gs_accel_at<P: Coordinate>(
    plan: &mut Plan<P>,
    ix: usize,
    max_accel: f64,
    skip_tcp: bool,
    margin: f64,
) -> GsFeasibility {
    let check = feasibility_check(plan, ix, max_accel, margin);
    if check.feasible {
        return check;
    }
    if 2.0 * margin >= plan.t(ix + 1) - plan.t(ix) {
        let gs = plan.gs_in(ix);
        plan.mk_gs_out(ix, gs);
        return check;
    }
    if skip_tcp && plan.meta(ix + 1).is_tcp() {
        plan.diagnostics_mut().warn(
            format!("fix_gs_accel_at: TCP at {} left in place", ix + 1),
            Some(ix + 1),
        );
        return check;
    }
    tracing::debug!(plan = plan.name(), index = ix, correction = check.correction, "fixing gs change");
    plan.time_shift(ix + 1, check.correction);
    check
}
