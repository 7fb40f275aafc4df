//! Virtual-point densification, along-path advance, time shifting and
//! horizon truncation.

use crate::config::{SamplerConfig, Tolerances};
use crate::error::PlanError;
use crate::geometry::{Coordinate, Waypoint};
use crate::kinematics::{arc_angle, turn_by_dist_2d};
use crate::plan::Plan;
use crate::tcp::{Dimension, TcpMeta};

const PATH_EPSILON_M: f64 = 1e-6;

/// Insert a Virtual vertex on the flyable curve at `time`.
///
/// Returns `None` if `time` is outside the plan or a vertex already sits there.
pub fn insert_virtual<P: Coordinate>(plan: &mut Plan<P>, time: f64) -> Option<usize> {
    if plan.index_of(time).is_ok() {
        return None;
    }
    let position = plan.position(time)?;
    plan.add(Waypoint::new(position, time), TcpMeta::virtual_point())
        .ok()
}

/// Copy of `plan` without the Virtual vertices strictly inside `(start, end)`.
pub fn remove_virtuals<P: Coordinate>(plan: &Plan<P>, start: f64, end: f64) -> Plan<P> {
    let mut out = plan.clone();
    let doomed: Vec<usize> = (0..out.len())
        .filter(|&i| {
            let t = out.t(i);
            out.meta(i).is_virtual() && start < t && t < end
        })
        .collect();
    for &i in doomed.iter().rev() {
        out.remove(i);
    }
    if !doomed.is_empty() {
        tracing::debug!(plan = plan.name(), removed = doomed.len(), "removed virtual points");
    }
    out
}

/// Copy of `plan` with Virtual vertices added until chord interpolation
/// between consecutive vertices stays within the accuracy bounds.
///
/// Straight legs are only split when the frame makes component-wise
/// interpolation deviate from the true path (great-circle legs); acceleration
/// zones are split in any frame.
pub fn densify<P: Coordinate>(
    plan: &Plan<P>,
    horiz_accuracy: f64,
    vert_accuracy: f64,
    start: f64,
    end: f64,
    cfg: &SamplerConfig,
) -> Plan<P> {
    let mut out = plan.clone();
    let legs: Vec<(f64, f64, bool)> = (0..plan.len().saturating_sub(1))
        .filter(|&i| plan.t(i + 1) > start && plan.t(i) < end)
        .map(|i| {
            let in_zone = plan.in_trk_accel(i) || plan.in_gs_accel(i) || plan.in_vs_accel(i);
            (plan.t(i), plan.t(i + 1), !in_zone)
        })
        .collect();
    let accuracy = (horiz_accuracy, vert_accuracy);
    for (t1, t2, straight) in legs {
        bisect(&mut out, t1, t2, 0, accuracy, straight, cfg);
    }
    let added = out.len() - plan.len();
    if added > 0 {
        tracing::debug!(plan = plan.name(), added, "densified plan");
    }
    out
}

fn bisect<P: Coordinate>(
    plan: &mut Plan<P>,
    t1: f64,
    t2: f64,
    depth: u32,
    (h_acc, v_acc): (f64, f64),
    straight: bool,
    cfg: &SamplerConfig,
) {
    if t2 - t1 <= cfg.min_dt || depth >= cfg.max_depth || plan.len() >= cfg.max_points {
        return;
    }
    let Some(seg) = plan.segment(t1) else {
        return;
    };
    if straight && plan.path_distance(seg) < 2.0 * cfg.min_leg_size {
        return;
    }
    let tm = 0.5 * (t1 + t2);
    let Some(curve) = plan.position(tm) else {
        return;
    };
    let chord = chord_position(plan, seg, tm);
    if chord.distance_h(&curve) <= h_acc && chord.distance_v(&curve) <= v_acc {
        return;
    }
    if insert_virtual(plan, tm).is_none() {
        return;
    }
    bisect(plan, t1, tm, depth + 1, (h_acc, v_acc), straight, cfg);
    bisect(plan, tm, t2, depth + 1, (h_acc, v_acc), straight, cfg);
}

/// Component-wise interpolation between the ends of segment `seg`.
fn chord_position<P: Coordinate>(plan: &Plan<P>, seg: usize, t: f64) -> P {
    let (a, b) = (plan.pos(seg).components(), plan.pos(seg + 1).components());
    let f = (t - plan.t(seg)) / (plan.t(seg + 1) - plan.t(seg));
    P::from_components([0, 1, 2].map(|k| a[k] + (b[k] - a[k]) * f))
}

/// Along-path distance from the start of segment `seg` to `p`.
pub(crate) fn distance_into_segment<P: Coordinate>(plan: &Plan<P>, seg: usize, p: &P) -> f64 {
    match plan.turn_geometry(seg) {
        Some((center, radius, dir)) => arc_angle(&plan.pos(seg), &center, p, dir) * radius,
        None => plan.pos(seg).distance_h(p),
    }
}

/// Vertex a point `into` metres along segment `seg` sits on, if any.
pub(crate) fn landing_vertex<P: Coordinate>(
    plan: &Plan<P>,
    seg: usize,
    into: f64,
) -> Option<usize> {
    if into.abs() <= PATH_EPSILON_M {
        Some(seg)
    } else if seg + 1 < plan.len() && (plan.path_distance(seg) - into).abs() <= PATH_EPSILON_M {
        Some(seg + 1)
    } else {
        None
    }
}

/// Move `dist` metres along segment `seg` from `so`; altitude follows the
/// segment's path-distance gradient.
fn advance_in_segment<P: Coordinate>(plan: &Plan<P>, seg: usize, so: &P, dist: f64) -> P {
    let moved = match plan.turn_geometry(seg) {
        Some((center, _, dir)) => turn_by_dist_2d(so, &center, dir, dist).0,
        None => {
            let next = plan.pos(seg + 1);
            if so.distance_h(&next) <= PATH_EPSILON_M {
                next
            } else {
                so.linear_dist_2d(so.initial_course(&next), dist)
            }
        }
    };
    let seg_dist = plan.path_distance(seg);
    let climb = plan.pos(seg + 1).alt() - plan.pos(seg).alt();
    let alt = if seg_dist > PATH_EPSILON_M {
        so.alt() + dist / seg_dist * climb
    } else {
        so.alt()
    };
    moved.with_alt(alt)
}

/// Position `distance` metres further along the path than the aircraft at
/// `from_time`, with the segment it falls in. `None` past the end of the plan.
pub fn advance_along_path<P: Coordinate>(
    plan: &Plan<P>,
    from_time: f64,
    distance: f64,
) -> Option<(P, usize)> {
    if !(distance >= 0.0) {
        return None;
    }
    let seg = plan.segment(from_time)?;
    let so = plan.position(from_time)?;
    if seg + 1 >= plan.len() {
        return (distance <= PATH_EPSILON_M).then_some((so, seg));
    }
    let left = plan.path_distance(seg) - distance_into_segment(plan, seg, &so);
    if distance <= left {
        return Some((advance_in_segment(plan, seg, &so, distance), seg));
    }
    let mut so_far = left;
    for j in seg + 1..plan.len() - 1 {
        let next = so_far + plan.path_distance(j);
        if next >= distance {
            let start = plan.pos(j);
            return Some((advance_in_segment(plan, j, &start, distance - so_far), j));
        }
        so_far = next;
    }
    let last = plan.len() - 1;
    ((distance - so_far).abs() <= PATH_EPSILON_M).then(|| (plan.pos(last), last))
}

/// Copy of `plan` with every vertex at or after `from` shifted by `dt`.
/// `None` for a non-finite `dt`.
pub fn time_shift<P: Coordinate>(plan: &Plan<P>, from: usize, dt: f64) -> Option<Plan<P>> {
    let mut out = plan.clone();
    out.time_shift(from, dt).then_some(out)
}

/// Cut `plan` to the window `[current_time, horizon]`.
///
/// The first vertex sits at `current_time` and reopens any zone in progress
/// there; the last sits at `horizon` and closes any zone still open. If the
/// plan ends before `horizon` it is continued linearly. When `extend` is past
/// the cut a linear extension vertex is appended.
pub fn truncate<P: Coordinate>(
    plan: &Plan<P>,
    current_time: f64,
    horizon: f64,
    extend: f64,
) -> Result<Plan<P>, PlanError> {
    if plan.len() < 2 {
        return Err(PlanError::TooFewPoints { needed: 2, len: plan.len() });
    }
    for t in [current_time, horizon] {
        if !t.is_finite() {
            return Err(PlanError::InvalidTime(t));
        }
    }
    let (first, last) = (plan.t(0), plan.t(plan.len() - 1));
    let t1 = current_time.clamp(first, last);
    let out_of_range = PlanError::TimeOutOfRange { time: horizon, start: t1, end: last };
    if horizon <= t1 {
        return Err(out_of_range);
    }

    let mut out = Plan::new(plan.name());
    let (p1, mut meta1) = match plan.index_of(t1) {
        Ok(i) => (plan.pos(i), plan.meta(i).clone()),
        Err(_) => (plan.position(t1).ok_or(out_of_range.clone())?, TcpMeta::new()),
    };
    for dim in Dimension::ALL {
        meta1.clear_end(dim);
    }
    if let Some(seg) = plan.segment(t1) {
        if let Some(b) = plan.owning_begin(Dimension::Trk, seg) {
            let m = plan.meta(b);
            if let (false, Some(center)) = (meta1.is_bot(), m.turn_center) {
                meta1.set_bot(m.signed_radius, center);
            }
        }
        if let Some(b) = plan.owning_begin(Dimension::Gs, seg) {
            if !meta1.is_bgs() {
                meta1.set_bgs(plan.meta(b).gs_accel);
            }
        }
        if let Some(b) = plan.owning_begin(Dimension::Vs, seg) {
            if !meta1.is_bvs() {
                meta1.set_bvs(plan.meta(b).vs_accel);
            }
        }
    }
    out.add(Waypoint::new(p1, t1), meta1)?;

    for v in plan.vertices() {
        if t1 < v.point.time && v.point.time < horizon {
            out.add(v.point, v.tcp.clone())?;
        }
    }

    if horizon > last {
        let v = plan.final_velocity(plan.len() - 2);
        let end = Waypoint::new(plan.pos(plan.len() - 1), last).linear(v, horizon - last);
        out.add(end, TcpMeta::new().with_info("linear-continuation"))?;
    } else {
        let exact = plan.index_of(horizon);
        let (p2, mut meta2) = match exact {
            Ok(i) => (plan.pos(i), plan.meta(i).clone()),
            Err(_) => (plan.position(horizon).ok_or(out_of_range)?, TcpMeta::new()),
        };
        let arriving = match exact {
            Ok(i) | Err(i) => i.checked_sub(1),
        };
        if let Some(s) = arriving {
            if plan.in_trk_accel(s) {
                meta2.set_eot();
            }
            if plan.in_gs_accel(s) {
                meta2.set_egs();
            }
            if plan.in_vs_accel(s) {
                meta2.set_evs();
            }
        }
        out.add(Waypoint::new(p2, horizon), meta2)?;
    }

    let n = out.len();
    if n >= 2 && extend > out.t(n - 1) {
        let v = out.final_velocity(n - 2);
        let tail = out.point(n - 1).map(|wp| wp.linear(v, extend - wp.time));
        if let Some(tail) = tail {
            out.add(tail, TcpMeta::new().with_info("extension"))?;
        }
    }

    out.repair_ends();
    out.merge_close_points(Tolerances::default().min_dt);
    tracing::debug!(
        plan = plan.name(),
        from = t1,
        to = horizon,
        points = out.len(),
        "truncated plan"
    );
    Ok(out)
}
