//! Zone reversion: collapse acceleration zones back to linear vertices.
//!
//! Vertical zones are reverted first, then turns, then ground-speed zones.
//! A turn collapsing can move the anchor of a gs zone that follows it, so gs
//! zones are reverted last against the settled horizontal path.

use crate::config::GenerationLimits;
use crate::error::PlanError;
use crate::geometry::{to_2pi, Coordinate, Waypoint};
use crate::kinematics::{arc_angle, dir_of};
use crate::plan::{Plan, Redundancy};
use crate::sampler;
use crate::tcp::{Dimension, TcpMeta};

const NEAR_ZERO_GS: f64 = 1e-4;

/// Revert the vertical zone opened at `bvs`; returns the index of the restored vertex.
///
/// The vertex comes back at its recorded source time and altitude when that
/// lies inside the zone, otherwise at the zone midpoint on the inbound
/// vertical-speed line. It is marked AltitudePreserve. Near-coincident
/// vertices are left for the caller to merge.
pub fn revert_vs_zone<P: Coordinate>(plan: &mut Plan<P>, bvs: usize) -> Result<usize, PlanError> {
    let evs = zone_end(plan, Dimension::Vs, bvs)?;
    let meta = plan.meta(bvs).clone();
    let (t_b, t_e) = (plan.t(bvs), plan.t(evs));
    let (z_b, z_e) = (plan.pos(bvs).alt(), plan.pos(evs).alt());

    let (t_v, z_v) = match meta.source.filter(|s| t_b < s.time && s.time < t_e) {
        Some(src) => (src.time, src.position.alt()),
        None => {
            let t = 0.5 * (t_b + t_e);
            (t, z_b + plan.vs_in(bvs) * (t - t_b))
        }
    };
    let p_v = plan
        .position(t_v)
        .ok_or(PlanError::TimeOutOfRange { time: t_v, start: t_b, end: t_e })?
        .with_alt(z_v);

    for k in bvs + 1..evs {
        let t = plan.t(k);
        let z = if t <= t_v {
            z_b + (z_v - z_b) * (t - t_b) / (t_v - t_b)
        } else {
            z_v + (z_e - z_v) * (t - t_v) / (t_e - t_v)
        };
        let p = plan.pos(k).with_alt(z);
        plan.set_position(k, p);
    }

    plan.tcp_mut(bvs).clear_bvs();
    plan.tcp_mut(evs).clear_evs();
    plan.remove_if_redundant(evs, Redundancy::TRK_GS);
    plan.remove_if_redundant(bvs, Redundancy::TRK_GS);

    let mut vertex = TcpMeta::new();
    vertex.set_alt_preserve();
    vertex.linear_index = meta.linear_index;
    plan.add(Waypoint::new(p_v, t_v), vertex)?;
    tracing::debug!(plan = plan.name(), time = t_v, "reverted vertical zone");
    plan.nearest_index(t_v)
        .ok_or(PlanError::TooFewPoints { needed: 1, len: 0 })
}

/// Revert every vertical zone that opens at or after `from` (or is open
/// there), last zone first. Returns how many zones were reverted.
pub fn revert_vs_zones<P: Coordinate>(plan: &mut Plan<P>, from: usize) -> Result<usize, PlanError> {
    let from = plan.owning_begin(Dimension::Vs, from).unwrap_or(from);
    let mut count = 0;
    let mut i = plan.len();
    while i > from {
        i -= 1;
        if i < plan.len() && plan.meta(i).is_bvs() {
            revert_vs_zone(plan, i)?;
            count += 1;
        }
    }
    Ok(count)
}

/// Revert the turn opened at `bot`; returns the index of the restored vertex.
///
/// The vertex is the BOT's source position when recorded, otherwise the
/// intersection of the inbound and outbound tangents. Interior vertices are
/// moved onto the two legs at their arc distance scaled by legs/arc, except
/// the corner the turn was generated from, which the vertex replaces. The
/// vertex is reached at the inbound ground speed and the outbound segment
/// keeps the ground speed that left the EOT.
pub fn revert_turn_zone<P: Coordinate>(plan: &mut Plan<P>, bot: usize) -> Result<usize, PlanError> {
    let eot = zone_end(plan, Dimension::Trk, bot)?;
    let bot_meta = plan.meta(bot).clone();
    let eot_meta = plan.meta(eot).clone();
    let (t_bot, t_eot) = (plan.t(bot), plan.t(eot));
    let (p_bot, p_eot) = (plan.pos(bot), plan.pos(eot));
    let gs_in = plan.gs_in(bot);
    let gs_next = plan.gs_out(eot);
    let arc = plan.path_distance_between(bot, eot);

    let vertex_pos = match bot_meta.source {
        Some(src) => src.position,
        None => tangent_vertex(plan, bot, eot),
    };

    let mut begin_side = bot_meta.clone();
    begin_side.clear_bot();
    let mut end_side = eot_meta;
    end_side.clear_eot();
    let mut vertex_meta = begin_side.merge(&end_side).map_err(|e| e.at(bot))?;
    vertex_meta.source = None;
    vertex_meta.set_original();

    let leg1 = p_bot.distance_h(&vertex_pos);
    let leg2 = vertex_pos.distance_h(&p_eot);
    let ratio = if arc > 1e-9 { (leg1 + leg2) / arc } else { 1.0 };
    let speed = if gs_in > NEAR_ZERO_GS {
        gs_in
    } else if t_eot > t_bot {
        ((leg1 + leg2) / (t_eot - t_bot)).max(NEAR_ZERO_GS)
    } else {
        NEAR_ZERO_GS
    };

    let is_corner = |m: &TcpMeta<P>| {
        !m.is_tcp() && m.linear_index.is_some() && m.linear_index == bot_meta.linear_index
    };
    let relaid: Vec<(f64, P, TcpMeta<P>)> = (bot + 1..eot)
        .filter(|&j| !plan.meta(j).is_virtual() && !is_corner(plan.meta(j)))
        .map(|j| {
            let s = plan.path_distance_between(bot, j) * ratio;
            let p = point_on_legs(&p_bot, &vertex_pos, &p_eot, s).with_alt(plan.pos(j).alt());
            (t_bot + s / speed, p, plan.meta(j).clone())
        })
        .collect();
    let t_vertex = t_bot + leg1 / speed;
    let t_last = relaid
        .iter()
        .map(|(t, _, _)| *t)
        .fold(t_vertex, f64::max);

    for k in (bot..=eot).rev() {
        plan.remove(k);
    }
    if bot < plan.len() && plan.t(bot) <= t_last {
        let gap = t_last + 1.0 - plan.t(bot);
        plan.time_shift(bot, gap);
    }
    plan.add(Waypoint::new(vertex_pos, t_vertex), vertex_meta)?;
    for (t, p, meta) in &relaid {
        plan.add(Waypoint::new(*p, *t), meta.clone())?;
    }

    if let Ok(last_new) = plan.index_of(t_last) {
        if last_new + 1 < plan.len() {
            plan.mk_gs_out(last_new, gs_next);
        }
    }
    for (t, _, _) in relaid.iter().rev() {
        if let Ok(k) = plan.index_of(*t) {
            plan.remove_if_redundant(k, Redundancy::TRK_GS);
        }
    }
    tracing::debug!(plan = plan.name(), time = t_vertex, "reverted turn");
    plan.nearest_index(t_vertex)
        .ok_or(PlanError::TooFewPoints { needed: 1, len: 0 })
}

/// Intersection of the tangents at the BOT and EOT, or the arc midpoint
/// when the turn is too wide for a usable intersection.
fn tangent_vertex<P: Coordinate>(plan: &Plan<P>, bot: usize, eot: usize) -> P {
    let (p_bot, p_eot) = (plan.pos(bot), plan.pos(eot));
    let t_mid = 0.5 * (plan.t(bot) + plan.t(eot));
    let mid = plan.position(t_mid).unwrap_or(p_bot);
    let meta = plan.meta(bot);
    let Some(center) = meta.turn_center else {
        return mid;
    };
    let dir = dir_of(meta.signed_radius);
    let radius = if meta.signed_radius != 0.0 {
        meta.signed_radius.abs()
    } else {
        center.distance_h(&p_bot)
    };
    let half = 0.5 * arc_angle(&p_bot, &center, &p_eot, dir);
    if half.cos() < 0.1 {
        return mid;
    }
    let bearing = to_2pi(center.initial_course(&p_bot) + dir * half);
    center
        .linear_dist_2d(bearing, radius / half.cos())
        .with_alt(mid.alt())
}

fn point_on_legs<P: Coordinate>(a: &P, vertex: &P, b: &P, s: f64) -> P {
    let leg1 = a.distance_h(vertex);
    let leg2 = vertex.distance_h(b);
    if s <= leg1 {
        if leg1 > 0.0 {
            a.interpolate(vertex, s / leg1)
        } else {
            *a
        }
    } else if leg2 > 0.0 {
        vertex.interpolate(b, ((s - leg1) / leg2).min(1.0))
    } else {
        *b
    }
}

/// Revert the ground-speed zone opened at `bgs`; returns `bgs`.
///
/// The zone is re-timed at the speed leaving the EGS, or at the speed
/// entering the BGS when the aircraft leaves the zone stopped.
pub fn revert_gs_zone<P: Coordinate>(plan: &mut Plan<P>, bgs: usize) -> Result<usize, PlanError> {
    let egs = zone_end(plan, Dimension::Gs, bgs)?;
    let gs_in_bgs = plan.gs_in(bgs);
    let gs_out_egs = plan.gs_out(egs);

    plan.tcp_mut(bgs).clear_bgs();
    plan.tcp_mut(egs).clear_egs();
    let target = if gs_out_egs < NEAR_ZERO_GS {
        gs_in_bgs
    } else {
        gs_out_egs
    };
    for k in bgs..egs {
        plan.mk_gs_out(k, target);
    }
    plan.remove_if_redundant(egs, Redundancy::TRK_VS);
    tracing::debug!(plan = plan.name(), index = bgs, gs = target, "reverted gs zone");
    Ok(bgs)
}

/// BOT of the turn whose EOT anchors the gs zone at `bgs`, if any.
fn anchoring_turn<P: Coordinate>(plan: &Plan<P>, bgs: usize) -> Option<usize> {
    let eot = (0..=bgs).rev().find(|&j| plan.meta(j).is_tcp_in(Dimension::Trk))?;
    let eot_meta = plan.meta(eot);
    if !eot_meta.is_eot() {
        return None;
    }
    let same_origin = eot == bgs
        || (eot_meta.linear_index.is_some()
            && eot_meta.linear_index == plan.meta(bgs).linear_index);
    if !same_origin {
        return None;
    }
    plan.prev_bot(eot)
}

/// Revert the gs zone at `bgs` and the turn it was generated with.
pub fn revert_gs_with_previous_turn<P: Coordinate>(
    plan: &mut Plan<P>,
    bgs: usize,
) -> Result<usize, PlanError> {
    let turn = anchoring_turn(plan, bgs);
    let ix = revert_gs_zone(plan, bgs)?;
    match turn {
        Some(bot) => revert_turn_zone(plan, bot),
        None => Ok(ix),
    }
}

/// Revert the zone that `i` opens or closes. A vertex with no tags is left alone.
pub fn revert_one<P: Coordinate>(plan: &mut Plan<P>, i: usize) -> Result<usize, PlanError> {
    let meta = plan
        .tcp(i)
        .ok_or(PlanError::InvalidIndex { index: i, len: plan.len() })?
        .clone();
    let begin = |dim: Dimension, is_begin: bool| -> Result<usize, PlanError> {
        if is_begin {
            Ok(i)
        } else {
            plan.prev_begin(dim, i)
                .ok_or(PlanError::NotZoneBegin { dimension: dim, index: i })
        }
    };
    if meta.is_vs_tcp() {
        let b = begin(Dimension::Vs, meta.is_bvs())?;
        revert_vs_zone(plan, b)
    } else if meta.is_trk_tcp() {
        let b = begin(Dimension::Trk, meta.is_bot())?;
        revert_turn_zone(plan, b)
    } else if meta.is_gs_tcp() {
        let b = begin(Dimension::Gs, meta.is_bgs())?;
        revert_gs_with_previous_turn(plan, b)
    } else {
        Ok(i)
    }
}

/// Revert every zone of the group the TCP at `ix` belongs to and return the
/// index of the linear vertex it came from.
pub fn revert_group<P: Coordinate>(plan: &mut Plan<P>, ix: usize) -> Result<usize, PlanError> {
    revert_group_with(plan, ix, &GenerationLimits::default())
}

/// [`revert_group`] merging leftover vertices closer than `limits.min_dt`.
///
/// The group is every TCP generated from the same linear vertex, widened to
/// whole zones: a zone that opens before the group or closes after it is
/// reverted as well. Vertical zones go first, then turns, then ground-speed
/// zones.
pub fn revert_group_with<P: Coordinate>(
    plan: &mut Plan<P>,
    ix: usize,
    limits: &GenerationLimits,
) -> Result<usize, PlanError> {
    let len = plan.len();
    let meta = plan
        .tcp(ix)
        .ok_or(PlanError::InvalidIndex { index: ix, len })?
        .clone();
    if !meta.is_tcp() {
        return Ok(ix);
    }
    if ix == 0 {
        plan.diagnostics_mut()
            .error("revert_group: cannot revert the first point", Some(0));
        return Err(PlanError::InvalidIndex { index: 0, len });
    }

    let key = meta.linear_index;
    let mut window = (plan.t(ix), plan.t(ix));
    let mut t_result = plan.t(ix);
    loop {
        let members: Vec<usize> = (0..plan.len())
            .filter(|&j| {
                let m = plan.meta(j);
                let t = plan.t(j);
                m.is_tcp()
                    && ((key.is_some() && m.linear_index == key)
                        || (window.0..=window.1).contains(&t))
            })
            .collect();
        let (Some(&lo), Some(&hi)) = (members.first(), members.last()) else {
            break;
        };
        let (lo, hi) = group_span(plan, lo, hi);
        window = (plan.t(lo), plan.t(hi));

        let next = (lo..=hi)
            .rev()
            .find(|&j| plan.meta(j).is_bvs())
            .map(|j| (Dimension::Vs, j))
            .or_else(|| {
                (lo..=hi)
                    .rev()
                    .find(|&j| plan.meta(j).is_bot())
                    .map(|j| (Dimension::Trk, j))
            })
            .or_else(|| (lo..=hi).find(|&j| plan.meta(j).is_bgs()).map(|j| (Dimension::Gs, j)));
        let Some((dim, begin)) = next else {
            break;
        };
        let ours = key.is_none() || plan.meta(begin).linear_index == key;
        let restored = match dim {
            Dimension::Vs => revert_vs_zone(plan, begin)?,
            Dimension::Trk => revert_turn_zone(plan, begin)?,
            Dimension::Gs => revert_gs_zone(plan, begin)?,
        };
        if ours {
            t_result = plan.t(restored);
        }
    }

    plan.merge_close_points(limits.min_dt);
    plan.nearest_index(t_result)
        .ok_or(PlanError::TooFewPoints { needed: 1, len: 0 })
}

/// Smallest index range holding `[lo, hi]` and every zone that touches it.
fn group_span<P: Coordinate>(plan: &Plan<P>, mut lo: usize, mut hi: usize) -> (usize, usize) {
    loop {
        let (mut new_lo, mut new_hi) = (lo, hi);
        for dim in Dimension::ALL {
            if let Some(b) = plan.owning_begin(dim, lo) {
                new_lo = new_lo.min(b);
            }
            for j in lo..=hi {
                let m = plan.meta(j);
                if m.is_begin(dim) {
                    if let Some(e) = plan.next_end(dim, j) {
                        new_hi = new_hi.max(e);
                    }
                }
                if m.is_end(dim) {
                    if let Some(b) = plan.prev_begin(dim, j) {
                        new_lo = new_lo.min(b);
                    }
                }
            }
        }
        if (new_lo, new_hi) == (lo, hi) {
            return (lo, hi);
        }
        (lo, hi) = (new_lo, new_hi);
    }
}

/// Mark non-TCP vertices where vertical speed changes as AltitudePreserve.
pub fn set_alt_preserve_by_delta<P: Coordinate>(plan: &mut Plan<P>, min_vs_delta: f64) {
    for i in 1..plan.len().saturating_sub(1) {
        if plan.meta(i).is_tcp() {
            continue;
        }
        if (plan.vs_in(i) - plan.vs_out(i)).abs() > 0.1 * min_vs_delta {
            plan.tcp_mut(i).set_alt_preserve();
        }
    }
}

/// Linear copy of `plan` with every acceleration zone reverted.
pub fn revert_all<P: Coordinate>(plan: &Plan<P>) -> Plan<P> {
    revert_all_with(plan, &GenerationLimits::default())
}

pub fn revert_all_with<P: Coordinate>(plan: &Plan<P>, limits: &GenerationLimits) -> Plan<P> {
    let (Some(first), Some(last)) = (plan.first_time(), plan.last_time()) else {
        return plan.clone();
    };
    let mut out = sampler::remove_virtuals(plan, first, last);

    let mut i = out.len();
    while i > 0 {
        i -= 1;
        if i < out.len() && out.meta(i).is_bvs() {
            if let Err(err) = revert_vs_zone(&mut out, i) {
                out.diagnostics_mut().error(format!("revert_all: {err}"), Some(i));
            }
        }
    }
    set_alt_preserve_by_delta(&mut out, limits.min_vs_delta);

    let mut i = out.len();
    while i > 0 {
        i -= 1;
        if i < out.len() && out.meta(i).is_bot() {
            if let Err(err) = revert_turn_zone(&mut out, i) {
                out.diagnostics_mut().error(format!("revert_all: {err}"), Some(i));
            }
        }
    }

    let mut i = 0;
    while i < out.len() {
        if out.meta(i).is_bgs() {
            if let Err(err) = revert_gs_zone(&mut out, i) {
                out.diagnostics_mut().error(format!("revert_all: {err}"), Some(i));
            }
        }
        i += 1;
    }

    out.clean(limits.min_dt);
    out
}

fn zone_end<P: Coordinate>(plan: &Plan<P>, dim: Dimension, begin: usize) -> Result<usize, PlanError> {
    if !plan.tcp(begin).is_some_and(|m| m.is_begin(dim)) {
        return Err(PlanError::NotZoneBegin { dimension: dim, index: begin });
    }
    plan.next_end(dim, begin)
        .ok_or(PlanError::MissingZoneEnd { dimension: dim, index: begin })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Xyz;
    use crate::kinematics::center_from_radius;
    use std::f64::consts::FRAC_PI_2;

    /// Quarter right turn at 100 m/s replacing the corner (0, 1000).
    fn turn_plan(with_source: bool) -> Plan<Xyz> {
        let r = 1000.0;
        let bot = Xyz::new(0.0, 0.0, 0.0);
        let arc_t = r * FRAC_PI_2 / 100.0;
        let corner = Xyz::new(0.0, 1000.0, 0.0);
        let mut plan = Plan::new("turn");
        plan.add_point(Xyz::new(0.0, -1000.0, 0.0), 0.0).unwrap();
        let mut m = TcpMeta::new();
        m.set_bot(r, center_from_radius(&bot, r, 0.0));
        if with_source {
            m = m.with_source(corner, 20.0);
        }
        plan.add(Waypoint::new(bot, 10.0), m).unwrap();
        let mut m = TcpMeta::new();
        m.set_eot();
        plan.add(Waypoint::new(Xyz::new(1000.0, 1000.0, 0.0), 10.0 + arc_t), m)
            .unwrap();
        plan.add_point(Xyz::new(2000.0, 1000.0, 0.0), 20.0 + arc_t).unwrap();
        plan
    }

    #[test]
    fn test_revert_turn_restores_corner() {
        for with_source in [true, false] {
            let mut plan = turn_plan(with_source);
            let ix = revert_turn_zone(&mut plan, 1).unwrap();
            assert_eq!(ix, 1);
            assert_eq!(plan.len(), 3);
            let p = plan.pos(1);
            assert!(p.distance_h(&Xyz::new(0.0, 1000.0, 0.0)) < 1e-6, "vertex {p:?}");
            assert!((plan.t(1) - 20.0).abs() < 1e-9);
            assert!((plan.t(2) - 40.0).abs() < 1e-9);
            assert!(!plan.meta(1).is_tcp());
        }
    }

    #[test]
    fn test_revert_gs_zone_uses_exit_speed() {
        let mut plan = Plan::new("gs");
        let mut bgs = TcpMeta::new();
        bgs.set_bgs(2.0);
        plan.add_point(Xyz::new(0.0, -500.0, 0.0), 0.0).unwrap();
        plan.add(Waypoint::new(Xyz::new(0.0, 0.0, 0.0), 10.0), bgs).unwrap();
        let mut egs = TcpMeta::new();
        egs.set_egs();
        plan.add(Waypoint::new(Xyz::new(0.0, 600.0, 0.0), 20.0), egs).unwrap();
        plan.add_point(Xyz::new(0.0, 1300.0, 0.0), 30.0).unwrap();

        assert_eq!(revert_gs_zone(&mut plan, 1), Ok(1));
        // the EGS sits on a straight, constant-speed leg once reverted
        assert_eq!(plan.len(), 3);
        assert!((plan.gs_out(1) - 70.0).abs() < 1e-9);
        assert!((plan.t(2) - (10.0 + 1300.0 / 70.0)).abs() < 1e-9);
    }

    #[test]
    fn test_revert_vs_zone_midpoint() {
        let mut plan = Plan::new("vs");
        plan.add_point(Xyz::new(0.0, 0.0, 0.0), 0.0).unwrap();
        let mut bvs = TcpMeta::new();
        bvs.set_bvs(1.0);
        // climb at 0 then 10 m/s, accelerating at 1 m/s^2 from t=10 to t=20
        plan.add(Waypoint::new(Xyz::new(0.0, 1000.0, 0.0), 10.0), bvs).unwrap();
        let mut evs = TcpMeta::new();
        evs.set_evs();
        plan.add(Waypoint::new(Xyz::new(0.0, 2000.0, 50.0), 20.0), evs).unwrap();
        plan.add_point(Xyz::new(0.0, 3000.0, 150.0), 30.0).unwrap();

        let ix = revert_vs_zone(&mut plan, 1).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(ix, 1);
        assert!((plan.t(1) - 15.0).abs() < 1e-9);
        assert!(plan.pos(1).z.abs() < 1e-9);
        assert!(plan.meta(1).is_alt_preserve());
        assert!((plan.vs_out(1) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_end() {
        let mut plan = turn_plan(true);
        plan.tcp_mut(2).clear_eot();
        assert_eq!(
            revert_turn_zone(&mut plan, 1),
            Err(PlanError::MissingZoneEnd { dimension: Dimension::Trk, index: 1 })
        );
    }

    #[test]
    fn test_revert_group_non_tcp_and_first() {
        let mut plan = turn_plan(true);
        assert_eq!(revert_group(&mut plan, 3), Ok(3));
        assert_eq!(plan.len(), 4);
        let mut m = TcpMeta::new();
        m.set_bgs(1.0);
        *plan.tcp_mut(0) = m;
        assert!(revert_group(&mut plan, 0).is_err());
        assert!(plan.diagnostics().has_error());
    }

    #[test]
    fn test_revert_group_takes_overlapping_vs_zone() {
        // climb starting on the inbound leg and ending inside the turn
        let mut plan = turn_plan(true);
        let p_evs = plan.position(14.0).unwrap().with_alt(50.0);
        let mut bvs = TcpMeta::new();
        bvs.set_bvs(1.0);
        plan.add(Waypoint::new(Xyz::new(0.0, -600.0, 0.0), 4.0), bvs).unwrap();
        let mut evs = TcpMeta::new();
        evs.set_evs();
        plan.add(Waypoint::new(p_evs, 14.0), evs).unwrap();
        for k in 4..6 {
            let p = plan.pos(k).with_alt(50.0 + 10.0 * (plan.t(k) - 14.0));
            plan.set_position(k, p);
        }
        assert!(plan.meta(4).is_eot() && plan.is_well_formed());

        assert_eq!(revert_group(&mut plan, 4), Ok(2));
        assert_eq!(plan.len(), 4);
        assert!(plan.vertices().iter().all(|v| !v.tcp.is_tcp()));
        assert!(plan.meta(1).is_alt_preserve());
        assert!((plan.t(1) - 9.0).abs() < 1e-9);
        assert!((plan.t(2) - 20.0).abs() < 1e-9);
        assert!(plan.pos(2).distance_h(&Xyz::new(0.0, 1000.0, 0.0)) < 1e-6);
    }

    #[test]
    fn test_revert_all_merges_at_configured_spacing() {
        let plan = Plan::linear(
            "close",
            [
                (Xyz::new(0.0, 0.0, 0.0), 0.0),
                (Xyz::new(0.0, 5.0, 0.0), 0.05),
                (Xyz::new(0.0, 1000.0, 0.0), 10.0),
            ],
        )
        .unwrap();
        assert_eq!(revert_all(&plan).len(), 3);
        let limits = GenerationLimits { min_dt: 0.1, ..GenerationLimits::default() };
        let merged = revert_all_with(&plan, &limits);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.time(1), Some(10.0));
    }

    #[test]
    fn test_revert_one_from_end_tag() {
        let mut plan = turn_plan(true);
        assert_eq!(revert_one(&mut plan, 2), Ok(1));
        assert_eq!(plan.len(), 3);
    }
}
