//! Build a kinematic plan from a linear one.
//!
//! Vertices whose altitude matters are marked AltitudePreserve first. Turns
//! are generated next, then ground-speed zones; the altitudes between marked
//! vertices are then made linear in time and vertical zones come last.
//! Every generated TCP points back at the linear vertex it came from, which is
//! what lets [`crate::revert`] restore the linear plan.

use crate::config::GenerationLimits;
use crate::geometry::{Coordinate, Waypoint};
use crate::kinematics::{
    self, center_from_radius, dir_of, radius_from_bank, turn_by_dist_2d, turn_delta,
};
use crate::plan::{Plan, Redundancy};
use crate::sampler;
use crate::synth::VerticalRegenerator;
use crate::tcp::{Dimension, Source, TcpMeta};

const NEAR_ZERO_GS: f64 = 1e-4;
const LEVEL_VS: f64 = 1e-6;
/// Closest a kept corner may sit to its EOT, in seconds.
const CORNER_GAP_S: f64 = 1e-3;

/// Give every vertex without one its current index as linear index.
fn mark_linear_indices<P: Coordinate>(plan: &mut Plan<P>) {
    for i in 0..plan.len() {
        let meta = plan.tcp_mut(i);
        if meta.linear_index.is_none() {
            meta.linear_index = Some(i);
        }
    }
}

/// Mark every interior vertex that is not in level flight as AltitudePreserve.
///
/// Turns move and re-time the vertices around a corner; a marked vertex keeps
/// its altitude through that, so each vertical-speed change stays at its own
/// linear vertex.
pub fn mark_vs_changes<P: Coordinate>(plan: &Plan<P>) -> Plan<P> {
    let mut out = plan.clone();
    for i in 1..out.len().saturating_sub(1) {
        if out.meta(i).is_tcp() {
            continue;
        }
        if out.vs_in(i).abs() > LEVEL_VS || out.vs_out(i).abs() > LEVEL_VS {
            out.tcp_mut(i).set_alt_preserve();
        }
    }
    out
}

/// Give every vertex between two AltitudePreserve vertices the altitude of
/// constant vertical speed between them. The first and last vertices anchor
/// the ends.
pub fn make_marked_vs_constant<P: Coordinate>(plan: &Plan<P>) -> Plan<P> {
    let mut out = plan.clone();
    let mut anchor = 0;
    for i in 1..out.len() {
        if !out.meta(i).is_alt_preserve() && i + 1 < out.len() {
            continue;
        }
        let (t0, z0) = (out.t(anchor), out.pos(anchor).alt());
        let vs = (out.pos(i).alt() - z0) / (out.t(i) - t0);
        for j in anchor + 1..i {
            let p = out.pos(j).with_alt(z0 + vs * (out.t(j) - t0));
            out.set_position(j, p);
        }
        anchor = i;
    }
    out
}

fn provenance<P: Coordinate>(plan: &Plan<P>, i: usize) -> TcpMeta<P> {
    let mut meta = TcpMeta::new();
    meta.source = Some(Source { position: plan.pos(i), time: plan.t(i) });
    meta.linear_index = plan.meta(i).linear_index;
    meta
}

struct Turn<P> {
    bot: Waypoint<P>,
    bot_meta: TcpMeta<P>,
    eot: Waypoint<P>,
    eot_meta: TcpMeta<P>,
    /// Where an AltitudePreserve corner sits on the arc.
    corner: Option<Waypoint<P>>,
    shift: f64,
}

fn turn_at<P: Coordinate>(
    plan: &Plan<P>,
    i: usize,
    limits: &GenerationLimits,
) -> Result<Option<Turn<P>>, String> {
    let meta = plan.meta(i);
    if meta.is_tcp() || plan.in_trk_accel(i - 1) {
        return Ok(None);
    }
    let delta = turn_delta(plan.trk_in(i), plan.trk_out(i));
    if delta.abs() <= limits.min_trk_delta {
        return Ok(None);
    }
    let gs_in = plan.gs_in(i);
    let gs_out = plan.gs_out(i);
    if gs_in < NEAR_ZERO_GS || gs_out < NEAR_ZERO_GS {
        return Err("no turn generated at zero ground speed".into());
    }
    let radius = if meta.signed_radius != 0.0 {
        meta.signed_radius.abs()
    } else {
        radius_from_bank(gs_in, limits.bank_angle)
    };
    if !radius.is_finite() {
        return Err("bank angle gives no finite turn radius".into());
    }

    let d = radius * (0.5 * delta.abs()).tan();
    let (prev, vertex, next) = (plan.pos(i - 1), plan.pos(i), plan.pos(i + 1));
    let leg_in = prev.distance_h(&vertex);
    let leg_out = vertex.distance_h(&next);
    if d >= leg_in || d >= leg_out {
        return Err(format!("turn of radius {radius:.0} m does not fit its legs"));
    }

    let bot_pos = vertex.interpolate(&prev, d / leg_in);
    let eot_pos = vertex.interpolate(&next, d / leg_out);
    let signed_radius = radius.copysign(delta);
    let center = center_from_radius(&bot_pos, signed_radius, bot_pos.initial_course(&vertex));

    let t_bot = plan.t(i) - d / gs_in;
    let t_eot = t_bot + radius * delta.abs() / gs_in;
    let t_next = t_eot + (leg_out - d) / gs_out;

    let corner = meta.is_alt_preserve().then(|| {
        let t_corner = if plan.t(i) < t_eot - CORNER_GAP_S {
            plan.t(i)
        } else {
            0.5 * (t_bot + t_eot)
        };
        let s = gs_in * (t_corner - t_bot);
        let (p, _) = turn_by_dist_2d(&bot_pos, &center, dir_of(signed_radius), s);
        Waypoint::new(p.with_alt(vertex.alt()), t_corner)
    });

    let mut bot_meta = provenance(plan, i);
    bot_meta.set_bot(signed_radius, center);
    bot_meta.info = meta.info.clone();
    let mut eot_meta = provenance(plan, i);
    eot_meta.set_eot();

    Ok(Some(Turn {
        bot: Waypoint::new(bot_pos, t_bot),
        bot_meta,
        eot: Waypoint::new(eot_pos, t_eot),
        eot_meta,
        corner,
        shift: t_next - plan.t(i + 1),
    }))
}

/// Replace every linear vertex with a track change by a BOT/EOT pair.
///
/// The radius is the vertex's requested radius, or the bank-angle radius at
/// the inbound ground speed. Downstream vertices move earlier by the time the
/// arc saves. An AltitudePreserve corner is kept on the arc at its own time
/// and altitude. Turns that do not fit their legs are left as corners and
/// noted in the plan diagnostics.
pub fn generate_turn_tcps<P: Coordinate>(plan: &Plan<P>, limits: &GenerationLimits) -> Plan<P> {
    let mut out = plan.clone();
    mark_linear_indices(&mut out);
    let mut i = 1;
    while i + 1 < out.len() {
        match turn_at(&out, i, limits) {
            Ok(Some(turn)) => {
                let next = match turn.corner {
                    Some(corner) => {
                        out.set_position(i, corner.position);
                        out.set_time(i, corner.time);
                        i + 1
                    }
                    None => {
                        out.remove(i);
                        i
                    }
                };
                out.time_shift(next, turn.shift);
                let added = out
                    .add(turn.bot, turn.bot_meta)
                    .and_then(|_| out.add(turn.eot, turn.eot_meta));
                if let Err(err) = added {
                    tracing::warn!("generate_turn_tcps: {}", err);
                    out.diagnostics_mut()
                        .error(format!("generate_turn_tcps: {err}"), Some(i));
                }
                i = next + 2;
            }
            Ok(None) => i += 1,
            Err(msg) => {
                tracing::warn!(index = i, "generate_turn_tcps: {}", msg);
                out.diagnostics_mut()
                    .warn(format!("generate_turn_tcps: {msg}"), Some(i));
                i += 1;
            }
        }
    }
    out
}

/// Open a gs zone at `i`; returns the index of its EGS.
fn gs_zone_at<P: Coordinate>(
    plan: &mut Plan<P>,
    i: usize,
    gs_in: f64,
    gs_out: f64,
    limits: &GenerationLimits,
) -> Result<usize, String> {
    let delta = gs_out - gs_in;
    let a = limits.gs_accel.abs().copysign(delta);
    let dist = kinematics::distance_after(gs_in, a, delta / a);
    let t_i = plan.t(i);

    let (egs_pos, egs_seg) = sampler::advance_along_path(plan, t_i, dist)
        .ok_or_else(|| format!("speed change of {delta:.2} m/s runs past the end of the plan"))?;
    let into = dist - plan.path_distance_between(i, egs_seg);
    let landing = sampler::landing_vertex(plan, egs_seg, into);
    let blocked = (i + 1..=egs_seg).filter(|&j| landing != Some(j)).any(|j| {
        plan.meta(j).is_gs_tcp() || (plan.gs_in(j) - plan.gs_out(j)).abs() > limits.min_gs_delta
    });
    if blocked {
        return Err("speed change overlaps the next one".into());
    }

    let t_egs_old = match landing {
        Some(j) => plan.t(j),
        None => {
            plan.t(egs_seg)
                + plan
                    .time_from_distance(egs_seg, into)
                    .ok_or("segment cannot be flown")?
        }
    };

    let mut end_meta = provenance(plan, i);
    end_meta.set_egs();
    let begin = plan.tcp_mut(i);
    begin.set_bgs(a);
    if begin.source.is_none() {
        begin.source = end_meta.source;
    }

    let egs = match landing {
        Some(j) => {
            let merged = plan.meta(j).merge(&end_meta).map_err(|e| e.at(j).to_string())?;
            *plan.tcp_mut(j) = merged;
            j
        }
        None => plan
            .add(Waypoint::new(egs_pos, t_egs_old), end_meta)
            .map_err(|e| e.to_string())?,
    };

    let mut times = Vec::with_capacity(egs - i);
    for k in i + 1..=egs {
        let dt = kinematics::time_from_distance(gs_in, a, plan.path_distance_between(i, k))
            .ok_or("zone cannot be flown")?;
        times.push(t_i + dt);
    }
    for (k, t) in (i + 1..).zip(&times) {
        plan.set_time(k, *t);
    }
    plan.time_shift(egs + 1, plan.t(egs) - t_egs_old);
    Ok(egs)
}

/// Mark a BGS at every vertex whose ground speed changes and insert the
/// matching EGS where the change completes. Segments after the EGS keep
/// their own speeds.
pub fn generate_gs_tcps<P: Coordinate>(plan: &Plan<P>, limits: &GenerationLimits) -> Plan<P> {
    let mut out = plan.clone();
    mark_linear_indices(&mut out);
    let mut i = 1;
    while i + 1 < out.len() {
        let meta = out.meta(i);
        if meta.is_bgs() || (out.in_gs_accel(i - 1) && !meta.is_egs()) {
            i += 1;
            continue;
        }
        let (gs_in, gs_out) = (out.gs_in(i), out.gs_out(i));
        if (gs_out - gs_in).abs() <= limits.min_gs_delta {
            i += 1;
            continue;
        }
        match gs_zone_at(&mut out, i, gs_in, gs_out, limits) {
            Ok(egs) => i = egs,
            Err(msg) => {
                tracing::warn!(index = i, "generate_gs_tcps: {}", msg);
                out.diagnostics_mut()
                    .warn(format!("generate_gs_tcps: {msg}"), Some(i));
                i += 1;
            }
        }
    }
    out
}

/// Places a BVS/EVS pair centred in time on every vertex where vertical
/// speed changes.
#[derive(Debug, Clone, PartialEq)]
pub struct VsVertexGenerator {
    pub min_vs_delta: f64,
}

impl Default for VsVertexGenerator {
    fn default() -> Self {
        Self::new(&GenerationLimits::default())
    }
}

impl VsVertexGenerator {
    pub fn new(limits: &GenerationLimits) -> Self {
        Self { min_vs_delta: limits.min_vs_delta }
    }

    fn vs_change(&self, plan: &Plan<impl Coordinate>, j: usize) -> Option<f64> {
        let delta = plan.vs_out(j) - plan.vs_in(j);
        (delta.abs() > self.min_vs_delta).then_some(delta)
    }

    /// Build the zone for vertex `i`; returns the index after its EVS.
    fn zone_at<P: Coordinate>(
        &self,
        plan: &mut Plan<P>,
        i: usize,
        accel: f64,
    ) -> Result<Option<usize>, String> {
        if plan.meta(i).is_vs_tcp() || plan.in_vs_accel(i - 1) {
            return Ok(None);
        }
        let Some(delta) = self.vs_change(plan, i) else {
            return Ok(None);
        };
        let a = accel.copysign(delta);
        let half = 0.5 * delta / a;
        let t_i = plan.t(i);
        let (t_b, t_e) = (t_i - half, t_i + half);

        let lower = plan
            .prev_tcp(Dimension::Vs, i)
            .map_or(plan.t(0), |j| plan.t(j));
        let next_change = (i + 1..plan.len() - 1)
            .find(|&j| plan.meta(j).is_vs_tcp() || self.vs_change(plan, j).is_some());
        let upper = match next_change {
            Some(j) if plan.meta(j).is_vs_tcp() => plan.t(j),
            Some(j) => {
                let d = self.vs_change(plan, j).unwrap_or(0.0);
                plan.t(j) - 0.5 * d.abs() / accel
            }
            None => plan.t(plan.len() - 1),
        };
        if t_b <= lower || t_e >= upper {
            return Err(format!("vertical zone at t={t_i:.2} does not fit"));
        }

        let vs_in = plan.vs_in(i);
        let (Some(p_b), Some(p_e)) = (plan.position(t_b), plan.position(t_e)) else {
            return Err("vertical zone outside the plan".into());
        };
        let mut begin = provenance(plan, i);
        begin.set_bvs(a);
        let mut end = provenance(plan, i);
        end.set_evs();

        // the zone replaces the vertex unless the vertex also bends the path
        if !plan.meta(i).is_tcp() {
            let kind = plan.meta(i).kind;
            plan.tcp_mut(i).set_original();
            if !plan.remove_if_redundant(i, Redundancy::TRK_GS) {
                plan.tcp_mut(i).kind = kind;
            }
        }
        let ib = plan
            .add(Waypoint::new(p_b, t_b), begin)
            .map_err(|e| e.to_string())?;
        let ie = plan
            .add(Waypoint::new(p_e, t_e), end)
            .map_err(|e| e.to_string())?;
        let z_b = p_b.alt();
        for k in ib + 1..=ie {
            let dt = plan.t(k) - t_b;
            let p = plan.pos(k).with_alt(z_b + vs_in * dt + 0.5 * a * dt * dt);
            plan.set_position(k, p);
        }
        Ok(Some(ie + 1))
    }
}

impl VerticalRegenerator for VsVertexGenerator {
    fn regenerate<P: Coordinate>(&self, plan: &Plan<P>, vs_accel: f64) -> Plan<P> {
        let mut out = plan.clone();
        if !(vs_accel.abs() > 0.0) {
            out.diagnostics_mut()
                .warn("regenerate: zero vertical acceleration, plan left linear", None);
            return out;
        }
        let mut i = 1;
        while i + 1 < out.len() {
            match self.zone_at(&mut out, i, vs_accel.abs()) {
                Ok(Some(next)) => i = next,
                Ok(None) => i += 1,
                Err(msg) => {
                    tracing::warn!(index = i, "regenerate: {}", msg);
                    out.diagnostics_mut().warn(format!("regenerate: {msg}"), Some(i));
                    i += 1;
                }
            }
        }
        out
    }
}

/// Turns, then ground-speed zones, then vertical zones.
pub fn make_kinematic_plan<P: Coordinate>(plan: &Plan<P>, limits: &GenerationLimits) -> Plan<P> {
    let marked = mark_vs_changes(plan);
    let turns = generate_turn_tcps(&marked, limits);
    let speeds = generate_gs_tcps(&turns, limits);
    let levelled = make_marked_vs_constant(&speeds);
    let out = VsVertexGenerator::new(limits).regenerate(&levelled, limits.vs_accel);
    tracing::debug!(plan = out.name(), points = out.len(), "generated kinematic plan");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::ConsistencyChecker;
    use crate::geometry::Xyz;
    use std::f64::consts::FRAC_PI_2;

    fn corner(leg: f64) -> Plan<Xyz> {
        Plan::linear(
            "corner",
            [
                (Xyz::new(0.0, -leg, 0.0), 0.0),
                (Xyz::new(0.0, 0.0, 0.0), leg / 100.0),
                (Xyz::new(leg, 0.0, 0.0), 2.0 * leg / 100.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_turn_replaces_corner() {
        let limits = GenerationLimits::default();
        let out = generate_turn_tcps(&corner(5000.0), &limits);
        assert_eq!(out.len(), 4);
        let r = radius_from_bank(100.0, limits.bank_angle);
        let bot = out.tcp(1).unwrap();
        assert!(bot.is_bot() && out.tcp(2).unwrap().is_eot());
        assert!((bot.signed_radius - r).abs() < 1e-9, "right turn radius {}", bot.signed_radius);
        assert_eq!(bot.linear_index, Some(1));
        assert_eq!(bot.source.map(|s| s.time), Some(50.0));

        let t_bot = out.time(1).unwrap();
        let t_eot = out.time(2).unwrap();
        assert!((t_bot - (50.0 - r / 100.0)).abs() < 1e-9);
        assert!((t_eot - t_bot - r * FRAC_PI_2 / 100.0).abs() < 1e-9);
        let t_end = out.time(3).unwrap();
        assert!((t_end - (t_eot + (5000.0 - r) / 100.0)).abs() < 1e-9);

        let report = ConsistencyChecker::default().check_plan(&out);
        assert!(report.passed(), "{report:?}");
    }

    #[test]
    fn test_turn_that_does_not_fit_is_skipped() {
        let out = generate_turn_tcps(&corner(1000.0), &GenerationLimits::default());
        assert_eq!(out.len(), 3);
        assert!(out.diagnostics().has_message());
        // a corner left linear is not a continuity failure
        let report = ConsistencyChecker::default().silent().check_plan(&out);
        assert!(report.passed(), "{report:?}");
    }

    #[test]
    fn test_marked_corner_stays_on_arc() {
        let limits = GenerationLimits::default();
        let plan = Plan::linear(
            "turn-and-climb",
            [
                (Xyz::new(0.0, -5000.0, 0.0), 0.0),
                (Xyz::new(0.0, 0.0, 0.0), 50.0),
                (Xyz::new(5000.0, 0.0, 500.0), 100.0),
            ],
        )
        .unwrap();

        let marked = mark_vs_changes(&plan);
        assert!(marked.tcp(1).unwrap().is_alt_preserve());
        assert!(!marked.tcp(0).unwrap().is_alt_preserve());

        let out = generate_turn_tcps(&marked, &limits);
        assert_eq!(out.len(), 5);
        assert!(out.tcp(1).unwrap().is_bot() && out.tcp(3).unwrap().is_eot());
        let kept = out.point(2).unwrap();
        assert!(out.tcp(2).unwrap().is_alt_preserve());
        assert_eq!(kept.time, 50.0);
        assert_eq!(kept.position.z, 0.0);
        let r = radius_from_bank(100.0, limits.bank_angle);
        let center = out.turn_center(1).unwrap();
        assert!((kept.position.distance_h(&center) - r).abs() < 1e-6);
        assert!(ConsistencyChecker::default().silent().check_turn(&out, 1).unwrap().is_empty());

        let level = make_marked_vs_constant(&out);
        assert_eq!(level.point(2).unwrap().position.z, 0.0);
        assert_eq!(level.point(1).unwrap().position.z, 0.0);
        assert!((level.vs_out(2) - level.vs_out(3)).abs() < 1e-9);
        assert_eq!(level.point(4).unwrap().position.z, 500.0);
    }

    #[test]
    fn test_gs_zone_generated() {
        let limits = GenerationLimits::default();
        let plan = Plan::linear(
            "speedup",
            [
                (Xyz::new(0.0, 0.0, 0.0), 0.0),
                (Xyz::new(0.0, 5000.0, 0.0), 50.0),
                (Xyz::new(0.0, 10000.0, 0.0), 90.0),
            ],
        )
        .unwrap();
        let out = generate_gs_tcps(&plan, &limits);
        assert_eq!(out.len(), 4);
        assert!(out.tcp(1).unwrap().is_bgs() && out.tcp(2).unwrap().is_egs());

        let a = limits.gs_accel;
        let t_acc = 25.0 / a;
        let dist = 100.0 * t_acc + 0.5 * a * t_acc * t_acc;
        assert!((out.time(2).unwrap() - (50.0 + t_acc)).abs() < 1e-6);
        let t_end = out.time(3).unwrap();
        assert!((t_end - (50.0 + t_acc + (5000.0 - dist) / 125.0)).abs() < 1e-6, "end {t_end}");
        assert!((out.gs_out(2) - 125.0).abs() < 1e-6);
        assert!(ConsistencyChecker::default().check_plan(&out).passed());
    }

    #[test]
    fn test_vs_zone_centred_on_vertex() {
        let plan = Plan::linear(
            "climb",
            [
                (Xyz::new(0.0, 0.0, 0.0), 0.0),
                (Xyz::new(0.0, 5000.0, 0.0), 50.0),
                (Xyz::new(0.0, 10000.0, 500.0), 100.0),
            ],
        )
        .unwrap();
        let out = VsVertexGenerator::default().regenerate(&plan, 1.0);
        assert_eq!(out.len(), 4);
        assert!(out.tcp(1).unwrap().is_bvs() && out.tcp(2).unwrap().is_evs());
        assert!((out.time(1).unwrap() - 45.0).abs() < 1e-9);
        assert!((out.time(2).unwrap() - 55.0).abs() < 1e-9);
        let z = out.point(2).unwrap().position.z;
        assert!((z - 50.0).abs() < 1e-9, "evs altitude {z}");
        assert!(ConsistencyChecker::default().check_plan(&out).passed());
    }

    #[test]
    fn test_vs_zone_that_does_not_fit() {
        let plan = Plan::linear(
            "steep",
            [
                (Xyz::new(0.0, 0.0, 0.0), 0.0),
                (Xyz::new(0.0, 100.0, 0.0), 1.0),
                (Xyz::new(0.0, 200.0, 30.0), 2.0),
            ],
        )
        .unwrap();
        let out = VsVertexGenerator::default().regenerate(&plan, 1.0);
        assert_eq!(out.len(), 3);
        assert!(out.diagnostics().has_message());
    }
}
