//! The trajectory container: time-ordered vertices with TCP metadata.

use crate::diagnostics::Diagnostics;
use crate::error::{PlanError, WellFormedError};
use crate::geometry::{Coordinate, Velocity, Waypoint};
use crate::kinematics::{self, dir_of, distance_after, tangent_track, turn_delta};
use crate::tcp::{Dimension, TcpMeta};
use crate::units::{from_fpm, from_kn};
use std::fmt;

/// A waypoint with its TCP metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex<P> {
    pub point: Waypoint<P>,
    pub tcp: TcpMeta<P>,
}

/// Which velocity components must be unchanged for a vertex to be redundant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redundancy {
    pub trk: bool,
    pub gs: bool,
    pub vs: bool,
}

impl Redundancy {
    pub const TRK_GS: Redundancy = Redundancy { trk: true, gs: true, vs: false };
    pub const TRK_VS: Redundancy = Redundancy { trk: true, gs: false, vs: true };
    pub const ALL: Redundancy = Redundancy { trk: true, gs: true, vs: true };
}

const REDUNDANT_TRK_DEG: f64 = 1.0;
const REDUNDANT_GS_KN: f64 = 5.0;
const REDUNDANT_VS_FPM: f64 = 100.0;

/// Ordered sequence of `(Waypoint, TcpMeta)` pairs in one coordinate frame.
///
/// Per-index derived quantities (`gs_out`, `trk_final`, ...) treat an index at
/// or past the last vertex as the final segment and return `0.0` on plans with
/// fewer than two vertices. Time-based and lookup queries return `Option`.
#[derive(Debug, Clone)]
pub struct Plan<P: Coordinate> {
    name: String,
    vertices: Vec<Vertex<P>>,
    diagnostics: Diagnostics,
}

impl<P: Coordinate> Plan<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Build a linear plan from `(position, time)` pairs.
    pub fn linear(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (P, f64)>,
    ) -> Result<Self, PlanError> {
        let mut plan = Self::new(name);
        for (position, time) in points {
            plan.add_point(position, time)?;
        }
        Ok(plan)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A copy with no diagnostics and only the given vertex range.
    pub fn sub_plan(&self, from: usize, to: usize) -> Self {
        let to = to.min(self.len().saturating_sub(1));
        let vertices = if from <= to && from < self.len() {
            self.vertices[from..=to].to_vec()
        } else {
            Vec::new()
        };
        Self {
            name: self.name.clone(),
            vertices,
            diagnostics: Diagnostics::new(),
        }
    }

    // ========== STORAGE ==========

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex<P>] {
        &self.vertices
    }

    pub fn vertex(&self, i: usize) -> Option<&Vertex<P>> {
        self.vertices.get(i)
    }

    pub fn point(&self, i: usize) -> Option<Waypoint<P>> {
        self.vertices.get(i).map(|v| v.point)
    }

    pub fn time(&self, i: usize) -> Option<f64> {
        self.vertices.get(i).map(|v| v.point.time)
    }

    pub fn tcp(&self, i: usize) -> Option<&TcpMeta<P>> {
        self.vertices.get(i).map(|v| &v.tcp)
    }

    pub fn first_time(&self) -> Option<f64> {
        self.vertices.first().map(|v| v.point.time)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.vertices.last().map(|v| v.point.time)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    pub fn set_info(&mut self, i: usize, info: impl Into<String>) -> bool {
        match self.vertices.get_mut(i) {
            Some(v) => {
                v.tcp.info = info.into();
                true
            }
            None => false,
        }
    }

    /// Insert a vertex in time order.
    ///
    /// A vertex at exactly the time of an existing non-virtual vertex is merged
    /// into it; an existing virtual vertex is overwritten.
    pub fn add(&mut self, point: Waypoint<P>, tcp: TcpMeta<P>) -> Result<usize, PlanError> {
        if !point.time.is_finite() || point.time < 0.0 {
            self.diagnostics
                .error(format!("add: invalid time {}", point.time), None);
            return Err(PlanError::InvalidTime(point.time));
        }
        if !point.position.is_finite() {
            self.diagnostics.error("add: position is not finite", None);
            return Err(PlanError::InvalidPosition);
        }
        match self.index_of(point.time) {
            Ok(i) if !self.vertices[i].tcp.is_virtual() => {
                match self.vertices[i].tcp.merge(&tcp) {
                    Ok(merged) => {
                        self.vertices[i].tcp = merged;
                        Ok(i)
                    }
                    Err(err) => {
                        self.diagnostics.warn(
                            format!("add: incompatible point at time {:.4}, not added", point.time),
                            Some(i),
                        );
                        Err(err.at(i))
                    }
                }
            }
            Ok(i) => {
                self.vertices[i] = Vertex { point, tcp };
                Ok(i)
            }
            Err(i) => {
                self.vertices.insert(i, Vertex { point, tcp });
                Ok(i)
            }
        }
    }

    pub fn add_point(&mut self, position: P, time: f64) -> Result<usize, PlanError> {
        self.add(Waypoint::new(position, time), TcpMeta::new())
    }

    pub fn remove(&mut self, i: usize) -> Option<Vertex<P>> {
        (i < self.len()).then(|| self.vertices.remove(i))
    }

    pub(crate) fn set_time(&mut self, i: usize, time: f64) {
        self.vertices[i].point.time = time;
    }

    pub(crate) fn set_position(&mut self, i: usize, position: P) {
        self.vertices[i].point.position = position;
    }

    pub(crate) fn tcp_mut(&mut self, i: usize) -> &mut TcpMeta<P> {
        &mut self.vertices[i].tcp
    }

    pub(crate) fn t(&self, i: usize) -> f64 {
        self.vertices[i].point.time
    }

    pub(crate) fn pos(&self, i: usize) -> P {
        self.vertices[i].point.position
    }

    pub(crate) fn meta(&self, i: usize) -> &TcpMeta<P> {
        &self.vertices[i].tcp
    }

    /// `Ok(i)` if a vertex sits exactly at `time`, else `Err(insertion index)`.
    pub fn index_of(&self, time: f64) -> Result<usize, usize> {
        self.vertices
            .binary_search_by(|v| v.point.time.total_cmp(&time))
    }

    /// Vertex whose time is closest to `time`.
    pub fn nearest_index(&self, time: f64) -> Option<usize> {
        (0..self.len()).min_by(|&a, &b| {
            (self.t(a) - time)
                .abs()
                .total_cmp(&(self.t(b) - time).abs())
        })
    }

    /// Segment containing `time`: the vertex at `time` or the one before it.
    pub fn segment(&self, time: f64) -> Option<usize> {
        let (first, last) = (self.first_time()?, self.last_time()?);
        if !(first..=last).contains(&time) {
            return None;
        }
        match self.index_of(time) {
            Ok(i) => Some(i),
            Err(i) => Some(i.saturating_sub(1)),
        }
    }

    // ========== ZONE NAVIGATION ==========

    pub fn next_begin(&self, dim: Dimension, i: usize) -> Option<usize> {
        (i + 1..self.len()).find(|&j| self.meta(j).is_begin(dim))
    }

    pub fn prev_begin(&self, dim: Dimension, i: usize) -> Option<usize> {
        (0..i.min(self.len())).rev().find(|&j| self.meta(j).is_begin(dim))
    }

    pub fn next_end(&self, dim: Dimension, i: usize) -> Option<usize> {
        (i + 1..self.len()).find(|&j| self.meta(j).is_end(dim))
    }

    pub fn prev_end(&self, dim: Dimension, i: usize) -> Option<usize> {
        (0..i.min(self.len())).rev().find(|&j| self.meta(j).is_end(dim))
    }

    /// Nearest vertex strictly before `i` carrying any tag of `dim`.
    pub fn prev_tcp(&self, dim: Dimension, i: usize) -> Option<usize> {
        (0..i.min(self.len())).rev().find(|&j| self.meta(j).is_tcp_in(dim))
    }

    pub fn next_bot(&self, i: usize) -> Option<usize> {
        self.next_begin(Dimension::Trk, i)
    }

    pub fn prev_bot(&self, i: usize) -> Option<usize> {
        self.prev_begin(Dimension::Trk, i)
    }

    pub fn next_eot(&self, i: usize) -> Option<usize> {
        self.next_end(Dimension::Trk, i)
    }

    pub fn prev_eot(&self, i: usize) -> Option<usize> {
        self.prev_end(Dimension::Trk, i)
    }

    pub fn next_bgs(&self, i: usize) -> Option<usize> {
        self.next_begin(Dimension::Gs, i)
    }

    pub fn prev_bgs(&self, i: usize) -> Option<usize> {
        self.prev_begin(Dimension::Gs, i)
    }

    pub fn next_egs(&self, i: usize) -> Option<usize> {
        self.next_end(Dimension::Gs, i)
    }

    pub fn prev_egs(&self, i: usize) -> Option<usize> {
        self.prev_end(Dimension::Gs, i)
    }

    pub fn next_bvs(&self, i: usize) -> Option<usize> {
        self.next_begin(Dimension::Vs, i)
    }

    pub fn prev_bvs(&self, i: usize) -> Option<usize> {
        self.prev_begin(Dimension::Vs, i)
    }

    pub fn next_evs(&self, i: usize) -> Option<usize> {
        self.next_end(Dimension::Vs, i)
    }

    pub fn prev_evs(&self, i: usize) -> Option<usize> {
        self.prev_end(Dimension::Vs, i)
    }

    // ========== ZONE MEMBERSHIP ==========

    /// Begin vertex of the `dim` zone that segment `seg` lies in.
    pub fn owning_begin(&self, dim: Dimension, seg: usize) -> Option<usize> {
        let j = self.prev_tcp(dim, seg + 1)?;
        self.meta(j).is_begin(dim).then_some(j)
    }

    pub fn in_trk_accel(&self, seg: usize) -> bool {
        self.owning_begin(Dimension::Trk, seg).is_some()
    }

    pub fn in_gs_accel(&self, seg: usize) -> bool {
        self.owning_begin(Dimension::Gs, seg).is_some()
    }

    pub fn in_vs_accel(&self, seg: usize) -> bool {
        self.owning_begin(Dimension::Vs, seg).is_some()
    }

    pub fn in_trk_change(&self, time: f64) -> bool {
        self.segment(time).is_some_and(|s| self.in_trk_accel(s))
    }

    pub fn in_gs_change(&self, time: f64) -> bool {
        self.segment(time).is_some_and(|s| self.in_gs_accel(s))
    }

    pub fn in_vs_change(&self, time: f64) -> bool {
        self.segment(time).is_some_and(|s| self.in_vs_accel(s))
    }

    pub fn in_accel(&self, time: f64) -> bool {
        self.in_trk_change(time) || self.in_gs_change(time) || self.in_vs_change(time)
    }

    /// Ground-speed acceleration active on segment `seg`.
    pub fn gs_accel_at(&self, seg: usize) -> f64 {
        self.owning_begin(Dimension::Gs, seg)
            .map_or(0.0, |j| self.meta(j).gs_accel)
    }

    /// Vertical acceleration active on segment `seg`.
    pub fn vs_accel_at(&self, seg: usize) -> f64 {
        self.owning_begin(Dimension::Vs, seg)
            .map_or(0.0, |j| self.meta(j).vs_accel)
    }

    /// BOT governing vertex `i`: `i` itself if it opens a turn, else the BOT of the segment ending at `i`.
    fn owning_bot_of_vertex(&self, i: usize) -> Option<usize> {
        if i >= self.len() {
            return None;
        }
        if self.meta(i).is_bot() {
            return Some(i);
        }
        i.checked_sub(1)
            .and_then(|s| self.owning_begin(Dimension::Trk, s))
    }

    pub fn turn_center(&self, i: usize) -> Option<P> {
        self.owning_bot_of_vertex(i)
            .and_then(|j| self.meta(j).turn_center)
    }

    /// Signed radius of the turn governing vertex `i`.
    pub fn turn_radius(&self, i: usize) -> Option<f64> {
        self.owning_bot_of_vertex(i)
            .map(|j| self.meta(j).signed_radius)
    }

    /// Centre, radius and direction of the turn segment `seg` is flown on.
    pub(crate) fn turn_geometry(&self, seg: usize) -> Option<(P, f64, f64)> {
        let j = self.owning_begin(Dimension::Trk, seg)?;
        let meta = self.meta(j);
        let center = meta.turn_center?;
        let radius = if meta.signed_radius.abs() > 0.0 {
            meta.signed_radius.abs()
        } else {
            center.distance_h(&self.pos(j))
        };
        Some((center, radius, dir_of(meta.signed_radius)))
    }

    // ========== DERIVED QUANTITIES ==========

    /// Along-path length of segment `i`, honouring turn arcs.
    pub fn path_distance(&self, i: usize) -> f64 {
        if i + 1 >= self.len() {
            return 0.0;
        }
        let (p1, p2) = (self.pos(i), self.pos(i + 1));
        match self.turn_geometry(i) {
            Some((center, radius, dir)) => kinematics::arc_angle(&p1, &center, &p2, dir) * radius,
            None => p1.distance_h(&p2),
        }
    }

    /// Along-path length from vertex `i` to vertex `j`.
    pub fn path_distance_between(&self, i: usize, j: usize) -> f64 {
        (i..j.min(self.len())).map(|k| self.path_distance(k)).sum()
    }

    /// Total along-path length of the plan.
    pub fn total_path_distance(&self) -> f64 {
        self.path_distance_between(0, self.len())
    }

    fn last_seg(&self, i: usize) -> Option<usize> {
        (self.len() >= 2).then(|| i.min(self.len() - 2))
    }

    fn seg_dt(&self, i: usize) -> f64 {
        self.t(i + 1) - self.t(i)
    }

    /// Ground speed leaving vertex `i`.
    pub fn gs_out(&self, i: usize) -> f64 {
        if self.len() < 2 {
            return 0.0;
        }
        if i + 1 >= self.len() {
            return self.gs_final(i);
        }
        let dt = self.seg_dt(i);
        if dt <= 0.0 {
            return 0.0;
        }
        let a = self.gs_accel_at(i);
        (self.path_distance(i) / dt - 0.5 * a * dt).max(0.0)
    }

    /// Ground speed at the end of segment `i`.
    pub fn gs_final(&self, i: usize) -> f64 {
        let Some(i) = self.last_seg(i) else {
            return 0.0;
        };
        let dt = self.seg_dt(i);
        if dt <= 0.0 {
            return 0.0;
        }
        let a = self.gs_accel_at(i);
        (self.path_distance(i) / dt + 0.5 * a * dt).max(0.0)
    }

    /// Ground speed arriving at vertex `i`.
    pub fn gs_in(&self, i: usize) -> f64 {
        if i == 0 {
            self.gs_out(0)
        } else {
            self.gs_final(i - 1)
        }
    }

    pub fn vs_out(&self, i: usize) -> f64 {
        if self.len() < 2 {
            return 0.0;
        }
        if i + 1 >= self.len() {
            return self.vs_final(i);
        }
        let dt = self.seg_dt(i);
        if dt <= 0.0 {
            return 0.0;
        }
        let a = self.vs_accel_at(i);
        (self.pos(i + 1).alt() - self.pos(i).alt()) / dt - 0.5 * a * dt
    }

    pub fn vs_final(&self, i: usize) -> f64 {
        let Some(i) = self.last_seg(i) else {
            return 0.0;
        };
        let dt = self.seg_dt(i);
        if dt <= 0.0 {
            return 0.0;
        }
        let a = self.vs_accel_at(i);
        (self.pos(i + 1).alt() - self.pos(i).alt()) / dt + 0.5 * a * dt
    }

    pub fn vs_in(&self, i: usize) -> f64 {
        if i == 0 {
            self.vs_out(0)
        } else {
            self.vs_final(i - 1)
        }
    }

    /// Track leaving vertex `i`.
    pub fn trk_out(&self, i: usize) -> f64 {
        if self.len() < 2 {
            return 0.0;
        }
        if i + 1 >= self.len() {
            return self.trk_final(i);
        }
        if let Some((center, _, dir)) = self.turn_geometry(i) {
            return tangent_track(&self.pos(i), &center, dir);
        }
        let (p1, p2) = (self.pos(i), self.pos(i + 1));
        if p1.distance_h(&p2) > 1e-9 {
            p1.initial_course(&p2)
        } else if i > 0 {
            self.trk_final(i - 1)
        } else {
            0.0
        }
    }

    /// Track at the end of segment `i`.
    pub fn trk_final(&self, i: usize) -> f64 {
        let Some(i) = self.last_seg(i) else {
            return 0.0;
        };
        if let Some((center, _, dir)) = self.turn_geometry(i) {
            return tangent_track(&self.pos(i + 1), &center, dir);
        }
        let (p1, p2) = (self.pos(i), self.pos(i + 1));
        if p1.distance_h(&p2) > 1e-9 {
            p1.final_course(&p2)
        } else if i > 0 {
            self.trk_final(i - 1)
        } else {
            0.0
        }
    }

    pub fn trk_in(&self, i: usize) -> f64 {
        if i == 0 {
            self.trk_out(0)
        } else {
            self.trk_final(i - 1)
        }
    }

    pub fn initial_velocity(&self, i: usize) -> Velocity {
        Velocity::new(self.trk_out(i), self.gs_out(i), self.vs_out(i))
    }

    pub fn final_velocity(&self, i: usize) -> Velocity {
        Velocity::new(self.trk_final(i), self.gs_final(i), self.vs_final(i))
    }

    // ========== EVALUATION ==========

    /// Position and velocity on the flyable curve at `time`.
    pub fn position_velocity(&self, time: f64) -> Option<(P, Velocity)> {
        let seg = self.segment(time)?;
        if seg + 1 >= self.len() {
            let v = if self.len() >= 2 {
                self.final_velocity(self.len() - 2)
            } else {
                Velocity::ZERO
            };
            return Some((self.pos(seg), v));
        }
        let so = self.pos(seg);
        let dt = time - self.t(seg);
        let gs0 = self.gs_out(seg);
        let a = self.gs_accel_at(seg);
        let dist = distance_after(gs0, a, dt);
        let gs_at = (gs0 + a * dt).max(0.0);

        let (p, trk) = match self.turn_geometry(seg) {
            Some((center, _, dir)) => kinematics::turn_by_dist_2d(&so, &center, dir, dist),
            None => {
                let next = self.pos(seg + 1);
                let p = so.linear_dist_2d(self.trk_out(seg), dist);
                let trk = if p.distance_h(&next) > 1e-3 {
                    p.initial_course(&next)
                } else {
                    self.trk_final(seg)
                };
                (p, trk)
            }
        };

        let vs0 = self.vs_out(seg);
        let av = self.vs_accel_at(seg);
        let alt = so.alt() + distance_after(vs0, av, dt);
        Some((p.with_alt(alt), Velocity::new(trk, gs_at, vs0 + av * dt)))
    }

    pub fn position(&self, time: f64) -> Option<P> {
        self.position_velocity(time).map(|(p, _)| p)
    }

    pub fn velocity(&self, time: f64) -> Option<Velocity> {
        self.position_velocity(time).map(|(_, v)| v)
    }

    /// Time needed to fly `dist` metres from vertex `i` along its segment.
    pub fn time_from_distance(&self, i: usize, dist: f64) -> Option<f64> {
        kinematics::time_from_distance(self.gs_out(i), self.gs_accel_at(i), dist)
    }

    // ========== EDITING ==========

    /// Re-time vertex `i + 1` (and everything after it) so segment `i` is flown starting at `gs`.
    pub fn mk_gs_out(&mut self, i: usize, gs: f64) -> bool {
        if i + 1 >= self.len() {
            return false;
        }
        let d = self.path_distance(i);
        let a = self.gs_accel_at(i);
        let dt = if gs.abs() < 1e-13 && a <= 0.0 {
            if d.abs() < 1e-13 {
                self.diagnostics
                    .warn("mk_gs_out: zero ground speed on hover segment", Some(i));
                return true;
            }
            self.diagnostics.error(
                "mk_gs_out: zero ground speed on a segment of non-zero length",
                Some(i),
            );
            return false;
        } else {
            match kinematics::time_from_distance(gs, a, d) {
                Some(dt) => dt,
                None => {
                    self.diagnostics
                        .error(format!("mk_gs_out: cannot fly segment at {gs:.3} m/s"), Some(i));
                    return false;
                }
            }
        };
        if dt.abs() < 1e-13 {
            return true;
        }
        self.time_shift(i + 1, dt - self.seg_dt(i))
    }

    /// Re-time vertex `i` (and everything after it) so it is reached at ground speed `gs`.
    pub fn mk_gs_in(&mut self, i: usize, gs: f64) -> bool {
        if i == 0 || i >= self.len() {
            return false;
        }
        let d = self.path_distance(i - 1);
        let a = self.gs_accel_at(i - 1);
        let dt = if a.abs() < 1e-12 {
            (gs > 0.0).then(|| d / gs)
        } else {
            let disc = gs * gs - 2.0 * a * d;
            (disc >= 0.0).then(|| (gs - disc.sqrt()) / a)
        };
        match dt {
            Some(dt) if dt.is_finite() && dt > 0.0 => {
                let shift = dt - self.seg_dt(i - 1);
                self.time_shift(i, shift)
            }
            _ => {
                self.diagnostics
                    .warn(format!("mk_gs_in: could not make ground speed {gs:.3} m/s"), Some(i));
                false
            }
        }
    }

    /// Shift every vertex at or after `from` by `dt` seconds.
    ///
    /// Vertices whose new time would be negative or not strictly after their
    /// predecessor are dropped. Returns `false` only for a non-finite `dt`.
    pub fn time_shift(&mut self, from: usize, dt: f64) -> bool {
        if !dt.is_finite() {
            return false;
        }
        if from >= self.len() || dt == 0.0 {
            return true;
        }
        if dt > 0.0 {
            for i in (from..self.len()).rev() {
                let t = self.t(i) + dt;
                self.set_time(i, t);
            }
            return true;
        }
        let mut dropped = 0usize;
        let mut i = from;
        while i < self.len() {
            let t = self.t(i) + dt;
            let after_prev = i == 0 || t > self.t(i - 1);
            if t >= 0.0 && after_prev {
                self.set_time(i, t);
                i += 1;
            } else {
                self.vertices.remove(i);
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.diagnostics.warn(
                format!("time_shift: dropped {dropped} vertices that fell out of order"),
                Some(from),
            );
        }
        true
    }

    /// Remove vertex `i` if it carries no structure and the selected velocity
    /// components pass through it unchanged. First and last vertices are kept.
    pub fn remove_if_redundant(&mut self, i: usize, flags: Redundancy) -> bool {
        if i == 0 || i + 1 >= self.len() {
            return false;
        }
        let meta = self.meta(i);
        if meta.is_tcp() || meta.is_alt_preserve() || !meta.info.is_empty() {
            return false;
        }
        let vin = self.final_velocity(i - 1);
        let vout = self.initial_velocity(i);
        let trk_ok = turn_delta(vin.trk, vout.trk).abs() <= REDUNDANT_TRK_DEG.to_radians();
        let gs_ok = (vin.gs - vout.gs).abs() <= from_kn(REDUNDANT_GS_KN);
        let vs_ok = (vin.vs - vout.vs).abs() <= from_fpm(REDUNDANT_VS_FPM);
        if (!flags.trk || trk_ok) && (!flags.gs || gs_ok) && (!flags.vs || vs_ok) {
            self.vertices.remove(i);
            true
        } else {
            false
        }
    }

    /// Remove redundant vertices in `[from, to]`, never the first or last vertex.
    pub fn remove_redundant_points(&mut self, from: usize, to: usize) {
        if self.len() < 3 {
            return;
        }
        let last = to.min(self.len() - 2);
        for i in (from.max(1)..=last).rev() {
            self.remove_if_redundant(i, Redundancy::TRK_GS);
        }
    }

    /// Collapse consecutive vertices closer than `min_dt` seconds, merging their metadata.
    pub fn merge_close_points(&mut self, min_dt: f64) {
        if min_dt <= 0.0 || self.len() < 2 {
            return;
        }
        for i in (0..self.len() - 1).rev() {
            if i + 1 >= self.len() || self.t(i + 1) - self.t(i) >= min_dt {
                continue;
            }
            let mut a = self.meta(i).clone();
            let mut b = self.meta(i + 1).clone();
            for dim in Dimension::ALL {
                if a.is_begin(dim) && b.is_end(dim) {
                    a.clear_begin(dim);
                    b.clear_end(dim);
                }
            }
            let merged = match a.merge(&b) {
                Ok(m) => m,
                Err(err) => {
                    self.diagnostics
                        .warn(format!("merge_close_points: {err}"), Some(i));
                    continue;
                }
            };
            let delete = if i == 0 {
                1
            } else if !a.is_begin_tcp() && b.is_begin_tcp() {
                i
            } else {
                i + 1
            };
            self.vertices.remove(delete);
            self.vertices[i].tcp = merged;
        }
    }

    /// Drop End tags at the first vertex and Begin tags at the last.
    pub fn repair_ends(&mut self) {
        if self.is_empty() {
            return;
        }
        let first = self.tcp_mut(0);
        first.clear_eot();
        first.clear_egs();
        first.clear_evs();
        if self.len() > 1 {
            let last = self.len() - 1;
            let meta = self.tcp_mut(last);
            meta.clear_bot();
            meta.clear_bgs();
            meta.clear_bvs();
        }
    }

    /// Merge near-coincident vertices and mark every vertex as Original.
    pub fn clean(&mut self, min_dt: f64) {
        self.merge_close_points(min_dt);
        for v in &mut self.vertices {
            v.tcp.set_original();
        }
    }

    /// Structural validity: at least two vertices, strictly increasing
    /// time, and properly bracketed zones in every dimension.
    pub fn well_formed(&self) -> Result<(), WellFormedError> {
        if self.len() < 2 {
            return Err(WellFormedError::TooFewPoints(self.len()));
        }
        if let Some(i) = (1..self.len()).find(|&i| self.t(i) <= self.t(i - 1)) {
            return Err(WellFormedError::NonIncreasingTime { index: i });
        }
        for dim in Dimension::ALL {
            let mut open: Option<usize> = None;
            for (i, v) in self.vertices.iter().enumerate() {
                if v.tcp.is_end(dim) {
                    if open.take().is_none() {
                        return Err(WellFormedError::UnmatchedEnd { dimension: dim, index: i });
                    }
                }
                if v.tcp.is_begin(dim) {
                    if let Some(b) = open {
                        return Err(WellFormedError::UnmatchedBegin { dimension: dim, index: b });
                    }
                    open = Some(i);
                }
            }
            if let Some(b) = open {
                return Err(WellFormedError::UnmatchedBegin { dimension: dim, index: b });
            }
        }
        Ok(())
    }

    pub fn is_well_formed(&self) -> bool {
        self.well_formed().is_ok()
    }
}

impl<P: Coordinate> fmt::Display for Plan<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan {} ({} points)", self.name, self.len())?;
        for (i, v) in self.vertices.iter().enumerate() {
            let c = v.point.position.components();
            writeln!(
                f,
                "{i:>3} t={:>10.3} [{:.6}, {:.6}, {:.2}] {}",
                v.point.time,
                c[0],
                c[1],
                c[2],
                crate::label::encode(&v.tcp)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Xyz;
    use crate::kinematics::center_from_radius;
    use std::f64::consts::FRAC_PI_2;

    fn straight() -> Plan<Xyz> {
        Plan::linear(
            "straight",
            [
                (Xyz::new(0.0, 0.0, 1000.0), 0.0),
                (Xyz::new(0.0, 1000.0, 1100.0), 10.0),
                (Xyz::new(1000.0, 1000.0, 1100.0), 30.0),
            ],
        )
        .unwrap()
    }

    /// Quarter right turn of radius 1000 m flown at 100 m/s.
    fn quarter_turn() -> Plan<Xyz> {
        let r = 1000.0;
        let bot = Xyz::new(0.0, 0.0, 0.0);
        let center = center_from_radius(&bot, r, 0.0);
        let arc_t = r * FRAC_PI_2 / 100.0;
        let mut plan = Plan::new("turn");
        plan.add_point(Xyz::new(0.0, -1000.0, 0.0), 0.0).unwrap();
        let mut m = TcpMeta::new();
        m.set_bot(r, center);
        plan.add(Waypoint::new(bot, 10.0), m).unwrap();
        let mut m = TcpMeta::new();
        m.set_eot();
        plan.add(Waypoint::new(Xyz::new(1000.0, 1000.0, 0.0), 10.0 + arc_t), m)
            .unwrap();
        plan.add_point(Xyz::new(2000.0, 1000.0, 0.0), 20.0 + arc_t).unwrap();
        plan
    }

    #[test]
    fn test_add_keeps_time_order() {
        let mut plan = straight();
        let ix = plan.add_point(Xyz::new(0.0, 500.0, 1050.0), 5.0).unwrap();
        assert_eq!(ix, 1);
        assert_eq!(plan.len(), 4);
        assert!(plan.is_well_formed());
    }

    #[test]
    fn test_add_rejects_negative_time() {
        let mut plan = straight();
        assert_eq!(
            plan.add_point(Xyz::default(), -1.0),
            Err(PlanError::InvalidTime(-1.0))
        );
        assert!(plan.diagnostics().has_error());
    }

    #[test]
    fn test_add_at_equal_time_merges_or_conflicts() {
        let mut plan = straight();
        let mut bgs = TcpMeta::new();
        bgs.set_bgs(1.0);
        assert_eq!(plan.add(Waypoint::new(Xyz::default(), 10.0), bgs.clone()), Ok(1));
        assert_eq!(plan.len(), 3);
        assert!(plan.meta(1).is_bgs());
        // position of the existing vertex is kept
        assert_eq!(plan.pos(1), Xyz::new(0.0, 1000.0, 1100.0));
        assert!(matches!(
            plan.add(Waypoint::new(Xyz::default(), 10.0), bgs),
            Err(PlanError::MergeConflict { index: Some(1), .. })
        ));
    }

    #[test]
    fn test_virtual_is_overwritten() {
        let mut plan = straight();
        plan.add(Waypoint::new(Xyz::new(0.0, 500.0, 0.0), 5.0), TcpMeta::virtual_point())
            .unwrap();
        plan.add(Waypoint::new(Xyz::new(1.0, 500.0, 0.0), 5.0), TcpMeta::new())
            .unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.pos(1).x, 1.0);
        assert!(!plan.meta(1).is_virtual());
    }

    #[test]
    fn test_segment_lookup() {
        let plan = straight();
        assert_eq!(plan.segment(-0.1), None);
        assert_eq!(plan.segment(0.0), Some(0));
        assert_eq!(plan.segment(5.0), Some(0));
        assert_eq!(plan.segment(10.0), Some(1));
        assert_eq!(plan.segment(30.0), Some(2));
        assert_eq!(plan.segment(30.1), None);
    }

    #[test]
    fn test_linear_speeds() {
        let plan = straight();
        assert!((plan.gs_out(0) - 100.0).abs() < 1e-9);
        assert!((plan.gs_out(1) - 50.0).abs() < 1e-9);
        assert!((plan.gs_in(1) - 100.0).abs() < 1e-9);
        assert!((plan.vs_out(0) - 10.0).abs() < 1e-9);
        assert!(plan.vs_out(1).abs() < 1e-9);
        assert!((plan.trk_out(1) - FRAC_PI_2).abs() < 1e-9);
        // last vertex reports the final segment
        assert!((plan.gs_out(2) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_position_velocity_linear() {
        let plan = straight();
        let (p, v) = plan.position_velocity(5.0).unwrap();
        assert!((p.y - 500.0).abs() < 1e-9 && p.x.abs() < 1e-9);
        assert!((p.z - 1050.0).abs() < 1e-9);
        assert!((v.gs - 100.0).abs() < 1e-9);
        assert!(plan.position(31.0).is_none());
    }

    #[test]
    fn test_turn_path_distance_and_midpoint() {
        let plan = quarter_turn();
        let arc = 1000.0 * FRAC_PI_2;
        assert!((plan.path_distance(1) - arc).abs() < 1e-6);
        assert!((plan.gs_out(1) - 100.0).abs() < 1e-6);
        assert!(plan.in_trk_accel(1));
        assert!(!plan.in_trk_accel(2));

        let t_mid = 10.0 + arc / 200.0;
        let (p, v) = plan.position_velocity(t_mid).unwrap();
        let center = plan.turn_center(1).unwrap();
        assert!((p.distance_h(&center) - 1000.0).abs() < 1e-6);
        assert!((v.trk - FRAC_PI_2 / 2.0).abs() < 1e-6, "mid-turn track {}", v.trk);
        assert!((plan.trk_final(1) - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_zone_navigation() {
        let plan = quarter_turn();
        assert_eq!(plan.next_bot(0), Some(1));
        assert_eq!(plan.next_eot(1), Some(2));
        assert_eq!(plan.prev_bot(2), Some(1));
        assert_eq!(plan.prev_bot(1), None);
        assert_eq!(plan.next_bgs(0), None);
        assert_eq!(plan.turn_radius(2), Some(1000.0));
        assert!(plan.in_trk_change(12.0));
        assert!(!plan.in_trk_change(5.0));
    }

    #[test]
    fn test_gs_accel_segment() {
        let mut plan = Plan::new("accel");
        let mut bgs = TcpMeta::new();
        bgs.set_bgs(2.0);
        plan.add(Waypoint::new(Xyz::new(0.0, 0.0, 0.0), 0.0), bgs).unwrap();
        let mut egs = TcpMeta::new();
        egs.set_egs();
        // 50 m/s for 10 s at 2 m/s^2 covers 600 m
        plan.add(Waypoint::new(Xyz::new(0.0, 600.0, 0.0), 10.0), egs).unwrap();
        plan.add_point(Xyz::new(0.0, 1300.0, 0.0), 20.0).unwrap();
        assert!((plan.gs_out(0) - 50.0).abs() < 1e-9);
        assert!((plan.gs_final(0) - 70.0).abs() < 1e-9);
        assert!((plan.gs_out(1) - 70.0).abs() < 1e-9);
        let (p, v) = plan.position_velocity(5.0).unwrap();
        assert!((p.y - 275.0).abs() < 1e-9);
        assert!((v.gs - 60.0).abs() < 1e-9);
        assert!((plan.time_from_distance(0, 275.0).unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_shift_drops_out_of_order() {
        let mut plan = straight();
        assert!(plan.time_shift(1, -12.0));
        // vertex 1 would land at -2 s, vertex 2 at 18 s
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.t(1), 18.0);
        assert!(plan.diagnostics().has_message());
        assert!(!plan.time_shift(0, f64::NAN));
    }

    #[test]
    fn test_mk_gs_out_retimes_downstream() {
        let mut plan = straight();
        assert!(plan.mk_gs_out(0, 50.0));
        assert!((plan.t(1) - 20.0).abs() < 1e-9);
        assert!((plan.t(2) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_if_redundant() {
        let mut plan = straight();
        plan.add_point(Xyz::new(0.0, 500.0, 1050.0), 5.0).unwrap();
        assert!(plan.remove_if_redundant(1, Redundancy::TRK_GS));
        assert_eq!(plan.len(), 3);
        // the corner is not redundant
        assert!(!plan.remove_if_redundant(1, Redundancy::TRK_GS));
    }

    #[test]
    fn test_well_formed_detects_open_zone() {
        let mut plan = straight();
        plan.tcp_mut(1).set_bgs(1.0);
        assert_eq!(
            plan.well_formed(),
            Err(WellFormedError::UnmatchedBegin { dimension: Dimension::Gs, index: 1 })
        );
        plan.tcp_mut(2).set_egs();
        assert!(plan.is_well_formed());
    }

    #[test]
    fn test_merge_close_points() {
        let mut plan = straight();
        plan.add_point(Xyz::new(0.0, 1000.0, 1100.0), 10.000001).unwrap();
        assert_eq!(plan.len(), 4);
        plan.merge_close_points(1e-5);
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_plan_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Plan<Xyz>>();
        assert_send_sync::<Plan<crate::geometry::LatLonAlt>>();
    }
}
