//! Per-vertex trajectory-change-point (TCP) metadata and its tag algebra.

use crate::error::PlanError;
use crate::geometry::Coordinate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One of the three independent acceleration dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Trk,
    Gs,
    Vs,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Trk, Dimension::Gs, Dimension::Vs];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dimension::Trk => "turn",
            Dimension::Gs => "ground-speed",
            Dimension::Vs => "vertical-speed",
        })
    }
}

macro_rules! zone_tag {
    ($(#[$doc:meta])* $name:ident {
        $begin:ident = $b:literal,
        $end:ident = $e:literal,
        $both:ident = $eb:literal $(,)?
    }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            None,
            $begin,
            $end,
            /// A zone ends and the next one begins at the same vertex.
            $both,
        }

        impl $name {
            pub const ALL: [$name; 4] = [$name::None, $name::$begin, $name::$end, $name::$both];

            pub fn is_begin(self) -> bool {
                matches!(self, $name::$begin | $name::$both)
            }

            pub fn is_end(self) -> bool {
                matches!(self, $name::$end | $name::$both)
            }

            pub fn is_none(self) -> bool {
                self == $name::None
            }

            pub fn with_begin(self) -> Self {
                if self.is_end() { $name::$both } else { $name::$begin }
            }

            pub fn with_end(self) -> Self {
                if self.is_begin() { $name::$both } else { $name::$end }
            }

            pub fn clear_begin(self) -> Self {
                match self {
                    $name::$begin => $name::None,
                    $name::$both => $name::$end,
                    other => other,
                }
            }

            pub fn clear_end(self) -> Self {
                match self {
                    $name::$end => $name::None,
                    $name::$both => $name::$begin,
                    other => other,
                }
            }

            pub fn mergeable(self, other: Self) -> bool {
                !(self.is_begin() && other.is_begin()) && !(self.is_end() && other.is_end())
            }

            /// Combine the tags of two vertices collapsing into one; `None` if not mergeable.
            pub fn merge(self, other: Self) -> Option<Self> {
                if !self.mergeable(other) {
                    return None;
                }
                Some(match (self, other) {
                    ($name::$begin, $name::$end) | ($name::$end, $name::$begin) => $name::$both,
                    ($name::None, x) | (x, $name::None) => x,
                    (x, _) => x,
                })
            }

            pub fn label(self) -> &'static str {
                match self {
                    $name::None => "",
                    $name::$begin => $b,
                    $name::$end => $e,
                    $name::$both => $eb,
                }
            }

            pub fn from_label(s: &str) -> Option<Self> {
                match s {
                    $b => Some($name::$begin),
                    $e => Some($name::$end),
                    $eb => Some($name::$both),
                    _ => None,
                }
            }
        }
    };
}

zone_tag! {
    /// Turn role of a vertex.
    TrkTag { Bot = "BOT", Eot = "EOT", EotBot = "EOTBOT" }
}

zone_tag! {
    /// Ground-speed acceleration role of a vertex.
    GsTag { Bgs = "BGS", Egs = "EGS", EgsBgs = "EGSBGS" }
}

zone_tag! {
    /// Vertical-speed acceleration role of a vertex.
    VsTag { Bvs = "BVS", Evs = "EVS", EvsBvs = "EVSBVS" }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WayKind {
    #[default]
    Original,
    /// Fidelity-only point; may be overwritten or dropped.
    Virtual,
    /// Vertex whose altitude must survive vertical regeneration.
    AltitudePreserve,
}

/// Back-reference to the linear vertex a kinematic point was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Source<P> {
    pub position: P,
    pub time: f64,
}

/// TCP state attached to one plan vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpMeta<P> {
    pub kind: WayKind,
    pub trk: TrkTag,
    pub gs: GsTag,
    pub vs: VsTag,
    /// Positive for right turns, negative for left, zero when unset.
    pub signed_radius: f64,
    pub turn_center: Option<P>,
    pub gs_accel: f64,
    pub vs_accel: f64,
    /// `None` means the point was added with no linear ancestor.
    pub source: Option<Source<P>>,
    pub linear_index: Option<usize>,
    pub info: String,
}

impl<P> Default for TcpMeta<P> {
    fn default() -> Self {
        Self {
            kind: WayKind::Original,
            trk: TrkTag::None,
            gs: GsTag::None,
            vs: VsTag::None,
            signed_radius: 0.0,
            turn_center: None,
            gs_accel: 0.0,
            vs_accel: 0.0,
            source: None,
            linear_index: None,
            info: String::new(),
        }
    }
}

impl<P: Coordinate> TcpMeta<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn virtual_point() -> Self {
        Self {
            kind: WayKind::Virtual,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, position: P, time: f64) -> Self {
        self.source = Some(Source { position, time });
        self
    }

    pub fn with_linear_index(mut self, ix: usize) -> Self {
        self.linear_index = Some(ix);
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    // ---- predicates ----

    pub fn is_begin(&self, dim: Dimension) -> bool {
        match dim {
            Dimension::Trk => self.trk.is_begin(),
            Dimension::Gs => self.gs.is_begin(),
            Dimension::Vs => self.vs.is_begin(),
        }
    }

    pub fn is_end(&self, dim: Dimension) -> bool {
        match dim {
            Dimension::Trk => self.trk.is_end(),
            Dimension::Gs => self.gs.is_end(),
            Dimension::Vs => self.vs.is_end(),
        }
    }

    pub fn is_tcp_in(&self, dim: Dimension) -> bool {
        self.is_begin(dim) || self.is_end(dim)
    }

    pub fn is_bot(&self) -> bool {
        self.trk.is_begin()
    }

    pub fn is_eot(&self) -> bool {
        self.trk.is_end()
    }

    pub fn is_bgs(&self) -> bool {
        self.gs.is_begin()
    }

    pub fn is_egs(&self) -> bool {
        self.gs.is_end()
    }

    pub fn is_bvs(&self) -> bool {
        self.vs.is_begin()
    }

    pub fn is_evs(&self) -> bool {
        self.vs.is_end()
    }

    pub fn is_trk_tcp(&self) -> bool {
        !self.trk.is_none()
    }

    pub fn is_gs_tcp(&self) -> bool {
        !self.gs.is_none()
    }

    pub fn is_vs_tcp(&self) -> bool {
        !self.vs.is_none()
    }

    pub fn is_tcp(&self) -> bool {
        self.is_trk_tcp() || self.is_gs_tcp() || self.is_vs_tcp()
    }

    pub fn is_begin_tcp(&self) -> bool {
        self.is_bot() || self.is_bgs() || self.is_bvs()
    }

    pub fn is_end_tcp(&self) -> bool {
        self.is_eot() || self.is_egs() || self.is_evs()
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == WayKind::Virtual
    }

    pub fn is_alt_preserve(&self) -> bool {
        self.kind == WayKind::AltitudePreserve
    }

    // ---- setters ----

    pub fn set_bot(&mut self, signed_radius: f64, center: P) {
        self.trk = self.trk.with_begin();
        self.signed_radius = signed_radius;
        self.turn_center = Some(center);
    }

    pub fn set_eot(&mut self) {
        self.trk = self.trk.with_end();
    }

    pub fn set_bgs(&mut self, accel: f64) {
        self.gs = self.gs.with_begin();
        self.gs_accel = accel;
    }

    pub fn set_egs(&mut self) {
        self.gs = self.gs.with_end();
    }

    pub fn set_bvs(&mut self, accel: f64) {
        self.vs = self.vs.with_begin();
        self.vs_accel = accel;
    }

    pub fn set_evs(&mut self) {
        self.vs = self.vs.with_end();
    }

    pub fn set_end(&mut self, dim: Dimension) {
        match dim {
            Dimension::Trk => self.set_eot(),
            Dimension::Gs => self.set_egs(),
            Dimension::Vs => self.set_evs(),
        }
    }

    pub fn clear_bot(&mut self) {
        self.trk = self.trk.clear_begin();
        self.signed_radius = 0.0;
        self.turn_center = None;
    }

    pub fn clear_eot(&mut self) {
        self.trk = self.trk.clear_end();
    }

    pub fn clear_bgs(&mut self) {
        self.gs = self.gs.clear_begin();
        self.gs_accel = 0.0;
    }

    pub fn clear_egs(&mut self) {
        self.gs = self.gs.clear_end();
    }

    pub fn clear_bvs(&mut self) {
        self.vs = self.vs.clear_begin();
        self.vs_accel = 0.0;
    }

    pub fn clear_evs(&mut self) {
        self.vs = self.vs.clear_end();
    }

    pub fn clear_begin(&mut self, dim: Dimension) {
        match dim {
            Dimension::Trk => self.clear_bot(),
            Dimension::Gs => self.clear_bgs(),
            Dimension::Vs => self.clear_bvs(),
        }
    }

    pub fn clear_end(&mut self, dim: Dimension) {
        match dim {
            Dimension::Trk => self.clear_eot(),
            Dimension::Gs => self.clear_egs(),
            Dimension::Vs => self.clear_evs(),
        }
    }

    pub fn set_virtual(&mut self) {
        self.kind = WayKind::Virtual;
    }

    pub fn set_alt_preserve(&mut self) {
        self.kind = WayKind::AltitudePreserve;
    }

    pub fn set_original(&mut self) {
        self.kind = WayKind::Original;
    }

    /// Drop every tag, acceleration and note; provenance is kept.
    pub fn reset(&mut self) {
        *self = Self {
            source: self.source,
            linear_index: self.linear_index,
            ..Self::default()
        };
    }

    // ---- merging ----

    pub fn mergeable(&self, other: &Self) -> bool {
        self.trk.mergeable(other.trk) && self.gs.mergeable(other.gs) && self.vs.mergeable(other.vs)
    }

    /// Commutative combination of two metas collapsing onto one vertex.
    ///
    /// A Begin side is authoritative for the zone it opens: radius, centre and
    /// accelerations come from it. Fails when both sides open (or both close)
    /// a zone of the same dimension.
    pub fn merge(&self, other: &Self) -> Result<Self, PlanError> {
        let conflict = |dimension, a_begin: bool| PlanError::MergeConflict {
            dimension,
            role: if a_begin { "begin" } else { "end" },
            index: None,
        };
        let trk = self
            .trk
            .merge(other.trk)
            .ok_or_else(|| conflict(Dimension::Trk, self.trk.is_begin() && other.trk.is_begin()))?;
        let gs = self
            .gs
            .merge(other.gs)
            .ok_or_else(|| conflict(Dimension::Gs, self.gs.is_begin() && other.gs.is_begin()))?;
        let vs = self
            .vs
            .merge(other.vs)
            .ok_or_else(|| conflict(Dimension::Vs, self.vs.is_begin() && other.vs.is_begin()))?;

        let kind = match (self.kind, other.kind) {
            (WayKind::AltitudePreserve, _) | (_, WayKind::AltitudePreserve) => {
                WayKind::AltitudePreserve
            }
            (WayKind::Original, _) | (_, WayKind::Original) => WayKind::Original,
            _ => WayKind::Virtual,
        };

        let (signed_radius, turn_center) = if self.is_bot() {
            (self.signed_radius, self.turn_center)
        } else if other.is_bot() {
            (other.signed_radius, other.turn_center)
        } else {
            (0.0, None)
        };
        let gs_accel = begin_value(self.is_bgs(), self.gs_accel, other.is_bgs(), other.gs_accel);
        let vs_accel = begin_value(self.is_bvs(), self.vs_accel, other.is_bvs(), other.vs_accel);

        let (source, linear_index) = match (self.is_begin_tcp(), other.is_begin_tcp()) {
            (true, false) => (self.source, self.linear_index),
            (false, true) => (other.source, other.linear_index),
            _ => (
                earlier_source(self.source, other.source),
                match (self.linear_index, other.linear_index) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                },
            ),
        };

        let mut infos = [self.info.as_str(), other.info.as_str()];
        infos.sort_unstable();
        let info = infos.iter().filter(|s| !s.is_empty()).copied().collect::<String>();

        Ok(Self {
            kind,
            trk,
            gs,
            vs,
            signed_radius,
            turn_center,
            gs_accel,
            vs_accel,
            source,
            linear_index,
            info,
        })
    }
}

fn begin_value(a_begin: bool, a: f64, b_begin: bool, b: f64) -> f64 {
    if a_begin {
        a
    } else if b_begin {
        b
    } else {
        0.0
    }
}

fn earlier_source<P: Coordinate>(a: Option<Source<P>>, b: Option<Source<P>>) -> Option<Source<P>> {
    match (a, b) {
        (Some(x), Some(y)) => {
            let key = |s: &Source<P>| {
                let c = s.position.components();
                [s.time, c[0], c[1], c[2]]
            };
            let ord = key(&x)
                .iter()
                .zip(key(&y).iter())
                .map(|(p, q)| p.total_cmp(q))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal);
            Some(if ord == Ordering::Greater { y } else { x })
        }
        (x, y) => x.or(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Xyz;

    fn meta(trk: TrkTag, gs: GsTag, vs: VsTag) -> TcpMeta<Xyz> {
        let mut m = TcpMeta::new();
        m.trk = trk;
        m.gs = gs;
        m.vs = vs;
        if trk.is_begin() {
            m.signed_radius = 1500.0;
            m.turn_center = Some(Xyz::new(1.0, 2.0, 0.0));
        }
        if gs.is_begin() {
            m.gs_accel = 1.5;
        }
        if vs.is_begin() {
            m.vs_accel = -0.8;
        }
        m
    }

    #[test]
    fn test_fused_tag_is_both_begin_and_end() {
        assert!(TrkTag::EotBot.is_begin() && TrkTag::EotBot.is_end());
        assert_eq!(TrkTag::EotBot.clear_begin(), TrkTag::Eot);
        assert_eq!(TrkTag::EotBot.clear_end(), TrkTag::Bot);
        assert_eq!(GsTag::Bgs.clear_begin(), GsTag::None);
        assert_eq!(VsTag::Evs.with_begin(), VsTag::EvsBvs);
    }

    #[test]
    fn test_begin_end_merge_fuses() {
        let a = meta(TrkTag::Eot, GsTag::None, VsTag::None);
        let b = meta(TrkTag::Bot, GsTag::Bgs, VsTag::None);
        let m = a.merge(&b).unwrap();
        assert_eq!(m.trk, TrkTag::EotBot);
        assert_eq!(m.gs, GsTag::Bgs);
        assert_eq!(m.signed_radius, 1500.0);
        assert_eq!(m.gs_accel, 1.5);
    }

    #[test]
    fn test_double_begin_is_conflict() {
        let a = meta(TrkTag::None, GsTag::Bgs, VsTag::None);
        let b = meta(TrkTag::Eot, GsTag::EgsBgs, VsTag::None);
        assert!(!a.mergeable(&b));
        match a.merge(&b) {
            Err(PlanError::MergeConflict { dimension, role, .. }) => {
                assert_eq!(dimension, Dimension::Gs);
                assert_eq!(role, "begin");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_kind_merge_priority() {
        let mut a = TcpMeta::<Xyz>::virtual_point();
        let mut b = TcpMeta::<Xyz>::virtual_point();
        assert_eq!(a.merge(&b).unwrap().kind, WayKind::Virtual);
        b.set_original();
        assert_eq!(a.merge(&b).unwrap().kind, WayKind::Original);
        a.set_alt_preserve();
        assert_eq!(a.merge(&b).unwrap().kind, WayKind::AltitudePreserve);
    }

    #[test]
    fn test_reset_keeps_provenance() {
        let mut m = meta(TrkTag::Bot, GsTag::Egs, VsTag::Bvs)
            .with_source(Xyz::new(5.0, 6.0, 7.0), 42.0)
            .with_linear_index(3)
            .with_info("tod");
        m.reset();
        assert!(!m.is_tcp());
        assert_eq!(m.signed_radius, 0.0);
        assert_eq!(m.info, "");
        assert_eq!(m.source.map(|s| s.time), Some(42.0));
        assert_eq!(m.linear_index, Some(3));
    }

    #[test]
    fn test_provenance_from_begin_side() {
        let end = meta(TrkTag::Eot, GsTag::None, VsTag::None).with_source(Xyz::default(), 10.0);
        let begin =
            meta(TrkTag::Bot, GsTag::None, VsTag::None).with_source(Xyz::new(9.0, 9.0, 0.0), 20.0);
        let m = end.merge(&begin).unwrap();
        assert_eq!(m.source.map(|s| s.time), Some(20.0));
    }
}
