//! Positions, velocities and waypoints in Euclidean or geodetic frames.
//!
//! The trajectory core never branches on the coordinate frame itself; every
//! frame-dependent formula lives behind the [`Coordinate`] trait.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt::Debug;

/// Mean earth radius used by the spherical formulas.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Frame-dependent geometry consumed by the trajectory core.
///
/// Courses are compass angles in radians (0 = north, clockwise) normalised to
/// `[0, 2π)`. Distances are horizontal metres.
pub trait Coordinate: Copy + Debug + PartialEq {
    fn alt(&self) -> f64;
    fn with_alt(&self, alt: f64) -> Self;
    fn is_finite(&self) -> bool;
    /// Horizontal distance in metres.
    fn distance_h(&self, other: &Self) -> f64;
    /// Course at `self` when travelling towards `other`.
    fn initial_course(&self, other: &Self) -> f64;
    /// Course on arrival at `other` when travelling from `self`.
    fn final_course(&self, other: &Self) -> f64;
    /// Move `dist` metres along `track`, keeping the altitude.
    fn linear_dist_2d(&self, track: f64, dist: f64) -> Self;
    /// Point at `fraction` of the way from `self` to `other`; altitude is linear.
    fn interpolate(&self, other: &Self, fraction: f64) -> Self;
    /// Signed distance from `self` to the path `start -> end`, positive to the right.
    fn cross_track_distance(&self, start: &Self, end: &Self) -> f64;
    fn components(&self) -> [f64; 3];
    fn from_components(c: [f64; 3]) -> Self;

    fn distance_v(&self, other: &Self) -> f64 {
        (self.alt() - other.alt()).abs()
    }
}

/// Normalise an angle to `[0, 2π)`.
pub fn to_2pi(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a >= TAU {
        0.0
    } else {
        a
    }
}

// ========== EUCLIDEAN ==========

/// Euclidean position in metres: x east, y north, z up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Xyz {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Coordinate for Xyz {
    fn alt(&self) -> f64 {
        self.z
    }

    fn with_alt(&self, alt: f64) -> Self {
        Self { z: alt, ..*self }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn distance_h(&self, other: &Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    fn initial_course(&self, other: &Self) -> f64 {
        to_2pi((other.x - self.x).atan2(other.y - self.y))
    }

    fn final_course(&self, other: &Self) -> f64 {
        self.initial_course(other)
    }

    fn linear_dist_2d(&self, track: f64, dist: f64) -> Self {
        Self {
            x: self.x + dist * track.sin(),
            y: self.y + dist * track.cos(),
            z: self.z,
        }
    }

    fn interpolate(&self, other: &Self, fraction: f64) -> Self {
        Self {
            x: self.x + (other.x - self.x) * fraction,
            y: self.y + (other.y - self.y) * fraction,
            z: self.z + (other.z - self.z) * fraction,
        }
    }

    fn cross_track_distance(&self, start: &Self, end: &Self) -> f64 {
        let len = start.distance_h(end);
        if len <= f64::EPSILON {
            return start.distance_h(self);
        }
        let ux = (end.x - start.x) / len;
        let uy = (end.y - start.y) / len;
        let wx = self.x - start.x;
        let wy = self.y - start.y;
        uy * wx - ux * wy
    }

    fn components(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn from_components(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

// ========== GEODETIC ==========

/// Geodetic position: latitude/longitude in decimal degrees, altitude in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLonAlt {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl LatLonAlt {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }

    fn radians(&self) -> (f64, f64) {
        (self.lat.to_radians(), self.lon.to_radians())
    }

    /// Great-circle angle to `other` in radians.
    fn central_angle(&self, other: &Self) -> f64 {
        let ((phi1, lam1), (phi2, lam2)) = (self.radians(), other.radians());
        let half_dphi = (0.5 * (phi2 - phi1)).sin();
        let half_dlam = (0.5 * (lam2 - lam1)).sin();
        let h = half_dphi * half_dphi + phi1.cos() * phi2.cos() * half_dlam * half_dlam;
        2.0 * h.sqrt().min(1.0).asin()
    }

    /// Course towards `other` in `(-π, π]`.
    fn course_to(&self, other: &Self) -> f64 {
        let ((phi1, lam1), (phi2, lam2)) = (self.radians(), other.radians());
        let dlam = lam2 - lam1;
        let east = dlam.sin() * phi2.cos();
        let north = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlam.cos();
        east.atan2(north)
    }
}

impl Coordinate for LatLonAlt {
    fn alt(&self) -> f64 {
        self.alt
    }

    fn with_alt(&self, alt: f64) -> Self {
        Self { alt, ..*self }
    }

    fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.alt.is_finite()
    }

    fn distance_h(&self, other: &Self) -> f64 {
        self.central_angle(other) * EARTH_RADIUS_M
    }

    fn initial_course(&self, other: &Self) -> f64 {
        to_2pi(self.course_to(other))
    }

    fn final_course(&self, other: &Self) -> f64 {
        to_2pi(other.course_to(self) + PI)
    }

    fn linear_dist_2d(&self, track: f64, dist: f64) -> Self {
        if dist.abs() <= f64::EPSILON {
            return *self;
        }
        let (phi1, lam1) = self.radians();
        let delta = dist / EARTH_RADIUS_M;
        let sin_phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * track.cos())
            .clamp(-1.0, 1.0);
        let dlam = (track.sin() * delta.sin() * phi1.cos())
            .atan2(delta.cos() - phi1.sin() * sin_phi2);
        Self {
            lat: sin_phi2.asin().to_degrees(),
            lon: ((lam1 + dlam + PI).rem_euclid(TAU) - PI).to_degrees(),
            alt: self.alt,
        }
    }

    fn interpolate(&self, other: &Self, fraction: f64) -> Self {
        let alt = self.alt + (other.alt - self.alt) * fraction;
        let delta = self.central_angle(other);
        if delta < 1e-12 {
            return Self {
                lat: self.lat + (other.lat - self.lat) * fraction,
                lon: self.lon + (other.lon - self.lon) * fraction,
                alt,
            };
        }
        let ((phi1, lam1), (phi2, lam2)) = (self.radians(), other.radians());
        let a = ((1.0 - fraction) * delta).sin() / delta.sin();
        let b = (fraction * delta).sin() / delta.sin();
        let x = a * phi1.cos() * lam1.cos() + b * phi2.cos() * lam2.cos();
        let y = a * phi1.cos() * lam1.sin() + b * phi2.cos() * lam2.sin();
        let z = a * phi1.sin() + b * phi2.sin();
        Self {
            lat: z.atan2(x.hypot(y)).to_degrees(),
            lon: y.atan2(x).to_degrees(),
            alt,
        }
    }

    fn cross_track_distance(&self, start: &Self, end: &Self) -> f64 {
        let d13 = start.central_angle(self);
        let theta = start.course_to(self) - start.course_to(end);
        (d13.sin() * theta.sin()).clamp(-1.0, 1.0).asin() * EARTH_RADIUS_M
    }

    fn components(&self) -> [f64; 3] {
        [self.lat, self.lon, self.alt]
    }

    fn from_components(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

// ========== VELOCITY / WAYPOINT ==========

/// Polar velocity: compass track (radians), ground speed and vertical speed (m/s).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub trk: f64,
    pub gs: f64,
    pub vs: f64,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { trk: 0.0, gs: 0.0, vs: 0.0 };

    pub fn new(trk: f64, gs: f64, vs: f64) -> Self {
        Self { trk: to_2pi(trk), gs, vs }
    }

    pub fn mk_gs(self, gs: f64) -> Self {
        Self { gs, ..self }
    }

    pub fn mk_vs(self, vs: f64) -> Self {
        Self { vs, ..self }
    }
}

/// Immutable space-time point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint<P> {
    pub position: P,
    pub time: f64,
}

impl<P: Coordinate> Waypoint<P> {
    pub fn new(position: P, time: f64) -> Self {
        Self { position, time }
    }

    pub fn is_valid(&self) -> bool {
        self.position.is_finite() && self.time.is_finite()
    }

    /// Straight-line extrapolation along `v` for `dt` seconds.
    pub fn linear(&self, v: Velocity, dt: f64) -> Self {
        let moved = self.position.linear_dist_2d(v.trk, v.gs * dt);
        Self {
            position: moved.with_alt(self.position.alt() + v.vs * dt),
            time: self.time + dt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geodetic_distance_one_degree() {
        let equator = LatLonAlt::new(0.0, 0.0, 0.0);
        let north = LatLonAlt::new(1.0, 0.0, 5000.0);
        let dist = equator.distance_h(&north);
        assert!((dist - EARTH_RADIUS_M * 1f64.to_radians()).abs() < 1e-6, "distance {dist}");
        // antipodes stay finite
        let far = LatLonAlt::new(0.0, 180.0, 0.0);
        assert!((equator.distance_h(&far) - EARTH_RADIUS_M * PI).abs() < 1e-3);
    }

    #[test]
    fn test_xyz_course_is_compass() {
        let o = Xyz::new(0.0, 0.0, 0.0);
        let east = Xyz::new(100.0, 0.0, 0.0);
        let south = Xyz::new(0.0, -100.0, 0.0);
        assert!((o.initial_course(&east) - PI / 2.0).abs() < 1e-12);
        assert!((o.initial_course(&south) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_xyz_cross_track_sign() {
        let start = Xyz::new(0.0, 0.0, 0.0);
        let end = Xyz::new(0.0, 1000.0, 0.0);
        let right = Xyz::new(30.0, 500.0, 0.0);
        let left = Xyz::new(-30.0, 500.0, 0.0);
        assert!((right.cross_track_distance(&start, &end) - 30.0).abs() < 1e-9);
        assert!((left.cross_track_distance(&start, &end) + 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_geodetic_offset_then_distance() {
        let start = LatLonAlt::new(33.0, -117.0, 1000.0);
        let moved = start.linear_dist_2d(0.7, 25_000.0);
        let dist = start.distance_h(&moved);
        assert!((dist - 25_000.0).abs() < 0.01, "distance {dist}");
        assert!((start.initial_course(&moved) - 0.7).abs() < 1e-6);
        assert_eq!(moved.alt, 1000.0);
    }

    #[test]
    fn test_geodetic_interpolate_midpoint() {
        let a = LatLonAlt::new(10.0, 20.0, 0.0);
        let b = LatLonAlt::new(11.0, 21.0, 1000.0);
        let mid = a.interpolate(&b, 0.5);
        let d1 = a.distance_h(&mid);
        let d2 = mid.distance_h(&b);
        assert!((d1 - d2).abs() < 1e-3, "halves {d1} vs {d2}");
        assert!((mid.alt - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_geodetic_cross_track_right_positive() {
        let start = LatLonAlt::new(0.0, 0.0, 0.0);
        let end = LatLonAlt::new(1.0, 0.0, 0.0);
        let east_of_path = LatLonAlt::new(0.5, 0.01, 0.0);
        let xt = east_of_path.cross_track_distance(&start, &end);
        assert!(xt > 1000.0 && xt < 1200.0, "cross track {xt}");
    }

    #[test]
    fn test_waypoint_linear() {
        let wp = Waypoint::new(Xyz::new(0.0, 0.0, 100.0), 10.0);
        let next = wp.linear(Velocity::new(PI / 2.0, 50.0, 2.0), 4.0);
        assert!((next.position.x - 200.0).abs() < 1e-9);
        assert!(next.position.y.abs() < 1e-9);
        assert!((next.position.z - 108.0).abs() < 1e-12);
        assert_eq!(next.time, 14.0);
    }
}
