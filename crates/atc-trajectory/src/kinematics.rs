//! Point kinematics primitives: circular turns and constant acceleration.

use crate::geometry::{to_2pi, Coordinate};
use crate::units::GRAVITY_MPS2;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Signed change from track `from` to track `to` in `(-π, π]`; positive is a right turn.
pub fn turn_delta(from: f64, to: f64) -> f64 {
    let d = to_2pi(to - from);
    if d > PI {
        d - TAU
    } else {
        d
    }
}

/// Turn direction of a signed radius: +1 right, -1 left.
pub fn dir_of(signed_radius: f64) -> f64 {
    if signed_radius < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Centre of the turn that starts at `bot` heading `trk`.
pub fn center_from_radius<P: Coordinate>(bot: &P, signed_radius: f64, trk: f64) -> P {
    let dir = dir_of(signed_radius);
    bot.linear_dist_2d(to_2pi(trk + dir * FRAC_PI_2), signed_radius.abs())
        .with_alt(bot.alt())
}

/// Angle swept in direction `dir` going from `from` to `to` around `center`, in `[0, 2π)`.
pub fn arc_angle<P: Coordinate>(from: &P, center: &P, to: &P, dir: f64) -> f64 {
    let a1 = center.initial_course(from);
    let a2 = center.initial_course(to);
    let angle = to_2pi(dir * (a2 - a1));
    if angle > TAU - 1e-9 {
        0.0
    } else {
        angle
    }
}

/// Track of the aircraft at `p` while circling `center` in direction `dir`.
pub fn tangent_track<P: Coordinate>(p: &P, center: &P, dir: f64) -> f64 {
    to_2pi(p.initial_course(center) - dir * FRAC_PI_2)
}

/// Position and track after flying `dist` metres around `center` starting at `so`.
/// The radius is the horizontal distance from `so` to `center`.
pub fn turn_by_dist_2d<P: Coordinate>(so: &P, center: &P, dir: f64, dist: f64) -> (P, f64) {
    let radius = center.distance_h(so);
    if radius <= f64::EPSILON {
        return (*so, 0.0);
    }
    let theta = center.initial_course(so) + dir * dist / radius;
    let p = center.linear_dist_2d(to_2pi(theta), radius).with_alt(so.alt());
    let trk = tangent_track(&p, center, dir);
    (p, trk)
}

/// Distance covered in `t` seconds from speed `v0` under constant acceleration `a`.
pub fn distance_after(v0: f64, a: f64, t: f64) -> f64 {
    v0 * t + 0.5 * a * t * t
}

/// Smallest non-negative time to cover `dist` from speed `v0` with acceleration `a`.
///
/// Returns `None` when the distance is never reached (decelerating to a stop first).
pub fn time_from_distance(v0: f64, a: f64, dist: f64) -> Option<f64> {
    if dist.abs() <= f64::EPSILON {
        return Some(0.0);
    }
    if a.abs() < 1e-12 {
        return (v0 > 0.0).then(|| dist / v0);
    }
    let disc = v0 * v0 + 2.0 * a * dist;
    if disc < 0.0 {
        return None;
    }
    let denom = v0 + disc.sqrt();
    if denom <= 0.0 {
        return None;
    }
    let t = 2.0 * dist / denom;
    (t >= 0.0).then_some(t)
}

/// Turn radius for a coordinated turn at ground speed `gs` and bank angle `bank`.
pub fn radius_from_bank(gs: f64, bank: f64) -> f64 {
    let tan = bank.abs().tan();
    if tan <= f64::EPSILON {
        return f64::INFINITY;
    }
    gs * gs / (GRAVITY_MPS2 * tan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{LatLonAlt, Xyz};

    #[test]
    fn test_turn_delta_wraps() {
        let d = turn_delta(350f64.to_radians(), 10f64.to_radians());
        assert!((d - 20f64.to_radians()).abs() < 1e-12);
        let d = turn_delta(10f64.to_radians(), 350f64.to_radians());
        assert!((d + 20f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn test_right_turn_quarter_circle() {
        let bot = Xyz::new(0.0, 0.0, 500.0);
        let center = center_from_radius(&bot, 1000.0, 0.0);
        assert!((center.x - 1000.0).abs() < 1e-9 && center.y.abs() < 1e-9);

        let quarter = 1000.0 * FRAC_PI_2;
        let (p, trk) = turn_by_dist_2d(&bot, &center, 1.0, quarter);
        assert!((p.x - 1000.0).abs() < 1e-6 && (p.y - 1000.0).abs() < 1e-6, "{p:?}");
        assert!((trk - FRAC_PI_2).abs() < 1e-9, "track {trk}");
        assert_eq!(p.z, 500.0);
        assert!((arc_angle(&bot, &center, &p, 1.0) - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_left_turn_on_sphere_keeps_radius() {
        let bot = LatLonAlt::new(45.0, 7.0, 3000.0);
        let center = center_from_radius(&bot, -2000.0, 1.0);
        let (p, _) = turn_by_dist_2d(&bot, &center, -1.0, 2500.0);
        let r = center.distance_h(&p);
        assert!((r - 2000.0).abs() < 0.01, "radius {r}");
        let angle = arc_angle(&bot, &center, &p, -1.0);
        assert!((angle * 2000.0 - 2500.0).abs() < 0.05, "arc {}", angle * 2000.0);
    }

    #[test]
    fn test_time_from_distance_accel_and_decel() {
        let t = time_from_distance(100.0, 1.0, distance_after(100.0, 1.0, 20.0)).unwrap();
        assert!((t - 20.0).abs() < 1e-9);
        let t = time_from_distance(100.0, -2.0, distance_after(100.0, -2.0, 10.0)).unwrap();
        assert!((t - 10.0).abs() < 1e-9);
        assert!(time_from_distance(10.0, -1.0, 100.0).is_none());
        assert!((time_from_distance(50.0, 0.0, 500.0).unwrap() - 10.0).abs() < 1e-12);
    }
}
