//! Aviation unit conversions. Everything inside the crate is SI: metres,
//! seconds, radians, metres per second.

pub const NAUTICAL_MILE_M: f64 = 1852.0;
pub const FOOT_M: f64 = 0.3048;
/// One knot in metres per second.
pub const KNOT_MPS: f64 = NAUTICAL_MILE_M / 3600.0;
/// One foot per minute in metres per second.
pub const FPM_MPS: f64 = FOOT_M / 60.0;
/// Standard gravity in m/s^2.
pub const GRAVITY_MPS2: f64 = 9.80665;

pub fn from_kn(kn: f64) -> f64 {
    kn * KNOT_MPS
}

pub fn to_kn(mps: f64) -> f64 {
    mps / KNOT_MPS
}

pub fn from_fpm(fpm: f64) -> f64 {
    fpm * FPM_MPS
}

pub fn to_fpm(mps: f64) -> f64 {
    mps / FPM_MPS
}

pub fn from_ft(ft: f64) -> f64 {
    ft * FOOT_M
}

pub fn from_nmi(nmi: f64) -> f64 {
    nmi * NAUTICAL_MILE_M
}
