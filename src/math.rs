//! Quaternion and Euler-angle helpers.
//!
//! Only the ZXY rotation order is honored: the composed rotation is
//! `R_z · R_x · R_y` applied to a column vector. The retarget calibration
//! tables depend on this exact convention, so the source file's declared
//! Euler order is never consulted.

use glam::{DVec3, Quat};

/// Above this |sin rx| the X axis is treated as gimbal-locked.
const GIMBAL_LOCK_THRESHOLD: f64 = 0.9999;

/// Above this |dot| slerp degenerates into normalized lerp.
const SLERP_LERP_THRESHOLD: f32 = 0.9995;

/// ZXY Euler angles (radians) to a unit quaternion: `q = q_z · q_x · q_y`.
pub fn quat_from_euler_zxy(euler: DVec3) -> Quat {
    let (sx, cx) = (euler.x * 0.5).sin_cos();
    let (sy, cy) = (euler.y * 0.5).sin_cos();
    let (sz, cz) = (euler.z * 0.5).sin_cos();
    let qx = Quat::from_xyzw(sx as f32, 0.0, 0.0, cx as f32);
    let qy = Quat::from_xyzw(0.0, sy as f32, 0.0, cy as f32);
    let qz = Quat::from_xyzw(0.0, 0.0, sz as f32, cz as f32);
    qz * qx * qy
}

/// Extracts ZXY Euler angles (radians) from a unit quaternion.
///
/// At gimbal lock (|sin rx| ~ 1) the X and Z axes align; rx pins to ±π/2,
/// rz to 0, and the remaining freedom goes to ry.
pub fn euler_zxy_from_quat(q: Quat) -> DVec3 {
    let (x, y, z, w) = (f64::from(q.x), f64::from(q.y), f64::from(q.z), f64::from(q.w));
    let sin_rx = 2.0 * (y * z + w * x);
    if sin_rx.abs() >= GIMBAL_LOCK_THRESHOLD {
        let rx = std::f64::consts::FRAC_PI_2.copysign(sin_rx);
        let ry = (2.0 * (x * y + w * z)).atan2(1.0 - 2.0 * (y * y + z * z));
        DVec3::new(rx, ry, 0.0)
    } else {
        let rx = sin_rx.asin();
        let ry = (-2.0 * (x * z - w * y)).atan2(1.0 - 2.0 * (x * x + y * y));
        let rz = (-2.0 * (x * y - w * z)).atan2(1.0 - 2.0 * (x * x + z * z));
        DVec3::new(rx, ry, rz)
    }
}

/// Spherical linear interpolation between unit quaternions.
///
/// Near-parallel endpoints blend linearly and renormalize; otherwise the
/// sin-weighted great-circle form, with the far endpoint sign-flipped when
/// the dot is negative so the path follows the shorter arc.
pub fn slerp(a: Quat, b: Quat, t: f32) -> Quat {
    let dot = a.dot(b);
    if dot.abs() > SLERP_LERP_THRESHOLD {
        let x = a.x + (b.x - a.x) * t;
        let y = a.y + (b.y - a.y) * t;
        let z = a.z + (b.z - a.z) * t;
        let w = a.w + (b.w - a.w) * t;
        let norm = (x * x + y * y + z * z + w * w).sqrt();
        return Quat::from_xyzw(x / norm, y / norm, z / norm, w / norm);
    }

    let theta = dot.abs().acos();
    let sin_theta = theta.sin();
    let w0 = (((1.0 - t) * theta).sin()) / sin_theta;
    let mut w1 = ((t * theta).sin()) / sin_theta;
    if dot < 0.0 {
        w1 = -w1;
    }
    Quat::from_xyzw(
        a.x * w0 + b.x * w1,
        a.y * w0 + b.y * w1,
        a.z * w0 + b.z * w1,
        a.w * w0 + b.w * w1,
    )
}

/// Negates any quaternion whose dot with its predecessor is negative, so a
/// track stays on one sheet of the double cover and interpolation never
/// takes the long way around.
pub fn unroll(quats: &mut [Quat]) {
    for i in 1..quats.len() {
        if quats[i - 1].dot(quats[i]) < 0.0 {
            quats[i] = -quats[i];
        }
    }
}
