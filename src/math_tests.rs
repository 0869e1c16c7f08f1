use crate::math::{euler_zxy_from_quat, quat_from_euler_zxy, slerp, unroll};
use glam::{DVec3, Quat};
use std::f64::consts::{FRAC_PI_2, PI};

fn assert_approx(actual: f32, expected: f32, eps: f32, ctx: &str) {
    let diff = (actual - expected).abs();
    assert!(diff <= eps, "{ctx}: expected {expected}, got {actual} (diff {diff})");
}

/// Same rotation, either sheet of the double cover.
fn assert_same_rotation(a: Quat, b: Quat, eps: f32, ctx: &str) {
    let dot = a.dot(b).abs();
    assert!((1.0 - dot) <= eps, "{ctx}: |dot| = {dot}, quats {a:?} vs {b:?}");
}

#[test]
fn axis_factors_compose_in_zxy_order() {
    // 90° about Z then X then Y collapses to a symmetric quaternion.
    let q = quat_from_euler_zxy(DVec3::new(FRAC_PI_2, 0.0, FRAC_PI_2));
    assert_approx(q.x, 0.5, 1e-6, "x");
    assert_approx(q.y, 0.5, 1e-6, "y");
    assert_approx(q.z, 0.5, 1e-6, "z");
    assert_approx(q.w, 0.5, 1e-6, "w");

    let single = quat_from_euler_zxy(DVec3::new(0.0, 0.0, FRAC_PI_2));
    assert_approx(single.z, (0.5f32 * FRAC_PI_2 as f32).sin(), 1e-6, "z only");
    assert_approx(single.w, (0.5f32 * FRAC_PI_2 as f32).cos(), 1e-6, "z only w");
}

#[test]
fn euler_round_trips_through_quaternion() {
    let samples = [
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(0.3, -0.7, 1.2),
        DVec3::new(-1.2, 2.9, -2.4),
        DVec3::new(0.9, -3.0, 0.1),
    ];
    for euler in samples {
        let q = quat_from_euler_zxy(euler);
        let back = quat_from_euler_zxy(euler_zxy_from_quat(q));
        assert_same_rotation(q, back, 1e-5, &format!("round trip of {euler:?}"));
    }
}

#[test]
fn gimbal_lock_pins_x_and_clears_z() {
    // 90° about X: sin rx saturates.
    let half = (2.0f32).sqrt() / 2.0;
    let q = Quat::from_xyzw(half, 0.0, 0.0, half);
    let euler = euler_zxy_from_quat(q);
    assert!((euler.x - FRAC_PI_2).abs() <= 1e-6, "rx = {}", euler.x);
    assert!(euler.y.abs() <= 1e-6, "ry = {}", euler.y);
    assert!(euler.z.abs() <= 1e-6, "rz = {}", euler.z);

    let back = quat_from_euler_zxy(euler);
    assert_same_rotation(q, back, 1e-6, "gimbal re-derivation");

    let down = euler_zxy_from_quat(Quat::from_xyzw(-half, 0.0, 0.0, half));
    assert!((down.x + FRAC_PI_2).abs() <= 1e-6, "rx = {}", down.x);
}

#[test]
fn slerp_midpoint_halves_the_angle() {
    let a = Quat::IDENTITY;
    let b = quat_from_euler_zxy(DVec3::new(FRAC_PI_2, 0.0, 0.0));
    let mid = slerp(a, b, 0.5);
    let expected = quat_from_euler_zxy(DVec3::new(FRAC_PI_2 / 2.0, 0.0, 0.0));
    assert_same_rotation(mid, expected, 1e-6, "midpoint");
    assert_approx(mid.length(), 1.0, 1e-6, "midpoint norm");
}

#[test]
fn slerp_endpoints_are_exact() {
    let a = quat_from_euler_zxy(DVec3::new(0.2, 0.4, -0.3));
    let b = quat_from_euler_zxy(DVec3::new(-0.9, 0.1, 1.4));
    assert_same_rotation(slerp(a, b, 0.0), a, 1e-6, "t = 0");
    assert_same_rotation(slerp(a, b, 1.0), b, 1e-6, "t = 1");
}

#[test]
fn slerp_near_parallel_degrades_to_normalized_lerp() {
    let a = quat_from_euler_zxy(DVec3::new(0.1, 0.0, 0.0));
    let b = quat_from_euler_zxy(DVec3::new(0.1001, 0.0, 0.0));
    let mid = slerp(a, b, 0.5);
    assert_approx(mid.length(), 1.0, 1e-6, "norm");
    let expected = quat_from_euler_zxy(DVec3::new(0.10005, 0.0, 0.0));
    assert_same_rotation(mid, expected, 1e-6, "nlerp midpoint");
}

#[test]
fn slerp_takes_the_shorter_arc_across_the_sign_flip() {
    let a = quat_from_euler_zxy(DVec3::new(0.4, 0.0, 0.0));
    let b = quat_from_euler_zxy(DVec3::new(0.8, 0.0, 0.0));
    // Negated endpoint represents the same rotation; the path must too.
    let mid_plus = slerp(a, b, 0.5);
    let mid_minus = slerp(a, -b, 0.5);
    assert_same_rotation(mid_plus, mid_minus, 1e-6, "sign-flipped endpoint");
    let expected = quat_from_euler_zxy(DVec3::new(0.6, 0.0, 0.0));
    assert_same_rotation(mid_plus, expected, 1e-6, "midpoint angle");
}

#[test]
fn unroll_keeps_adjacent_dots_non_negative() {
    let base = [
        quat_from_euler_zxy(DVec3::new(0.0, 0.0, 0.0)),
        quat_from_euler_zxy(DVec3::new(0.5, 0.0, 0.0)),
        quat_from_euler_zxy(DVec3::new(1.0, 0.0, 0.0)),
        quat_from_euler_zxy(DVec3::new(1.5, 0.0, 0.0)),
    ];
    let mut flipped = base;
    flipped[1] = -flipped[1];
    flipped[3] = -flipped[3];

    unroll(&mut flipped);
    for (i, pair) in flipped.windows(2).enumerate() {
        assert!(pair[0].dot(pair[1]) >= 0.0, "pair {i} still rolled");
    }
    for (a, b) in base.iter().zip(&flipped) {
        assert_same_rotation(*a, *b, 1e-6, "rotation preserved");
    }
}

#[test]
fn full_sweep_accumulates_angle_monotonically() {
    // Quarter-turn steps through a full turn about X, as the subdivision
    // pass emits them: each step advances 45° in quaternion half-angle.
    let steps: Vec<Quat> = (0..=4)
        .map(|i| quat_from_euler_zxy(DVec3::new(PI * f64::from(i) / 2.0, 0.0, 0.0)))
        .collect();
    let mut track = steps;
    unroll(&mut track);

    let mut accumulated = 0.0f64;
    for pair in track.windows(2) {
        let dot = pair[0].dot(pair[1]);
        assert!(dot >= 0.0, "sign flip after unrolling");
        let step = 2.0 * f64::from(dot.clamp(-1.0, 1.0)).acos();
        assert!(step > 0.0, "no progress");
        accumulated += step;
    }
    assert!((accumulated - 2.0 * PI).abs() < 1e-3, "total angle {accumulated}");
}
