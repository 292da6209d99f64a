//! Critically damped springs and the angle helpers the camera and the
//! movement controller share.

use std::f32::consts::{PI, TAU};

use bevy_math::{Mat3, Quat, Vec3};

/// Moves `current` toward `target` along a critically damped spring.
///
/// `lag` is roughly the time needed to reach the target. The distance the
/// spring pulls over is capped at `max_speed * lag` and a single step never
/// moves more than `max_speed * dt`. The target is never overshot: once
/// reached, `velocity` is zeroed.
pub fn smooth_damp(
    current: f32,
    target: f32,
    velocity: &mut f32,
    lag: f32,
    max_speed: f32,
    dt: f32,
) -> f32 {
    if dt <= 0.0 {
        return current;
    }

    let lag = lag.max(1e-4);
    let omega = 2.0 / lag;
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let max_change = max_speed * lag;
    let change = (current - target).clamp(-max_change, max_change);
    let pulled_target = current - change;

    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let mut output = pulled_target + (change + temp) * decay;

    let max_step = max_speed * dt;
    output = current + (output - current).clamp(-max_step, max_step);

    let reached = if target > current {
        output >= target
    } else if target < current {
        output <= target
    } else {
        true
    };
    if reached || (target - output).abs() <= SETTLE_EPSILON * target.abs().max(1.0) {
        output = target;
        *velocity = 0.0;
    }
    output
}

/// Relative distance under which a spring is considered settled.
const SETTLE_EPSILON: f32 = 1e-5;

/// [`smooth_damp`] for angles in radians, following the shortest arc.
pub fn smooth_damp_angle(
    current: f32,
    target: f32,
    velocity: &mut f32,
    lag: f32,
    max_speed: f32,
    dt: f32,
) -> f32 {
    let target = current + delta_angle(current, target);
    smooth_damp(current, target, velocity, lag, max_speed, dt)
}

/// Shortest signed difference `target - current`, in `[-PI, PI]`.
pub fn delta_angle(current: f32, target: f32) -> f32 {
    let mut delta = (target - current).rem_euclid(TAU);
    if delta > PI {
        delta -= TAU;
    }
    delta
}

/// Heading of `rotation` around +Y. Zero faces -Z.
pub fn yaw_of(rotation: Quat) -> f32 {
    let forward = rotation * Vec3::NEG_Z;
    (-forward.x).atan2(-forward.z)
}

/// Rotation whose forward (-Z) axis points along `forward`, with +Y kept up.
/// Returns identity for a zero or vertical `forward`.
pub fn look_rotation(forward: Vec3) -> Quat {
    let back = -forward.normalize_or_zero();
    let right = Vec3::Y.cross(back);
    if back == Vec3::ZERO || right.length_squared() < 1e-12 {
        return Quat::IDENTITY;
    }
    let right = right.normalize();
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back)).normalize()
}

/// Rotates `current` toward `target` by at most `max_radians`, both treated as
/// directions. A zero `current` snaps straight to `target`.
pub fn rotate_towards(current: Vec3, target: Vec3, max_radians: f32) -> Vec3 {
    let from = current.normalize_or_zero();
    let to = target.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return if to == Vec3::ZERO { from } else { to };
    }

    let angle = from.angle_between(to);
    if angle <= max_radians {
        return to;
    }

    let axis = from.cross(to);
    // Opposite directions: turn around the up axis.
    let axis = if axis.length_squared() < 1e-10 {
        Vec3::Y
    } else {
        axis.normalize()
    };
    Quat::from_axis_angle(axis, max_radians) * from
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn smooth_damp_converges_without_overshoot() {
        let mut velocity = 0.0;
        let mut value = 0.0;
        for _ in 0..600 {
            let next = smooth_damp(value, 5.0, &mut velocity, 0.2, 10.0, DT);
            assert!(next >= value);
            assert!(next <= 5.0);
            value = next;
        }
        assert_eq!(value, 5.0);
        assert_eq!(velocity, 0.0);
    }

    #[test]
    fn smooth_damp_step_is_bounded_by_max_speed() {
        let mut velocity = 0.0;
        let mut value = -100.0;
        for _ in 0..1200 {
            let next = smooth_damp(value, 100.0, &mut velocity, 0.2, 10.0, DT);
            assert!((next - value).abs() <= 10.0 * DT + 1e-5);
            value = next;
        }
    }

    #[test]
    fn smooth_damp_ignores_zero_dt() {
        let mut velocity = 3.0;
        assert_eq!(smooth_damp(1.0, 2.0, &mut velocity, 0.2, 10.0, 0.0), 1.0);
        assert_eq!(velocity, 3.0);
    }

    #[test]
    fn delta_angle_takes_the_short_way() {
        let d = delta_angle(350f32.to_radians(), 10f32.to_radians());
        assert!((d - 20f32.to_radians()).abs() < 1e-5);
        let d = delta_angle(10f32.to_radians(), 350f32.to_radians());
        assert!((d + 20f32.to_radians()).abs() < 1e-5);
    }

    #[test]
    fn smooth_damp_angle_wraps() {
        let mut velocity = 0.0;
        let mut angle = 350f32.to_radians();
        for _ in 0..600 {
            angle = smooth_damp_angle(angle, 10f32.to_radians(), &mut velocity, 0.3, f32::INFINITY, DT);
        }
        assert!(delta_angle(angle, 10f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn look_rotation_points_forward_axis() {
        let dir = Vec3::new(1.0, 0.0, 1.0).normalize();
        let rotation = look_rotation(dir);
        assert!((rotation * Vec3::NEG_Z - dir).length() < 1e-5);
        assert!((rotation * Vec3::Y - Vec3::Y).length() < 1e-5);
        assert_eq!(look_rotation(Vec3::ZERO), Quat::IDENTITY);
    }

    #[test]
    fn yaw_matches_rotation_about_y() {
        let rotation = Quat::from_rotation_y(0.7);
        assert!((yaw_of(rotation) - 0.7).abs() < 1e-5);
        assert!(yaw_of(Quat::IDENTITY).abs() < 1e-6);
    }

    #[test]
    fn rotate_towards_caps_the_turn() {
        let turned = rotate_towards(Vec3::NEG_Z, Vec3::Z, 0.5);
        assert!((turned.angle_between(Vec3::NEG_Z) - 0.5).abs() < 1e-4);
        assert!(turned.y.abs() < 1e-6);

        let snapped = rotate_towards(Vec3::NEG_Z, Vec3::X, 10.0);
        assert_eq!(snapped, Vec3::X);
    }
}
