//! Vector and rotation helpers shared by the ground sampler and simulator

use glam::{Mat3, Quat, Vec3};

/// Magnitudes at or below this are treated as "no direction"
pub const NEAR_ZERO: f32 = 1e-3;

/// Local forward axis (+Z) of a body rotation
#[inline]
pub fn forward(rotation: Quat) -> Vec3 {
    rotation * Vec3::Z
}

/// Local up axis (+Y) of a body rotation
#[inline]
pub fn up(rotation: Quat) -> Vec3 {
    rotation * Vec3::Y
}

/// Local right axis (+X) of a body rotation
#[inline]
pub fn right(rotation: Quat) -> Vec3 {
    rotation * Vec3::X
}

/// Remove the component of `v` along `normal`. A zero normal leaves `v` untouched.
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    let len_sq = normal.length_squared();
    if len_sq <= f32::EPSILON {
        return v;
    }
    v - normal * (v.dot(normal) / len_sq)
}

/// Unsigned angle in degrees, 0 when either vector has no direction
pub fn angle_deg(a: Vec3, b: Vec3) -> f32 {
    match (a.try_normalize(), b.try_normalize()) {
        (Some(a), Some(b)) => a.dot(b).clamp(-1.0, 1.0).acos().to_degrees(),
        _ => 0.0,
    }
}

/// Rotation whose forward axis points along `forward` and whose up axis is
/// as close to `up` as possible. `None` when the basis is degenerate.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Option<Quat> {
    let f = forward.try_normalize()?;
    let r = up.cross(f).try_normalize()?;
    let u = f.cross(r);
    Some(Quat::from_mat3(&Mat3::from_cols(r, u, f)).normalize())
}

/// Rotation about the world up axis, heading in degrees
pub fn yaw_rotation(yaw_deg: f32) -> Quat {
    Quat::from_rotation_y(yaw_deg.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn identity_axes() {
        assert!(approx(forward(Quat::IDENTITY), Vec3::Z));
        assert!(approx(up(Quat::IDENTITY), Vec3::Y));
        assert!(approx(right(Quat::IDENTITY), Vec3::X));
    }

    #[test]
    fn positive_yaw_turns_forward_toward_right() {
        let rotated = forward(yaw_rotation(90.0));
        assert!(approx(rotated, Vec3::X));
    }

    #[test]
    fn look_rotation_reproduces_axes() {
        let fwd = Vec3::new(1.0, 0.0, 1.0).normalize();
        let q = look_rotation(fwd, Vec3::Y).unwrap();
        assert!(approx(forward(q), fwd));
        assert!(approx(up(q), Vec3::Y));
    }

    #[test]
    fn look_rotation_rejects_parallel_up() {
        assert!(look_rotation(Vec3::Y, Vec3::Y).is_none());
        assert!(look_rotation(Vec3::ZERO, Vec3::Y).is_none());
    }

    #[test]
    fn plane_projection_drops_normal_component() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert!(approx(project_on_plane(v, Vec3::Y), Vec3::new(1.0, 0.0, 3.0)));
        assert!(approx(project_on_plane(v, Vec3::Y * 5.0), Vec3::new(1.0, 0.0, 3.0)));
        assert!(approx(project_on_plane(v, Vec3::ZERO), v));
    }

    #[test]
    fn angle_of_degenerate_vectors_is_zero() {
        assert_eq!(angle_deg(Vec3::ZERO, Vec3::X), 0.0);
        assert!((angle_deg(Vec3::X, Vec3::Z) - 90.0).abs() < 1e-3);
    }
}
