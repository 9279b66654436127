//! Ground contact and terrain plane estimation from downward probe rays

use glam::Vec3;

use super::math::{forward, right, up};
use super::physics::VehicleTuning;
use super::vehicle::Pose;
use crate::world::{CollisionWorld, Layer};

/// Result of probing the ground under a vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundSample {
    pub on_ground: bool,
    /// Averaged terrain normal, `None` when no probe triangle was complete
    pub normal: Option<Vec3>,
}

#[derive(Debug, Clone, Copy)]
pub struct GroundSampler {
    /// Reach of the contact probe below the underside
    pub max_ground_distance: f32,
    /// Longitudinal offset of the alignment probes from the rotation root
    pub probe_forward: f32,
    /// Lateral offset of the alignment probes
    pub probe_side: f32,
    /// Height above the root the alignment probes start at
    pub probe_height: f32,
    /// Length of the alignment probes
    pub probe_distance: f32,
}

/// Contact probe starts this far above the underside
const CONTACT_LIFT: f32 = 0.1;

impl GroundSampler {
    pub fn from_tuning(tuning: &VehicleTuning) -> Self {
        Self {
            max_ground_distance: tuning.max_ground_check_distance,
            probe_forward: tuning.alignment_probe_forward,
            probe_side: tuning.alignment_probe_side,
            probe_height: tuning.alignment_probe_height,
            probe_distance: tuning.alignment_probe_distance,
        }
    }

    /// Contact probe plus, when grounded, the terrain plane
    pub fn sample(&self, pose: &Pose, world: &impl CollisionWorld) -> GroundSample {
        let on_ground = self.contact(pose, world);
        GroundSample {
            on_ground,
            normal: if on_ground {
                self.plane_normal(pose, world)
            } else {
                None
            },
        }
    }

    /// True iff the short downward probe reaches ground
    pub fn contact(&self, pose: &Pose, world: &impl CollisionWorld) -> bool {
        let down = -up(pose.rotation);
        let origin = pose.position - down * CONTACT_LIFT;
        world
            .raycast(
                origin,
                down,
                CONTACT_LIFT + self.max_ground_distance,
                Layer::Ground,
            )
            .is_some()
    }

    /// Fit the terrain plane from four corner probes.
    ///
    /// Two triangles are formed: front-left/back-left/back-right and
    /// front-left/front-right/back-right. The normals of the complete ones
    /// are averaged.
    pub fn plane_normal(&self, pose: &Pose, world: &impl CollisionWorld) -> Option<Vec3> {
        let fwd = forward(pose.rotation) * self.probe_forward;
        let side = right(pose.rotation) * self.probe_side;
        let lift = up(pose.rotation) * self.probe_height;
        let down = -up(pose.rotation);
        let base = pose.position + lift;

        let probe = |offset: Vec3| {
            world
                .raycast(base + offset, down, self.probe_distance, Layer::Ground)
                .map(|hit| hit.point)
        };
        let front_left = probe(fwd - side);
        let front_right = probe(fwd + side);
        let back_left = probe(-fwd - side);
        let back_right = probe(-fwd + side);

        let first = match (front_left, back_left, back_right) {
            (Some(fl), Some(bl), Some(br)) => triangle_normal(fl, br, bl, -down),
            _ => None,
        };
        let second = match (front_left, front_right, back_right) {
            (Some(fl), Some(fr), Some(br)) => triangle_normal(fl, fr, br, -down),
            _ => None,
        };

        match (first, second) {
            (Some(a), Some(b)) => (a + b).try_normalize(),
            (Some(n), None) | (None, Some(n)) => Some(n),
            (None, None) => None,
        }
    }
}

/// Unit normal of triangle `abc`, flipped to face `reference`
fn triangle_normal(a: Vec3, b: Vec3, c: Vec3, reference: Vec3) -> Option<Vec3> {
    let n = (b - a).cross(c - a).try_normalize()?;
    Some(if n.dot(reference) < 0.0 { -n } else { n })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Aabb, HeightField, RayHit, TerrainWorld};
    use glam::{UVec2, Vec2};

    fn sampler() -> GroundSampler {
        GroundSampler::from_tuning(&VehicleTuning::default())
    }

    /// Flat ground with holes under the listed (x, z) probe origins
    struct HoleyWorld {
        holes: Vec<Vec2>,
    }

    impl CollisionWorld for HoleyWorld {
        fn raycast(&self, origin: Vec3, direction: Vec3, max: f32, layer: Layer) -> Option<RayHit> {
            let xz = Vec2::new(origin.x, origin.z);
            if self.holes.iter().any(|h| h.distance(xz) < 0.25) {
                return None;
            }
            TerrainWorld::flat(0.0).raycast(origin, direction, max, layer)
        }

        fn move_body(&self, position: Vec3, displacement: Vec3, _radius: f32) -> Vec3 {
            position + displacement
        }
    }

    #[test]
    fn grounded_on_flat_terrain() {
        let world = TerrainWorld::flat(0.0);
        let pose = Pose::new(Vec3::new(0.0, 0.05, 0.0), 0.0);
        let sample = sampler().sample(&pose, &world);
        assert!(sample.on_ground);
        assert!((sample.normal.unwrap() - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn airborne_has_no_contact_and_no_normal() {
        let world = TerrainWorld::flat(0.0);
        let pose = Pose::new(Vec3::new(0.0, 10.0, 0.0), 0.0);
        let sample = sampler().sample(&pose, &world);
        assert_eq!(
            sample,
            GroundSample {
                on_ground: false,
                normal: None
            }
        );
    }

    #[test]
    fn slope_normal_follows_terrain() {
        // 0.5 rise per unit along +z
        let heights = (0..4)
            .flat_map(|z| std::iter::repeat(z as f32 * 2.0).take(4))
            .collect();
        let hf = HeightField::from_heights(
            Vec2::new(-6.0, -6.0),
            UVec2::new(4, 4),
            Vec2::splat(4.0),
            heights,
        )
        .unwrap();
        let world = TerrainWorld::new(hf);
        let y = world.ground.sample_height(0.0, 0.0);
        let pose = Pose::new(Vec3::new(0.0, y, 0.0), 0.0);

        let normal = sampler().plane_normal(&pose, &world).unwrap();
        let expected = Vec3::new(0.0, 1.0, -0.5).normalize();
        assert!((normal - expected).length() < 1e-3, "{normal:?}");
    }

    #[test]
    fn one_complete_triangle_is_enough() {
        let pose = Pose::new(Vec3::ZERO, 0.0);

        // back-left missing: only front-left/front-right/back-right remains
        let world = HoleyWorld {
            holes: vec![Vec2::new(-1.0, -1.0)],
        };
        let normal = sampler().plane_normal(&pose, &world).unwrap();
        assert!((normal - Vec3::Y).length() < 1e-4);

        // back-left and front-right missing: no complete triangle
        let world = HoleyWorld {
            holes: vec![Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)],
        };
        assert!(sampler().plane_normal(&pose, &world).is_none());
    }

    #[test]
    fn obstacles_do_not_count_as_ground() {
        let world = TerrainWorld::flat(-50.0)
            .with_obstacle(Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 0.0, 1.0)));
        let pose = Pose::new(Vec3::new(0.0, 0.05, 0.0), 0.0);
        assert!(!sampler().contact(&pose, &world));
    }
}
