//! Heightfield ground plus box obstacles, the concrete world used by levels and tests

use glam::{UVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::{CollisionWorld, Layer, LevelError, RayHit};

/// Regular grid heightfield. Heights are in world units.
#[derive(Clone, Debug)]
pub struct HeightField {
    /// World-space (x, z) of grid sample (0, 0)
    pub origin: Vec2,
    pub dims: UVec2, // nx, nz (columns in x, rows in z)
    pub cell: Vec2,  // sx, sz (world units per cell)
    pub heights: Vec<f32>,
}

impl HeightField {
    pub fn from_heights(
        origin: Vec2,
        dims: UVec2,
        cell: Vec2,
        heights: Vec<f32>,
    ) -> Result<Self, LevelError> {
        if dims.x < 2 || dims.y < 2 {
            return Err(LevelError::HeightfieldTooSmall(dims.x, dims.y));
        }
        let expected = (dims.x as usize) * (dims.y as usize);
        if expected != heights.len() {
            return Err(LevelError::HeightfieldSize {
                expected,
                actual: heights.len(),
            });
        }
        if cell.x <= 0.0 || cell.y <= 0.0 {
            return Err(LevelError::InvalidCellSize);
        }
        Ok(Self {
            origin,
            dims,
            cell,
            heights,
        })
    }

    /// Flat ground at `height`. Sampling clamps to the grid edges, so this
    /// behaves as an infinite plane.
    pub fn flat(height: f32) -> Self {
        Self {
            origin: Vec2::ZERO,
            dims: UVec2::new(2, 2),
            cell: Vec2::ONE,
            heights: vec![height; 4],
        }
    }

    #[inline]
    fn idx(&self, x: i32, z: i32) -> usize {
        (x as usize) + (z as usize) * (self.dims.x as usize)
    }

    #[inline]
    fn h(&self, x: i32, z: i32) -> f32 {
        self.heights[self.idx(x, z)]
    }

    /// Bilinear height at world (x, z); positions outside the grid use the edge samples
    pub fn sample_height(&self, x: f32, z: f32) -> f32 {
        let nx = self.dims.x as i32;
        let nz = self.dims.y as i32;
        let fx = ((x - self.origin.x) / self.cell.x).clamp(0.0, (nx - 1) as f32 - 1e-5);
        let fz = ((z - self.origin.y) / self.cell.y).clamp(0.0, (nz - 1) as f32 - 1e-5);
        let x0 = fx.floor() as i32;
        let x1 = (x0 + 1).min(nx - 1);
        let z0 = fz.floor() as i32;
        let z1 = (z0 + 1).min(nz - 1);
        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let a = self.h(x0, z0) * (1.0 - tx) + self.h(x1, z0) * tx;
        let b = self.h(x0, z1) * (1.0 - tx) + self.h(x1, z1) * tx;
        a * (1.0 - tz) + b * tz
    }

    /// Central-difference unit normal at world (x, z)
    pub fn sample_normal(&self, x: f32, z: f32) -> Vec3 {
        let hx0 = self.sample_height(x - self.cell.x, z);
        let hx1 = self.sample_height(x + self.cell.x, z);
        let hz0 = self.sample_height(x, z - self.cell.y);
        let hz1 = self.sample_height(x, z + self.cell.y);

        let ddx = (hx1 - hx0) / (2.0 * self.cell.x);
        let ddz = (hz1 - hz0) / (2.0 * self.cell.y);

        Vec3::new(-ddx, 1.0, -ddz).normalize_or_zero()
    }

    /// March along the ray and refine the first surface crossing by bisection.
    /// A ray starting at or below the surface hits at distance 0.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        let dir = direction.try_normalize()?;
        if !(max_distance > 0.0) {
            return None;
        }

        let gap = |t: f32| {
            let p = origin + dir * t;
            p.y - self.sample_height(p.x, p.z)
        };
        if gap(0.0) <= 0.0 {
            return Some(self.hit(origin, 0.0));
        }

        let step = (self.cell.min_element() * 0.25).max(0.01);
        let mut prev = 0.0;
        let mut t = step.min(max_distance);
        loop {
            if gap(t) <= 0.0 {
                let (mut lo, mut hi) = (prev, t);
                for _ in 0..20 {
                    let mid = 0.5 * (lo + hi);
                    if gap(mid) <= 0.0 {
                        hi = mid;
                    } else {
                        lo = mid;
                    }
                }
                return Some(self.hit(origin + dir * hi, hi));
            }
            if t >= max_distance {
                return None;
            }
            prev = t;
            t = (t + step).min(max_distance);
        }
    }

    fn hit(&self, point: Vec3, distance: f32) -> RayHit {
        RayHit {
            point,
            normal: self.sample_normal(point.x, point.z),
            distance,
        }
    }
}

/// Axis-aligned box obstacle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn grown(&self, by: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(by),
            max: self.max + Vec3::splat(by),
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Slab test. Rays starting inside the box do not hit it.
    pub fn raycast(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<RayHit> {
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut enter_normal = Vec3::ZERO;

        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if d.abs() < 1e-8 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let (t1, t2) = ((lo - o) / d, (hi - o) / d);
            let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
            if near > t_enter {
                t_enter = near;
                enter_normal = Vec3::ZERO;
                enter_normal[axis] = -d.signum();
            }
            t_exit = t_exit.min(far);
            if t_enter > t_exit {
                return None;
            }
        }

        if t_enter < 0.0 || t_enter > max_distance {
            return None;
        }
        Some(RayHit {
            point: origin + dir * t_enter,
            normal: enter_normal,
            distance: t_enter,
        })
    }

    /// Smallest translation moving `p` out of the box, along a single axis
    fn push_out(&self, p: Vec3) -> Vec3 {
        let mut best = Vec3::ZERO;
        let mut best_depth = f32::INFINITY;
        for axis in 0..3 {
            let to_min = p[axis] - self.min[axis];
            let to_max = self.max[axis] - p[axis];
            let (depth, sign) = if to_min < to_max {
                (to_min, -1.0)
            } else {
                (to_max, 1.0)
            };
            if depth < best_depth {
                best_depth = depth;
                best = Vec3::ZERO;
                best[axis] = sign * depth;
            }
        }
        best
    }
}

/// Heightfield ground with box obstacles
#[derive(Clone, Debug)]
pub struct TerrainWorld {
    pub ground: HeightField,
    pub obstacles: Vec<Aabb>,
}

impl TerrainWorld {
    pub fn new(ground: HeightField) -> Self {
        Self {
            ground,
            obstacles: Vec::new(),
        }
    }

    pub fn flat(height: f32) -> Self {
        Self::new(HeightField::flat(height))
    }

    pub fn with_obstacle(mut self, obstacle: Aabb) -> Self {
        self.obstacles.push(obstacle);
        self
    }
}

impl CollisionWorld for TerrainWorld {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layer: Layer,
    ) -> Option<RayHit> {
        match layer {
            Layer::Ground => self.ground.raycast(origin, direction, max_distance),
            Layer::Obstacle => {
                let dir = direction.try_normalize()?;
                self.obstacles
                    .iter()
                    .filter_map(|o| o.raycast(origin, dir, max_distance))
                    .min_by(|a, b| a.distance.total_cmp(&b.distance))
            }
        }
    }

    fn move_body(&self, position: Vec3, displacement: Vec3, radius: f32) -> Vec3 {
        let mut p = position + displacement;

        for obstacle in &self.obstacles {
            let grown = obstacle.grown(radius);
            if grown.contains(p) {
                p += grown.push_out(p);
            }
        }

        let floor = self.ground.sample_height(p.x, p.z);
        if p.y < floor {
            p.y = floor;
        }
        p
    }
}
