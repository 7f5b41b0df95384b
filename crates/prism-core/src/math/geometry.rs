// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Spatial primitives used for visibility and shadow fitting.
//!
//! Everything here is pure geometry: bounding boxes and spheres, planes, the
//! six-plane view frustum and rays.

use super::{Mat4, Vec3, Vec4};

/// An axis-aligned bounding box stored as centre and half extents.
///
/// The centre/extent form is what culling consumes directly (the bounding
/// sphere radius is the length of the half extents).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    /// The centre of the box.
    pub center: Vec3,
    /// Half the size of the box along each axis. Never negative.
    pub half_extents: Vec3,
}

impl Aabb {
    /// Creates a box from its centre and half extents.
    #[inline]
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
        }
    }

    /// Creates a box from two corners, in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self {
            center: (min + max) * 0.5,
            half_extents: (max - min) * 0.5,
        }
    }

    /// The smallest box enclosing `points`, or `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let (min, max) = rest
            .iter()
            .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Self::from_min_max(min, max))
    }

    /// The minimum corner.
    #[inline]
    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    /// The maximum corner.
    #[inline]
    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// The radius of the sphere centred on the box that encloses it.
    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.half_extents.length()
    }

    /// The enclosing bounding sphere.
    #[inline]
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.center, self.bounding_radius())
    }

    /// Grows this box to also enclose `other`.
    pub fn add(&mut self, other: &Aabb) {
        *self = Self::from_min_max(self.min().min(other.min()), self.max().max(other.max()));
    }

    /// The eight corners. Bit 0 of the index selects max X, bit 1 max Y, bit 2 max Z.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min(), self.max());
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 != 0 { hi.x } else { lo.x },
                if i & 2 != 0 { hi.y } else { lo.y },
                if i & 4 != 0 { hi.z } else { lo.z },
            )
        })
    }

    /// The axis-aligned box enclosing this box after an affine transform.
    pub fn transform(&self, m: &Mat4) -> Self {
        let center = m.transform_point(self.center);
        let he = self.half_extents;
        let extent = |row: usize| {
            let r = m.get_row(row);
            r.x.abs() * he.x + r.y.abs() * he.y + r.z.abs() * he.z
        };
        Self {
            center,
            half_extents: Vec3::new(extent(0), extent(1), extent(2)),
        }
    }

    /// Returns `true` when `point` lies inside or on the box.
    pub fn contains_point(&self, point: Vec3) -> bool {
        let (lo, hi) = (self.min(), self.max());
        point.x >= lo.x
            && point.x <= hi.x
            && point.y >= lo.y
            && point.y <= hi.y
            && point.z >= lo.z
            && point.z <= hi.z
    }
}

/// A sphere used as the culling volume for instances and lights.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    /// The centre of the sphere.
    pub center: Vec3,
    /// The radius of the sphere.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a sphere.
    #[inline]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Returns `true` when the two spheres overlap.
    pub fn intersects(&self, other: &BoundingSphere) -> bool {
        let r = self.radius + other.radius;
        (self.center - other.center).length_squared() <= r * r
    }
}

/// A plane `normal · p + distance = 0` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane {
    /// The unit normal, pointing to the positive half-space.
    pub normal: Vec3,
    /// The signed offset from the origin.
    pub distance: f32,
}

impl Plane {
    /// Builds a plane from raw `(a, b, c, d)` coefficients, normalising them.
    pub fn from_coefficients(v: Vec4) -> Self {
        let n = v.truncate();
        let len = n.length();
        if len > 0.0 {
            Self {
                normal: n / len,
                distance: v.w / len,
            }
        } else {
            Self {
                normal: n,
                distance: v.w,
            }
        }
    }

    /// Signed distance from the plane, positive on the normal's side.
    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.distance
    }
}

/// Result of testing a sphere against a frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SphereContainment {
    /// Completely outside at least one plane.
    Outside,
    /// Straddles at least one plane.
    Intersecting,
    /// Completely inside all six planes.
    Inside,
}

impl SphereContainment {
    /// Any overlap counts as visible.
    #[inline]
    pub fn is_visible(self) -> bool {
        self != SphereContainment::Outside
    }
}

/// The six-plane convex volume seen by a camera.
///
/// Planes are ordered left, right, bottom, top, near, far, and their normals
/// point inwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frustum {
    /// The inward-facing planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a `projection * view` matrix (Gribb/Hartmann).
    pub fn from_view_projection(m: &Mat4) -> Self {
        let r0 = m.get_row(0);
        let r1 = m.get_row(1);
        let r2 = m.get_row(2);
        let r3 = m.get_row(3);
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Tests a sphere against the six planes, stopping at the first plane it is outside of.
    pub fn contains_sphere(&self, sphere: &BoundingSphere) -> SphereContainment {
        let mut fully_inside = 0;
        for plane in &self.planes {
            let d = plane.signed_distance(sphere.center);
            if d <= -sphere.radius {
                return SphereContainment::Outside;
            }
            if d > sphere.radius {
                fully_inside += 1;
            }
        }
        if fully_inside == self.planes.len() {
            SphereContainment::Inside
        } else {
            SphereContainment::Intersecting
        }
    }

    /// Returns `true` when `point` is inside every plane.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.signed_distance(point) > 0.0)
    }
}

/// A half-line used for picking-style queries against bounding volumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The start point.
    pub origin: Vec3,
    /// The unit direction.
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray, normalising the direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// The point at parameter `t` along the ray.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance to the first intersection with `sphere`, if any.
    ///
    /// An origin inside the sphere reports the exit point.
    pub fn intersect_sphere(&self, sphere: &BoundingSphere) -> Option<f32> {
        let l = self.origin - sphere.center;
        let b = l.dot(self.direction);
        let c = l.length_squared() - sphere.radius * sphere.radius;
        if c > 0.0 && b > 0.0 {
            return None;
        }
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let t = -b - sq;
        Some(if t < 0.0 { -b + sq } else { t })
    }

    /// Distance to the entry point of `aabb` (slab test), if any.
    pub fn intersect_aabb(&self, aabb: &Aabb) -> Option<f32> {
        let (lo, hi) = (aabb.min(), aabb.max());
        let mut t_min = 0.0f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let o = self.origin[axis];
            let d = self.direction[axis];
            if d.abs() < f32::EPSILON {
                if o < lo[axis] || o > hi[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (mut t0, mut t1) = ((lo[axis] - o) * inv, (hi[axis] - o) * inv);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}
