use cgmath::InnerSpace;
use imark_base::Tolerance;

use crate::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Below this `|direction · normal|` the ray is treated as parallel to a plane.
    pub precision: f64,
}

impl Ray {
    /// Builds a ray with a normalized direction. A zero direction stays zero and
    /// makes every query against the ray degenerate.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let len2 = direction.magnitude2();
        let direction = if len2 <= f64::EPSILON * f64::EPSILON {
            direction
        } else {
            direction / len2.sqrt()
        };
        Self {
            origin,
            direction,
            precision: Tolerance::default().ray_precision,
        }
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Intersects `ray` with the plane through `plane_origin` with normal `plane_normal`.
///
/// Negative ray parameters are allowed: the ray is treated as a line. Returns
/// `None` when the ray is parallel to the plane within `ray.precision`.
pub fn intersect_plane(ray: &Ray, plane_origin: Vec3, plane_normal: Vec3) -> Option<Vec3> {
    let dot = ray.direction.dot(plane_normal);
    if dot.abs() < ray.precision {
        return None;
    }
    let t = plane_normal.dot(plane_origin - ray.origin) / dot;
    Some(ray.at(t))
}

/// Parameter along `target` of the point closest to the line carrying `other`
/// (Bourke's line-line closest approach). `None` for near-parallel rays.
pub fn closest_point_on_ray_pair(target: &Ray, other: &Ray) -> Option<f64> {
    let v13 = target.origin - other.origin;
    let v43 = other.direction;
    let v21 = target.direction;

    let d1343 = v13.dot(v43);
    let d4321 = v43.dot(v21);
    let d1321 = v13.dot(v21);
    let d4343 = v43.dot(v43);
    let d2121 = v21.dot(v21);

    let denom = d2121 * d4343 - d4321 * d4321;
    if denom.abs() <= Tolerance::default().ray_pair {
        return None;
    }
    let numer = d1343 * d4321 - d1321 * d4343;
    Some(numer / denom)
}

/// Nearest non-negative hit distance of `ray` against a sphere.
pub fn ray_sphere(ray: &Ray, center: Vec3, radius: f64) -> Option<f64> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.dot(oc) - radius * radius;
    let a = ray.direction.dot(ray.direction);
    if a <= f64::EPSILON {
        return None;
    }
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt = disc.sqrt();
    let near = (-b - sqrt) / a;
    let far = (-b + sqrt) / a;
    if near >= 0.0 {
        Some(near)
    } else if far >= 0.0 {
        Some(far)
    } else {
        None
    }
}

/// Slab test against the box `[-half, half]` centered on the origin. The ray is
/// expected to already be expressed in the box frame.
pub fn ray_box(ray: &Ray, half_extents: Vec3) -> Option<f64> {
    let origin = [ray.origin.x, ray.origin.y, ray.origin.z];
    let dir = [ray.direction.x, ray.direction.y, ray.direction.z];
    let half = [half_extents.x, half_extents.y, half_extents.z];

    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    for axis in 0..3 {
        if dir[axis].abs() <= f64::EPSILON {
            if origin[axis] < -half[axis] || origin[axis] > half[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir[axis];
        let mut t0 = (-half[axis] - origin[axis]) * inv;
        let mut t1 = (half[axis] - origin[axis]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    if t_min >= 0.0 {
        Some(t_min)
    } else if t_max >= 0.0 {
        Some(t_max)
    } else {
        None
    }
}
