use cgmath::{Deg, InnerSpace, Matrix3, Matrix4, Rotation, SquareMatrix};
use imark_base::{Error, Result, Tolerance, ensure_finite};

use crate::{Quat, Ray, Transform, UNIT_Z, Vec2, Vec3, closest_point_on_ray_pair, identity_quat};

/// Perspective camera looking down its local -Z axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
    /// World up used by [`Camera::look_at`].
    pub up: Vec3,
    pub fov_deg: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl Camera {
    pub fn perspective(fov_deg: f64, aspect: f64, near: f64, far: f64) -> Result<Self> {
        ensure_finite("fov", fov_deg)?;
        ensure_finite("aspect", aspect)?;
        if !(fov_deg > 0.0 && fov_deg < 180.0) {
            return Err(Error::InvalidParameter(format!(
                "fov must be within (0, 180) degrees, got {fov_deg}"
            )));
        }
        if aspect <= 0.0 {
            return Err(Error::InvalidParameter("aspect must be > 0".to_string()));
        }
        if !(near > 0.0 && far > near) {
            return Err(Error::InvalidParameter(format!(
                "clip planes must satisfy 0 < near < far, got {near}..{far}"
            )));
        }
        Ok(Self {
            position: Vec3::new(0.0, 0.0, 0.0),
            orientation: identity_quat(),
            up: UNIT_Z,
            fov_deg,
            aspect,
            near,
            far,
        })
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        if aspect > 0.0 && aspect.is_finite() {
            self.aspect = aspect;
        }
    }

    /// Points the local -Z axis at `target`, keeping local +Y as close to `self.up`
    /// as possible.
    pub fn look_at(&mut self, target: Vec3) {
        let mut z = self.position - target;
        if z.magnitude2() <= f64::EPSILON {
            z = UNIT_Z;
        }
        let z = z.normalize();
        let mut x = self.up.cross(z);
        if x.magnitude2() <= f64::EPSILON {
            let nudged = if self.up.z.abs() > 0.9 {
                Vec3::new(z.x + 1.0e-4, z.y, z.z)
            } else {
                Vec3::new(z.x, z.y, z.z + 1.0e-4)
            };
            x = self.up.cross(nudged.normalize());
        }
        let x = x.normalize();
        let y = z.cross(x);
        self.orientation = Quat::from(Matrix3::from_cols(x, y, z));
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation.rotate_vector(-UNIT_Z)
    }

    pub fn world_transform(&self) -> Transform {
        Transform::new(self.position, self.orientation)
    }

    pub fn view_matrix(&self) -> Matrix4<f64> {
        let inv = self.world_transform().inverse();
        Matrix4::from_translation(inv.translation) * Matrix4::from(inv.rotation)
    }

    pub fn projection_matrix(&self) -> Matrix4<f64> {
        cgmath::perspective(Deg(self.fov_deg), self.aspect, self.near, self.far)
    }

    /// World point to normalized device coordinates.
    pub fn project(&self, point: Vec3) -> Vec3 {
        let clip = self.projection_matrix() * self.view_matrix() * point.extend(1.0);
        if clip.w.abs() <= f64::EPSILON {
            return clip.truncate();
        }
        clip.truncate() / clip.w
    }

    /// Normalized device coordinates back to a world point.
    pub fn unproject(&self, ndc: Vec3) -> Option<Vec3> {
        let inv = (self.projection_matrix() * self.view_matrix()).invert()?;
        let world = inv * ndc.extend(1.0);
        if world.w.abs() <= f64::EPSILON {
            return None;
        }
        Some(world.truncate() / world.w)
    }

    /// Ray from the camera through a device-space point in `[-1, 1]²`.
    pub fn ray_through(&self, ndc: Vec2) -> Option<Ray> {
        let target = self.unproject(Vec3::new(ndc.x, ndc.y, 0.5))?;
        Some(Ray::new(self.position, target - self.position))
    }
}

/// Parameter along `axis_ray` of the point that best follows `screen_point`.
///
/// The axis is projected into device space, the screen point is projected onto
/// that 2D segment, and a camera ray through the result is intersected with the
/// 3D axis. `None` when the axis collapses to a point on screen or the camera
/// ray runs parallel to the axis.
pub fn closest_axis_screen_point(axis_ray: &Ray, camera: &Camera, screen_point: Vec2) -> Option<f64> {
    let o = camera.project(axis_ray.origin);
    let o2 = camera.project(axis_ray.origin + axis_ray.direction);
    let o = Vec2::new(o.x, o.y);
    let d = Vec2::new(o2.x, o2.y) - o;

    let dd = d.dot(d);
    if dd <= Tolerance::default().screen_axis || !dd.is_finite() {
        return None;
    }
    let t = (screen_point - o).dot(d) / dd;
    let mp = o + d * t;

    let mouse_ray = camera.ray_through(mp)?;
    closest_point_on_ray_pair(axis_ray, &mouse_ray)
}
