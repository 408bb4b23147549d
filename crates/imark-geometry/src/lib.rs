pub use cgmath::{Deg, InnerSpace, Matrix3, Matrix4, Rad, Rotation, Rotation3, Vector2, Vector3, Vector4};

mod camera;
mod pose;
mod ray;

pub use camera::{Camera, closest_axis_screen_point};
pub use pose::{Pose, Transform, normalize_quat};
pub use ray::{Ray, closest_point_on_ray_pair, intersect_plane, ray_box, ray_sphere};

pub type Vec2 = Vector2<f64>;
pub type Vec3 = Vector3<f64>;
pub type Quat = cgmath::Quaternion<f64>;

pub const UNIT_X: Vec3 = Vector3 { x: 1.0, y: 0.0, z: 0.0 };
pub const UNIT_Y: Vec3 = Vector3 { x: 0.0, y: 1.0, z: 0.0 };
pub const UNIT_Z: Vec3 = Vector3 { x: 0.0, y: 0.0, z: 1.0 };
pub const ZERO: Vec3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

pub fn identity_quat() -> Quat {
    Quat::new(1.0, 0.0, 0.0, 0.0)
}

/// Rotates `v` by the unit quaternion `q`.
pub fn rotate(q: Quat, v: Vec3) -> Vec3 {
    q.rotate_vector(v)
}

/// Signed angle of the rotation `q` about `axis`, in `(-PI, PI]`.
pub fn angle_about(q: Quat, axis: Vec3) -> f64 {
    let axis = axis.normalize();
    let q = normalize_quat(q);
    let angle = 2.0 * q.v.dot(axis).atan2(q.s);
    if angle > std::f64::consts::PI {
        angle - 2.0 * std::f64::consts::PI
    } else if angle <= -std::f64::consts::PI {
        angle + 2.0 * std::f64::consts::PI
    } else {
        angle
    }
}
