use cgmath::{InnerSpace, Rotation};

use crate::{Quat, Vec3, ZERO, identity_quat};

/// Normalizes `q`, falling back to identity for a zero quaternion.
pub fn normalize_quat(q: Quat) -> Quat {
    let len2 = q.magnitude2();
    if len2 <= f64::EPSILON || !len2.is_finite() {
        identity_quat()
    } else {
        q / len2.sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn identity() -> Self {
        Self::new(ZERO, identity_quat())
    }

    pub fn normalized(self) -> Self {
        Self::new(self.position, normalize_quat(self.orientation))
    }

    /// `tf ∘ self`: rotate the position by the transform, then translate; the
    /// orientation is pre-multiplied by the transform's rotation.
    pub fn transformed(&self, tf: &Transform) -> Self {
        Self {
            position: tf.rotation.rotate_vector(self.position) + tf.translation,
            orientation: tf.rotation * self.orientation,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self::new(ZERO, identity_quat())
    }

    pub fn from_pose(pose: &Pose) -> Self {
        Self::new(pose.position, pose.orientation)
    }

    pub fn inverse(&self) -> Self {
        let rotation = normalize_quat(self.rotation).conjugate();
        Self {
            translation: -rotation.rotate_vector(self.translation),
            rotation,
        }
    }

    /// Composition where `other` is applied first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            translation: self.rotation.rotate_vector(other.translation) + self.translation,
            rotation: self.rotation * other.rotation,
        }
    }

    pub fn apply(&self, pose: &Pose) -> Pose {
        pose.transformed(self)
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.rotate_vector(point) + self.translation
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation.rotate_vector(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rad, Rotation3, UNIT_Z};
    use std::f64::consts::FRAC_PI_2;

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!((a - b).magnitude() < 1.0e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn transform_rotates_then_translates() {
        let tf = Transform::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_axis_angle(UNIT_Z, Rad(FRAC_PI_2)),
        );
        let pose = Pose::new(Vec3::new(1.0, 0.0, 0.0), identity_quat());
        let out = tf.apply(&pose);
        assert_vec_close(out.position, Vec3::new(1.0, 1.0, 0.0));
        assert!((out.orientation - tf.rotation).magnitude() < 1.0e-9);
    }

    #[test]
    fn inverse_recovers_original_pose() {
        let tf = Transform::new(
            Vec3::new(0.5, -2.0, 3.0),
            Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), Rad(0.7)),
        );
        let pose = Pose::new(
            Vec3::new(4.0, 5.0, 6.0),
            Quat::from_axis_angle(UNIT_Z, Rad(0.3)),
        );
        let back = tf.inverse().apply(&tf.apply(&pose));
        assert_vec_close(back.position, pose.position);
        assert!((back.orientation - pose.orientation).magnitude() < 1.0e-9);
    }

    #[test]
    fn zero_quaternion_normalizes_to_identity() {
        let q = normalize_quat(Quat::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(q, identity_quat());
    }
}
