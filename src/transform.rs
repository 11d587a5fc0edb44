//! Rigid transforms and transform integration.

use cgmath::prelude::*;
use cgmath::{BaseFloat, Matrix3, Point3, Quaternion, Vector3};
use collision::Aabb3;

/// Rigid body transform: a rotation matrix and a translation.
///
/// The rotation is kept in matrix form because the collision pipeline mostly
/// rotates vectors; integration converts through a quaternion and writes the
/// result back as a matrix.
///
/// ### Type parameters:
///
/// - `S`: Scalar type, `f32` or `f64`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform<S> {
    /// Rotation part, an orthonormal basis.
    pub rotation: Matrix3<S>,
    /// Translation part.
    pub translation: Vector3<S>,
}

impl<S> Default for Transform<S>
where
    S: BaseFloat,
{
    fn default() -> Self {
        Self::new(Matrix3::identity(), Vector3::zero())
    }
}

impl<S> Transform<S>
where
    S: BaseFloat,
{
    /// Create a transform from a rotation matrix and a translation.
    pub fn new(rotation: Matrix3<S>, translation: Vector3<S>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Create a pure translation.
    pub fn from_translation(translation: Vector3<S>) -> Self {
        Self::new(Matrix3::identity(), translation)
    }

    /// Set the rotation from a quaternion.
    pub fn set_rotation(&mut self, rotation: Quaternion<S>) {
        self.rotation = Matrix3::from(rotation);
    }

    /// Transform a point given in local coordinates into world coordinates.
    pub fn apply(&self, v: Vector3<S>) -> Vector3<S> {
        self.rotation * v + self.translation
    }

    /// Transform a world coordinate back into the local frame.
    pub fn apply_inverse(&self, v: Vector3<S>) -> Vector3<S> {
        self.rotation.transpose() * (v - self.translation)
    }

    /// Rotate a direction into world coordinates, ignoring translation.
    pub fn apply_to_direction(&self, v: Vector3<S>) -> Vector3<S> {
        self.rotation * v
    }

    /// Compute the inverse transform.
    ///
    /// Relies on the rotation being orthonormal, so the inverse rotation is
    /// the transpose.
    pub fn inverse(&self) -> Self {
        let inv_rot = self.rotation.transpose();
        Self::new(inv_rot, inv_rot * -self.translation)
    }

    /// Is this the identity transform ?
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

impl<S> cgmath::Transform<Point3<S>> for Transform<S>
where
    S: BaseFloat,
{
    fn one() -> Self {
        Self::default()
    }

    fn look_at(eye: Point3<S>, center: Point3<S>, up: Vector3<S>) -> Self {
        let rotation = Matrix3::look_at(center - eye, up);
        let translation = rotation * (Point3::origin() - eye);
        Self::new(rotation, translation)
    }

    fn transform_vector(&self, vec: Vector3<S>) -> Vector3<S> {
        self.rotation * vec
    }

    fn inverse_transform_vector(&self, vec: Vector3<S>) -> Option<Vector3<S>> {
        Some(self.rotation.transpose() * vec)
    }

    fn transform_point(&self, point: Point3<S>) -> Point3<S> {
        Point3::from_vec(self.apply(point.to_vec()))
    }

    fn concat(&self, other: &Self) -> Self {
        Self::new(
            self.rotation * other.rotation,
            self.rotation * other.translation + self.translation,
        )
    }

    fn inverse_transform(&self) -> Option<Self> {
        Some(self.inverse())
    }
}

/// Integrate a transform over a time step with the given linear and angular
/// velocities.
///
/// Translation is `x + v·dt`. Rotation composes a delta quaternion built from
/// the angular velocity onto the current orientation; for small angles the
/// `sin(θ)/θ` factor is replaced by its Taylor expansion to avoid
/// cancellation.
pub fn integrate_transform<S>(
    transform: &Transform<S>,
    linear_velocity: Vector3<S>,
    angular_velocity: Vector3<S>,
    dt: S,
) -> Transform<S>
where
    S: BaseFloat,
{
    let half = S::from(0.5).unwrap();

    let mut result = *transform;
    result.translation = transform.translation + linear_velocity * dt;

    let angle = angular_velocity.magnitude();

    let axis = if angle * dt < S::from(2e-3).unwrap() {
        // Taylor expansion of sin(θ·dt/2)/θ around zero.
        angular_velocity
            * (half * dt - (dt * dt * dt) * S::from(0.020_833_333_333).unwrap() * angle * angle)
    } else {
        angular_velocity * ((half * angle * dt).sin() / angle)
    };

    let delta = Quaternion::new((half * angle * dt).cos(), axis.x, axis.y, axis.z);
    let orientation: Quaternion<S> = Quaternion::from(transform.rotation);

    result.set_rotation((delta * orientation).normalize());
    result
}

/// Element-wise absolute value of a rotation matrix.
pub(crate) fn matrix_abs<S>(m: &Matrix3<S>) -> Matrix3<S>
where
    S: BaseFloat,
{
    Matrix3::from_cols(
        m.x.map(|e| e.abs()),
        m.y.map(|e| e.abs()),
        m.z.map(|e| e.abs()),
    )
}

/// Compute the world space bounding box of an oriented box given by its half
/// extent, via `|R|·h`.
pub fn aabb_from_half_extent<S>(half_extent: Vector3<S>, transform: &Transform<S>) -> Aabb3<S>
where
    S: BaseFloat,
{
    let rotated_extent = matrix_abs(&transform.rotation) * half_extent;
    Aabb3::new(
        Point3::from_vec(transform.translation - rotated_extent),
        Point3::from_vec(transform.translation + rotated_extent),
    )
}
