//! Collision shapes and the shape type lattice.

use std::fmt::Debug;

use cgmath::prelude::*;
use cgmath::{BaseFloat, Point3, Vector3};
use collision::Aabb3;

use crate::transform::{aabb_from_half_extent, Transform};

/// Shape type tag.
///
/// Tags form a single-parent hierarchy used by the narrowphase factory to
/// fall back to more generic algorithms: a shape pair without a bespoke
/// algorithm walks up the parent chain until a match is found. The ordering
/// of tags is significant; collision pairs are canonicalized so that the
/// lower tag comes first.
///
/// The enumeration is open: user shapes pick tags above
/// [`ShapeType::FIRST_USER_TYPE`](struct.ShapeType.html) and register them
/// with the factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeType(pub i32);

impl ShapeType {
    /// Generic convex shape, parent of `BOX` and `SPHERE`.
    pub const CONVEX: ShapeType = ShapeType(0);
    /// Box shape.
    pub const BOX: ShapeType = ShapeType(1);
    /// Sphere shape.
    pub const SPHERE: ShapeType = ShapeType(2);
    /// Infinite axis-aligned plane.
    pub const AXIS_ALIGNED_PLANE: ShapeType = ShapeType(3);
    /// First tag value available to user shapes.
    pub const FIRST_USER_TYPE: ShapeType = ShapeType(16);
}

/// Static shape type information, used when registering shape types with the
/// narrowphase factory.
pub trait ShapeTypeInfo {
    /// The tag of this shape type.
    const TYPE: ShapeType;
    /// The parent tag, if any.
    const PARENT: Option<ShapeType>;
}

/// Sphere centered on its local origin.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sphere<S> {
    /// Sphere radius.
    pub radius: S,
}

impl<S> Sphere<S> {
    /// Create a sphere with the given radius.
    pub fn new(radius: S) -> Self {
        Self { radius }
    }
}

impl<S> ShapeTypeInfo for Sphere<S> {
    const TYPE: ShapeType = ShapeType::SPHERE;
    const PARENT: Option<ShapeType> = Some(ShapeType::CONVEX);
}

/// Box given by its half extent along each local axis.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cuboid<S> {
    /// Half extent along each local axis.
    pub half_extent: Vector3<S>,
}

impl<S> Cuboid<S> {
    /// Create a box from its half extent.
    pub fn new(half_extent: Vector3<S>) -> Self {
        Self { half_extent }
    }
}

impl<S> ShapeTypeInfo for Cuboid<S> {
    const TYPE: ShapeType = ShapeType::BOX;
    const PARENT: Option<ShapeType> = Some(ShapeType::CONVEX);
}

/// Infinite plane aligned with one of the world axes.
///
/// Infinite planes are only supported axis-aligned, anything else would need
/// an infinite AABB on all three axes which the broadphase handles poorly
/// (and a `Y = d` floor is the overwhelmingly common case). The owning body
/// must keep the identity transform; the plane's placement is entirely in
/// `axis` and `distance`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisAlignedPlane<S> {
    /// The normal axis: 0 = X, 1 = Y, 2 = Z.
    pub axis: usize,
    /// Signed distance from the origin along the normal axis.
    pub distance: S,
}

impl<S> AxisAlignedPlane<S>
where
    S: BaseFloat,
{
    /// Create a plane on the given axis at the given signed distance.
    pub fn new(axis: usize, distance: S) -> Self {
        assert!(axis < 3, "plane axis out of range: {}", axis);
        Self { axis, distance }
    }

    /// Plane normal: the positive basis vector of the plane's axis.
    pub fn normal(&self) -> Vector3<S> {
        let mut n = Vector3::zero();
        n[self.axis] = S::one();
        n
    }
}

impl<S> ShapeTypeInfo for AxisAlignedPlane<S> {
    const TYPE: ShapeType = ShapeType::AXIS_ALIGNED_PLANE;
    const PARENT: Option<ShapeType> = None;
}

/// Capability set for user supplied shapes.
///
/// A custom shape provides the same operations as the built in ones: its
/// type tag, a world space bounding box, a diagonal inertia and a support
/// function. Register the tag (and a parent, typically
/// [`ShapeType::CONVEX`](struct.ShapeType.html)) with the narrowphase
/// factory before use.
pub trait CustomShape<S>: Debug + Send + Sync {
    /// The registered type tag of this shape.
    fn shape_type(&self) -> ShapeType;
    /// World space bounding box under the given transform.
    fn aabb(&self, transform: &Transform<S>) -> Aabb3<S>;
    /// Diagonal of the local inertia tensor for the given mass.
    fn inertia(&self, mass: S) -> Vector3<S>;
    /// The vertex farthest along `direction`, in the local frame.
    fn support(&self, direction: Vector3<S>) -> Vector3<S>;
}

/// A collision shape.
///
/// Shapes are owned by the caller and immutable during a step; bodies only
/// borrow them. The four built in variants cover the common cases, `Custom`
/// is the extension point.
#[derive(Debug)]
pub enum Shape<S> {
    /// Sphere.
    Sphere(Sphere<S>),
    /// Box.
    Cuboid(Cuboid<S>),
    /// Infinite axis-aligned plane.
    Plane(AxisAlignedPlane<S>),
    /// User supplied shape.
    Custom(Box<dyn CustomShape<S>>),
}

impl<S> Shape<S>
where
    S: BaseFloat,
{
    /// The type tag of this shape.
    pub fn shape_type(&self) -> ShapeType {
        match *self {
            Shape::Sphere(_) => ShapeType::SPHERE,
            Shape::Cuboid(_) => ShapeType::BOX,
            Shape::Plane(_) => ShapeType::AXIS_ALIGNED_PLANE,
            Shape::Custom(ref shape) => shape.shape_type(),
        }
    }

    /// World space bounding box of the shape under the given transform.
    pub fn aabb(&self, transform: &Transform<S>) -> Aabb3<S> {
        match *self {
            Shape::Sphere(ref sphere) => {
                let r = Vector3::from_value(sphere.radius);
                Aabb3::new(
                    Point3::from_vec(transform.translation - r),
                    Point3::from_vec(transform.translation + r),
                )
            }
            Shape::Cuboid(ref cuboid) => aabb_from_half_extent(cuboid.half_extent, transform),
            Shape::Plane(ref plane) => {
                let epsilon = S::from(0.1).unwrap();
                let mut min = Vector3::from_value(S::min_value());
                let mut max = Vector3::from_value(S::max_value());
                min[plane.axis] = plane.distance - epsilon;
                max[plane.axis] = plane.distance + epsilon;
                Aabb3::new(Point3::from_vec(min), Point3::from_vec(max))
            }
            Shape::Custom(ref shape) => shape.aabb(transform),
        }
    }

    /// Diagonal of the local inertia tensor for the given mass.
    ///
    /// Infinite planes have no meaningful inertia; attaching one to a
    /// dynamic body is a programming error.
    pub fn inertia(&self, mass: S) -> Vector3<S> {
        match *self {
            Shape::Sphere(ref sphere) => {
                let elem = S::from(0.4).unwrap() * mass * sphere.radius * sphere.radius;
                Vector3::from_value(elem)
            }
            Shape::Cuboid(ref cuboid) => {
                let size = cuboid.half_extent * S::from(2.).unwrap();
                let size_sq = size.mul_element_wise(size);
                let twelfth = mass / S::from(12.).unwrap();
                Vector3::new(
                    twelfth * (size_sq.y + size_sq.z),
                    twelfth * (size_sq.x + size_sq.z),
                    twelfth * (size_sq.x + size_sq.y),
                )
            }
            Shape::Plane(_) => panic!("inertia queried for an infinite plane"),
            Shape::Custom(ref shape) => shape.inertia(mass),
        }
    }

    /// The vertex farthest along `direction` in the local frame.
    ///
    /// Only meaningful for convex shapes; the direction does not need to be
    /// normalized.
    pub fn support(&self, direction: Vector3<S>) -> Vector3<S> {
        match *self {
            Shape::Sphere(ref sphere) => direction * sphere.radius,
            Shape::Cuboid(ref cuboid) => {
                let h = cuboid.half_extent;
                Vector3::new(
                    if direction.x >= S::zero() { h.x } else { -h.x },
                    if direction.y >= S::zero() { h.y } else { -h.y },
                    if direction.z >= S::zero() { h.z } else { -h.z },
                )
            }
            Shape::Plane(_) => panic!("support queried for a non-convex shape"),
            Shape::Custom(ref shape) => shape.support(direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Matrix3};

    use super::*;

    #[test]
    fn sphere_aabb_follows_translation() {
        let shape = Shape::Sphere(Sphere::new(2.0f32));
        let aabb = shape.aabb(&Transform::from_translation(Vector3::new(1., 5., -1.)));
        assert_eq!(aabb.min, Point3::new(-1., 3., -3.));
        assert_eq!(aabb.max, Point3::new(3., 7., 1.));
    }

    #[test]
    fn cuboid_aabb_grows_under_rotation() {
        let shape = Shape::Cuboid(Cuboid::new(Vector3::new(1.0f32, 1., 1.)));
        let t = Transform::new(Matrix3::from_angle_y(Deg(45.0f32)), Vector3::zero());
        let aabb = shape.aabb(&t);
        assert_relative_eq!(aabb.max.x, 2.0f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(aabb.max.y, 1., epsilon = 1e-5);
    }

    #[test]
    fn plane_aabb_is_thin_on_its_axis() {
        let shape = Shape::Plane(AxisAlignedPlane::new(1, 0.0f32));
        let aabb = shape.aabb(&Transform::default());
        assert_eq!(aabb.min.y, -0.1);
        assert_eq!(aabb.max.y, 0.1);
        assert_eq!(aabb.min.x, f32::MIN);
        assert_eq!(aabb.max.z, f32::MAX);
    }

    #[test]
    fn cuboid_support_picks_matching_corner() {
        let shape = Shape::Cuboid(Cuboid::new(Vector3::new(1.0f32, 2., 3.)));
        assert_eq!(
            shape.support(Vector3::new(0.3, -0.1, 0.9)),
            Vector3::new(1., -2., 3.)
        );
        // Zero components resolve to the positive half extent.
        assert_eq!(
            shape.support(Vector3::new(0., -1., 0.)),
            Vector3::new(1., -2., 3.)
        );
    }

    #[test]
    fn sphere_support_scales_direction() {
        let shape = Shape::Sphere(Sphere::new(3.0f32));
        assert_eq!(shape.support(Vector3::new(0., 1., 0.)), Vector3::new(0., 3., 0.));
    }

    #[test]
    fn inertia_diagonals() {
        let sphere = Shape::Sphere(Sphere::new(2.0f32));
        assert_relative_eq!(sphere.inertia(1.).x, 1.6);

        let cuboid = Shape::Cuboid(Cuboid::new(Vector3::new(1.0f32, 1., 1.)));
        let inertia = cuboid.inertia(3.);
        assert_relative_eq!(inertia.x, 2.);
        assert_relative_eq!(inertia.y, 2.);
        assert_relative_eq!(inertia.z, 2.);
    }

    #[test]
    fn plane_normal_is_basis_vector() {
        let plane = AxisAlignedPlane::new(2, 1.0f32);
        assert_eq!(plane.normal(), Vector3::new(0., 0., 1.));
    }
}
