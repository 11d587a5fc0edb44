//! Generic convex vs convex contact generation using GJK/EPA.

use std::fmt::{self, Debug};

use cgmath::prelude::*;
use cgmath::{BaseFloat, Point3, Vector3};
use collision::algorithm::minkowski::GJK3;
use collision::prelude::*;
use collision::CollisionStrategy;

use super::{AlgorithmInfo, ContactAlgorithm};
use crate::collide::shapes::{Shape, ShapeType};
use crate::collide::{CollisionObject, ContactManifold};

/// Adapts a convex [`Shape`](../shapes/enum.Shape.html) to the `collision`
/// crate's support mapping interface.
struct SupportMap<'s, S>(&'s Shape<S>);

impl<'s, S> Primitive for SupportMap<'s, S>
where
    S: BaseFloat,
{
    type Point = Point3<S>;

    fn support_point<T>(&self, direction: &Vector3<S>, transform: &T) -> Point3<S>
    where
        T: Transform<Point3<S>>,
    {
        let local_direction = transform
            .inverse_transform_vector(*direction)
            .unwrap_or(*direction);
        transform.transform_point(Point3::from_vec(self.0.support(local_direction)))
    }
}

/// Convex vs convex contact through the Minkowski-space GJK intersection
/// test, refined by EPA for the penetration vector. One contact per step;
/// the persistent manifold accumulates the contact patch.
pub struct ConvexConvex<S> {
    gjk: GJK3<S>,
}

impl<S> Debug for ConvexConvex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvexConvex").finish()
    }
}

impl<S> Default for ConvexConvex<S>
where
    S: BaseFloat,
{
    fn default() -> Self {
        Self { gjk: GJK3::new() }
    }
}

impl<S> AlgorithmInfo for ConvexConvex<S> {
    const LHS_TYPE: ShapeType = ShapeType::CONVEX;
    const RHS_TYPE: ShapeType = ShapeType::CONVEX;
}

impl<S> ContactAlgorithm<S> for ConvexConvex<S>
where
    S: BaseFloat + Send + Sync + 'static,
{
    fn process(
        &self,
        a: &CollisionObject<'_, S>,
        b: &CollisionObject<'_, S>,
        manifold: &mut ContactManifold<S>,
    ) {
        let contact = self.gjk.intersection(
            &CollisionStrategy::FullResolution,
            &SupportMap(a.shape),
            &a.transform,
            &SupportMap(b.shape),
            &b.transform,
        );

        if let Some(contact) = contact {
            // GJK reports the normal from A toward B and a positive
            // penetration depth; the manifold wants B toward A and a
            // negative separation.
            let normal = -contact.normal;
            let distance = -contact.penetration_depth;
            let point_on_b = contact.contact_point.to_vec();

            if distance < manifold.contact_distance() {
                manifold.add_contact(&a.transform, &b.transform, normal, point_on_b, distance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collide::shapes::{Cuboid, Sphere};
    use crate::transform::Transform;

    #[test]
    fn penetrating_boxes_produce_a_contact() {
        let shape = Shape::Cuboid(Cuboid::new(Vector3::new(1.0f32, 1., 1.)));
        let a = CollisionObject::new(&shape, Transform::default());
        let b = CollisionObject::new(&shape, Transform::from_translation(Vector3::new(1.8, 0., 0.)));

        let mut manifold = ContactManifold::new(0.02);
        ConvexConvex::default().process(&a, &b, &mut manifold);

        assert_eq!(manifold.points().len(), 1);
        let point = &manifold.points()[0];
        assert_relative_eq!(point.distance, -0.2, epsilon = 1e-4);
        assert_relative_eq!(point.normal, Vector3::new(-1., 0., 0.), epsilon = 1e-4);
    }

    #[test]
    fn box_against_sphere_overlap() {
        let box_shape = Shape::Cuboid(Cuboid::new(Vector3::new(1.0f32, 1., 1.)));
        let sphere_shape = Shape::Sphere(Sphere::new(1.0f32));
        let a = CollisionObject::new(&box_shape, Transform::default());
        let b = CollisionObject::new(
            &sphere_shape,
            Transform::from_translation(Vector3::new(1.9, 0., 0.)),
        );

        let mut manifold = ContactManifold::new(0.02);
        ConvexConvex::default().process(&a, &b, &mut manifold);

        assert_eq!(manifold.points().len(), 1);
        assert!(manifold.points()[0].distance < 0.);
    }

    #[test]
    fn separated_shapes_produce_nothing() {
        let shape = Shape::Cuboid(Cuboid::new(Vector3::new(1.0f32, 1., 1.)));
        let a = CollisionObject::new(&shape, Transform::default());
        let b = CollisionObject::new(&shape, Transform::from_translation(Vector3::new(5., 0., 0.)));

        let mut manifold = ContactManifold::new(0.02);
        ConvexConvex::default().process(&a, &b, &mut manifold);
        assert_eq!(manifold.points().len(), 0);
    }
}
