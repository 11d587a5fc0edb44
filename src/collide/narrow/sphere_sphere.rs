//! Sphere vs sphere contact generation.

use cgmath::prelude::*;
use cgmath::{BaseFloat, Vector3};

use super::{AlgorithmInfo, ContactAlgorithm};
use crate::collide::shapes::{Shape, ShapeType};
use crate::collide::{CollisionObject, ContactManifold};

/// Analytic sphere vs sphere contact.
#[derive(Debug, Default)]
pub struct SphereSphere;

impl AlgorithmInfo for SphereSphere {
    const LHS_TYPE: ShapeType = ShapeType::SPHERE;
    const RHS_TYPE: ShapeType = ShapeType::SPHERE;
}

impl<S> ContactAlgorithm<S> for SphereSphere
where
    S: BaseFloat,
{
    fn process(
        &self,
        a: &CollisionObject<'_, S>,
        b: &CollisionObject<'_, S>,
        manifold: &mut ContactManifold<S>,
    ) {
        let (sphere_a, sphere_b) = match (a.shape, b.shape) {
            (&Shape::Sphere(ref sa), &Shape::Sphere(ref sb)) => (sa, sb),
            _ => panic!("sphere/sphere dispatched on non-sphere shapes"),
        };

        let contact_distance = sphere_a.radius + sphere_b.radius;

        let delta = a.transform.translation - b.transform.translation;
        let length = delta.magnitude();
        let distance = length - contact_distance;

        if distance < manifold.contact_distance() {
            // Coincident centers have no meaningful direction; emit a zero
            // normal rather than a NaN one.
            let normal = if length > S::zero() {
                delta / length
            } else {
                Vector3::zero()
            };

            let point_on_b = b.transform.translation + normal * sphere_b.radius;
            manifold.add_contact(&a.transform, &b.transform, normal, point_on_b, distance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collide::shapes::Sphere;
    use crate::transform::Transform;

    #[test]
    fn overlapping_spheres_produce_one_contact() {
        let shape_a = Shape::Sphere(Sphere::new(1.0f32));
        let shape_b = Shape::Sphere(Sphere::new(1.0f32));
        // The later-added sphere ends up as object A in the pair.
        let a = CollisionObject::new(&shape_a, Transform::from_translation(Vector3::new(1.9, 0., 0.)));
        let b = CollisionObject::new(&shape_b, Transform::default());

        let mut manifold = ContactManifold::new(0.02);
        SphereSphere.process(&a, &b, &mut manifold);

        assert_eq!(manifold.points().len(), 1);
        let point = &manifold.points()[0];
        assert_relative_eq!(point.normal, Vector3::new(1., 0., 0.), epsilon = 1e-6);
        assert_relative_eq!(point.distance, -0.1, epsilon = 1e-6);
        assert_relative_eq!(point.ws_position[1], Vector3::new(1., 0., 0.), epsilon = 1e-6);
    }

    #[test]
    fn separated_spheres_produce_nothing() {
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let a = CollisionObject::new(&shape, Transform::from_translation(Vector3::new(3., 0., 0.)));
        let b = CollisionObject::new(&shape, Transform::default());

        let mut manifold = ContactManifold::new(0.02);
        SphereSphere.process(&a, &b, &mut manifold);
        assert_eq!(manifold.points().len(), 0);
    }

    #[test]
    fn coincident_centers_use_zero_normal() {
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let a = CollisionObject::new(&shape, Transform::default());
        let b = CollisionObject::new(&shape, Transform::default());

        let mut manifold = ContactManifold::new(0.02);
        SphereSphere.process(&a, &b, &mut manifold);
        assert_eq!(manifold.points().len(), 1);
        assert_eq!(manifold.points()[0].normal, Vector3::new(0., 0., 0.));
    }

    #[test]
    fn unequal_radii_use_both() {
        let shape_a = Shape::Sphere(Sphere::new(2.0f32));
        let shape_b = Shape::Sphere(Sphere::new(0.5f32));
        let a = CollisionObject::new(&shape_a, Transform::from_translation(Vector3::new(2.4, 0., 0.)));
        let b = CollisionObject::new(&shape_b, Transform::default());

        let mut manifold = ContactManifold::new(0.02);
        SphereSphere.process(&a, &b, &mut manifold);
        assert_eq!(manifold.points().len(), 1);
        assert_relative_eq!(manifold.points()[0].distance, -0.1, epsilon = 1e-6);
    }
}
