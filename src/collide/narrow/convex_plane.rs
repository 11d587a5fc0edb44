//! Convex shape vs axis-aligned plane contact generation.

use cgmath::prelude::*;
use cgmath::BaseFloat;

use super::{AlgorithmInfo, ContactAlgorithm};
use crate::collide::shapes::{Shape, ShapeType};
use crate::collide::{CollisionObject, ContactManifold};

/// Any convex shape against an infinite axis-aligned plane, via a single
/// support query against the plane normal.
#[derive(Debug, Default)]
pub struct ConvexPlane;

impl AlgorithmInfo for ConvexPlane {
    const LHS_TYPE: ShapeType = ShapeType::CONVEX;
    const RHS_TYPE: ShapeType = ShapeType::AXIS_ALIGNED_PLANE;
}

impl<S> ContactAlgorithm<S> for ConvexPlane
where
    S: BaseFloat,
{
    fn process(
        &self,
        a: &CollisionObject<'_, S>,
        b: &CollisionObject<'_, S>,
        manifold: &mut ContactManifold<S>,
    ) {
        let plane = match *b.shape {
            Shape::Plane(ref plane) => plane,
            _ => panic!("convex/plane dispatched with a non-plane right-hand shape"),
        };

        // Infinite planes only work with identity transforms.
        assert!(
            b.transform.is_identity(),
            "axis-aligned plane attached to a transformed body"
        );

        let normal = plane.normal();

        let plane_to_convex = a.transform.inverse();
        let normal_in_object_space = plane_to_convex.rotation * -normal;
        let support = a.shape.support(normal_in_object_space);

        let vertex_ws = a.transform.apply(support);
        let distance = normal.dot(vertex_ws) - plane.distance;

        let projected = vertex_ws - normal * distance;

        if distance < manifold.contact_distance() {
            manifold.add_contact(&a.transform, &b.transform, normal, projected, distance);
        }
    }
}
