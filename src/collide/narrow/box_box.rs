//! Box vs box contact generation via the separating axis test.

use cgmath::prelude::*;
use cgmath::{BaseFloat, Vector3};

use super::{AlgorithmInfo, ContactAlgorithm};
use crate::collide::shapes::{Shape, ShapeType};
use crate::collide::{CollisionObject, ContactManifold};

/// Box vs box separating axis test.
///
/// Tests the 15 candidate axes (3 face normals per box, 9 edge cross
/// products); any separating axis means no contact, otherwise the axis of
/// minimum penetration defines the contact normal. A single deepest point is
/// emitted per step and the persistent manifold accumulates the patch.
#[derive(Debug, Default)]
pub struct BoxBox;

impl AlgorithmInfo for BoxBox {
    const LHS_TYPE: ShapeType = ShapeType::BOX;
    const RHS_TYPE: ShapeType = ShapeType::BOX;
}

impl<S> ContactAlgorithm<S> for BoxBox
where
    S: BaseFloat,
{
    fn process(
        &self,
        a: &CollisionObject<'_, S>,
        b: &CollisionObject<'_, S>,
        manifold: &mut ContactManifold<S>,
    ) {
        let (box_a, box_b) = match (a.shape, b.shape) {
            (&Shape::Cuboid(ref ba), &Shape::Cuboid(ref bb)) => (ba, bb),
            _ => panic!("box/box dispatched on non-box shapes"),
        };

        // From B's center toward A's center.
        let center_delta = a.transform.translation - b.transform.translation;

        let axes_a = [
            a.transform.rotation.x,
            a.transform.rotation.y,
            a.transform.rotation.z,
        ];
        let axes_b = [
            b.transform.rotation.x,
            b.transform.rotation.y,
            b.transform.rotation.z,
        ];

        let degenerate = S::from(1e-6).unwrap();

        let mut normal = Vector3::zero();
        let mut depth = S::max_value();

        let mut test_axis = |axis: Vector3<S>| -> bool {
            let length_sq = axis.magnitude2();
            if length_sq < degenerate {
                // Parallel edges; covered by the face axes.
                return true;
            }
            let axis = axis / length_sq.sqrt();

            let project = |axes: &[Vector3<S>; 3], half_extent: Vector3<S>| {
                axes[0].dot(axis).abs() * half_extent.x
                    + axes[1].dot(axis).abs() * half_extent.y
                    + axes[2].dot(axis).abs() * half_extent.z
            };

            let overlap = project(&axes_a, box_a.half_extent)
                + project(&axes_b, box_b.half_extent)
                - center_delta.dot(axis).abs();

            if overlap < S::zero() {
                return false;
            }
            if overlap < depth {
                depth = overlap;
                normal = if center_delta.dot(axis) < S::zero() {
                    -axis
                } else {
                    axis
                };
            }
            true
        };

        for &axis in &axes_a {
            if !test_axis(axis) {
                return;
            }
        }
        for &axis in &axes_b {
            if !test_axis(axis) {
                return;
            }
        }
        for &edge_a in &axes_a {
            for &edge_b in &axes_b {
                if !test_axis(edge_a.cross(edge_b)) {
                    return;
                }
            }
        }

        // Deepest point of B along the normal, i.e. toward A.
        let local_direction = b.transform.rotation.transpose() * normal;
        let point_on_b = b.transform.apply(b.shape.support(local_direction));

        let distance = -depth;
        if distance < manifold.contact_distance() {
            manifold.add_contact(&a.transform, &b.transform, normal, point_on_b, distance);
        }
    }
}
