//! Collision detection: objects, contacts, persistent manifolds, broad and
//! narrow phase.

pub mod broad;
pub mod narrow;
pub mod shapes;
pub mod world;

use arrayvec::ArrayVec;
use cgmath::prelude::*;
use cgmath::{BaseFloat, Vector3};
use collision::Aabb3;

use self::broad::BroadphaseHandle;
use self::shapes::Shape;
use crate::transform::Transform;

/// Maximum number of cached contact points per manifold.
pub const MAX_CONTACTS: usize = 4;

/// Which kind of body owns a collision object, together with the body's slot.
///
/// Carrying the slot inside the variant keeps the owner kind and the owner
/// handle in agreement by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    /// Not owned by any body.
    None,
    /// Owned by a static body.
    Static,
    /// Owned by the dynamic body in the given slot.
    Dynamic(u32),
    /// Owned by a kinematic body in the given slot.
    Kinematic(u32),
}

impl Owner {
    /// The dynamic body slot, if the owner is a dynamic body.
    pub fn dynamic_slot(&self) -> Option<u32> {
        match *self {
            Owner::Dynamic(slot) => Some(slot),
            _ => None,
        }
    }
}

/// An object registered with the collision world.
///
/// Owns the current transform and borrows its shape; shapes are caller
/// owned and must outlive every object referencing them.
///
/// ### Type parameters:
///
/// - `S`: Scalar type, `f32` or `f64`
#[derive(Debug)]
pub struct CollisionObject<'a, S> {
    /// The collision shape.
    pub shape: &'a Shape<S>,
    /// Current model-to-world transform.
    pub transform: Transform<S>,

    pub(crate) owner: Owner,
    pub(crate) restitution: S,
    pub(crate) handle: BroadphaseHandle,
}

impl<'a, S> CollisionObject<'a, S>
where
    S: BaseFloat,
{
    /// Create an unowned collision object.
    pub fn new(shape: &'a Shape<S>, transform: Transform<S>) -> Self {
        Self {
            shape,
            transform,
            owner: Owner::None,
            restitution: S::zero(),
            handle: BroadphaseHandle(u32::max_value()),
        }
    }

    /// The owning body, if any.
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Does this object respond to forces ?
    pub fn accepts_forces(&self) -> bool {
        self.owner.dynamic_slot().is_some()
    }

    /// Is this object taking part in the simulation this step ?
    pub fn is_active(&self) -> bool {
        true
    }

    /// World space bounding box under the current transform.
    pub fn aabb(&self) -> Aabb3<S> {
        self.shape.aabb(&self.transform)
    }
}

/// A single contact between two bodies.
///
/// Positions are cached both in world space and in each body's object
/// space; the object space positions survive between steps and are used to
/// refresh the world space ones. The normal is in world space and points
/// from body B toward body A. Negative distance means penetration.
#[derive(Clone, Copy, Debug)]
pub struct ContactPoint<S> {
    /// World space contact position on A and B.
    pub ws_position: [Vector3<S>; 2],
    /// Object space contact position on A and B.
    pub os_position: [Vector3<S>; 2],
    /// World space contact normal, pointing from B toward A.
    pub normal: Vector3<S>,
    /// Signed separation distance along the normal.
    pub distance: S,
}

/// Persistent contact manifold between an ordered pair of objects.
///
/// Holds up to [`MAX_CONTACTS`](constant.MAX_CONTACTS.html) points. Each
/// step the cached points are refreshed against the current transforms and
/// the narrow phase adds new ones; points beyond the capacity replace the
/// least valuable cached point, never the deepest one.
#[derive(Debug)]
pub struct ContactManifold<S> {
    points: ArrayVec<ContactPoint<S>, MAX_CONTACTS>,
    contact_distance: S,
    /// Combined restitution of the two bodies.
    pub restitution: S,
    pub(crate) island: u32,
}

impl<S> ContactManifold<S>
where
    S: BaseFloat,
{
    /// Create an empty manifold with the given contact distance threshold.
    pub fn new(contact_distance: S) -> Self {
        Self {
            points: ArrayVec::new(),
            contact_distance,
            restitution: S::zero(),
            island: u32::max_value(),
        }
    }

    /// Distance below which the narrow phase reports a contact.
    pub fn contact_distance(&self) -> S {
        self.contact_distance
    }

    /// Squared contact distance, the equivalence threshold for point
    /// coalescing.
    pub fn contact_distance_sq(&self) -> S {
        self.contact_distance * self.contact_distance
    }

    /// The cached contact points.
    pub fn points(&self) -> &[ContactPoint<S>] {
        &self.points
    }

    /// Re-derive world space data of the cached points from the current
    /// transforms, dropping points that have separated or slid apart.
    pub fn refresh(&mut self, transform_a: &Transform<S>, transform_b: &Transform<S>) {
        let threshold = self.contact_distance;
        let threshold_sq = self.contact_distance * self.contact_distance;

        self.points.retain(|point| {
            let ws_a = transform_a.apply(point.os_position[0]);
            let ws_b = transform_b.apply(point.os_position[1]);
            point.ws_position = [ws_a, ws_b];
            point.distance = (ws_a - ws_b).dot(point.normal);

            if point.distance > threshold {
                return false;
            }

            // Tangential drift of the cached pair of points.
            let projected = ws_a - point.normal * point.distance;
            (projected - ws_b).magnitude2() <= threshold_sq
        });
    }

    /// Add a contact produced by the narrow phase.
    ///
    /// The point on A is derived from the point on B along the normal. An
    /// existing point within the equivalence threshold is overwritten;
    /// otherwise the point is appended, evicting the least valuable point
    /// when the manifold is full.
    pub fn add_contact(
        &mut self,
        transform_a: &Transform<S>,
        transform_b: &Transform<S>,
        normal: Vector3<S>,
        point_on_b: Vector3<S>,
        distance: S,
    ) {
        let point_on_a = point_on_b + normal * distance;
        let local_a = transform_a.apply_inverse(point_on_a);
        let local_b = transform_b.apply_inverse(point_on_b);

        let point = ContactPoint {
            ws_position: [point_on_a, point_on_b],
            os_position: [local_a, local_b],
            normal,
            distance,
        };

        if let Some(index) = self.equivalent_point(local_a) {
            self.points[index] = point;
        } else if !self.points.is_full() {
            self.points.push(point);
        } else {
            let index = self.least_valuable_point(local_a, distance);
            self.points[index] = point;
        }
    }

    /// Find an existing point close enough to `local_a` to qualify as
    /// equivalent.
    fn equivalent_point(&self, local_a: Vector3<S>) -> Option<usize> {
        let threshold_sq = self.contact_distance_sq();
        self.points
            .iter()
            .position(|point| (local_a - point.os_position[0]).magnitude2() < threshold_sq)
    }

    /// Pick the cached point to recycle for an incoming contact at
    /// `local_a` with the given separation.
    ///
    /// The point with the deepest penetration (counting the incoming one)
    /// is never recycled. Among the rest, the value of a point is its
    /// summed squared distance to the incoming point and to every other
    /// cached point; the lowest value contributes least to the contact
    /// patch and is evicted. This approximates maximising the manifold
    /// area without the exact quad-area computation.
    fn least_valuable_point(&self, local_a: Vector3<S>, distance: S) -> usize {
        let mut deepest = None;
        let mut max_depth = distance;
        for (index, point) in self.points.iter().enumerate() {
            if point.distance < max_depth {
                deepest = Some(index);
                max_depth = point.distance;
            }
        }

        let mut candidate = 0;
        let mut candidate_value = S::max_value();
        for (index, point) in self.points.iter().enumerate() {
            if Some(index) == deepest {
                continue;
            }

            let d = local_a - point.os_position[0];
            let mut value = d.magnitude2();
            for other in &self.points {
                value += (point.os_position[0] - other.os_position[0]).magnitude2();
            }

            if value < candidate_value {
                candidate_value = value;
                candidate = index;
            }
        }

        candidate
    }
}
