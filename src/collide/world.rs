//! Persistent collision world.
//!
//! Wires the broad phase to the pair cache and drives the narrow phase over
//! the live pairs. The world is built around temporal coherency: pairs and
//! their manifolds persist between steps and are only touched when the
//! broad phase reports an overlap change.

use std::collections::btree_map;
use std::collections::BTreeMap;

use cgmath::BaseFloat;
use collision::Aabb3;
use slab::Slab;

use super::broad::{AxisSweep3, PairEvents};
use super::narrow::{AlgorithmInstance, NarrowphaseFactory};
use super::{CollisionObject, ContactManifold};

/// Canonical cache key of an object pair.
fn pair_key(a: u32, b: u32) -> u64 {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    (u64::from(low) << 32) | u64::from(high)
}

/// A live broadphase pair: the two object ids (ordered so that the left
/// shape type does not exceed the right one), the persistent manifold and
/// the lazily assigned narrowphase algorithm.
#[derive(Debug)]
pub(crate) struct PairEntry<S> {
    pub(crate) objects: [u32; 2],
    pub(crate) manifold: ContactManifold<S>,
    algorithm: Option<AlgorithmInstance<S>>,
}

/// Pair cache maintenance driven by broadphase events.
///
/// The cache is a `BTreeMap` rather than a hash map: iteration order feeds
/// the island builder and the solver, and stepping must be deterministic.
struct CacheEvents<'e, 'a, S> {
    objects: &'e Slab<CollisionObject<'a, S>>,
    pairs: &'e mut BTreeMap<u64, PairEntry<S>>,
    contact_distance: S,
}

impl<'e, 'a, S> PairEvents for CacheEvents<'e, 'a, S>
where
    S: BaseFloat,
{
    fn pair_added(&mut self, a: u32, b: u32) {
        let objects = self.objects;
        let contact_distance = self.contact_distance;

        // The narrowphase is not instantiated right away; short-lived pairs
        // are often removed before it ever runs.
        self.pairs.entry(pair_key(a, b)).or_insert_with(|| {
            let object_a = &objects[a as usize];
            let object_b = &objects[b as usize];

            // Order the pair so algorithms can assume lhs type <= rhs type.
            let pair = if object_a.shape.shape_type() <= object_b.shape.shape_type() {
                [a, b]
            } else {
                [b, a]
            };

            let mut manifold = ContactManifold::new(contact_distance);
            manifold.restitution = if object_a.restitution < object_b.restitution {
                object_a.restitution
            } else {
                object_b.restitution
            };

            PairEntry {
                objects: pair,
                manifold,
                algorithm: None,
            }
        });
    }

    fn pair_removed(&mut self, a: u32, b: u32) {
        self.pairs.remove(&pair_key(a, b));
    }
}

/// Collision world: object arena, broad phase and pair cache.
///
/// ### Type parameters:
///
/// - `S`: Scalar type, `f32` or `f64`
#[derive(Debug)]
pub struct CollisionWorld<'a, S> {
    objects: Slab<CollisionObject<'a, S>>,
    pairs: BTreeMap<u64, PairEntry<S>>,
    broadphase: AxisSweep3<S>,
    factory: &'a NarrowphaseFactory<S>,
    contact_distance: S,
}

impl<'a, S> CollisionWorld<'a, S>
where
    S: BaseFloat,
{
    /// Create a collision world.
    ///
    /// The factory must already be prepopulated; it is only borrowed, one
    /// factory can serve many worlds.
    pub fn new(
        object_count_hint: usize,
        factory: &'a NarrowphaseFactory<S>,
        contact_distance: S,
    ) -> Self {
        Self {
            objects: Slab::with_capacity(object_count_hint),
            pairs: BTreeMap::new(),
            broadphase: AxisSweep3::new(object_count_hint),
            factory,
            contact_distance,
        }
    }

    /// Register an object, returning its id.
    ///
    /// Immediately creates pair cache entries for everything the object's
    /// AABB overlaps.
    pub fn add(&mut self, object: CollisionObject<'a, S>) -> u32 {
        let aabb = object.aabb();
        let id = self.objects.insert(object) as u32;

        let handle = {
            let CollisionWorld {
                ref mut broadphase,
                ref objects,
                ref mut pairs,
                contact_distance,
                ..
            } = *self;
            let mut events = CacheEvents {
                objects,
                pairs,
                contact_distance,
            };
            broadphase.add(&aabb, id, &mut events)
        };

        self.objects[id as usize].handle = handle;
        id
    }

    /// Remove an object, dropping every pair cache entry involving it.
    /// Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: u32) {
        if !self.objects.contains(id as usize) {
            log::debug!("collision world remove for unknown object {}", id);
            return;
        }

        let handle = self.objects[id as usize].handle;
        {
            let CollisionWorld {
                ref mut broadphase,
                ref objects,
                ref mut pairs,
                contact_distance,
                ..
            } = *self;
            let mut events = CacheEvents {
                objects,
                pairs,
                contact_distance,
            };
            broadphase.remove(handle, &mut events);
        }

        self.pairs
            .retain(|_, entry| entry.objects[0] != id && entry.objects[1] != id);
        self.objects.remove(id as usize);
    }

    /// Report a new bounding box for an object, updating the pair cache
    /// through the broadphase callbacks.
    pub fn update(&mut self, id: u32, aabb: &Aabb3<S>) {
        let handle = self.objects[id as usize].handle;
        let CollisionWorld {
            ref mut broadphase,
            ref objects,
            ref mut pairs,
            contact_distance,
            ..
        } = *self;
        let mut events = CacheEvents {
            objects,
            pairs,
            contact_distance,
        };
        broadphase.update(handle, aabb, &mut events);
    }

    /// Run the narrow phase over every live pair: refresh the cached
    /// contacts against the current transforms, then let the pair's
    /// algorithm add new ones.
    pub fn update_narrowphase(&mut self) {
        let CollisionWorld {
            ref objects,
            ref mut pairs,
            factory,
            ..
        } = *self;

        for entry in pairs.values_mut() {
            let a = &objects[entry.objects[0] as usize];
            let b = &objects[entry.objects[1] as usize];

            let algorithm = entry.algorithm.get_or_insert_with(|| {
                factory.algorithm(a.shape.shape_type(), b.shape.shape_type())
            });

            entry.manifold.refresh(&a.transform, &b.transform);
            algorithm.process(a, b, &mut entry.manifold);
        }
    }

    /// Borrow an object.
    pub fn object(&self, id: u32) -> &CollisionObject<'a, S> {
        &self.objects[id as usize]
    }

    /// Mutably borrow an object.
    pub fn object_mut(&mut self, id: u32) -> &mut CollisionObject<'a, S> {
        &mut self.objects[id as usize]
    }

    /// Iterate over the live contact manifolds.
    pub fn manifolds(&self) -> impl Iterator<Item = &ContactManifold<S>> {
        self.pairs.values().map(|entry| &entry.manifold)
    }

    /// Number of live pairs.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub(crate) fn pair(&self, key: u64) -> &PairEntry<S> {
        &self.pairs[&key]
    }

    /// Split borrow for callers that need the objects and the mutable pair
    /// entries at the same time.
    pub(crate) fn split_pairs_mut(
        &mut self,
    ) -> (
        &Slab<CollisionObject<'a, S>>,
        btree_map::IterMut<'_, u64, PairEntry<S>>,
    ) {
        (&self.objects, self.pairs.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::collide::shapes::{Shape, Sphere};
    use crate::transform::Transform;

    #[test]
    fn overlapping_objects_create_a_pair_with_contacts() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut world = CollisionWorld::new(4, &factory, 0.02);

        world.add(CollisionObject::new(&shape, Transform::default()));
        world.add(CollisionObject::new(
            &shape,
            Transform::from_translation(Vector3::new(1.9, 0., 0.)),
        ));
        assert_eq!(world.pair_count(), 1);

        world.update_narrowphase();
        let manifold = world.manifolds().next().unwrap();
        assert_eq!(manifold.points().len(), 1);
        assert_relative_eq!(manifold.points()[0].distance, -0.1, epsilon = 1e-6);
    }

    #[test]
    fn moving_apart_drops_the_pair() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut world = CollisionWorld::new(4, &factory, 0.02);

        world.add(CollisionObject::new(&shape, Transform::default()));
        let mover = world.add(CollisionObject::new(
            &shape,
            Transform::from_translation(Vector3::new(1., 0., 0.)),
        ));
        assert_eq!(world.pair_count(), 1);

        world.object_mut(mover).transform.translation.x = 10.;
        let aabb = world.object(mover).aabb();
        world.update(mover, &aabb);
        assert_eq!(world.pair_count(), 0);
    }

    #[test]
    fn removing_an_object_purges_its_pairs() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut world = CollisionWorld::new(4, &factory, 0.02);

        let center = world.add(CollisionObject::new(&shape, Transform::default()));
        world.add(CollisionObject::new(
            &shape,
            Transform::from_translation(Vector3::new(1., 0., 0.)),
        ));
        world.add(CollisionObject::new(
            &shape,
            Transform::from_translation(Vector3::new(-1., 0., 0.)),
        ));
        assert!(world.pair_count() >= 2);

        world.remove(center);
        // Only the two satellites remain; they overlap each other.
        assert_eq!(world.pair_count(), 1);
    }

    #[test]
    fn removing_unknown_object_is_noop() {
        let factory = factory();
        let mut world = CollisionWorld::<f32>::new(4, &factory, 0.02);
        world.remove(42);
        assert_eq!(world.pair_count(), 0);
    }

    // util
    fn factory() -> NarrowphaseFactory<f32> {
        let mut factory = NarrowphaseFactory::new();
        factory.register_defaults();
        factory.prepopulate();
        factory
    }
}
