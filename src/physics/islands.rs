//! Simulation island partitioning.
//!
//! Bodies connected through contact manifolds must be solved together;
//! everything else can be solved independently. The builder runs a
//! union-find over the contact graph, sorts bodies and manifolds by island
//! and hands the solver one contiguous island at a time.

use cgmath::BaseFloat;
use slab::Slab;

use crate::collide::world::CollisionWorld;
use crate::physics::body::DynamicBody;

/// Island sentinel for manifolds with no dynamic endpoint.
const NO_ISLAND: u32 = u32::max_value();

/// Union-find entry: one per dynamic body position, pointing at the
/// current representative of its equivalence class.
#[derive(Clone, Copy, Debug)]
struct IslandMapping {
    object_id: u32,
    island_id: u32,
}

/// Builds and visits simulation islands.
///
/// Scratch buffers are reused between steps; steady state allocates
/// nothing.
#[derive(Debug, Default)]
pub struct SimulationIslands {
    mapping: Vec<IslandMapping>,
    sorted: Vec<(u32, u64)>,
    keys: Vec<u64>,
}

impl SimulationIslands {
    /// Create an island builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition the dynamic bodies into islands and invoke `visitor` once
    /// per island with the island's bodies and manifold keys.
    ///
    /// Building and visiting is a single operation: mutating the world
    /// between the two would leave the sorted views dangling, so no
    /// separate visit entry point exists.
    ///
    /// `order` is the dynamic body order; it is sorted by island and every
    /// body's `world_index` is rewritten to its position in the sorted
    /// order, so external handles stay valid.
    pub(crate) fn build_and_visit<'a, S, F>(
        &mut self,
        bodies: &mut Slab<DynamicBody<S>>,
        order: &mut Vec<u32>,
        collision: &mut CollisionWorld<'a, S>,
        mut visitor: F,
    ) where
        S: BaseFloat,
        F: FnMut(&mut Slab<DynamicBody<S>>, &mut CollisionWorld<'a, S>, &[u32], &[u64]),
    {
        if order.is_empty() {
            return;
        }

        self.build(bodies, order, collision);

        // Sort bodies by island and record the new positions.
        {
            let bodies = &*bodies;
            order.sort_by_key(|&slot| bodies[slot as usize].island);
        }
        for (position, &slot) in order.iter().enumerate() {
            bodies[slot as usize].world_index = position as u32;
        }

        // Tag each manifold with the island of its dynamic endpoint and
        // sort. Manifolds between two non-dynamic objects sort last, past
        // every real island, and are never visited.
        self.sorted.clear();
        {
            let (objects, pairs) = collision.split_pairs_mut();
            for (&key, entry) in pairs {
                let island = entry.objects.iter()
                    .filter_map(|&id| objects[id as usize].owner.dynamic_slot())
                    .map(|slot| bodies[slot as usize].island)
                    .next()
                    .unwrap_or(NO_ISLAND);
                entry.manifold.island = island;
                self.sorted.push((island, key));
            }
        }
        self.sorted.sort();

        self.keys.clear();
        self.keys.extend(self.sorted.iter().map(|&(_, key)| key));

        log::trace!(
            "visiting islands: {} bodies, {} manifolds",
            order.len(),
            self.sorted.len()
        );

        // Lock-step walk over both sorted sequences, one visit per island.
        let mut body_start = 0;
        let mut manifold_start = 0;
        while body_start < order.len() {
            let island = bodies[order[body_start] as usize].island;

            let mut body_end = body_start + 1;
            while body_end < order.len() && bodies[order[body_end] as usize].island == island {
                body_end += 1;
            }

            let mut manifold_end = manifold_start;
            while manifold_end < self.sorted.len() && self.sorted[manifold_end].0 == island {
                manifold_end += 1;
            }

            visitor(
                bodies,
                collision,
                &order[body_start..body_end],
                &self.keys[manifold_start..manifold_end],
            );

            body_start = body_end;
            manifold_start = manifold_end;
        }
    }

    /// Assign every dynamic body its island representative.
    fn build<S>(
        &mut self,
        bodies: &mut Slab<DynamicBody<S>>,
        order: &[u32],
        collision: &mut CollisionWorld<'_, S>,
    ) where
        S: BaseFloat,
    {
        self.mapping.clear();
        for (position, &slot) in order.iter().enumerate() {
            bodies[slot as usize].island = position as u32;
            self.mapping.push(IslandMapping {
                object_id: position as u32,
                island_id: position as u32,
            });
        }

        // Manifolds between two dynamic bodies join their islands.
        {
            let (objects, pairs) = collision.split_pairs_mut();
            for (_, entry) in pairs {
                let slot_a = objects[entry.objects[0] as usize].owner.dynamic_slot();
                let slot_b = objects[entry.objects[1] as usize].owner.dynamic_slot();
                if let (Some(a), Some(b)) = (slot_a, slot_b) {
                    let island_a = bodies[a as usize].island;
                    let island_b = bodies[b as usize].island;
                    self.join(island_a, island_b);
                }
            }
        }

        for index in 0..self.mapping.len() {
            let object = self.mapping[index].object_id;
            let island = self.find(index as u32);
            bodies[order[object as usize] as usize].island = island;
        }
    }

    /// Find the representative with path halving.
    fn find(&mut self, mut id: u32) -> u32 {
        loop {
            let parent = self.mapping[id as usize].island_id;
            if parent == id {
                return id;
            }
            let grandparent = self.mapping[parent as usize].island_id;
            if grandparent == parent {
                return parent;
            }
            self.mapping[id as usize].island_id = grandparent;
            id = grandparent;
        }
    }

    /// Join the islands of two bodies. The tree is left unbalanced; lookup
    /// flattens it.
    fn join(&mut self, a: u32, b: u32) {
        let island_a = self.find(a);
        let island_b = self.find(b);

        if island_a != island_b {
            self.mapping[island_a as usize].island_id = island_b;
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::collide::narrow::NarrowphaseFactory;
    use crate::collide::shapes::{Shape, Sphere};
    use crate::collide::{CollisionObject, Owner};
    use crate::transform::Transform;

    struct Fixture<'a> {
        bodies: Slab<DynamicBody<f32>>,
        order: Vec<u32>,
        collision: CollisionWorld<'a, f32>,
    }

    /// Six unit spheres placed so the overlap graph is exactly
    /// {(0,1), (1,2), (3,4)}; body 5 is alone.
    fn fixture<'a>(factory: &'a NarrowphaseFactory<f32>, shape: &'a Shape<f32>) -> Fixture<'a> {
        let positions = [0., 1.5, 3., 10., 11.5, 20.];

        let mut bodies = Slab::new();
        let mut order = Vec::new();
        let mut collision = CollisionWorld::new(8, factory, 0.02);

        for &x in &positions {
            let object = collision.add(CollisionObject::new(
                shape,
                Transform::from_translation(Vector3::new(x, 0., 0.)),
            ));
            let slot = bodies.insert(DynamicBody::new(object, 1., Vector3::new(1., 1., 1.))) as u32;
            collision.object_mut(object).owner = Owner::Dynamic(slot);
            order.push(slot);
        }

        Fixture {
            bodies,
            order,
            collision,
        }
    }

    #[test]
    fn partitions_connected_components() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut f = fixture(&factory, &shape);

        let mut islands: Vec<Vec<u32>> = Vec::new();
        let mut manifold_counts = Vec::new();
        SimulationIslands::new().build_and_visit(
            &mut f.bodies,
            &mut f.order,
            &mut f.collision,
            |_, _, slots, manifolds| {
                let mut slots = slots.to_vec();
                slots.sort();
                islands.push(slots);
                manifold_counts.push(manifolds.len());
            },
        );

        islands.sort();
        assert_eq!(islands, vec![vec![0, 1, 2], vec![3, 4], vec![5]]);
        let total: usize = manifold_counts.iter().sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn world_index_matches_sorted_position() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut f = fixture(&factory, &shape);

        SimulationIslands::new().build_and_visit(
            &mut f.bodies,
            &mut f.order,
            &mut f.collision,
            |_, _, _, _| {},
        );

        for (position, &slot) in f.order.iter().enumerate() {
            assert_eq!(f.bodies[slot as usize].world_index, position as u32);
        }
    }

    #[test]
    fn bodies_share_island_iff_connected() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut f = fixture(&factory, &shape);

        SimulationIslands::new().build_and_visit(
            &mut f.bodies,
            &mut f.order,
            &mut f.collision,
            |_, _, _, _| {},
        );

        let island = |slot: usize| f.bodies[slot].island;
        assert_eq!(island(0), island(1));
        assert_eq!(island(1), island(2));
        assert_eq!(island(3), island(4));
        assert_ne!(island(0), island(3));
        assert_ne!(island(0), island(5));
        assert_ne!(island(3), island(5));
    }

    #[test]
    fn static_contact_joins_the_dynamic_body_island() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut f = fixture(&factory, &shape);

        // A static object overlapping body 5 only.
        let object = f.collision.add(CollisionObject::new(
            &shape,
            Transform::from_translation(Vector3::new(21., 0., 0.)),
        ));
        f.collision.object_mut(object).owner = Owner::Static;

        let mut visited = Vec::new();
        SimulationIslands::new().build_and_visit(
            &mut f.bodies,
            &mut f.order,
            &mut f.collision,
            |bodies, collision, slots, manifolds| {
                for &key in manifolds {
                    let entry = collision.pair(key);
                    assert_eq!(entry.manifold.island, bodies[slots[0] as usize].island);
                }
                visited.push((slots.to_vec(), manifolds.len()));
            },
        );

        // Body 5's island now carries one manifold (with the static object).
        let five = visited
            .iter()
            .find(|(slots, _)| slots.contains(&5))
            .unwrap();
        assert_eq!(five.1, 1);
    }

    // util
    fn factory() -> NarrowphaseFactory<f32> {
        let mut factory = NarrowphaseFactory::new();
        factory.register_defaults();
        factory.prepopulate();
        factory
    }
}
