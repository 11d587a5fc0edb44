//! World orchestration: body lifecycle and the per-step pipeline.

use cgmath::prelude::*;
use cgmath::{BaseFloat, Vector3};
use slab::Slab;

use crate::collide::narrow::NarrowphaseFactory;
use crate::collide::shapes::Shape;
use crate::collide::world::CollisionWorld;
use crate::collide::{CollisionObject, ContactManifold, Owner};
use crate::physics::body::DynamicBody;
use crate::physics::islands::SimulationIslands;
use crate::physics::solver::{SequentialImpulseSolver, SolverConfig};
use crate::physics::Material;
use crate::transform::{integrate_transform, Transform};

/// Handle to a dynamic body. Stays valid until the body is removed,
/// regardless of what happens to other bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DynamicBodyHandle(u32);

/// Handle to a static body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StaticBodyHandle(u32);

/// Configuration for a static body.
#[derive(Debug)]
pub struct BodyConfig<'a, S> {
    /// Collision shape; must outlive the world.
    pub shape: &'a Shape<S>,
    /// Initial model-to-world transform.
    pub transform: Transform<S>,
    /// Surface material.
    pub material: Material,
}

impl<'a, S> BodyConfig<'a, S>
where
    S: BaseFloat,
{
    /// Create a config for the given shape, at the identity transform.
    pub fn new(shape: &'a Shape<S>) -> Self {
        Self {
            shape,
            transform: Transform::default(),
            material: Material::default(),
        }
    }

    /// Set the initial transform.
    pub fn with_transform(mut self, transform: Transform<S>) -> Self {
        self.transform = transform;
        self
    }

    /// Set the initial position, keeping the identity rotation.
    pub fn with_translation(mut self, translation: Vector3<S>) -> Self {
        self.transform = Transform::from_translation(translation);
        self
    }

    /// Set the material.
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }
}

/// Configuration for a dynamic body.
#[derive(Debug)]
pub struct DynamicBodyConfig<'a, S> {
    /// The common body configuration.
    pub body: BodyConfig<'a, S>,
    /// Body mass; must be positive.
    pub mass: S,
}

impl<'a, S> DynamicBodyConfig<'a, S>
where
    S: BaseFloat,
{
    /// Create a config for the given shape with unit mass.
    pub fn new(shape: &'a Shape<S>) -> Self {
        Self {
            body: BodyConfig::new(shape),
            mass: S::one(),
        }
    }

    /// Set the mass.
    pub fn with_mass(mut self, mass: S) -> Self {
        self.mass = mass;
        self
    }

    /// Set the initial transform.
    pub fn with_transform(mut self, transform: Transform<S>) -> Self {
        self.body.transform = transform;
        self
    }

    /// Set the initial position, keeping the identity rotation.
    pub fn with_translation(mut self, translation: Vector3<S>) -> Self {
        self.body.transform = Transform::from_translation(translation);
        self
    }

    /// Set the material.
    pub fn with_material(mut self, material: Material) -> Self {
        self.body.material = material;
        self
    }
}

/// Global simulation parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldConfig<S> {
    /// Gravitational acceleration applied to every dynamic body.
    pub gravity: Vector3<S>,
    /// Distance below which the narrow phase keeps contact points.
    pub contact_distance: S,
    /// Contact solver tuning.
    pub solver: SolverConfig<S>,
}

impl<S> Default for WorldConfig<S>
where
    S: BaseFloat,
{
    fn default() -> Self {
        Self {
            gravity: Vector3::zero(),
            contact_distance: S::from(0.02).unwrap(),
            solver: SolverConfig::default(),
        }
    }
}

/// The physics world.
///
/// Owns the dynamic bodies, the collision world and the solver, and
/// advances them through discrete time steps. The narrowphase factory is
/// only borrowed; one prepopulated factory can serve many worlds.
///
/// ### Type parameters:
///
/// - `S`: Scalar type, `f32` or `f64`
#[derive(Debug)]
pub struct World<'a, S> {
    collision: CollisionWorld<'a, S>,
    bodies: Slab<DynamicBody<S>>,
    dynamic_order: Vec<u32>,
    islands: SimulationIslands,
    solver: SequentialImpulseSolver<S>,
    gravity: Vector3<S>,
}

impl<'a, S> World<'a, S>
where
    S: BaseFloat,
{
    /// Create a world with default configuration.
    ///
    /// The factory must be prepopulated before the first `step`.
    pub fn new(object_count_hint: usize, factory: &'a NarrowphaseFactory<S>) -> Self {
        Self::with_config(object_count_hint, factory, WorldConfig::default())
    }

    /// Create a world with the given configuration.
    pub fn with_config(
        object_count_hint: usize,
        factory: &'a NarrowphaseFactory<S>,
        config: WorldConfig<S>,
    ) -> Self {
        Self {
            collision: CollisionWorld::new(object_count_hint, factory, config.contact_distance),
            bodies: Slab::with_capacity(object_count_hint),
            dynamic_order: Vec::with_capacity(object_count_hint),
            islands: SimulationIslands::new(),
            solver: SequentialImpulseSolver::new(config.solver),
            gravity: config.gravity,
        }
    }

    /// Set the gravitational acceleration.
    pub fn set_gravity(&mut self, gravity: Vector3<S>) {
        self.gravity = gravity;
    }

    /// Create a static body.
    pub fn create_static_body(&mut self, config: BodyConfig<'a, S>) -> StaticBodyHandle {
        let mut object = CollisionObject::new(config.shape, config.transform);
        object.owner = Owner::Static;
        object.restitution = config.material.restitution();

        let id = self.collision.add(object);
        log::debug!("created static body, collision object {}", id);
        StaticBodyHandle(id)
    }

    /// Create a dynamic body.
    pub fn create_dynamic_body(&mut self, config: DynamicBodyConfig<'a, S>) -> DynamicBodyHandle {
        let inertia = config.body.shape.inertia(config.mass);

        let mut object = CollisionObject::new(config.body.shape, config.body.transform);
        object.restitution = config.body.material.restitution();

        let id = self.collision.add(object);
        let slot = self
            .bodies
            .insert(DynamicBody::new(id, config.mass, inertia)) as u32;
        self.collision.object_mut(id).owner = Owner::Dynamic(slot);

        self.bodies[slot as usize].world_index = self.dynamic_order.len() as u32;
        self.dynamic_order.push(slot);

        log::debug!("created dynamic body {}, collision object {}", slot, id);
        DynamicBodyHandle(slot)
    }

    /// Remove a static body. Every cached pair involving it disappears
    /// with it. Removing an unknown handle is a no-op.
    pub fn remove_static_body(&mut self, handle: StaticBodyHandle) {
        self.collision.remove(handle.0);
    }

    /// Remove a dynamic body. Removing an unknown handle is a no-op.
    pub fn remove_dynamic_body(&mut self, handle: DynamicBodyHandle) {
        let slot = handle.0 as usize;
        if !self.bodies.contains(slot) {
            log::debug!("removing unknown dynamic body {}", handle.0);
            return;
        }

        let body = self.bodies.remove(slot);
        self.collision.remove(body.object);

        let index = body.world_index as usize;
        self.dynamic_order.swap_remove(index);
        if index < self.dynamic_order.len() {
            let moved = self.dynamic_order[index];
            self.bodies[moved as usize].world_index = index as u32;
        }
    }

    /// Accumulate a force on a dynamic body, applied at the next step.
    pub fn apply_force(&mut self, handle: DynamicBodyHandle, force: Vector3<S>) {
        self.bodies[handle.0 as usize].force += force;
    }

    /// Accumulate a torque on a dynamic body, applied at the next step.
    pub fn apply_torque(&mut self, handle: DynamicBodyHandle, torque: Vector3<S>) {
        self.bodies[handle.0 as usize].torque += torque;
    }

    /// Set the linear velocity of a dynamic body.
    pub fn set_linear_velocity(&mut self, handle: DynamicBodyHandle, velocity: Vector3<S>) {
        self.bodies[handle.0 as usize].linear_velocity = velocity;
    }

    /// Set the angular velocity of a dynamic body.
    pub fn set_angular_velocity(&mut self, handle: DynamicBodyHandle, velocity: Vector3<S>) {
        self.bodies[handle.0 as usize].angular_velocity = velocity;
    }

    /// Linear velocity of a dynamic body.
    pub fn linear_velocity(&self, handle: DynamicBodyHandle) -> Vector3<S> {
        self.bodies[handle.0 as usize].linear_velocity
    }

    /// Angular velocity of a dynamic body.
    pub fn angular_velocity(&self, handle: DynamicBodyHandle) -> Vector3<S> {
        self.bodies[handle.0 as usize].angular_velocity
    }

    /// Mass of a dynamic body.
    pub fn mass(&self, handle: DynamicBodyHandle) -> S {
        self.bodies[handle.0 as usize].mass
    }

    /// Current transform of a dynamic body.
    pub fn transform(&self, handle: DynamicBodyHandle) -> &Transform<S> {
        &self.collision.object(self.bodies[handle.0 as usize].object).transform
    }

    /// Current position of a dynamic body.
    pub fn position(&self, handle: DynamicBodyHandle) -> Vector3<S> {
        self.transform(handle).translation
    }

    /// Transform of a static body.
    pub fn static_transform(&self, handle: StaticBodyHandle) -> &Transform<S> {
        &self.collision.object(handle.0).transform
    }

    /// Handles of all dynamic bodies.
    pub fn dynamic_bodies(&self) -> impl Iterator<Item = DynamicBodyHandle> + '_ {
        self.dynamic_order.iter().map(|&slot| DynamicBodyHandle(slot))
    }

    /// The live contact manifolds.
    pub fn manifolds(&self) -> impl Iterator<Item = &ContactManifold<S>> {
        self.collision.manifolds()
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: S) {
        log::trace!(
            "step: {} dynamic bodies, {} pairs",
            self.dynamic_order.len(),
            self.collision.pair_count()
        );

        // Update the broadphase with every dynamic body that may have
        // moved, and refresh the world-frame inertia while at it.
        let gravity = self.gravity;
        for &slot in &self.dynamic_order {
            let body = &mut self.bodies[slot as usize];
            body.force += gravity * body.mass;

            let object_id = body.object;
            if !self.collision.object(object_id).is_active() {
                continue;
            }

            let rotation = self.collision.object(object_id).transform.rotation;
            body.update_world_inertia(&rotation);

            let aabb = self.collision.object(object_id).aabb();
            self.collision.update(object_id, &aabb);
        }

        self.collision.update_narrowphase();

        {
            let World {
                ref mut collision,
                ref mut bodies,
                ref mut dynamic_order,
                ref mut islands,
                ref mut solver,
                ..
            } = *self;
            islands.build_and_visit(
                bodies,
                dynamic_order,
                collision,
                |bodies, collision, island, manifolds| {
                    solver.solve(bodies, collision, island, manifolds, dt);
                },
            );
        }

        // Integrate transforms and clear the force accumulators.
        for &slot in &self.dynamic_order {
            let body = &mut self.bodies[slot as usize];
            let object_id = body.object;

            let integrated = {
                let transform = &self.collision.object(object_id).transform;
                integrate_transform(transform, body.linear_velocity, body.angular_velocity, dt)
            };
            self.collision.object_mut(object_id).transform = integrated;

            body.clear_forces();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collide::shapes::{AxisAlignedPlane, Cuboid, Sphere};

    const DT: f32 = 1. / 60.;

    #[test]
    fn applied_force_integrates_velocity_and_position() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut world = World::new(2, &factory);

        let body = world.create_dynamic_body(DynamicBodyConfig::new(&shape).with_mass(2.));
        world.apply_force(body, Vector3::new(2., 0., 0.));
        world.step(0.5);

        assert_relative_eq!(world.linear_velocity(body), Vector3::new(0.5, 0., 0.));
        assert_relative_eq!(world.position(body), Vector3::new(0.25, 0., 0.));

        // Forces are cleared after the step; velocity persists.
        world.step(0.5);
        assert_relative_eq!(world.linear_velocity(body), Vector3::new(0.5, 0., 0.));
        assert_relative_eq!(world.position(body), Vector3::new(0.5, 0., 0.));
    }

    #[test]
    fn falling_box_settles_on_the_floor() {
        let factory = factory();
        let plane_shape = Shape::Plane(AxisAlignedPlane::new(1, 0.0f32));
        let box_shape = Shape::Cuboid(Cuboid::new(Vector3::new(1., 1., 1.)));

        let mut world = World::with_config(
            2,
            &factory,
            WorldConfig {
                gravity: Vector3::new(0., -9.81, 0.),
                ..WorldConfig::default()
            },
        );

        world.create_static_body(BodyConfig::new(&plane_shape));
        let body = world.create_dynamic_body(
            DynamicBodyConfig::new(&box_shape)
                .with_mass(1.)
                .with_translation(Vector3::new(0., 2., 0.)),
        );

        for _ in 0..60 {
            world.step(DT);
        }
        let y = world.position(body).y;
        assert!(
            y >= 1.0 && y <= 1.02,
            "box should rest on the plane after one second, y = {}",
            y
        );

        for _ in 60..100 {
            world.step(DT);
        }
        let y = world.position(body).y;
        assert!(
            y >= 0.98 && y <= 1.02,
            "box should stay settled, y = {}",
            y
        );
    }

    #[test]
    fn sphere_pair_produces_expected_contact() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut world = World::new(2, &factory);

        world.create_dynamic_body(DynamicBodyConfig::new(&shape));
        world.create_dynamic_body(
            DynamicBodyConfig::new(&shape).with_translation(Vector3::new(1.9, 0., 0.)),
        );
        world.step(DT);

        let manifold = world.manifolds().next().unwrap();
        assert_eq!(manifold.points().len(), 1);
        let point = &manifold.points()[0];
        assert_relative_eq!(point.normal, Vector3::new(1., 0., 0.), epsilon = 1e-6);
        assert!((point.distance + 0.1).abs() < 0.02);
    }

    #[test]
    fn stepping_is_deterministic() {
        fn run() -> Vec<(f32, f32, f32)> {
            let factory = factory();
            let plane_shape = Shape::Plane(AxisAlignedPlane::new(1, 0.0f32));
            let sphere_shape = Shape::Sphere(Sphere::new(1.0f32));

            let mut world = World::with_config(
                8,
                &factory,
                WorldConfig {
                    gravity: Vector3::new(0., -9.81, 0.),
                    ..WorldConfig::default()
                },
            );
            world.create_static_body(BodyConfig::new(&plane_shape));

            let mut handles = Vec::new();
            for i in 0..5 {
                handles.push(world.create_dynamic_body(
                    DynamicBodyConfig::new(&sphere_shape).with_translation(Vector3::new(
                        i as f32 * 1.5,
                        3. + i as f32 * 0.5,
                        0.,
                    )),
                ));
            }

            for _ in 0..50 {
                world.step(DT);
            }

            handles
                .iter()
                .map(|&h| {
                    let p = world.position(h);
                    (p.x, p.y, p.z)
                })
                .collect()
        }

        // Bit-identical, not approximately equal.
        assert_eq!(run(), run());
    }

    #[test]
    fn removed_body_stops_participating() {
        let factory = factory();
        let shape = Shape::Sphere(Sphere::new(1.0f32));
        let mut world = World::new(4, &factory);

        let a = world.create_dynamic_body(DynamicBodyConfig::new(&shape));
        let b = world.create_dynamic_body(
            DynamicBodyConfig::new(&shape).with_translation(Vector3::new(1., 0., 0.)),
        );
        let c = world.create_dynamic_body(
            DynamicBodyConfig::new(&shape).with_translation(Vector3::new(10., 0., 0.)),
        );
        world.step(DT);
        assert!(world.manifolds().count() >= 1);

        world.remove_dynamic_body(a);
        world.step(DT);
        assert_eq!(world.manifolds().count(), 0);

        // The remaining handles stay valid.
        assert_relative_eq!(world.position(b).x, 1., epsilon = 0.2);
        assert_relative_eq!(world.position(c).x, 10., epsilon = 0.2);

        // Removing again is a no-op.
        world.remove_dynamic_body(a);
    }

    #[test]
    fn resting_contact_does_not_gain_energy() {
        let factory = factory();
        let plane_shape = Shape::Plane(AxisAlignedPlane::new(1, 0.0f32));
        let sphere_shape = Shape::Sphere(Sphere::new(1.0f32));

        let mut world = World::with_config(
            2,
            &factory,
            WorldConfig {
                gravity: Vector3::new(0., -9.81, 0.),
                ..WorldConfig::default()
            },
        );
        world.create_static_body(BodyConfig::new(&plane_shape));
        let body = world.create_dynamic_body(
            DynamicBodyConfig::new(&sphere_shape).with_translation(Vector3::new(0., 1.0, 0.)),
        );

        // Inelastic resting contact: speed stays near zero, never grows.
        for _ in 0..120 {
            world.step(DT);
            let v = world.linear_velocity(body);
            assert!(v.magnitude() < 0.5, "resting sphere picked up speed: {:?}", v);
        }
        let y = world.position(body).y;
        assert!(y > 0.97 && y < 1.03, "resting sphere drifted to y = {}", y);
    }

    // util
    fn factory() -> NarrowphaseFactory<f32> {
        let mut factory = NarrowphaseFactory::new();
        factory.register_defaults();
        factory.prepopulate();
        factory
    }
}
