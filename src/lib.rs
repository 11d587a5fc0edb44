//! # Impetus physics library
//!
//! A real-time 3D rigid body physics engine.
//! Uses [`cgmath`](https://github.com/rustgd/cgmath) for all computation.
//!
//! Features:
//!
//! * Incremental sweep and prune broad phase over sorted edge lists, with
//!   pair add/remove events driving a persistent pair cache.
//! * Narrow phase dispatch over an extensible shape type hierarchy with
//!   priority based algorithm selection: analytic sphere/sphere and
//!   convex/plane, separating-axis box/box, GJK+EPA for everything convex.
//! * Persistent four point contact manifolds with a replacement heuristic
//!   that keeps the deepest contact.
//! * Simulation islands built by union-find over the contact graph.
//! * Sequential impulse contact solver with split impulse penetration
//!   resolution.
//! * Uses single precision as default, works with double precision as well.
//!
//! The simulation loop is single-threaded and cooperative: `step` runs to
//! completion before any mutator is called. The narrowphase factory is the
//! only shared piece: prepopulate it once and any number of worlds can
//! borrow it, across threads.
//!
//! ```
//! use cgmath::Vector3;
//! use impetus::{
//!     AxisAlignedPlane, BodyConfig, Cuboid, DynamicBodyConfig, NarrowphaseFactory, Shape, World,
//!     WorldConfig,
//! };
//!
//! let mut factory = NarrowphaseFactory::<f32>::new();
//! factory.register_defaults();
//! factory.prepopulate();
//!
//! let floor_shape = Shape::Plane(AxisAlignedPlane::new(1, 0.));
//! let box_shape = Shape::Cuboid(Cuboid::new(Vector3::new(1., 1., 1.)));
//!
//! let mut world = World::with_config(
//!     2,
//!     &factory,
//!     WorldConfig {
//!         gravity: Vector3::new(0., -9.81, 0.),
//!         ..WorldConfig::default()
//!     },
//! );
//! world.create_static_body(BodyConfig::new(&floor_shape));
//! let body = world.create_dynamic_body(
//!     DynamicBodyConfig::new(&box_shape).with_translation(Vector3::new(0., 2., 0.)),
//! );
//!
//! for _ in 0..100 {
//!     world.step(1. / 60.);
//! }
//! assert!(world.position(body).y < 1.1);
//! ```

#![deny(
    missing_docs,
    trivial_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

#[cfg(test)]
#[macro_use]
extern crate approx;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

pub use crate::collide::broad::{AxisSweep3, BroadphaseHandle, PairEvents};
pub use crate::collide::narrow::{
    AlgorithmInfo, AlgorithmInstance, BoxBox, ContactAlgorithm, ConvexConvex, ConvexPlane,
    NarrowphaseFactory, SphereSphere,
};
pub use crate::collide::shapes::{
    AxisAlignedPlane, Cuboid, CustomShape, Shape, ShapeType, ShapeTypeInfo, Sphere,
};
pub use crate::collide::world::CollisionWorld;
pub use crate::collide::{CollisionObject, ContactManifold, ContactPoint, Owner, MAX_CONTACTS};
pub use crate::physics::islands::SimulationIslands;
pub use crate::physics::solver::{SequentialImpulseSolver, SolverConfig};
pub use crate::physics::Material;
pub use crate::transform::{aabb_from_half_extent, integrate_transform, Transform};
pub use crate::world::{
    BodyConfig, DynamicBodyConfig, DynamicBodyHandle, StaticBodyHandle, World, WorldConfig,
};

mod collide;
mod physics;
mod transform;
mod world;
