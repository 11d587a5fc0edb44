//! Narrow phase contact generation and the algorithm dispatch table.
//!
//! Algorithms are registered against a pair of shape type tags with a
//! priority. Lookup walks the shape type hierarchy, so a pair without a
//! bespoke algorithm falls back to the most specific generic one: a box
//! against a plane dispatches to the convex/plane algorithm unless
//! something better was registered.

mod box_box;
mod convex_convex;
mod convex_plane;
mod sphere_sphere;

pub use self::box_box::BoxBox;
pub use self::convex_convex::ConvexConvex;
pub use self::convex_plane::ConvexPlane;
pub use self::sphere_sphere::SphereSphere;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use cgmath::BaseFloat;

use super::shapes::{AxisAlignedPlane, Cuboid, ShapeType, ShapeTypeInfo, Sphere};
use super::{CollisionObject, ContactManifold};

/// A contact generation algorithm for one canonical pair of shape types.
///
/// Instances registered with the factory are shared between every pair (and
/// every world) using them, so they cannot hold per-pair state. An algorithm
/// that needs state between steps returns a fresh per-pair instance from
/// [`fork`](#method.fork); the registered prototype itself stays stateless.
pub trait ContactAlgorithm<S>: Debug {
    /// Generate contacts for a pair, ordered so that
    /// `a.shape.shape_type() <= b.shape.shape_type()`.
    fn process(
        &self,
        a: &CollisionObject<'_, S>,
        b: &CollisionObject<'_, S>,
        manifold: &mut ContactManifold<S>,
    );

    /// Produce a fresh instance to own per collision pair.
    ///
    /// Returning `None` (the default) marks the algorithm shareable. A
    /// per-pair instance is only ever used from one world, so it may keep
    /// interior state (e.g. in a `Cell`).
    fn fork(&self) -> Option<Box<dyn ContactAlgorithm<S> + Send>> {
        None
    }
}

/// Shape pair handled by an algorithm, used at registration.
pub trait AlgorithmInfo {
    /// Lower shape type tag; must not exceed `RHS_TYPE`.
    const LHS_TYPE: ShapeType;
    /// Higher shape type tag.
    const RHS_TYPE: ShapeType;
}

/// An algorithm instance handed out by the factory: either the shared
/// registered instance or a per-pair fork.
#[derive(Debug)]
pub enum AlgorithmInstance<S> {
    /// The shared stateless instance.
    Shared(Arc<dyn ContactAlgorithm<S> + Send + Sync>),
    /// A per-pair instance of a stateful algorithm.
    Unique(Box<dyn ContactAlgorithm<S> + Send>),
}

impl<S> AlgorithmInstance<S> {
    /// Run the algorithm.
    pub fn process(
        &self,
        a: &CollisionObject<'_, S>,
        b: &CollisionObject<'_, S>,
        manifold: &mut ContactManifold<S>,
    ) {
        match *self {
            AlgorithmInstance::Shared(ref algorithm) => algorithm.process(a, b, manifold),
            AlgorithmInstance::Unique(ref algorithm) => algorithm.process(a, b, manifold),
        }
    }
}

struct Registration<S> {
    priority: i32,
    create: fn() -> Arc<dyn ContactAlgorithm<S> + Send + Sync>,
}

impl<S> Debug for Registration<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("priority", &self.priority)
            .finish()
    }
}

/// Narrow phase algorithm factory.
///
/// Registration happens up front: shape types first, then algorithms, then a
/// single [`prepopulate`](#method.prepopulate) that resolves the best
/// algorithm for every registered shape pair. After that the factory is
/// read-only and can be shared by any number of worlds across threads;
/// worlds only borrow it.
///
/// ### Type parameters:
///
/// - `S`: Scalar type, `f32` or `f64`
#[derive(Debug, Default)]
pub struct NarrowphaseFactory<S> {
    hierarchy: BTreeMap<ShapeType, Option<ShapeType>>,
    registrations: BTreeMap<(ShapeType, ShapeType), Registration<S>>,
    algorithms: BTreeMap<(ShapeType, ShapeType), Arc<dyn ContactAlgorithm<S> + Send + Sync>>,
    prepopulated: bool,
}

impl<S> NarrowphaseFactory<S>
where
    S: BaseFloat,
{
    /// Create an empty factory.
    pub fn new() -> Self {
        Self {
            hierarchy: BTreeMap::new(),
            registrations: BTreeMap::new(),
            algorithms: BTreeMap::new(),
            prepopulated: false,
        }
    }

    /// Register a shape type by its static info.
    pub fn register_shape_type<T>(&mut self)
    where
        T: ShapeTypeInfo,
    {
        self.register_shape_tag(T::TYPE, T::PARENT);
    }

    /// Register a shape type tag with an optional parent tag.
    pub fn register_shape_tag(&mut self, tag: ShapeType, parent: Option<ShapeType>) {
        self.hierarchy.insert(tag, parent);
    }

    /// Register an algorithm for its declared shape pair with the given
    /// priority. Among all algorithms reachable through the type hierarchy
    /// for a pair, the highest priority wins.
    pub fn register_algorithm<A>(&mut self, priority: i32)
    where
        A: ContactAlgorithm<S> + AlgorithmInfo + Default + Send + Sync + 'static,
    {
        assert!(
            A::LHS_TYPE <= A::RHS_TYPE,
            "algorithm shape pair must be canonically ordered"
        );

        fn instantiate<S, A>() -> Arc<dyn ContactAlgorithm<S> + Send + Sync>
        where
            A: ContactAlgorithm<S> + Default + Send + Sync + 'static,
        {
            Arc::new(A::default())
        }

        self.registrations.insert(
            (A::LHS_TYPE, A::RHS_TYPE),
            Registration {
                priority,
                create: instantiate::<S, A>,
            },
        );
    }

    /// Resolve the best algorithm for every ordered pair of registered
    /// shape types.
    ///
    /// Must be called once, after registration and before the factory is
    /// handed to a world; afterwards the algorithm table is immutable and
    /// safe to read from multiple threads.
    pub fn prepopulate(&mut self) {
        let tags = self.hierarchy.keys().cloned().collect::<Vec<_>>();
        for (index, &lhs) in tags.iter().enumerate() {
            for &rhs in &tags[index..] {
                if let Some(create) = self.lookup(lhs, rhs).map(|registration| registration.create)
                {
                    self.algorithms.insert((lhs, rhs), create());
                }
            }
        }
        self.prepopulated = true;
    }

    /// Fetch the algorithm instance for a shape type pair, canonicalizing
    /// the order.
    ///
    /// Panics if `prepopulate` has not run, or if no algorithm covers the
    /// pair; both are programming errors, not runtime conditions.
    pub fn algorithm(&self, a: ShapeType, b: ShapeType) -> AlgorithmInstance<S> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };

        assert!(
            self.prepopulated,
            "narrowphase factory used before prepopulate()"
        );
        let shared = self
            .algorithms
            .get(&(a, b))
            .unwrap_or_else(|| panic!("no narrowphase algorithm for {:?} vs {:?}", a, b));

        match shared.fork() {
            Some(unique) => AlgorithmInstance::Unique(unique),
            None => AlgorithmInstance::Shared(Arc::clone(shared)),
        }
    }

    /// Register the built-in shape types and algorithms.
    pub fn register_defaults(&mut self)
    where
        S: Send + Sync + 'static,
    {
        self.register_shape_tag(ShapeType::CONVEX, None);
        self.register_shape_type::<Cuboid<S>>();
        self.register_shape_type::<Sphere<S>>();
        self.register_shape_type::<AxisAlignedPlane<S>>();

        self.register_algorithm::<ConvexConvex<S>>(0);
        self.register_algorithm::<ConvexPlane>(0);

        self.register_algorithm::<BoxBox>(1);
        self.register_algorithm::<SphereSphere>(1);
    }

    /// Find the highest-priority registration anywhere along the type
    /// lattice for `(a, b)`: first the right-hand parent chain, then
    /// recursively the left-hand side one step up against the original
    /// right-hand side. Ties keep the first seen.
    fn lookup(&self, a: ShapeType, b: ShapeType) -> Option<&Registration<S>> {
        let mut result: Option<&Registration<S>> = None;

        let mut walk = Some(b);
        while let Some(tag) = walk {
            if let Some(found) = self.registrations.get(&(a, tag)) {
                if result.map_or(true, |best| found.priority > best.priority) {
                    result = Some(found);
                }
            }
            walk = self.hierarchy.get(&tag).cloned().and_then(|parent| parent);
        }

        if let Some(&Some(parent)) = self.hierarchy.get(&a) {
            if let Some(found) = self.lookup(parent, b) {
                if result.map_or(true, |best| found.priority > best.priority) {
                    result = Some(found);
                }
            }
        }

        result
    }
}
