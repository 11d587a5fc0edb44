//! Sequential impulse contact solver with split impulse penetration
//! resolution.
//!
//! Runs on one island at a time: a projected Gauss-Seidel sweep over the
//! contact constraints, iterated until the residual drops below the
//! configured threshold or the iteration limit is reached. Penetrations
//! deeper than the split impulse threshold are resolved positionally in a
//! separate pass so they never feed energy into the velocity state.

mod body;
mod contact;

use cgmath::prelude::*;
use cgmath::BaseFloat;
use slab::Slab;

use self::body::SolverBody;
use self::contact::ContactConstraint;
use crate::collide::world::CollisionWorld;
use crate::physics::body::DynamicBody;
use crate::transform::integrate_transform;

/// Tuning parameters for the sequential impulse solver.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig<S> {
    /// Number of velocity iterations to perform.
    pub iterations: u32,

    /// Number of iterations for split impulse penetration resolving.
    pub penetration_iterations: u32,

    /// Residual below which the iteration loops terminate early.
    pub residual_threshold: S,

    /// Error reduction parameter: fraction of positional error resolved
    /// per step.
    pub erp: S,

    /// Constraint force mixing; softens contacts when non-zero.
    pub cfm: S,

    /// Penetrations deeper than this (a negative number) are resolved by
    /// the split impulse pass instead of the velocity impulse.
    pub split_impulse_penetration_threshold: S,

    /// Fraction of the split impulse turn velocity applied when
    /// re-integrating the transform.
    pub split_impulse_turn_erp: S,
}

impl<S> Default for SolverConfig<S>
where
    S: BaseFloat,
{
    fn default() -> Self {
        Self {
            iterations: 10,
            penetration_iterations: 10,
            residual_threshold: S::zero(),
            erp: S::from(0.2).unwrap(),
            cfm: S::zero(),
            split_impulse_penetration_threshold: S::from(-0.04).unwrap(),
            split_impulse_turn_erp: S::from(0.1).unwrap(),
        }
    }
}

/// Sequential impulse solver.
///
/// Scratch buffers are reused between islands and steps; steady state
/// allocates nothing.
///
/// ### Type parameters:
///
/// - `S`: Scalar type, `f32` or `f64`
#[derive(Debug)]
pub struct SequentialImpulseSolver<S> {
    config: SolverConfig<S>,
    bodies: Vec<SolverBody<S>>,
    contacts: Vec<ContactConstraint<S>>,
}

impl<S> SequentialImpulseSolver<S>
where
    S: BaseFloat,
{
    /// Create a solver with the given configuration.
    pub fn new(config: SolverConfig<S>) -> Self {
        Self {
            config,
            bodies: Vec::new(),
            contacts: Vec::new(),
        }
    }

    /// Solve one island.
    ///
    /// `island` lists the dynamic body slots of the island, `manifolds` the
    /// pair cache keys of its contact manifolds. Writes the resulting
    /// velocities back to the bodies and, when split impulses were applied,
    /// the corrected transforms back to the collision objects.
    pub(crate) fn solve(
        &mut self,
        bodies: &mut Slab<DynamicBody<S>>,
        collision: &mut CollisionWorld<'_, S>,
        island: &[u32],
        manifolds: &[u64],
        dt: S,
    ) {
        self.setup(bodies, collision, island, manifolds, dt);

        self.resolve_penetrations();

        for _ in 0..self.config.iterations {
            let residual = self.solve_iteration();
            if residual <= self.config.residual_threshold {
                break;
            }
        }

        self.finish(bodies, collision, dt);
    }

    fn setup(
        &mut self,
        bodies: &mut Slab<DynamicBody<S>>,
        collision: &CollisionWorld<'_, S>,
        island: &[u32],
        manifolds: &[u64],
        dt: S,
    ) {
        self.bodies.clear();
        self.contacts.clear();
        self.bodies.reserve(island.len() + 1);

        // The shared stand-in for every static object.
        self.bodies.push(SolverBody::fixed());

        for &slot in island {
            let body = &mut bodies[slot as usize];
            body.solver_id = self.bodies.len() as u32;
            let transform = collision.object(body.object).transform;
            self.bodies.push(SolverBody::new(slot, body, transform, dt));
        }

        for &key in manifolds {
            let entry = collision.pair(key);
            let object_a = collision.object(entry.objects[0]);
            let object_b = collision.object(entry.objects[1]);

            let index_0 = object_a
                .owner
                .dynamic_slot()
                .map_or(0, |slot| bodies[slot as usize].solver_id);
            let index_1 = object_b
                .owner
                .dynamic_slot()
                .map_or(0, |slot| bodies[slot as usize].solver_id);

            // A contact both of whose bodies are immovable can never be
            // resolved and must not get this far.
            assert!(
                self.bodies[index_0 as usize].inv_mass != S::zero()
                    || self.bodies[index_1 as usize].inv_mass != S::zero(),
                "contact between two zero-inverse-mass bodies reached the solver"
            );

            for point in entry.manifold.points() {
                let rel_pos_0 = point.ws_position[0] - object_a.transform.translation;
                let rel_pos_1 = point.ws_position[1] - object_b.transform.translation;

                let vel_0 = self.bodies[index_0 as usize].velocity_at(rel_pos_0);
                let vel_1 = self.bodies[index_1 as usize].velocity_at(rel_pos_1);
                let relative_vel = point.normal.dot(vel_0 - vel_1);

                self.contacts.push(ContactConstraint::new(
                    &self.config,
                    dt,
                    point,
                    &self.bodies[index_0 as usize],
                    &self.bodies[index_1 as usize],
                    index_0,
                    index_1,
                    rel_pos_0,
                    rel_pos_1,
                    relative_vel,
                    entry.manifold.restitution,
                ));
            }
        }
    }

    fn resolve_penetrations(&mut self) {
        for _ in 0..self.config.penetration_iterations {
            let mut residual = S::zero();
            for index in 0..self.contacts.len() {
                residual += self.solve_penetration(index).abs();
            }

            if residual <= self.config.residual_threshold {
                break;
            }
        }
    }

    fn solve_iteration(&mut self) -> S {
        let mut residual = S::zero();

        for index in 0..self.contacts.len() {
            let delta = self.solve_contact(index);
            residual += delta * delta;
        }

        residual
    }

    fn solve_penetration(&mut self, index: usize) -> S {
        let contact = &mut self.contacts[index];
        if contact.penetration_impulse == S::zero() {
            return S::zero();
        }

        let (body_0, body_1) = pair_mut(
            &mut self.bodies,
            contact.bodies[0] as usize,
            contact.bodies[1] as usize,
        );

        let mut d_impulse = contact.penetration_impulse - contact.applied_push_impulse * contact.cfm;

        let dv_0_dot_n = contact.normals[0].dot(body_0.push_vel)
            + contact.relpos_cross_normal[0].dot(body_0.turn_vel);
        let dv_1_dot_n = contact.normals[1].dot(body_1.push_vel)
            + contact.relpos_cross_normal[1].dot(body_1.turn_vel);

        d_impulse -= dv_0_dot_n * contact.jac_diag_ab_inv;
        d_impulse -= dv_1_dot_n * contact.jac_diag_ab_inv;

        let mut new_impulse = contact.applied_push_impulse + d_impulse;
        if new_impulse < contact.lower_limit() {
            d_impulse = contact.lower_limit() - contact.applied_push_impulse;
            new_impulse = contact.lower_limit();
        }
        contact.applied_push_impulse = new_impulse;

        body_0.apply_push_impulse(
            contact.normals[0] * body_0.inv_mass,
            contact.angular_component[0],
            d_impulse,
        );
        body_1.apply_push_impulse(
            contact.normals[1] * body_1.inv_mass,
            contact.angular_component[1],
            d_impulse,
        );

        d_impulse
    }

    fn solve_contact(&mut self, index: usize) -> S {
        let contact = &mut self.contacts[index];
        let (body_0, body_1) = pair_mut(
            &mut self.bodies,
            contact.bodies[0] as usize,
            contact.bodies[1] as usize,
        );

        let mut d_impulse = contact.impulse - contact.applied_impulse * contact.cfm;

        let dv_0_dot_n = contact.normals[0].dot(body_0.delta_v)
            + contact.relpos_cross_normal[0].dot(body_0.delta_w);
        let dv_1_dot_n = contact.normals[1].dot(body_1.delta_v)
            + contact.relpos_cross_normal[1].dot(body_1.delta_w);

        d_impulse -= dv_0_dot_n * contact.jac_diag_ab_inv;
        d_impulse -= dv_1_dot_n * contact.jac_diag_ab_inv;

        let mut new_impulse = contact.applied_impulse + d_impulse;
        if new_impulse < contact.lower_limit() {
            d_impulse = contact.lower_limit() - contact.applied_impulse;
            new_impulse = contact.lower_limit();
        }
        contact.applied_impulse = new_impulse;

        body_0.apply_impulse(
            contact.normals[0] * body_0.inv_mass,
            contact.angular_component[0],
            d_impulse,
        );
        body_1.apply_impulse(
            contact.normals[1] * body_1.inv_mass,
            contact.angular_component[1],
            d_impulse,
        );

        d_impulse
    }

    fn finish(
        &mut self,
        bodies: &mut Slab<DynamicBody<S>>,
        collision: &mut CollisionWorld<'_, S>,
        dt: S,
    ) {
        let turn_erp = self.config.split_impulse_turn_erp;

        for solver_body in self.bodies.iter_mut().skip(1) {
            let slot = match solver_body.target {
                Some(slot) => slot,
                None => continue,
            };
            let body = &mut bodies[slot as usize];

            solver_body.linear_velocity += solver_body.delta_v;
            solver_body.angular_velocity += solver_body.delta_w;

            body.linear_velocity = solver_body.linear_velocity + solver_body.applied_force_impulse;
            body.angular_velocity =
                solver_body.angular_velocity + solver_body.applied_torque_impulse;

            if solver_body.push_applied {
                let corrected = integrate_transform(
                    &solver_body.world_transform,
                    solver_body.push_vel,
                    solver_body.turn_vel * turn_erp,
                    dt,
                );
                collision.object_mut(body.object).transform = corrected;
            }
        }
    }
}

/// Distinct mutable references to two slots of one slice.
fn pair_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = slice.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
