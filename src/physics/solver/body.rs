//! Per-island solver body cache.

use cgmath::prelude::*;
use cgmath::{BaseFloat, Matrix3, Vector3};

use crate::physics::body::DynamicBody;
use crate::transform::Transform;

/// Snapshot of a body's state for one solver run, plus the impulse
/// accumulators the iterations work on.
///
/// Normal impulses accumulate into `delta_v`/`delta_w`; split impulse
/// pushes accumulate separately into `push_vel`/`turn_vel` so penetration
/// resolution never adds energy to the velocity state.
#[derive(Debug)]
pub(crate) struct SolverBody<S> {
    /// Dynamic body slot this cache entry writes back to; `None` for the
    /// shared fixed body.
    pub target: Option<u32>,

    pub world_transform: Transform<S>,

    pub inv_mass: S,
    pub inv_inertia_world: Matrix3<S>,

    pub linear_velocity: Vector3<S>,
    pub angular_velocity: Vector3<S>,

    /// Velocity change from external forces, `F·dt/m`.
    pub applied_force_impulse: Vector3<S>,
    /// Angular velocity change from external torques, `I⁻¹·τ·dt`.
    pub applied_torque_impulse: Vector3<S>,

    pub delta_v: Vector3<S>,
    pub delta_w: Vector3<S>,

    pub push_vel: Vector3<S>,
    pub turn_vel: Vector3<S>,
    pub push_applied: bool,
}

impl<S> SolverBody<S>
where
    S: BaseFloat,
{
    /// The shared zero-inverse-mass body standing in for every static
    /// object.
    pub fn fixed() -> Self {
        Self {
            target: None,
            world_transform: Transform::default(),
            inv_mass: S::zero(),
            inv_inertia_world: Matrix3::zero(),
            linear_velocity: Vector3::zero(),
            angular_velocity: Vector3::zero(),
            applied_force_impulse: Vector3::zero(),
            applied_torque_impulse: Vector3::zero(),
            delta_v: Vector3::zero(),
            delta_w: Vector3::zero(),
            push_vel: Vector3::zero(),
            turn_vel: Vector3::zero(),
            push_applied: false,
        }
    }

    /// Snapshot a dynamic body.
    pub fn new(slot: u32, body: &DynamicBody<S>, world_transform: Transform<S>, dt: S) -> Self {
        let inv_mass = body.inv_mass();

        Self {
            target: Some(slot),
            world_transform,
            inv_mass,
            inv_inertia_world: body.inv_inertia_world,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
            applied_force_impulse: body.force * inv_mass * dt,
            applied_torque_impulse: body.inv_inertia_world * body.torque * dt,
            delta_v: Vector3::zero(),
            delta_w: Vector3::zero(),
            push_vel: Vector3::zero(),
            turn_vel: Vector3::zero(),
            push_applied: false,
        }
    }

    /// Velocity of the body material at offset `p` from the center of
    /// mass, including the pending external force impulses.
    pub fn velocity_at(&self, p: Vector3<S>) -> Vector3<S> {
        self.linear_velocity
            + self.applied_force_impulse
            + (self.angular_velocity + self.applied_torque_impulse).cross(p)
    }

    pub fn apply_impulse(&mut self, linear: Vector3<S>, angular: Vector3<S>, magnitude: S) {
        self.delta_v += linear * magnitude;
        self.delta_w += angular * magnitude;
    }

    pub fn apply_push_impulse(&mut self, linear: Vector3<S>, angular: Vector3<S>, magnitude: S) {
        self.push_vel += linear * magnitude;
        self.turn_vel += angular * magnitude;
        self.push_applied = true;
    }
}
