//! Dynamic body state.

use cgmath::prelude::*;
use cgmath::{BaseFloat, Matrix3, Vector3};

/// Mass, inertia and motion state of a dynamic body.
///
/// The local inverse inertia is the diagonal inertia tensor of the body's
/// shape, inverted per axis. The world frame tensor is recomputed from the
/// current rotation each step before the solver runs.
#[derive(Debug)]
pub(crate) struct DynamicBody<S> {
    /// Collision object backing this body.
    pub object: u32,

    pub mass: S,
    pub inv_inertia_local: Vector3<S>,
    pub inv_inertia_world: Matrix3<S>,

    pub linear_velocity: Vector3<S>,
    pub angular_velocity: Vector3<S>,

    pub force: Vector3<S>,
    pub torque: Vector3<S>,

    /// Simulation island assigned this step.
    pub island: u32,
    /// Slot in the solver's body cache this step.
    pub solver_id: u32,
    /// Position in the dynamic body order.
    pub world_index: u32,
}

impl<S> DynamicBody<S>
where
    S: BaseFloat,
{
    pub fn new(object: u32, mass: S, inertia: Vector3<S>) -> Self {
        assert!(mass > S::zero(), "dynamic bodies need a positive mass");

        let inv_inertia_local = Vector3::new(
            S::one() / inertia.x,
            S::one() / inertia.y,
            S::one() / inertia.z,
        );

        let mut body = Self {
            object,
            mass,
            inv_inertia_local,
            inv_inertia_world: Matrix3::zero(),
            linear_velocity: Vector3::zero(),
            angular_velocity: Vector3::zero(),
            force: Vector3::zero(),
            torque: Vector3::zero(),
            island: u32::max_value(),
            solver_id: u32::max_value(),
            world_index: u32::max_value(),
        };
        body.update_world_inertia(&Matrix3::identity());
        body
    }

    pub fn inv_mass(&self) -> S {
        S::one() / self.mass
    }

    /// Recompute the world frame inverse inertia tensor,
    /// `R·diag(I⁻¹)·Rᵀ`, for the given orientation.
    pub fn update_world_inertia(&mut self, rotation: &Matrix3<S>) {
        let scaled = Matrix3::from_cols(
            rotation.x * self.inv_inertia_local.x,
            rotation.y * self.inv_inertia_local.y,
            rotation.z * self.inv_inertia_local.z,
        );
        self.inv_inertia_world = scaled * rotation.transpose();
    }

    pub fn clear_forces(&mut self) {
        self.force = Vector3::zero();
        self.torque = Vector3::zero();
    }
}
