//! Contact constraint setup.

use cgmath::prelude::*;
use cgmath::{BaseFloat, Vector3};

use super::body::SolverBody;
use super::SolverConfig;
use crate::collide::ContactPoint;

/// One contact point prepared for the iterative solver.
///
/// Precomputes the effective mass along the normal, the per-body jacobian
/// rows and the impulse targets; the iterations only accumulate clamped
/// deltas against these.
#[derive(Debug)]
pub(crate) struct ContactConstraint<S> {
    /// Indices of the two bodies in the solver body cache.
    pub bodies: [u32; 2],

    pub normals: [Vector3<S>; 2],
    pub angular_component: [Vector3<S>; 2],
    pub relpos_cross_normal: [Vector3<S>; 2],

    /// Inverse of the effective mass along the normal.
    pub jac_diag_ab_inv: S,

    /// Constraint force mixing, scaled by `1/dt` and by the jacobian.
    pub cfm: S,

    /// Target velocity impulse.
    pub impulse: S,
    pub applied_impulse: S,

    /// Positional error routed to the split impulse pass.
    pub penetration_impulse: S,
    pub applied_push_impulse: S,
}

impl<S> ContactConstraint<S>
where
    S: BaseFloat,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &SolverConfig<S>,
        dt: S,
        contact: &ContactPoint<S>,
        body_0: &SolverBody<S>,
        body_1: &SolverBody<S>,
        index_0: u32,
        index_1: u32,
        rel_pos_0: Vector3<S>,
        rel_pos_1: Vector3<S>,
        relative_vel: S,
        restitution: S,
    ) -> Self {
        let dt_inv = S::one() / dt;

        let erp = config.erp;
        let mut cfm = config.cfm * dt_inv;

        let normal = contact.normal;
        let normals = [normal, -normal];
        let mut angular_component = [Vector3::zero(); 2];
        let mut relpos_cross_normal = [Vector3::zero(); 2];

        let mut denom = S::zero();

        if body_0.target.is_some() {
            let torque_axis = rel_pos_0.cross(normal);
            let ang = body_0.inv_inertia_world * torque_axis;

            denom = body_0.inv_mass + normal.dot(ang.cross(rel_pos_0));

            angular_component[0] = ang;
            relpos_cross_normal[0] = torque_axis;
        }

        if body_1.target.is_some() {
            let torque_axis = rel_pos_1.cross(normal);
            let ang = body_1.inv_inertia_world * -torque_axis;

            denom += body_1.inv_mass + normal.dot((-ang).cross(rel_pos_1));

            angular_component[1] = ang;
            relpos_cross_normal[1] = -torque_axis;
        }

        let jac_diag_ab_inv = S::one() / (denom + cfm);

        let penetration = contact.distance;
        let mut bounce = restitution * -relative_vel;
        if bounce < S::zero() {
            bounce = S::zero();
        }

        let vel_0 = body_0.linear_velocity + body_0.applied_force_impulse;
        let vel_1 = body_1.linear_velocity + body_1.applied_force_impulse;
        let ang_vel_0 = body_0.angular_velocity + body_0.applied_torque_impulse;
        let ang_vel_1 = body_1.angular_velocity + body_1.applied_torque_impulse;

        let vel_0_dot_n = normals[0].dot(vel_0) + relpos_cross_normal[0].dot(ang_vel_0);
        let vel_1_dot_n = normals[1].dot(vel_1) + relpos_cross_normal[1].dot(ang_vel_1);

        let mut velocity_error = bounce - (vel_0_dot_n + vel_1_dot_n);
        let positional_error;

        if penetration > S::zero() {
            // Separated but within the contact threshold: bleed the slack
            // off the impulse instead of correcting position.
            positional_error = S::zero();
            velocity_error -= penetration * dt_inv;
        } else {
            positional_error = -penetration * erp * dt_inv;
        }

        let p_impulse = positional_error * jac_diag_ab_inv;
        let velocity_impulse = velocity_error * jac_diag_ab_inv;

        let (impulse, penetration_impulse) =
            if penetration > config.split_impulse_penetration_threshold {
                (p_impulse + velocity_impulse, S::zero())
            } else {
                (velocity_impulse, p_impulse)
            };

        cfm *= jac_diag_ab_inv;

        Self {
            bodies: [index_0, index_1],
            normals,
            angular_component,
            relpos_cross_normal,
            jac_diag_ab_inv,
            cfm,
            impulse,
            applied_impulse: S::zero(),
            penetration_impulse,
            applied_push_impulse: S::zero(),
        }
    }

    pub fn lower_limit(&self) -> S {
        S::zero()
    }
}
