//! Rigid body dynamics: body state, simulation islands and the contact
//! solver.

pub mod islands;
pub mod solver;

pub(crate) mod body;

use cgmath::BaseFloat;

/// Physics material.
///
/// Describes the surface response of a body; currently that is the
/// restitution coefficient in `[0, 1]`, the fraction of normal velocity
/// reflected in a collision. A contact uses the smaller restitution of the
/// two bodies involved.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    restitution: f32,
}

impl Default for Material {
    fn default() -> Self {
        Material::new(0.)
    }
}

impl Material {
    /// Rock
    pub const ROCK: Material = Material { restitution: 0.1 };
    /// Wood
    pub const WOOD: Material = Material { restitution: 0.2 };
    /// Metal
    pub const METAL: Material = Material { restitution: 0.05 };
    /// Bouncy Ball
    pub const BOUNCY_BALL: Material = Material { restitution: 0.8 };
    /// Super Ball
    pub const SUPER_BALL: Material = Material { restitution: 0.95 };
    /// Pillow
    pub const PILLOW: Material = Material { restitution: 0.2 };

    /// Create a new material with the given restitution.
    pub fn new(restitution: f32) -> Self {
        Self { restitution }
    }

    /// Get restitution
    pub fn restitution<S>(&self) -> S
    where
        S: BaseFloat,
    {
        S::from(self.restitution).unwrap()
    }
}
