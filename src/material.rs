//! Surface material properties and the read-only table they live in.

use serde::{Deserialize, Serialize};

/// Small integer identifying a row in a [`MaterialTable`].
///
/// Id `0` is reserved for the built-in default material.
pub type MaterialId = u32;

/// Surface properties used by the narrowphase and the contact solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Mass density, used when deriving mass properties from a shape.
    pub density: f64,
    /// Coulomb static friction coefficient.
    pub static_friction: f64,
    /// Coulomb dynamic (kinetic) friction coefficient.
    pub dynamic_friction: f64,
    /// Friction applied to rolling contact, separate from sliding friction.
    pub rolling_friction: f64,
    /// Normal restitution (elasticity), in `[0, 1]`.
    pub elasticity: f64,
    /// Tangential restitution, in `[-1, 1]`; controls spin imparted on an oblique bounce.
    pub tangential_elasticity: f64,
    /// Tortional (spin-about-normal) restitution.
    pub tortional_elasticity: f64,
}

impl Default for Material {
    /// Neutral, moderately grippy, inelastic material.
    fn default() -> Self {
        Self {
            density: 1.0,
            static_friction: 0.6,
            dynamic_friction: 0.4,
            rolling_friction: 0.0,
            elasticity: 0.0,
            tangential_elasticity: 0.0,
            tortional_elasticity: 0.0,
        }
    }
}

/// Read-only lookup of [`Material`] by [`MaterialId`].
///
/// Kept as a trait rather than a concrete asset-manager handle so this crate does not need to
/// depend on a particular asset-loading or hot-reloading story.
pub trait MaterialTable {
    /// Look up a material. Implementations must always resolve id `0`.
    fn material(&self, id: MaterialId) -> Option<&Material>;
}

/// A flat `Vec`-backed [`MaterialTable`] with id `0` reserved for [`Material::default`].
#[derive(Debug, Clone)]
pub struct SliceMaterialTable {
    materials: Vec<Material>,
}

impl SliceMaterialTable {
    /// Build a table with id `0` as the default material followed by `extra`.
    pub fn new(extra: impl IntoIterator<Item = Material>) -> Self {
        let mut materials = vec![Material::default()];
        materials.extend(extra);

        Self { materials }
    }

    /// Append a material, returning its newly assigned id.
    pub fn push(&mut self, material: Material) -> MaterialId {
        let id = self.materials.len() as MaterialId;
        self.materials.push(material);
        id
    }
}

impl Default for SliceMaterialTable {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl MaterialTable for SliceMaterialTable {
    fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_zero_is_always_present() {
        let table = SliceMaterialTable::default();
        assert_eq!(table.material(0), Some(&Material::default()));
    }

    #[test]
    fn push_returns_assigned_id() {
        let mut table = SliceMaterialTable::default();
        let id = table.push(Material {
            elasticity: 0.9,
            ..Material::default()
        });
        assert_eq!(id, 1);
        assert_eq!(table.material(1).unwrap().elasticity, 0.9);
    }
}
