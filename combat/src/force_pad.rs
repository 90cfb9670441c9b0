use std::collections::HashSet;

use character_collision::RAYCAST_INSET;
use character_motor::EntityController;
use rapier2d::math::{Point, Vector};
use rapier2d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier2d::prelude::Real;

/// Launches entities that touch it along its up direction.
#[derive(Clone, Debug)]
pub struct ForcePad {
    bounds: Aabb,
    up: Vector<Real>,
    push_force: Real,
    touching: HashSet<usize>,
}

impl ForcePad {
    pub fn new(
        center: Point<Real>,
        half_extents: Vector<Real>,
        up: Vector<Real>,
        push_force: Real,
    ) -> Self {
        let up = if up.norm_squared() > 0.0 {
            up.normalize()
        } else {
            Vector::y()
        };
        Self {
            bounds: Aabb::new(center - half_extents, center + half_extents),
            up,
            push_force,
            touching: HashSet::new(),
        }
    }

    pub fn up(&self) -> Vector<Real> {
        self.up
    }

    pub fn push_force(&self) -> Real {
        self.push_force
    }

    /// Resting entities float an inset above surfaces, so contact is tested with that slack.
    pub fn touches(&self, entity: &EntityController) -> bool {
        let trigger = self.bounds.loosened(RAYCAST_INSET * 2.0);
        entity
            .bounds()
            .is_some_and(|bounds| bounds.intersects(&trigger))
    }

    /// Pushes `entity` once per contact. Returns whether this call started the contact.
    pub fn contact(&mut self, key: usize, entity: &mut EntityController) -> bool {
        if !self.touches(entity) {
            self.touching.remove(&key);
            return false;
        }
        if !self.touching.insert(key) {
            return false;
        }
        entity.apply_velocity(self.up, self.push_force);
        true
    }

    /// Runs [`ForcePad::contact`] for every entity, keyed by slice index.
    pub fn dispatch(&mut self, entities: &mut [EntityController]) -> Vec<usize> {
        entities
            .iter_mut()
            .enumerate()
            .filter_map(|(key, entity)| self.contact(key, entity).then_some(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use character_collision::FormShape;
    use character_motor::EntityDescriptor;
    use rapier2d::prelude::{nalgebra, point, vector};

    fn crate_entity(y: Real) -> EntityController {
        let descriptor = EntityDescriptor::new("crate", vec![FormShape::centered(1.0, 1.0)]);
        EntityController::new(descriptor, point![0.0, y])
    }

    #[test]
    fn pad_launches_once_per_contact() {
        let mut pad = ForcePad::new(point![0.0, -0.25], vector![1.0, 0.25], vector![0.0, 1.0], 12.0);
        let mut entities = vec![crate_entity(0.51)];

        assert_eq!(pad.dispatch(&mut entities), vec![0]);
        assert_eq!(entities[0].motion().external, vector![0.0, 12.0]);
        assert!(pad.dispatch(&mut entities).is_empty());

        entities[0].set_position(point![0.0, 3.0]);
        assert!(pad.dispatch(&mut entities).is_empty());
        entities[0].set_position(point![0.0, 0.5]);
        assert_eq!(pad.dispatch(&mut entities), vec![0]);
        assert_eq!(entities[0].motion().external, vector![0.0, 24.0]);
    }

    #[test]
    fn knockback_resistance_can_absorb_the_push() {
        let mut pad = ForcePad::new(point![0.0, -0.25], vector![1.0, 0.25], vector![0.0, 1.0], 2.0);
        let mut entity = crate_entity(0.5);
        let mut heavy = EntityDescriptor::new("anvil", vec![FormShape::centered(1.0, 1.0)]);
        heavy.profile.knockback_resistance = 5.0;
        let mut anvil = EntityController::new(heavy, point![0.0, 0.5]);

        assert!(pad.contact(0, &mut entity));
        assert!(pad.contact(1, &mut anvil));
        assert_eq!(entity.motion().external, vector![0.0, 2.0]);
        assert_eq!(anvil.motion().external, Vector::zeros());
    }
}
