use std::collections::HashSet;

use character_motor::{EntityController, Faction};
use rapier2d::math::{Point, Vector};
use rapier2d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier2d::prelude::Real;

/// What a hitbox does to the entity it strikes. Chosen when the hitbox is built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitEffect {
    /// Knockback along the swing direction.
    MeleeSwing {
        direction: Vector<Real>,
        knockback: Real,
    },
    /// Direct damage; the carrier is spent.
    Projectile { damage: i32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitOutcome {
    Applied,
    /// Applied, and the carrier should be removed.
    Spent,
}

#[derive(Clone, Debug)]
pub struct Hitbox {
    effect: HitEffect,
    center: Point<Real>,
    half_extents: Vector<Real>,
    blacklist: HashSet<Faction>,
    active: bool,
    struck: HashSet<usize>,
}

impl Hitbox {
    pub fn new(effect: HitEffect, half_extents: Vector<Real>) -> Self {
        Self {
            effect,
            center: Point::origin(),
            half_extents,
            blacklist: HashSet::new(),
            active: false,
            struck: HashSet::new(),
        }
    }

    pub fn melee_swing(knockback: Real, half_extents: Vector<Real>) -> Self {
        Self::new(
            HitEffect::MeleeSwing {
                direction: Vector::x(),
                knockback,
            },
            half_extents,
        )
    }

    pub fn effect(&self) -> HitEffect {
        self.effect
    }

    pub fn blacklist_faction(&mut self, faction: Faction) {
        self.blacklist.insert(faction);
    }

    pub fn clear_blacklist(&mut self) {
        self.blacklist.clear();
    }

    pub fn is_blacklisted(&self, faction: Faction) -> bool {
        self.blacklist.contains(&faction)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Turns the hitbox on at `center`; every target may be struck once per activation.
    pub fn activate(&mut self, center: Point<Real>) {
        self.center = center;
        self.active = true;
        self.struck.clear();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn center(&self) -> Point<Real> {
        self.center
    }

    pub fn set_center(&mut self, center: Point<Real>) {
        self.center = center;
    }

    /// Points a melee swing. Other effects are unchanged.
    pub fn aim(&mut self, direction: Vector<Real>) {
        if let HitEffect::MeleeSwing { knockback, .. } = self.effect {
            self.effect = HitEffect::MeleeSwing {
                direction,
                knockback,
            };
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            self.center - self.half_extents,
            self.center + self.half_extents,
        )
    }

    pub fn on_hit(&self, target: &mut EntityController) -> HitOutcome {
        match self.effect {
            HitEffect::MeleeSwing {
                direction,
                knockback,
            } => {
                target.apply_impulse(direction * knockback);
                HitOutcome::Applied
            }
            HitEffect::Projectile { damage } => {
                target.damage(damage);
                HitOutcome::Spent
            }
        }
    }

    /// Whether `target` is a valid, overlapping, not yet struck victim.
    pub fn can_strike(&self, key: usize, target: &EntityController) -> bool {
        if !self.active || self.struck.contains(&key) || self.is_blacklisted(target.faction()) {
            return false;
        }
        target
            .bounds()
            .is_some_and(|bounds| bounds.intersects(&self.bounds()))
    }

    /// Strikes every overlapping entity not on the blacklist, keyed by slice index.
    ///
    /// Stops at the first strike when the effect spends the hitbox.
    pub fn dispatch_overlap(&mut self, targets: &mut [EntityController]) -> Vec<usize> {
        let mut hits = Vec::new();
        for (key, target) in targets.iter_mut().enumerate() {
            if !self.can_strike(key, target) {
                continue;
            }
            self.struck.insert(key);
            hits.push(key);
            log::debug!("hitbox struck `{}`", target.name());
            if self.on_hit(target) == HitOutcome::Spent {
                self.active = false;
                break;
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use character_collision::FormShape;
    use character_motor::EntityDescriptor;
    use rapier2d::prelude::{nalgebra, point, vector};

    fn entity(name: &str, faction: Faction, x: Real) -> EntityController {
        let mut descriptor = EntityDescriptor::new(name, vec![FormShape::centered(1.0, 1.0)]);
        descriptor.faction = faction;
        descriptor.health = 3;
        descriptor.max_health = 3;
        EntityController::new(descriptor, point![x, 0.0])
    }

    #[test]
    fn swing_knocks_back_along_direction_once() {
        let mut swing = Hitbox::melee_swing(15.0, vector![0.5, 0.5]);
        swing.blacklist_faction(Faction::Player);
        swing.aim(vector![-1.0, 0.0]);
        swing.activate(point![0.5, 0.0]);
        let mut targets = vec![
            entity("grunt", Faction::Enemies, 1.0),
            entity("far", Faction::Enemies, 10.0),
        ];

        assert_eq!(swing.dispatch_overlap(&mut targets), vec![0]);
        assert_eq!(targets[0].motion().external, vector![-15.0, 0.0]);
        assert_eq!(targets[1].motion().external, Vector::zeros());

        assert!(swing.dispatch_overlap(&mut targets).is_empty());
        assert_eq!(targets[0].motion().external, vector![-15.0, 0.0]);
    }

    #[test]
    fn blacklisted_factions_are_skipped() {
        let mut swing = Hitbox::melee_swing(15.0, vector![2.0, 2.0]);
        swing.blacklist_faction(Faction::Player);
        swing.activate(point![0.0, 0.0]);
        let mut targets = vec![
            entity("hero", Faction::Player, 0.0),
            entity("crate", Faction::Neutral, 0.5),
        ];

        assert_eq!(swing.dispatch_overlap(&mut targets), vec![1]);
        assert_eq!(targets[0].motion().external, Vector::zeros());
    }

    #[test]
    fn inactive_hitbox_strikes_nothing() {
        let mut swing = Hitbox::melee_swing(15.0, vector![2.0, 2.0]);
        let mut targets = vec![entity("grunt", Faction::Enemies, 0.0)];
        assert!(swing.dispatch_overlap(&mut targets).is_empty());
        swing.activate(point![0.0, 0.0]);
        swing.deactivate();
        assert!(swing.dispatch_overlap(&mut targets).is_empty());
    }

    #[test]
    fn projectile_effect_damages_and_is_spent() {
        let mut shot = Hitbox::new(HitEffect::Projectile { damage: 1 }, vector![0.2, 0.2]);
        shot.activate(point![0.0, 0.0]);
        let mut targets = vec![
            entity("a", Faction::Enemies, 0.0),
            entity("b", Faction::Enemies, 0.1),
        ];

        assert_eq!(shot.dispatch_overlap(&mut targets), vec![0]);
        assert_eq!(targets[0].health(), 2);
        assert_eq!(targets[1].health(), 3);
        assert!(!shot.is_active());
    }
}
