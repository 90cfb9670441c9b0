use character_collision::ObstacleQuery;
use character_motor::{EntityController, Faction};
use engine_core::pool::{PoolHandle, PoolManager};
use rapier2d::math::{Point, Vector};
use rapier2d::prelude::Real;

use crate::hitbox::{HitEffect, HitOutcome, Hitbox};

/// A pooled straight-line shot.
#[derive(Clone, Debug)]
pub struct Projectile {
    pub position: Point<Real>,
    pub velocity: Vector<Real>,
    /// Seconds left before the shot expires.
    pub lifetime: Real,
    pub hitbox: Hitbox,
}

impl Projectile {
    pub fn energy_shot() -> Self {
        Self {
            position: Point::origin(),
            velocity: Vector::zeros(),
            lifetime: 0.0,
            hitbox: Hitbox::new(HitEffect::Projectile { damage: 1 }, Vector::repeat(0.15)),
        }
    }

    /// Resets a recycled shot for a new flight.
    pub fn launch(
        &mut self,
        position: Point<Real>,
        velocity: Vector<Real>,
        lifetime: Real,
        owner: Faction,
    ) {
        self.position = position;
        self.velocity = velocity;
        self.lifetime = lifetime;
        self.hitbox.clear_blacklist();
        self.hitbox.blacklist_faction(owner);
        self.hitbox.activate(position);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProjectileEvent {
    Struck { handle: PoolHandle, target: usize },
    Blocked { handle: PoolHandle, point: Point<Real> },
    Expired { handle: PoolHandle },
}

impl ProjectileEvent {
    pub fn handle(&self) -> PoolHandle {
        match *self {
            ProjectileEvent::Struck { handle, .. }
            | ProjectileEvent::Blocked { handle, .. }
            | ProjectileEvent::Expired { handle } => handle,
        }
    }
}

/// Moves every shot checked out of `pool_name`, resolving obstacle and entity hits.
///
/// Shots that hit something or run out of lifetime are released back to the pool.
pub fn advance_projectiles<Q>(
    pools: &mut PoolManager<Projectile>,
    pool_name: &str,
    query: &Q,
    targets: &mut [EntityController],
    dt: Real,
) -> Vec<ProjectileEvent>
where
    Q: ObstacleQuery + ?Sized,
{
    let handles = match pools.pool(pool_name) {
        Some(pool) => pool.outstanding(),
        None => return Vec::new(),
    };
    let mut events = Vec::new();
    for handle in handles {
        let Some(shot) = pools.get_mut(pool_name, handle) else {
            continue;
        };
        if let Some(event) = step_projectile(shot, handle, query, targets, dt) {
            events.push(event);
            if let Err(err) = pools.release(pool_name, handle) {
                log::warn!("projectile {handle} could not be recycled: {err}");
            }
        }
    }
    events
}

fn step_projectile<Q>(
    shot: &mut Projectile,
    handle: PoolHandle,
    query: &Q,
    targets: &mut [EntityController],
    dt: Real,
) -> Option<ProjectileEvent>
where
    Q: ObstacleQuery + ?Sized,
{
    let travel = shot.velocity * dt.max(0.0);
    let distance = travel.norm();
    if distance > 0.0 {
        if let Some(hit) = query.cast_ray(shot.position, travel / distance, distance) {
            shot.hitbox.deactivate();
            return Some(ProjectileEvent::Blocked {
                handle,
                point: hit.point,
            });
        }
        shot.position += travel;
        shot.hitbox.set_center(shot.position);
    }

    for (key, target) in targets.iter_mut().enumerate() {
        if !shot.hitbox.can_strike(key, target) {
            continue;
        }
        if shot.hitbox.on_hit(target) == HitOutcome::Spent {
            shot.hitbox.deactivate();
            return Some(ProjectileEvent::Struck {
                handle,
                target: key,
            });
        }
    }

    shot.lifetime -= dt;
    if shot.lifetime <= 0.0 {
        shot.hitbox.deactivate();
        return Some(ProjectileEvent::Expired { handle });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use character_collision::FormShape;
    use character_motor::EntityDescriptor;
    use physics_rapier::PhysicsWorld;
    use rapier2d::prelude::{nalgebra, point, vector};

    const POOL: &str = "energy_shot";

    fn pools() -> PoolManager<Projectile> {
        let mut pools = PoolManager::new();
        pools
            .create_pool(POOL, true, Projectile::energy_shot)
            .expect("pool");
        pools
    }

    fn fire(pools: &mut PoolManager<Projectile>, velocity: Vector<Real>) -> PoolHandle {
        let handle = pools.acquire(POOL).expect("acquire");
        let shot = pools.get_mut(POOL, handle).expect("shot");
        shot.launch(point![0.0, 1.0], velocity, 1.0, Faction::Player);
        handle
    }

    fn enemy(x: Real) -> EntityController {
        let mut descriptor = EntityDescriptor::new("target", vec![FormShape::centered(1.0, 2.0)]);
        descriptor.faction = Faction::Enemies;
        descriptor.health = 2;
        EntityController::new(descriptor, point![x, 1.0])
    }

    #[test]
    fn shot_damages_enemy_and_returns_to_pool() {
        let world = PhysicsWorld::new();
        let mut pools = pools();
        let handle = fire(&mut pools, vector![30.0, 0.0]);
        let mut targets = vec![enemy(2.0)];

        let mut events = Vec::new();
        for _ in 0..10 {
            events.extend(advance_projectiles(&mut pools, POOL, &world, &mut targets, 1.0 / 60.0));
        }
        assert_eq!(events, vec![ProjectileEvent::Struck { handle, target: 0 }]);
        assert_eq!(targets[0].health(), 1);
        let pool = pools.pool(POOL).expect("pool");
        assert_eq!(pool.outstanding_count(), 0);
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn shot_stops_at_walls() {
        let mut world = PhysicsWorld::new();
        world.insert_obstacle_box(vector![1.6, 1.0], vector![0.1, 2.0], 0.0);
        let mut pools = pools();
        let handle = fire(&mut pools, vector![60.0, 0.0]);
        let mut targets = vec![enemy(3.0)];

        let events = advance_projectiles(&mut pools, POOL, &world, &mut targets, 1.0 / 60.0);
        assert!(events.is_empty());
        let events = advance_projectiles(&mut pools, POOL, &world, &mut targets, 1.0 / 60.0);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProjectileEvent::Blocked { handle: h, .. } if h == handle));
        assert_eq!(targets[0].health(), 2);
    }

    #[test]
    fn owner_faction_is_ignored_and_shot_expires() {
        let world = PhysicsWorld::new();
        let mut pools = pools();
        let handle = fire(&mut pools, vector![0.0, 0.0]);
        let mut descriptor = EntityDescriptor::new("hero", vec![FormShape::centered(1.0, 2.0)]);
        descriptor.faction = Faction::Player;
        let mut targets = vec![EntityController::new(descriptor, point![0.0, 1.0])];

        let mut events = Vec::new();
        for _ in 0..8 {
            events.extend(advance_projectiles(&mut pools, POOL, &world, &mut targets, 0.25));
        }
        assert_eq!(events, vec![ProjectileEvent::Expired { handle }]);
        assert_eq!(targets[0].health(), 1);
    }
}
