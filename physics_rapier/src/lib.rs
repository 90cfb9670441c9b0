//! Rapier obstacle world and collision layer setup.
#![forbid(unsafe_code)]

use rapier2d::parry::query::ShapeCastOptions;
use rapier2d::prelude::*;

/// Collision layers for level obstacles and entity bodies.
pub mod layers {
    use rapier2d::prelude::{Group, InteractionGroups};

    pub const OBSTACLES: Group = Group::GROUP_1;
    pub const ENTITIES: Group = Group::GROUP_2;

    /// Groups assigned to level geometry.
    pub fn obstacle_member() -> InteractionGroups {
        InteractionGroups::new(OBSTACLES, Group::ALL)
    }

    /// Groups used by movement queries: only obstacles are visible.
    pub fn obstacle_query() -> InteractionGroups {
        InteractionGroups::new(Group::ALL, OBSTACLES)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub collider: ColliderHandle,
    pub distance: Real,
    pub point: Point<Real>,
    pub normal: Vector<Real>,
}

/// Static level geometry plus the query pipeline used by kinematic movement.
///
/// There is no rigid-body solver here: obstacles never move, entities are moved by
/// raycasts, so the world only has to answer queries.
pub struct PhysicsWorld {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    query_pipeline: QueryPipeline,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    pub fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.query_pipeline
    }

    pub fn obstacle_count(&self) -> usize {
        self.colliders
            .iter()
            .filter(|(_, collider)| {
                collider
                    .collision_groups()
                    .memberships
                    .intersects(layers::OBSTACLES)
            })
            .count()
    }

    /// Inserts a collider as-is (keeping its own collision groups).
    pub fn insert_collider(&mut self, collider: Collider) -> ColliderHandle {
        let handle = self.colliders.insert(collider);
        self.query_pipeline.update(&self.colliders);
        handle
    }

    /// Inserts a collider on the obstacle layer.
    pub fn insert_obstacle(&mut self, mut collider: Collider) -> ColliderHandle {
        collider.set_collision_groups(layers::obstacle_member());
        self.insert_collider(collider)
    }

    /// Adds a (possibly rotated) box obstacle. `rotation` is in radians, counter-clockwise.
    pub fn insert_obstacle_box(
        &mut self,
        center: Vector<Real>,
        half_extents: Vector<Real>,
        rotation: Real,
    ) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y)
            .translation(center)
            .rotation(rotation)
            .build();
        self.insert_obstacle(collider)
    }

    /// Adds a triangular obstacle, used for ramps.
    pub fn insert_obstacle_triangle(
        &mut self,
        a: Point<Real>,
        b: Point<Real>,
        c: Point<Real>,
    ) -> ColliderHandle {
        self.insert_obstacle(ColliderBuilder::triangle(a, b, c).build())
    }

    fn obstacle_filter() -> QueryFilter<'static> {
        QueryFilter::new().groups(layers::obstacle_query())
    }

    /// Nearest obstacle hit along `direction` within `max_distance`.
    ///
    /// Rays starting inside an obstacle report a hit at distance zero.
    pub fn cast_obstacle_ray(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
    ) -> Option<RayHit> {
        let length = direction.norm();
        if length <= 0.0 || max_distance <= 0.0 {
            return None;
        }
        let ray = Ray::new(origin, direction / length);
        let (collider, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            Self::obstacle_filter(),
        )?;
        Some(RayHit {
            collider,
            distance: hit.time_of_impact,
            point: ray.point_at(hit.time_of_impact),
            normal: hit.normal,
        })
    }

    /// Sweeps an axis-aligned box and returns the travel distance to the first obstacle.
    pub fn cast_obstacle_box(
        &self,
        center: Point<Real>,
        half_extents: Vector<Real>,
        direction: Vector<Real>,
        max_distance: Real,
    ) -> Option<Real> {
        let length = direction.norm();
        if length <= 0.0 || max_distance <= 0.0 {
            return None;
        }
        if half_extents.x <= 0.0 || half_extents.y <= 0.0 {
            return None;
        }
        let shape = Cuboid::new(half_extents);
        let shape_pos = Isometry::translation(center.x, center.y);
        let options = ShapeCastOptions {
            max_time_of_impact: max_distance,
            target_distance: 0.0,
            stop_at_penetration: true,
            compute_impact_geometry_on_penetration: false,
        };
        let (_, hit) = self.query_pipeline.cast_shape(
            &self.bodies,
            &self.colliders,
            &shape_pos,
            &(direction / length),
            &shape,
            options,
            Self::obstacle_filter(),
        )?;
        Some(hit.time_of_impact)
    }
}
