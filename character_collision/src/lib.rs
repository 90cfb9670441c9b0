//! Raycast kinematic motion for box-shaped entities.
//!
//! Movement is resolved against static obstacles only; entities never push each other.
#![forbid(unsafe_code)]

mod form;
mod resolver;

pub use form::{FormError, FormGeometry, FormShape, MIN_RAYS, RAYCAST_INSET};
pub use resolver::{
    ContactSink, MotionResolver, MotionResult, SurfaceContact, Termination, MAX_RECURSIONS,
};

use physics_rapier::PhysicsWorld;
use rapier2d::math::{Point, Vector};
use rapier2d::prelude::Real;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleHit {
    pub distance: Real,
    pub point: Point<Real>,
    pub normal: Vector<Real>,
}

/// Spatial queries the resolver needs from the world.
pub trait ObstacleQuery {
    /// Nearest obstacle along `direction` (unit length) within `max_distance`.
    fn cast_ray(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
    ) -> Option<ObstacleHit>;

    /// Travel distance of an axis-aligned box swept along `direction`, if it hits.
    fn cast_box(
        &self,
        center: Point<Real>,
        half_extents: Vector<Real>,
        direction: Vector<Real>,
        max_distance: Real,
    ) -> Option<Real>;
}

impl ObstacleQuery for PhysicsWorld {
    fn cast_ray(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
    ) -> Option<ObstacleHit> {
        self.cast_obstacle_ray(origin, direction, max_distance)
            .map(|hit| ObstacleHit {
                distance: hit.distance,
                point: hit.point,
                normal: hit.normal,
            })
    }

    fn cast_box(
        &self,
        center: Point<Real>,
        half_extents: Vector<Real>,
        direction: Vector<Real>,
        max_distance: Real,
    ) -> Option<Real> {
        self.cast_obstacle_box(center, half_extents, direction, max_distance)
    }
}
