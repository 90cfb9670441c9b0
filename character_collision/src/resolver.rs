//! Recursive raycast slide resolution.

use rapier2d::math::{Point, Vector};
use rapier2d::prelude::Real;

use crate::form::{FormGeometry, RAYCAST_INSET};
use crate::{ObstacleHit, ObstacleQuery};

/// Deflection steps allowed after the first cast.
pub const MAX_RECURSIONS: u32 = 5;

/// First surface hit by a top-level resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceContact {
    pub normal: Vector<Real>,
    pub point: Point<Real>,
    /// Displacement requested by the caller, before any deflection.
    pub incoming: Vector<Real>,
    /// Deflection side: -1, 1, or 0 for a head-on hit.
    pub side: Real,
}

/// Receives contact notifications while a displacement is resolved.
pub trait ContactSink {
    fn on_surface_contact(&mut self, contact: SurfaceContact);
    fn on_concave_landing(&mut self, incoming: Vector<Real>);
}

impl ContactSink for () {
    fn on_surface_contact(&mut self, _contact: SurfaceContact) {}
    fn on_concave_landing(&mut self, _incoming: Vector<Real>) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Nothing was requested.
    Idle,
    /// The last step reached its full length.
    Clear,
    /// Stopped against a surface with nothing left to slide.
    Blocked,
    /// Tangent hits on consecutive steps.
    ConcaveCorner,
    /// Ran out of deflection steps.
    DepthExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionResult {
    pub displacement: Vector<Real>,
    pub termination: Termination,
    /// Deepest recursion step reached (0 for a single cast).
    pub depth: u32,
}

impl MotionResult {
    fn stop(displacement: Vector<Real>, termination: Termination, depth: u32) -> Self {
        Self {
            displacement,
            termination,
            depth,
        }
    }
}

struct FacingOrigins {
    signs: (i8, i8),
    offsets: Vec<Vector<Real>>,
}

struct Closest {
    adjusted: Real,
    hit: Option<ObstacleHit>,
    tangent: bool,
}

/// Resolves desired displacements for one entity form.
pub struct MotionResolver {
    form: FormGeometry,
    facing: Option<FacingOrigins>,
}

impl MotionResolver {
    pub fn new(form: FormGeometry) -> Self {
        Self { form, facing: None }
    }

    pub fn form(&self) -> &FormGeometry {
        &self.form
    }

    /// Swaps the active layout and drops the cached origins.
    pub fn set_form(&mut self, form: FormGeometry) {
        self.form = form;
        self.facing = None;
    }

    /// Sign pair the cached origins were selected for.
    pub fn cached_signs(&self) -> Option<(i8, i8)> {
        self.facing.as_ref().map(|facing| facing.signs)
    }

    /// Moves as far along `desired` as obstacles allow, sliding along what it hits.
    pub fn resolve_motion<Q, S>(
        &mut self,
        query: &Q,
        position: Point<Real>,
        desired: Vector<Real>,
        sink: &mut S,
    ) -> MotionResult
    where
        Q: ObstacleQuery + ?Sized,
        S: ContactSink + ?Sized,
    {
        if desired == Vector::zeros() {
            return MotionResult::stop(Vector::zeros(), Termination::Idle, 0);
        }
        let base = position + self.form.center();
        self.step(query, sink, base, desired, desired, 0, false)
    }

    /// True when the inset box would touch an obstacle within `2 × inset` along `-up`.
    pub fn check_ground<Q>(&self, query: &Q, position: Point<Real>, up: Vector<Real>) -> bool
    where
        Q: ObstacleQuery + ?Sized,
    {
        let center = position + self.form.center();
        query
            .cast_box(
                center,
                self.form.inset_half_extents(),
                -up,
                RAYCAST_INSET * 2.0,
            )
            .is_some()
    }

    #[allow(clippy::too_many_arguments)]
    fn step<Q, S>(
        &mut self,
        query: &Q,
        sink: &mut S,
        base: Point<Real>,
        velocity: Vector<Real>,
        original: Vector<Real>,
        depth: u32,
        was_tangent: bool,
    ) -> MotionResult
    where
        Q: ObstacleQuery + ?Sized,
        S: ContactSink + ?Sized,
    {
        let magnitude = velocity.norm();
        if magnitude <= 0.0 {
            return MotionResult::stop(Vector::zeros(), Termination::Blocked, depth);
        }
        let direction = velocity / magnitude;
        let cast_distance = (magnitude + RAYCAST_INSET).max(RAYCAST_INSET * 2.0);
        let closest = self.closest_hit(query, base, direction, cast_distance);

        if closest.tangent && was_tangent {
            sink.on_concave_landing(original);
            return MotionResult::stop(Vector::zeros(), Termination::ConcaveCorner, depth);
        }
        let Some(hit) = closest.hit else {
            return MotionResult::stop(velocity, Termination::Clear, depth);
        };

        let travel = direction * closest.adjusted.min(magnitude);
        if depth >= MAX_RECURSIONS {
            log::trace!("motion resolution used all {MAX_RECURSIONS} deflections");
            return MotionResult::stop(travel, Termination::DepthExhausted, depth);
        }
        let remaining = magnitude - closest.adjusted;
        if remaining <= 0.0 {
            return MotionResult::stop(travel, Termination::Blocked, depth);
        }

        let side = deflection_side(hit.normal, velocity);
        let tangent = perpendicular(hit.normal) * side;
        let deflected = tangent * direction.dot(&tangent) * remaining;

        if depth == 0 {
            sink.on_surface_contact(SurfaceContact {
                normal: hit.normal,
                point: hit.point,
                incoming: original,
                side,
            });
        }
        if deflected == Vector::zeros() {
            return MotionResult::stop(travel, Termination::Blocked, depth);
        }

        let rest = self.step(
            query,
            sink,
            base + travel,
            deflected,
            original,
            depth + 1,
            closest.tangent,
        );
        MotionResult {
            displacement: travel + rest.displacement,
            ..rest
        }
    }

    fn closest_hit<Q>(
        &mut self,
        query: &Q,
        base: Point<Real>,
        direction: Vector<Real>,
        cast_distance: Real,
    ) -> Closest
    where
        Q: ObstacleQuery + ?Sized,
    {
        let mut closest = Closest {
            adjusted: cast_distance,
            hit: None,
            tangent: false,
        };
        for &offset in self.facing_origins(direction) {
            let Some(hit) = query.cast_ray(base + offset, direction, cast_distance) else {
                continue;
            };
            let adjusted = hit.distance - RAYCAST_INSET;
            if adjusted > closest.adjusted {
                continue;
            }
            if adjusted <= 0.0 {
                closest.tangent = true;
            }
            if adjusted < closest.adjusted {
                closest.adjusted = adjusted;
                closest.hit = Some(hit);
            }
        }
        closest
    }

    fn facing_origins(&mut self, direction: Vector<Real>) -> &[Vector<Real>] {
        let signs = (sign_of(direction.x), sign_of(direction.y));
        let facing = match self.facing.take() {
            Some(cached) if cached.signs == signs => cached,
            _ => FacingOrigins {
                signs,
                offsets: self.form.facing_origins(signs),
            },
        };
        &self.facing.insert(facing).offsets
    }
}

fn sign_of(value: Real) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

fn perpendicular(normal: Vector<Real>) -> Vector<Real> {
    Vector::new(-normal.y, normal.x)
}

/// Sign of the angle from `normal` to `velocity`; head-on hits give 0.
fn deflection_side(normal: Vector<Real>, velocity: Vector<Real>) -> Real {
    let cross = normal.x * velocity.y - normal.y * velocity.x;
    let angle = cross.atan2(normal.dot(&velocity));
    if angle.abs() >= std::f32::consts::PI {
        0.0
    } else if angle < 0.0 {
        -1.0
    } else if angle > 0.0 {
        1.0
    } else {
        0.0
    }
}
