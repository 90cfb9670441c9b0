use character_collision::{
    ContactSink, FormError, FormGeometry, FormShape, MotionResolver, ObstacleQuery,
    SurfaceContact, Termination,
};
use rapier2d::math::{Point, Vector};
use rapier2d::parry::bounding_volume::Aabb;
use rapier2d::prelude::Real;

use crate::motion::{EntityMotion, Faction, MotionState};
use crate::profile::MotorProfile;
use crate::velocity::{compose_velocity, decay_external, MotionController};

/// Static description an entity is spawned from.
#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    pub name: String,
    pub health: i32,
    pub max_health: i32,
    pub faction: Faction,
    pub forms: Vec<FormShape>,
    pub form_index: usize,
    pub profile: MotorProfile,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>, forms: Vec<FormShape>) -> Self {
        Self {
            name: name.into(),
            health: 1,
            max_health: 1,
            faction: Faction::Neutral,
            forms,
            form_index: 0,
            profile: MotorProfile::platformer_default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub displacement: Vector<Real>,
    pub termination: Termination,
    pub previous_state: MotionState,
    pub state: MotionState,
    pub landed: bool,
}

impl TickReport {
    fn idle(state: MotionState) -> Self {
        Self {
            displacement: Vector::zeros(),
            termination: Termination::Idle,
            previous_state: state,
            state,
            landed: false,
        }
    }

    pub fn left_ground(&self) -> bool {
        self.previous_state == MotionState::Grounded && self.state == MotionState::Air
    }
}

/// Applies contact notifications to the motion record while a move is resolved.
struct ContactHandler<'a, C: ?Sized> {
    motion: &'a mut EntityMotion,
    profile: &'a MotorProfile,
    controller: &'a mut C,
    landed: bool,
}

impl<C: MotionController + ?Sized> ContactHandler<'_, C> {
    fn check_for_landing(&mut self, incoming: Vector<Real>) {
        let up = self.motion.up();
        if incoming.dot(&up) >= 0.0 {
            return;
        }
        let rising = self.motion.external.dot(&up);
        self.motion.external -= up * rising;
        if self.motion.state != MotionState::Grounded {
            self.motion.state = MotionState::Grounded;
            self.controller.on_landing(self.motion);
            self.motion.reset_air_time();
            self.landed = true;
        }
    }
}

impl<C: MotionController + ?Sized> ContactSink for ContactHandler<'_, C> {
    fn on_surface_contact(&mut self, contact: SurfaceContact) {
        let slope = contact.normal.angle(&self.motion.up()).to_degrees();
        if slope < self.profile.max_climb_angle_deg {
            self.check_for_landing(contact.incoming);
        } else if contact.side != 0.0 {
            self.motion.state = MotionState::Air;
        }
    }

    fn on_concave_landing(&mut self, incoming: Vector<Real>) {
        self.check_for_landing(incoming);
    }
}

/// A moving box in the level: forms, motion record and resolver.
pub struct EntityController {
    name: String,
    health: i32,
    max_health: i32,
    faction: Faction,
    profile: MotorProfile,
    forms: Vec<FormShape>,
    form_index: usize,
    resolver: Option<MotionResolver>,
    position: Point<Real>,
    motion: EntityMotion,
}

impl EntityController {
    /// Builds the entity. A missing or unusable form disables it instead of failing.
    pub fn new(descriptor: EntityDescriptor, position: Point<Real>) -> Self {
        let resolver = match Self::build_geometry(
            &descriptor.forms,
            descriptor.form_index,
            &descriptor.profile,
        ) {
            Ok(geometry) => Some(MotionResolver::new(geometry)),
            Err(err) => {
                log::error!("entity `{}` disabled: {err}", descriptor.name);
                None
            }
        };
        Self {
            name: descriptor.name,
            health: descriptor.health,
            max_health: descriptor.max_health,
            faction: descriptor.faction,
            profile: descriptor.profile,
            forms: descriptor.forms,
            form_index: descriptor.form_index,
            resolver,
            position,
            motion: EntityMotion::new(),
        }
    }

    fn build_geometry(
        forms: &[FormShape],
        index: usize,
        profile: &MotorProfile,
    ) -> Result<FormGeometry, FormError> {
        if forms.is_empty() {
            return Err(FormError::NoForms);
        }
        let shape = forms.get(index).ok_or(FormError::InvalidIndex {
            index,
            available: forms.len(),
        })?;
        FormGeometry::new(
            *shape,
            profile.ray_precision_base,
            profile.ray_precision_height,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.resolver.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn set_health(&mut self, health: i32) {
        self.health = health;
    }

    pub fn damage(&mut self, amount: i32) {
        self.health -= amount;
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    pub fn set_faction(&mut self, faction: Faction) {
        self.faction = faction;
    }

    pub fn profile(&self) -> &MotorProfile {
        &self.profile
    }

    pub fn position(&self) -> Point<Real> {
        self.position
    }

    pub fn set_position(&mut self, position: Point<Real>) {
        self.position = position;
    }

    pub fn motion(&self) -> &EntityMotion {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut EntityMotion {
        &mut self.motion
    }

    pub fn state(&self) -> MotionState {
        self.motion.state
    }

    pub fn facing_right(&self) -> bool {
        self.motion.facing_right
    }

    pub fn forward(&self) -> Vector<Real> {
        self.motion.forward()
    }

    pub fn form_index(&self) -> usize {
        self.form_index
    }

    pub fn form_count(&self) -> usize {
        self.forms.len()
    }

    /// Switches the active form. Bad requests are logged and the current form is kept.
    pub fn change_form(&mut self, index: usize) -> Result<(), FormError> {
        if index == self.form_index && self.resolver.is_some() {
            return Ok(());
        }
        let geometry = match Self::build_geometry(&self.forms, index, &self.profile) {
            Ok(geometry) => geometry,
            Err(err) => {
                log::error!("entity `{}`: form {index} rejected: {err}", self.name);
                return Err(err);
            }
        };
        match self.resolver.as_mut() {
            Some(resolver) => resolver.set_form(geometry),
            None => self.resolver = Some(MotionResolver::new(geometry)),
        }
        self.form_index = index;
        Ok(())
    }

    /// Replaces the form list and activates the first form.
    pub fn set_forms(&mut self, forms: Vec<FormShape>) -> Result<(), FormError> {
        self.forms = forms;
        self.form_index = 0;
        match Self::build_geometry(&self.forms, 0, &self.profile) {
            Ok(geometry) => {
                self.resolver = Some(MotionResolver::new(geometry));
                Ok(())
            }
            Err(err) => {
                log::error!("entity `{}` disabled: {err}", self.name);
                self.resolver = None;
                Err(err)
            }
        }
    }

    /// Changes ray counts per face; values below two are raised to two.
    pub fn set_precision(&mut self, base: usize, height: usize) -> Result<(), FormError> {
        self.profile.ray_precision_base = base;
        self.profile.ray_precision_height = height;
        let geometry = Self::build_geometry(&self.forms, self.form_index, &self.profile)?;
        match self.resolver.as_mut() {
            Some(resolver) => resolver.set_form(geometry),
            None => self.resolver = Some(MotionResolver::new(geometry)),
        }
        Ok(())
    }

    /// Adds an impulse. A negative magnitude flips `direction`; impulses that do not
    /// exceed the knockback resistance are dropped.
    pub fn apply_velocity(&mut self, direction: Vector<Real>, magnitude: Real) {
        let (direction, magnitude) = if magnitude < 0.0 {
            (-direction, -magnitude)
        } else {
            (direction, magnitude)
        };
        if magnitude - self.profile.knockback_resistance > 0.0 {
            self.motion.external += direction * magnitude;
        }
    }

    pub fn apply_impulse(&mut self, impulse: Vector<Real>) {
        let magnitude = impulse.norm();
        if magnitude > 0.0 {
            self.apply_velocity(impulse / magnitude, magnitude);
        }
    }

    /// World-space box of the active form, without the raycast inset.
    pub fn bounds(&self) -> Option<Aabb> {
        let form = self.resolver.as_ref()?.form();
        let center = self.position + form.center();
        Some(Aabb::new(
            center - form.half_extents(),
            center + form.half_extents(),
        ))
    }

    pub fn is_on_ground<Q: ObstacleQuery + ?Sized>(&self, query: &Q) -> bool {
        self.resolver
            .as_ref()
            .is_some_and(|resolver| resolver.check_ground(query, self.position, self.motion.up()))
    }

    /// Advances one fixed step and commits the resolved displacement.
    pub fn tick<Q, C>(&mut self, query: &Q, controller: &mut C, dt: Real) -> TickReport
    where
        Q: ObstacleQuery + ?Sized,
        C: MotionController + ?Sized,
    {
        let previous_state = self.motion.state;
        let Some(resolver) = self.resolver.as_mut() else {
            return TickReport::idle(previous_state);
        };
        let dt = dt.max(0.0);

        self.motion.update_facing();
        let airborne = match self.motion.state {
            MotionState::Air => true,
            MotionState::Grounded => {
                !resolver.check_ground(query, self.position, self.motion.up())
            }
            MotionState::Clutch => false,
        };
        if airborne {
            self.motion.state = MotionState::Air;
            self.motion.sub_air_time += dt;
            controller.on_airborne(&self.motion);
        }

        self.motion.velocity = compose_velocity(controller, &self.motion, &self.profile);
        let desired = self.motion.velocity * dt;
        let mut handler = ContactHandler {
            motion: &mut self.motion,
            profile: &self.profile,
            controller,
            landed: false,
        };
        let result = resolver.resolve_motion(query, self.position, desired, &mut handler);
        let landed = handler.landed;
        self.position += result.displacement;

        self.motion.external = decay_external(
            self.motion.external,
            self.profile.inertial_damping,
            self.profile.damping_cutoff,
        );

        TickReport {
            displacement: result.displacement,
            termination: result.termination,
            previous_state,
            state: self.motion.state,
            landed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::velocity::Inert;
    use character_collision::{ObstacleHit, RAYCAST_INSET};
    use physics_rapier::PhysicsWorld;
    use rapier2d::prelude::{nalgebra, point, vector};

    const DT: Real = 1.0 / 60.0;

    #[derive(Default)]
    struct Scripted {
        push: Vector<Real>,
        over: Vector<Real>,
        landings: u32,
        airborne_ticks: u32,
    }

    impl MotionController for Scripted {
        fn override_velocity(&mut self, _motion: &EntityMotion) -> Vector<Real> {
            self.over
        }

        fn additive_velocity(&mut self, _motion: &EntityMotion) -> Vector<Real> {
            self.push
        }

        fn on_landing(&mut self, _motion: &EntityMotion) {
            self.landings += 1;
        }

        fn on_airborne(&mut self, _motion: &EntityMotion) {
            self.airborne_ticks += 1;
        }
    }

    fn descriptor(width: Real, height: Real) -> EntityDescriptor {
        let mut descriptor = EntityDescriptor::new("mover", vec![FormShape::centered(width, height)]);
        descriptor.profile.gravity_coefficient = 30.0;
        descriptor.profile.max_fall_speed = 15.0;
        descriptor
    }

    fn flat_ground() -> PhysicsWorld {
        let mut world = PhysicsWorld::new();
        world.insert_obstacle_box(vector![0.0, -1.0], vector![4.0, 1.0], 0.0);
        world
    }

    #[test]
    fn landing_on_a_slope_fires_once() {
        let mut world = PhysicsWorld::new();
        world.insert_obstacle_box(vector![0.0, 0.0], vector![20.0, 0.5], std::f32::consts::FRAC_PI_4);
        let mut entity = EntityController::new(descriptor(1.0, 1.0), point![0.0, 3.0]);
        let mut script = Scripted {
            push: vector![0.0, -2.0],
            ..Default::default()
        };

        for _ in 0..120 {
            entity.tick(&world, &mut script, DT);
        }
        assert_eq!(script.landings, 1);
        assert!(script.airborne_ticks > 0);
        assert_eq!(entity.state(), MotionState::Grounded);
    }

    /// A V whose 60° walls are too steep to stand on; the box already touches both.
    struct SteepWedge;

    impl ObstacleQuery for SteepWedge {
        fn cast_ray(
            &self,
            origin: Point<Real>,
            direction: Vector<Real>,
            _max_distance: Real,
        ) -> Option<ObstacleHit> {
            let normal = if direction.x > 0.0 {
                vector![-0.866_025_4, 0.5]
            } else {
                vector![0.866_025_4, 0.5]
            };
            Some(ObstacleHit {
                distance: RAYCAST_INSET,
                point: origin + direction * RAYCAST_INSET,
                normal,
            })
        }

        fn cast_box(
            &self,
            _center: Point<Real>,
            _half_extents: Vector<Real>,
            _direction: Vector<Real>,
            _max_distance: Real,
        ) -> Option<Real> {
            None
        }
    }

    #[test]
    fn falling_into_a_steep_v_lands_in_the_corner() {
        let mut entity = EntityController::new(descriptor(1.0, 1.0), point![0.0, 0.0]);
        let mut script = Scripted {
            push: vector![0.0, -2.0],
            ..Default::default()
        };
        assert_eq!(entity.state(), MotionState::Air);

        let report = entity.tick(&SteepWedge, &mut script, DT);
        assert_eq!(report.termination, Termination::ConcaveCorner);
        assert_eq!(report.displacement, Vector::zeros());
        assert_eq!(report.previous_state, MotionState::Air);
        assert_eq!(report.state, MotionState::Grounded);
        assert!(report.landed);
        assert_eq!(script.landings, 1);
        assert_eq!(entity.motion().sub_air_time, 0.0);
        assert_eq!(entity.position(), point![0.0, 0.0]);
    }

    #[test]
    fn diagonal_move_from_rest_clamps_to_ground() {
        let world = flat_ground();
        let mut desc = descriptor(2.0, 2.0);
        desc.profile.gravity_enabled = false;
        desc.profile.max_fall_speed = 10.0;
        let mut entity = EntityController::new(desc, point![0.0, 1.0]);
        entity.motion_mut().state = MotionState::Grounded;
        let mut script = Scripted {
            over: vector![5.0, -5.0] / DT,
            ..Default::default()
        };

        let report = entity.tick(&world, &mut script, DT);
        // Origins rest one inset above the ground; the diagonal hit keeps the inset along the ray.
        let expected_drop = RAYCAST_INSET - RAYCAST_INSET / std::f32::consts::SQRT_2;
        assert!((report.displacement.x - 5.0).abs() < 1.0e-3);
        assert!((report.displacement.y + expected_drop).abs() < 1.0e-4);
        assert!((entity.position().y - (1.0 - expected_drop)).abs() < 1.0e-4);
        assert_eq!(report.state, MotionState::Grounded);
        assert_eq!(script.landings, 0);
    }

    #[test]
    fn walking_off_an_edge_goes_airborne() {
        let world = flat_ground();
        let mut entity = EntityController::new(descriptor(1.0, 1.0), point![3.0, 0.5]);
        entity.motion_mut().state = MotionState::Grounded;
        let mut script = Scripted {
            push: vector![6.0, 0.0],
            ..Default::default()
        };

        let mut left_ground = false;
        for _ in 0..30 {
            let report = entity.tick(&world, &mut script, DT);
            left_ground |= report.left_ground();
        }
        assert!(left_ground);
        assert_eq!(entity.state(), MotionState::Air);
        assert!(entity.motion().sub_air_time > 0.0);
        assert!(entity.position().y < 0.5);
    }

    #[test]
    fn missing_forms_disable_the_entity() {
        let world = flat_ground();
        let mut entity = EntityController::new(descriptor(1.0, 1.0), point![0.0, 5.0]);
        assert!(entity.is_enabled());
        assert_eq!(entity.set_forms(Vec::new()), Err(FormError::NoForms));
        assert!(!entity.is_enabled());

        let report = entity.tick(&world, &mut Inert, DT);
        assert_eq!(report.termination, Termination::Idle);
        assert_eq!(entity.position(), point![0.0, 5.0]);
        assert!(entity.bounds().is_none());
    }

    #[test]
    fn invalid_form_index_keeps_current_form() {
        let mut desc = descriptor(1.0, 2.0);
        desc.forms.push(FormShape::new(vector![0.0, -0.5], vector![0.5, 0.5]));
        let mut entity = EntityController::new(desc, point![0.0, 0.0]);

        assert!(matches!(
            entity.change_form(5),
            Err(FormError::InvalidIndex { index: 5, available: 2 })
        ));
        assert_eq!(entity.form_index(), 0);

        entity.change_form(1).expect("crouch form");
        let bounds = entity.bounds().expect("bounds");
        assert_eq!(bounds.maxs.y, 0.0);
        assert_eq!(bounds.mins.y, -1.0);
    }

    #[test]
    fn impulses_respect_knockback_resistance() {
        let mut desc = descriptor(1.0, 1.0);
        desc.profile.knockback_resistance = 3.0;
        let mut entity = EntityController::new(desc, point![0.0, 0.0]);

        entity.apply_velocity(vector![1.0, 0.0], 2.0);
        assert_eq!(entity.motion().external, Vector::zeros());

        entity.apply_velocity(vector![1.0, 0.0], -4.0);
        assert_eq!(entity.motion().external, vector![-4.0, 0.0]);

        entity.apply_impulse(vector![0.0, 5.0]);
        assert_eq!(entity.motion().external, vector![-4.0, 5.0]);
    }

    #[test]
    fn landing_clears_upward_external_velocity() {
        let world = flat_ground();
        let mut desc = descriptor(1.0, 1.0);
        desc.profile.inertial_damping = 0.0;
        let mut entity = EntityController::new(desc, point![0.0, 0.6]);
        entity.motion_mut().external = vector![2.0, 3.0];
        let mut script = Scripted {
            push: vector![0.0, -30.0],
            ..Default::default()
        };

        let report = entity.tick(&world, &mut script, DT);
        assert!(report.landed);
        assert_eq!(entity.motion().external, vector![2.0, 0.0]);
        assert_eq!(entity.motion().air_time(), 0.0);
    }
}
