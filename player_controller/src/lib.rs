//! Player controller composition (input + motion contributions + actions).
#![forbid(unsafe_code)]

use character_collision::{FormShape, ObstacleQuery};
use character_motor::{
    EntityController, EntityDescriptor, EntityMotion, Faction, MotionController, MotionState,
    TickReport,
};
use combat::{ForcePad, Hitbox, Projectile};
use engine_core::action_timer::{ActionTimer, CancelMode, TimerEvent};
use engine_core::pool::{PoolError, PoolManager};
use rapier2d::math::{Point, Vector};
use rapier2d::prelude::Real;
use serde::{Deserialize, Serialize};

/// Grace window after leaving the ground before the ground jump is lost.
pub const COYOTE_TIME: Real = 5.0 / 60.0;
pub const CROUCH_SPEED_MULT: Real = 0.5;
pub const STAND_FORM: usize = 0;
pub const CROUCH_FORM: usize = 1;
pub const PROJECTILE_POOL: &str = "player_energy_shot";
/// Contact key the player uses with keyed dispatchers such as force pads.
pub const PLAYER_CONTACT_KEY: usize = usize::MAX;

#[derive(Clone, Copy, Debug, Default)]
pub struct RawInput {
    pub move_x: Real,
    pub move_y: Real,
    pub jump: bool,
    pub dash: bool,
    pub melee: bool,
    pub ranged: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InputIntent {
    pub move_axis: [Real; 2],
    pub jump_pressed: bool,
    pub jump_released: bool,
    pub dash_pressed: bool,
    pub melee_pressed: bool,
    pub ranged_pressed: bool,
}

pub trait InputAdapter {
    fn intent(&mut self, raw: RawInput) -> InputIntent;
}

/// Turns held buttons into press/release edges.
#[derive(Default)]
pub struct DirectInputAdapter {
    held: RawInput,
}

impl DirectInputAdapter {
    fn normalize_axis(axis: [Real; 2]) -> [Real; 2] {
        let len = (axis[0] * axis[0] + axis[1] * axis[1]).sqrt();
        if len > 1.0 {
            [axis[0] / len, axis[1] / len]
        } else {
            axis
        }
    }
}

impl InputAdapter for DirectInputAdapter {
    fn intent(&mut self, raw: RawInput) -> InputIntent {
        let previous = std::mem::replace(&mut self.held, raw);
        InputIntent {
            move_axis: Self::normalize_axis([raw.move_x, raw.move_y]),
            jump_pressed: raw.jump && !previous.jump,
            jump_released: !raw.jump && previous.jump,
            dash_pressed: raw.dash && !previous.dash,
            melee_pressed: raw.melee && !previous.melee,
            ranged_pressed: raw.ranged && !previous.ranged,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub run_speed: Real,
    pub jump_velocity: Real,
    /// Seconds the jump velocity is held while the button stays down.
    pub jump_time: Real,
    /// Upward nudge when the jump button is let go early.
    pub release_impulse: Real,
    pub max_jumps: i32,
    pub dash_speed: Real,
    pub dash_time: Real,
    pub dash_cooldown: Real,
    pub can_air_dash: bool,
    pub melee_attack_time: Real,
    pub melee_attack_cooldown: Real,
    pub swing_knockback: Real,
    pub swing_reach: Real,
    pub ranged_attack_time: Real,
    pub ranged_attack_cooldown: Real,
    pub projectile_speed: Real,
    pub projectile_lifetime: Real,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self::platformer_default()
    }
}

impl PlayerTuning {
    pub fn platformer_default() -> Self {
        Self {
            run_speed: 8.0,
            jump_velocity: 14.0,
            jump_time: 0.25,
            release_impulse: 2.0,
            max_jumps: 2,
            dash_speed: 22.0,
            dash_time: 0.15,
            dash_cooldown: 0.4,
            can_air_dash: false,
            melee_attack_time: 0.2,
            melee_attack_cooldown: 0.3,
            swing_knockback: 15.0,
            swing_reach: 0.9,
            ranged_attack_time: 0.1,
            ranged_attack_cooldown: 0.35,
            projectile_speed: 24.0,
            projectile_lifetime: 1.5,
        }
    }

    pub fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }
}

/// Standing and crouching boxes with the entity position at the feet.
pub fn player_forms(width: Real, height: Real) -> Vec<FormShape> {
    let half_width = width * 0.5;
    vec![
        FormShape::new(
            Vector::new(0.0, height * 0.5),
            Vector::new(half_width, height * 0.5),
        ),
        FormShape::new(
            Vector::new(0.0, height * 0.25),
            Vector::new(half_width, height * 0.25),
        ),
    ]
}

/// Jump, dash and attack bookkeeping; supplies the player's velocity contributions.
#[derive(Clone, Debug)]
pub struct PlayerMotion {
    tuning: PlayerTuning,
    jumps: i32,
    crouching: bool,
    is_jumping: bool,
    jump_time_counter: Real,
    allow_influence: bool,
    coyote_spent: bool,
    dash_dir: Vector<Real>,
    last_swing_direction: Vector<Real>,
    dash: ActionTimer,
    melee: ActionTimer,
    ranged: ActionTimer,
}

impl PlayerMotion {
    pub fn new(tuning: PlayerTuning) -> Self {
        Self {
            tuning,
            jumps: tuning.max_jumps,
            crouching: false,
            is_jumping: false,
            jump_time_counter: 0.0,
            allow_influence: true,
            coyote_spent: false,
            dash_dir: Vector::zeros(),
            last_swing_direction: Vector::x(),
            dash: ActionTimer::new(tuning.dash_time, tuning.dash_cooldown, 0.0),
            melee: ActionTimer::new(tuning.melee_attack_time, tuning.melee_attack_cooldown, 0.0),
            ranged: ActionTimer::new(tuning.ranged_attack_time, tuning.ranged_attack_cooldown, 0.0),
        }
    }

    pub fn tuning(&self) -> &PlayerTuning {
        &self.tuning
    }

    pub fn jumps(&self) -> i32 {
        self.jumps
    }

    pub fn is_jumping(&self) -> bool {
        self.is_jumping
    }

    pub fn is_crouching(&self) -> bool {
        self.crouching
    }

    pub fn is_dashing(&self) -> bool {
        self.dash.is_active()
    }

    pub fn last_swing_direction(&self) -> Vector<Real> {
        self.last_swing_direction
    }

    fn restore_movement_options(&mut self) {
        self.jumps = self.tuning.max_jumps;
        self.jump_time_counter = self.tuning.jump_time;
        self.coyote_spent = false;
    }
}

impl MotionController for PlayerMotion {
    fn override_velocity(&mut self, motion: &EntityMotion) -> Vector<Real> {
        if !self.dash.is_active() {
            return Vector::zeros();
        }
        let speed = self.tuning.dash_speed;
        let x = if self.crouching {
            motion.forward().x * speed * 1.1
        } else {
            self.dash_dir.x * speed
        };
        Vector::new(x, self.dash_dir.y * speed)
    }

    fn additive_velocity(&mut self, motion: &EntityMotion) -> Vector<Real> {
        let influence = if self.allow_influence { 1.0 } else { 0.0 };
        let mut velocity =
            motion.right() * (motion.directional_influence.x * self.tuning.run_speed * influence);
        if self.is_jumping {
            velocity += motion.up() * self.tuning.jump_velocity;
        }
        velocity
    }

    fn multiply_velocity(&mut self, motion: &EntityMotion) -> Vector<Real> {
        let mut scale = Vector::repeat(1.0);
        if motion.is_grounded() && self.crouching {
            scale.x = CROUCH_SPEED_MULT;
        }
        scale
    }

    fn on_landing(&mut self, _motion: &EntityMotion) {
        self.restore_movement_options();
    }

    fn on_airborne(&mut self, _motion: &EntityMotion) {
        self.crouching = false;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PlayerFrame {
    pub position: Point<Real>,
    pub state: MotionState,
    pub report: TickReport,
    pub jumps: i32,
    pub crouching: bool,
    pub dashing: bool,
    pub swinging: bool,
}

/// Registers the pool ranged attacks draw from.
pub fn create_projectile_pool(pools: &mut PoolManager<Projectile>) -> Result<(), PoolError> {
    pools.create_pool(PROJECTILE_POOL, true, Projectile::energy_shot)
}

pub struct PlayerController<A: InputAdapter> {
    input: A,
    entity: EntityController,
    motion: PlayerMotion,
    swing: Hitbox,
}

impl<A: InputAdapter> PlayerController<A> {
    pub fn new(
        input: A,
        mut descriptor: EntityDescriptor,
        tuning: PlayerTuning,
        position: Point<Real>,
    ) -> Self {
        descriptor.faction = Faction::Player;
        let mut swing = Hitbox::melee_swing(tuning.swing_knockback, Vector::new(0.5, 0.4));
        swing.blacklist_faction(Faction::Player);
        Self {
            input,
            entity: EntityController::new(descriptor, position),
            motion: PlayerMotion::new(tuning),
            swing,
        }
    }

    pub fn entity(&self) -> &EntityController {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut EntityController {
        &mut self.entity
    }

    pub fn motion(&self) -> &PlayerMotion {
        &self.motion
    }

    pub fn swing(&self) -> &Hitbox {
        &self.swing
    }

    pub fn set_jumps(&mut self, jumps: i32) {
        self.motion.jumps = jumps;
    }

    pub fn tick<Q>(
        &mut self,
        world: &Q,
        raw: RawInput,
        shots: &mut PoolManager<Projectile>,
        dt: Real,
    ) -> PlayerFrame
    where
        Q: ObstacleQuery + ?Sized,
    {
        let intent = self.input.intent(raw);
        self.entity.motion_mut().directional_influence =
            Vector::new(intent.move_axis[0], intent.move_axis[1]);

        if intent.jump_pressed {
            self.initiate_jump();
        }
        if intent.jump_released {
            self.released_jump();
        }
        if intent.dash_pressed {
            self.initiate_dash();
        }
        if intent.melee_pressed {
            self.initiate_melee();
        }
        if intent.ranged_pressed {
            self.initiate_ranged(shots);
        }

        self.update_jump_state(dt);
        self.update_form();

        let report = self.entity.tick(world, &mut self.motion, dt);
        self.advance_timers(dt);
        if self.swing.is_active() {
            let center = self.swing_center(self.last_swing_placement());
            self.swing.set_center(center);
        }

        PlayerFrame {
            position: self.entity.position(),
            state: self.entity.state(),
            report,
            jumps: self.motion.jumps,
            crouching: self.motion.crouching,
            dashing: self.motion.is_dashing(),
            swinging: self.swing.is_active(),
        }
    }

    /// Applies the melee swing to overlapping entities.
    pub fn strike(&mut self, targets: &mut [EntityController]) -> Vec<usize> {
        self.swing.dispatch_overlap(targets)
    }

    /// Touching a pad cancels a dash, leaves one jump spent and launches the player.
    pub fn touch_force_pad(&mut self, pad: &mut ForcePad) -> bool {
        if !pad.touches(&self.entity) {
            pad.contact(PLAYER_CONTACT_KEY, &mut self.entity);
            return false;
        }
        if self.motion.dash.is_active() {
            self.interrupt_dash();
        }
        let launched = pad.contact(PLAYER_CONTACT_KEY, &mut self.entity);
        if launched {
            self.motion.jumps = self.motion.tuning.max_jumps - 1;
            // Drop the fall's gravity build-up so the push is not swallowed.
            self.entity.motion_mut().tally_air_time();
        }
        launched
    }

    /// Stops a dash early and converts it into momentum.
    pub fn interrupt_dash(&mut self) {
        self.motion.dash.cancel(CancelMode::NoEndAction);
        self.end_dash();
    }

    fn update_jump_state(&mut self, dt: Real) {
        let motion = self.entity.motion();
        if motion.state == MotionState::Air
            && !self.motion.is_jumping
            && !self.motion.coyote_spent
            && motion.sub_air_time >= COYOTE_TIME
        {
            self.motion.jumps -= 1;
            self.motion.coyote_spent = true;
        }

        if self.motion.is_jumping {
            if self.motion.jump_time_counter > 0.0 {
                self.motion.jump_time_counter -= dt;
            } else {
                self.motion.is_jumping = false;
                self.entity.motion_mut().tally_air_time();
            }
        }
    }

    fn update_form(&mut self) {
        let motion = self.entity.motion();
        if motion.is_grounded() && !self.motion.dash.is_active() {
            self.motion.crouching = motion.directional_influence.y < 0.0;
        }
        let form = if self.motion.crouching {
            CROUCH_FORM
        } else {
            STAND_FORM
        };
        // Failures are logged by the entity and leave the current form active.
        let _ = self.entity.change_form(form);
    }

    fn advance_timers(&mut self, dt: Real) {
        if self.motion.dash.advance(dt) == Some(TimerEvent::Ended) {
            self.end_dash();
        }
        if self.motion.melee.advance(dt) == Some(TimerEvent::Ended) {
            self.swing.deactivate();
        }
        self.motion.ranged.advance(dt);
    }

    fn initiate_jump(&mut self) {
        let motion = self.entity.motion();
        let coyote = !self.motion.coyote_spent && motion.air_time() < COYOTE_TIME;
        let can_jump = motion.is_grounded() || coyote || self.motion.jumps > 0;
        if !can_jump {
            return;
        }
        self.motion.is_jumping = true;
        self.motion.jump_time_counter = self.motion.tuning.jump_time;
        self.motion.crouching = false;
        self.motion.coyote_spent = true;
        self.motion.jumps -= 1;
        let motion = self.entity.motion_mut();
        motion.state = MotionState::Air;
        motion.tally_air_time();
    }

    fn released_jump(&mut self) {
        if !self.motion.is_jumping {
            return;
        }
        self.motion.is_jumping = false;
        let up = self.entity.motion().up();
        self.entity.apply_velocity(up, self.motion.tuning.release_impulse);
        self.entity.motion_mut().tally_air_time();
    }

    fn initiate_dash(&mut self) {
        if !self.motion.dash.is_ready() {
            return;
        }
        let motion = self.entity.motion();
        if !self.motion.tuning.can_air_dash && motion.state == MotionState::Air {
            return;
        }
        let influence = motion.directional_influence;
        let dash_dir = if influence == Vector::zeros()
            || (influence.y < 0.0 && motion.is_grounded())
        {
            motion.forward()
        } else {
            influence
        };
        self.motion.is_jumping = false;
        self.motion.allow_influence = false;
        self.motion.dash_dir = dash_dir;
        self.motion.dash.start();
    }

    fn end_dash(&mut self) {
        self.entity.motion_mut().external = self.motion.dash_dir * self.motion.tuning.dash_speed;
        self.motion.allow_influence = true;
        self.entity.motion_mut().tally_air_time();
    }

    fn initiate_melee(&mut self) {
        if !self.motion.melee.is_ready() {
            return;
        }
        let motion = self.entity.motion();
        let direction = if motion.directional_influence != Vector::zeros() {
            motion.directional_influence
        } else {
            motion.forward()
        };
        self.motion.last_swing_direction = direction;
        self.swing.aim(direction);
        let center = self.swing_center(self.last_swing_placement());
        self.swing.activate(center);
        self.motion.melee.start();
    }

    /// Swing direction, except a grounded downward swing goes forward instead.
    fn last_swing_placement(&self) -> Vector<Real> {
        let direction = self.motion.last_swing_direction;
        if self.entity.motion().is_grounded() && direction.y < 0.0 {
            self.entity.forward()
        } else {
            direction
        }
    }

    fn swing_center(&self, direction: Vector<Real>) -> Point<Real> {
        let origin = self
            .entity
            .bounds()
            .map_or(self.entity.position(), |bounds| bounds.center());
        let reach = direction
            .try_normalize(Real::EPSILON)
            .unwrap_or_else(|| self.entity.forward());
        origin + reach * self.motion.tuning.swing_reach
    }

    fn initiate_ranged(&mut self, shots: &mut PoolManager<Projectile>) {
        if self.motion.ranged.start().is_none() {
            return;
        }
        let handle = match shots.acquire(PROJECTILE_POOL) {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("ranged attack without a projectile: {err}");
                return;
            }
        };
        let forward = self.entity.forward();
        let origin = self
            .entity
            .bounds()
            .map_or(self.entity.position(), |bounds| bounds.center());
        if let Some(shot) = shots.get_mut(PROJECTILE_POOL, handle) {
            shot.launch(
                origin + forward * 0.5,
                forward * self.motion.tuning.projectile_speed,
                self.motion.tuning.projectile_lifetime,
                Faction::Player,
            );
        }
    }
}
