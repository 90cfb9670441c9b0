use rapier2d::math::Vector;
use rapier2d::prelude::Real;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MotionState {
    Grounded,
    #[default]
    Air,
    /// Reserved; carries no behavior.
    Clutch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    #[default]
    Neutral,
    Player,
    Enemies,
}

/// Per-entity motion record read by controllers.
#[derive(Clone, Debug)]
pub struct EntityMotion {
    pub state: MotionState,
    /// Velocity composed for the current tick.
    pub velocity: Vector<Real>,
    /// Knockback and launch impulses, decayed every tick.
    pub external: Vector<Real>,
    /// Unit direction the speed is re-projected onto, if any.
    pub incline: Option<Vector<Real>>,
    pub facing_right: bool,
    pub directional_influence: Vector<Real>,
    pub sub_air_time: Real,
    pub total_air_time: Real,
    up: Vector<Real>,
}

impl Default for EntityMotion {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityMotion {
    pub fn new() -> Self {
        Self {
            state: MotionState::Air,
            velocity: Vector::zeros(),
            external: Vector::zeros(),
            incline: None,
            facing_right: true,
            directional_influence: Vector::zeros(),
            sub_air_time: 0.0,
            total_air_time: 0.0,
            up: Vector::y(),
        }
    }

    pub fn is_grounded(&self) -> bool {
        self.state == MotionState::Grounded
    }

    pub fn up(&self) -> Vector<Real> {
        self.up
    }

    /// `up` rotated a quarter turn clockwise.
    pub fn right(&self) -> Vector<Real> {
        Vector::new(self.up.y, -self.up.x)
    }

    pub fn forward(&self) -> Vector<Real> {
        if self.facing_right {
            self.right()
        } else {
            -self.right()
        }
    }

    /// Sets the up direction. Zero or non-finite vectors are ignored.
    pub fn set_up(&mut self, up: Vector<Real>) -> bool {
        let length = up.norm();
        if !length.is_finite() || length <= 0.0 {
            log::warn!("ignoring degenerate up vector {up:?}");
            return false;
        }
        self.up = up / length;
        true
    }

    pub fn set_incline(&mut self, incline: Option<Vector<Real>>) {
        self.incline = incline
            .filter(|direction| direction.norm_squared() > 0.0)
            .map(|direction| direction.normalize());
    }

    pub fn update_facing(&mut self) {
        if self.directional_influence.x > 0.0 {
            self.facing_right = true;
        } else if self.directional_influence.x < 0.0 {
            self.facing_right = false;
        }
    }

    /// Folds the current air time into the total and restarts gravity build-up.
    pub fn tally_air_time(&mut self) {
        self.total_air_time += self.sub_air_time;
        self.sub_air_time = 0.0;
    }

    pub fn reset_air_time(&mut self) {
        self.sub_air_time = 0.0;
        self.total_air_time = 0.0;
    }

    pub fn air_time(&self) -> Real {
        self.total_air_time + self.sub_air_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_follows_horizontal_influence() {
        let mut motion = EntityMotion::new();
        motion.directional_influence = Vector::new(-1.0, 0.0);
        motion.update_facing();
        assert!(!motion.facing_right);
        assert_eq!(motion.forward(), Vector::new(-1.0, 0.0));

        motion.directional_influence = Vector::new(0.0, 1.0);
        motion.update_facing();
        assert!(!motion.facing_right);
    }

    #[test]
    fn right_is_derived_from_up() {
        let mut motion = EntityMotion::new();
        assert_eq!(motion.right(), Vector::new(1.0, 0.0));
        assert!(motion.set_up(Vector::new(-2.0, 0.0)));
        assert_eq!(motion.right(), Vector::new(0.0, 1.0));
        assert!(!motion.set_up(Vector::zeros()));
        assert_eq!(motion.up(), Vector::new(-1.0, 0.0));
    }

    #[test]
    fn air_time_tally_and_reset() {
        let mut motion = EntityMotion::new();
        motion.sub_air_time = 0.25;
        motion.tally_air_time();
        assert_eq!(motion.sub_air_time, 0.0);
        assert_eq!(motion.total_air_time, 0.25);
        motion.sub_air_time = 0.5;
        assert_eq!(motion.air_time(), 0.75);
        motion.reset_air_time();
        assert_eq!(motion.air_time(), 0.0);
    }
}
