use rapier2d::math::Vector;
use rapier2d::prelude::Real;

use crate::motion::EntityMotion;
use crate::profile::MotorProfile;

/// Velocity contributions and state hooks supplied by whatever drives an entity.
pub trait MotionController {
    /// A non-zero value replaces every other contribution for the tick.
    fn override_velocity(&mut self, _motion: &EntityMotion) -> Vector<Real> {
        Vector::zeros()
    }

    fn additive_velocity(&mut self, _motion: &EntityMotion) -> Vector<Real> {
        Vector::zeros()
    }

    /// Component-wise scale applied last.
    fn multiply_velocity(&mut self, _motion: &EntityMotion) -> Vector<Real> {
        Vector::repeat(1.0)
    }

    fn on_landing(&mut self, _motion: &EntityMotion) {}

    /// Called on every airborne tick, including the one that leaves the ground.
    fn on_airborne(&mut self, _motion: &EntityMotion) {}
}

/// Controller with no contributions: the entity only falls and drifts.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inert;

impl MotionController for Inert {}

pub fn gravity_vector(up: Vector<Real>, sub_air_time: Real, profile: &MotorProfile) -> Vector<Real> {
    let speed = sub_air_time * profile.gravity_coefficient;
    let speed = if profile.max_fall_speed < 0.0 {
        speed
    } else {
        speed.min(profile.max_fall_speed)
    };
    -up * speed
}

pub fn compose_velocity<C>(
    controller: &mut C,
    motion: &EntityMotion,
    profile: &MotorProfile,
) -> Vector<Real>
where
    C: MotionController + ?Sized,
{
    let overridden = controller.override_velocity(motion);
    if overridden != Vector::zeros() {
        return overridden;
    }
    let mut velocity = controller.additive_velocity(motion);
    if profile.gravity_enabled {
        velocity += gravity_vector(motion.up(), motion.sub_air_time, profile);
    }
    velocity += motion.external;
    if let Some(incline) = motion.incline {
        velocity = incline * velocity.norm();
    }
    velocity.component_mul(&controller.multiply_velocity(motion))
}

pub fn decay_external(external: Vector<Real>, damping: Real, cutoff: Real) -> Vector<Real> {
    let mut decayed = external.lerp(&Vector::zeros(), damping);
    for component in decayed.iter_mut() {
        if component.abs() < cutoff {
            *component = 0.0;
        }
    }
    decayed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        over: Vector<Real>,
        add: Vector<Real>,
        mult: Vector<Real>,
    }

    impl MotionController for Fixed {
        fn override_velocity(&mut self, _motion: &EntityMotion) -> Vector<Real> {
            self.over
        }

        fn additive_velocity(&mut self, _motion: &EntityMotion) -> Vector<Real> {
            self.add
        }

        fn multiply_velocity(&mut self, _motion: &EntityMotion) -> Vector<Real> {
            self.mult
        }
    }

    fn no_gravity() -> MotorProfile {
        MotorProfile {
            gravity_enabled: false,
            ..MotorProfile::platformer_default()
        }
    }

    #[test]
    fn override_short_circuits() {
        let mut controller = Fixed {
            over: Vector::new(7.0, 0.0),
            add: Vector::new(1.0, 1.0),
            mult: Vector::new(0.0, 0.0),
        };
        let mut motion = EntityMotion::new();
        motion.external = Vector::new(3.0, 3.0);
        let velocity = compose_velocity(&mut controller, &motion, &no_gravity());
        assert_eq!(velocity, Vector::new(7.0, 0.0));
    }

    #[test]
    fn contributions_sum_then_scale() {
        let mut controller = Fixed {
            over: Vector::zeros(),
            add: Vector::new(2.0, 1.0),
            mult: Vector::new(0.5, 1.0),
        };
        let mut motion = EntityMotion::new();
        motion.external = Vector::new(2.0, 0.0);
        motion.sub_air_time = 0.5;
        let profile = MotorProfile {
            gravity_coefficient: 4.0,
            max_fall_speed: 10.0,
            ..MotorProfile::platformer_default()
        };
        let velocity = compose_velocity(&mut controller, &motion, &profile);
        assert_eq!(velocity, Vector::new(2.0, -1.0));
    }

    #[test]
    fn incline_keeps_speed_not_direction() {
        let mut controller = Fixed {
            over: Vector::zeros(),
            add: Vector::new(3.0, 4.0),
            mult: Vector::repeat(1.0),
        };
        let mut motion = EntityMotion::new();
        motion.set_incline(Some(Vector::new(0.0, -2.0)));
        let velocity = compose_velocity(&mut controller, &motion, &no_gravity());
        assert!((velocity - Vector::new(0.0, -5.0)).norm() < 1.0e-5);
    }

    #[test]
    fn gravity_is_capped_unless_negative() {
        let up = Vector::y();
        let mut profile = MotorProfile {
            gravity_coefficient: 10.0,
            max_fall_speed: 5.0,
            ..MotorProfile::platformer_default()
        };
        assert_eq!(gravity_vector(up, 2.0, &profile), Vector::new(0.0, -5.0));
        profile.max_fall_speed = -1.0;
        assert_eq!(gravity_vector(up, 2.0, &profile), Vector::new(0.0, -20.0));
        let sideways = gravity_vector(Vector::x(), 0.25, &profile);
        assert_eq!(sideways, Vector::new(-2.5, 0.0));
    }

    #[test]
    fn external_velocity_decays_monotonically_to_zero() {
        let mut external = Vector::new(12.0, -7.0);
        let mut previous = external.norm();
        let mut ticks = 0;
        while external != Vector::zeros() {
            external = decay_external(external, 0.1, 0.05);
            let magnitude = external.norm();
            assert!(magnitude <= previous);
            previous = magnitude;
            ticks += 1;
            assert!(ticks < 200, "decay never settled");
        }
        assert_eq!(external, Vector::zeros());
    }

    #[test]
    fn components_below_cutoff_snap_independently() {
        let decayed = decay_external(Vector::new(4.0, 0.04), 0.0, 0.05);
        assert_eq!(decayed, Vector::new(4.0, 0.0));
    }
}
