use rapier2d::prelude::Real;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("motor profile parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("motor profile field `{field}` {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Physics parameters of one entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorProfile {
    pub gravity_enabled: bool,
    /// Fall speed gained per second of air time.
    pub gravity_coefficient: Real,
    /// Cap on gravity speed. Negative means uncapped.
    pub max_fall_speed: Real,
    /// Fraction of external velocity removed per tick, in `[0, 1]`.
    pub inertial_damping: Real,
    /// External velocity components below this snap to zero.
    pub damping_cutoff: Real,
    /// Steepest surface, in degrees from up, that still counts as ground.
    pub max_climb_angle_deg: Real,
    /// Impulses weaker than this are ignored.
    pub knockback_resistance: Real,
    pub ray_precision_base: usize,
    pub ray_precision_height: usize,
}

impl Default for MotorProfile {
    fn default() -> Self {
        Self::platformer_default()
    }
}

impl MotorProfile {
    pub fn platformer_default() -> Self {
        Self {
            gravity_enabled: true,
            gravity_coefficient: 60.0,
            max_fall_speed: 20.0,
            inertial_damping: 0.1,
            damping_cutoff: 0.05,
            max_climb_angle_deg: 55.0,
            knockback_resistance: 0.0,
            ray_precision_base: 3,
            ray_precision_height: 3,
        }
    }

    pub fn parse_toml(text: &str) -> Result<Self, ProfileError> {
        let profile: Self = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if !self.gravity_coefficient.is_finite() || self.gravity_coefficient < 0.0 {
            return Err(ProfileError::Invalid {
                field: "gravity_coefficient",
                reason: "must be finite and non-negative",
            });
        }
        if !self.max_fall_speed.is_finite() {
            return Err(ProfileError::Invalid {
                field: "max_fall_speed",
                reason: "must be finite",
            });
        }
        if !(0.0..=1.0).contains(&self.inertial_damping) {
            return Err(ProfileError::Invalid {
                field: "inertial_damping",
                reason: "must be within [0, 1]",
            });
        }
        if !self.damping_cutoff.is_finite() || self.damping_cutoff < 0.0 {
            return Err(ProfileError::Invalid {
                field: "damping_cutoff",
                reason: "must be finite and non-negative",
            });
        }
        if !(self.max_climb_angle_deg > 0.0 && self.max_climb_angle_deg <= 180.0) {
            return Err(ProfileError::Invalid {
                field: "max_climb_angle_deg",
                reason: "must be within (0, 180]",
            });
        }
        if !self.knockback_resistance.is_finite() || self.knockback_resistance < 0.0 {
            return Err(ProfileError::Invalid {
                field: "knockback_resistance",
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_profile_keeps_defaults() {
        let profile = MotorProfile::parse_toml(
            r#"
gravity_coefficient = 45.0
max_fall_speed = -1.0
"#,
        )
        .expect("profile");
        assert_eq!(profile.gravity_coefficient, 45.0);
        assert_eq!(profile.max_fall_speed, -1.0);
        assert_eq!(
            profile.max_climb_angle_deg,
            MotorProfile::platformer_default().max_climb_angle_deg
        );
    }

    #[test]
    fn damping_outside_unit_range_is_refused() {
        let err = MotorProfile::parse_toml("inertial_damping = 1.5").expect_err("invalid");
        assert!(matches!(
            err,
            ProfileError::Invalid {
                field: "inertial_damping",
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let err = MotorProfile::parse_toml("gravity_enabled = maybe").expect_err("parse");
        assert!(matches!(err, ProfileError::Parse(_)));
    }
}
