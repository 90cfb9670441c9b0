//! Platformer entity motion: state machine, velocity composition and tuning.
#![forbid(unsafe_code)]

mod entity;
mod motion;
mod profile;
mod velocity;

pub use entity::{EntityController, EntityDescriptor, TickReport};
pub use motion::{EntityMotion, Faction, MotionState};
pub use profile::{MotorProfile, ProfileError};
pub use velocity::{compose_velocity, decay_external, gravity_vector, Inert, MotionController};
