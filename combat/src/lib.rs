//! Hitboxes, projectiles and force pads acting on entities.
#![forbid(unsafe_code)]

mod force_pad;
mod hitbox;
mod projectile;

pub use force_pad::ForcePad;
pub use hitbox::{HitEffect, HitOutcome, Hitbox};
pub use projectile::{advance_projectiles, Projectile, ProjectileEvent};
