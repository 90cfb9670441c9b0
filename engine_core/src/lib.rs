//! Fixed-step gameplay utilities: action timers and object pools.
#![forbid(unsafe_code)]

pub mod action_timer;
pub mod pool;
