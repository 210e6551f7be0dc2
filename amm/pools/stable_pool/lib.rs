//! Plain and stable-ng Curve pools.
//!
//! Both kinds share one state type, [`StableSwapPool`], and differ in the D product term,
//! the fee policy and the inverse quote.

mod config;
mod kind;
mod pool;

pub use config::{NgStaticExtra, PlainStaticExtra, StableExtra};
pub use kind::{NextGen, Plain, StableKind};
pub use pool::{NgPool, PlainPool, StableSwapPool};
