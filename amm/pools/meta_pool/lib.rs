//! Stable meta pools: a stable pool whose last coin is the LP token of another stable pool.
//!
//! Swaps between a meta coin and a base coin go through the base pool's single-sided
//! deposit or withdrawal. The base pool is passed in by the caller, either per call or bound
//! for the lifetime of a [`BoundMetaPool`].

mod base;
mod config;
mod pool;

pub use base::BasePoolKind;
pub use config::MetaStaticExtra;
pub use pool::{BoundMetaPool, MetaPool, NgMetaPool, PlainMetaPool};
