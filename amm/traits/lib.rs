mod base_pool;
mod error;
mod pool;
pub mod snapshot;

pub use base_pool::BasePool;
pub use curve_helpers::{ramp::Timestamp, InvariantError, MathError};
pub use error::PoolError;
pub use pool::{pair_indices, Pool, Quote, Trade};
pub use snapshot::{PoolSnapshot, TokenInfo};
