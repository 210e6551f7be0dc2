//! Three-coin Curve crypto pools (tricrypto-ng).
//!
//! Quotes solve the crypto invariant on price-scaled balances. Applying a trade also moves
//! the price oracle and, when the pool is profitable enough, the price scale.

mod config;
mod pool;
mod tweak_price;

pub use config::{TricryptoExtra, TricryptoStaticExtra};
pub use pool::{Exchange, TricryptoPool};
