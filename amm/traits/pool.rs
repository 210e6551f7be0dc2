use curve_helpers::ramp::Timestamp;
use primitive_types::U256;

use crate::PoolError;

/// Result of a swap quote. `fee` is denominated in the output token.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub amount: U256,
    pub fee: U256,
    /// Admin share of `fee`, retained by the pool on apply.
    pub admin_fee: U256,
    /// Fee the base pool charges on the underlying coin of a meta pool route, in that coin.
    /// Zero for swaps that stay within one pool.
    pub base_fee: U256,
    pub gas: u64,
}

/// A swap chosen by the router, to be applied to the pool state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub token_in: String,
    pub amount_in: U256,
    pub token_out: String,
}

impl Trade {
    pub fn new(token_in: impl Into<String>, amount_in: U256, token_out: impl Into<String>) -> Self {
        Self {
            token_in: token_in.into(),
            amount_in,
            token_out: token_out.into(),
        }
    }
}

/// Quote API consumed by the router.
///
/// Quoting never mutates the pool and may run concurrently. `apply` is the single writer and
/// must be serialized by the caller.
pub trait Pool {
    fn address(&self) -> &str;

    /// Lowercased token addresses in pool order.
    fn tokens(&self) -> &[String];

    fn token_index(&self, token: &str) -> Result<usize, PoolError> {
        let token = token.to_lowercase();
        self.tokens()
            .iter()
            .position(|t| *t == token)
            .ok_or(PoolError::UnknownToken(token))
    }

    /// Returns the amount of `token_out` received for `amount_in` of `token_in`.
    fn quote_out(
        &self,
        token_in: &str,
        amount_in: U256,
        token_out: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError>;

    /// Returns the amount of `token_in` required to receive `amount_out` of `token_out`.
    fn quote_in(
        &self,
        token_out: &str,
        amount_out: U256,
        token_in: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError>;

    /// Executes `trade` against the pool state. On error the state is left untouched.
    fn apply(&mut self, trade: &Trade, now: Timestamp) -> Result<Quote, PoolError>;
}

/// Resolves a pair of distinct tokens to their indices.
pub fn pair_indices<P: Pool + ?Sized>(
    pool: &P,
    token_a: &str,
    token_b: &str,
) -> Result<(usize, usize), PoolError> {
    let i = pool.token_index(token_a)?;
    let j = pool.token_index(token_b)?;
    if i == j {
        return Err(PoolError::IdenticalTokens);
    }
    Ok((i, j))
}
