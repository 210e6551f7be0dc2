use curve_helpers::{
    ramp::Timestamp,
    stable_swap_math::{liquidity::LiquidityQuote, SwapResult},
};
use primitive_types::U256;

use crate::PoolError;

/// Capabilities a pool needs to back a meta pool's LP slot.
pub trait BasePool {
    fn address(&self) -> &str;

    /// Lowercased token addresses in pool order.
    fn tokens(&self) -> &[String];

    fn token_index(&self, token: &str) -> Option<usize> {
        let token = token.to_lowercase();
        self.tokens().iter().position(|t| *t == token)
    }

    fn balances(&self) -> &[U256];

    fn lp_supply(&self) -> U256;

    /// Returns `(virtual_price, D)`.
    fn virtual_price(&self, now: Timestamp) -> Result<(U256, U256), PoolError>;

    /// Quotes the LP minted (or burned) for depositing (or withdrawing) `amounts`.
    fn calc_token_amount(
        &self,
        amounts: &[U256],
        is_deposit: bool,
        now: Timestamp,
    ) -> Result<LiquidityQuote, PoolError>;

    /// Quotes the payout in coin `i` for burning `lp_amount`.
    fn calc_withdraw_one_coin(
        &self,
        lp_amount: U256,
        i: usize,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError>;

    /// Deposits `amounts` and returns the minted LP amount with the fees charged.
    fn add_liquidity(
        &mut self,
        amounts: &[U256],
        now: Timestamp,
    ) -> Result<LiquidityQuote, PoolError>;

    /// Burns `lp_amount` for coin `i` and returns the payout with the fee charged.
    fn remove_liquidity_one_coin(
        &mut self,
        lp_amount: U256,
        i: usize,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError>;
}
