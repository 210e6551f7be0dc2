use curve_helpers::{
    ramp::Timestamp,
    stable_swap_math::{liquidity::LiquidityQuote, SwapResult},
};
use curve_traits::{BasePool, Pool, PoolError, PoolSnapshot, Quote, Trade};
use primitive_types::U256;
use stable_pool::{NextGen, NgPool, Plain, PlainPool, StableKind};

/// The stable pools a meta pool can sit on.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum BasePoolKind {
    Plain(PlainPool),
    Ng(NgPool),
}

macro_rules! dispatch {
    ($self:ident, $pool:ident => $body:expr) => {
        match $self {
            BasePoolKind::Plain($pool) => $body,
            BasePoolKind::Ng($pool) => $body,
        }
    };
}

impl BasePoolKind {
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        Self::from_snapshot(&PoolSnapshot::from_json(json)?)
    }

    /// Picks the pool kind from the snapshot's `exchange` field.
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<Self, PoolError> {
        match snapshot.exchange.as_str() {
            kind if kind == Plain::NAME => Ok(Self::Plain(PlainPool::from_snapshot(snapshot)?)),
            kind if kind == NextGen::NAME => Ok(Self::Ng(NgPool::from_snapshot(snapshot)?)),
            other => Err(PoolError::InvalidConfig(format!(
                "{other:?} cannot serve as a base pool"
            ))),
        }
    }
}

impl From<PlainPool> for BasePoolKind {
    fn from(pool: PlainPool) -> Self {
        Self::Plain(pool)
    }
}

impl From<NgPool> for BasePoolKind {
    fn from(pool: NgPool) -> Self {
        Self::Ng(pool)
    }
}

impl BasePool for BasePoolKind {
    fn address(&self) -> &str {
        dispatch!(self, pool => pool.address())
    }

    fn tokens(&self) -> &[String] {
        dispatch!(self, pool => pool.tokens())
    }

    fn balances(&self) -> &[U256] {
        dispatch!(self, pool => pool.reserves())
    }

    fn lp_supply(&self) -> U256 {
        dispatch!(self, pool => pool.lp_supply())
    }

    fn virtual_price(&self, now: Timestamp) -> Result<(U256, U256), PoolError> {
        dispatch!(self, pool => BasePool::virtual_price(pool, now))
    }

    fn calc_token_amount(
        &self,
        amounts: &[U256],
        is_deposit: bool,
        now: Timestamp,
    ) -> Result<LiquidityQuote, PoolError> {
        dispatch!(self, pool => pool.calc_token_amount(amounts, is_deposit, now))
    }

    fn calc_withdraw_one_coin(
        &self,
        lp_amount: U256,
        i: usize,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError> {
        dispatch!(self, pool => pool.calc_withdraw_one_coin(lp_amount, i, now))
    }

    fn add_liquidity(
        &mut self,
        amounts: &[U256],
        now: Timestamp,
    ) -> Result<LiquidityQuote, PoolError> {
        dispatch!(self, pool => pool.add_liquidity(amounts, now))
    }

    fn remove_liquidity_one_coin(
        &mut self,
        lp_amount: U256,
        i: usize,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError> {
        dispatch!(self, pool => pool.remove_liquidity_one_coin(lp_amount, i, now))
    }
}

/// Base pools stay tradable on their own.
impl Pool for BasePoolKind {
    fn address(&self) -> &str {
        dispatch!(self, pool => pool.address())
    }

    fn tokens(&self) -> &[String] {
        dispatch!(self, pool => pool.tokens())
    }

    fn quote_out(
        &self,
        token_in: &str,
        amount_in: U256,
        token_out: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        dispatch!(self, pool => pool.quote_out(token_in, amount_in, token_out, now))
    }

    fn quote_in(
        &self,
        token_out: &str,
        amount_out: U256,
        token_in: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        dispatch!(self, pool => pool.quote_in(token_out, amount_out, token_in, now))
    }

    fn apply(&mut self, trade: &Trade, now: Timestamp) -> Result<Quote, PoolError> {
        dispatch!(self, pool => pool.apply(trade, now))
    }
}
