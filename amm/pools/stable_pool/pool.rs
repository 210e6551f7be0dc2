use core::marker::PhantomData;

use curve_helpers::{
    constants::{stable_pool::EXCHANGE_GAS, MAX_TOKENS},
    ensure,
    ramp::{AmplificationCoefficient, Timestamp},
    stable_swap_math::{
        self as math,
        fees::Fees,
        liquidity::{self, LiquidityQuote},
        StableCurve, SwapResult,
    },
    InvariantError, MathError,
};
use curve_traits::{
    pair_indices, snapshot::default_rate, BasePool, Pool, PoolError, PoolSnapshot, Quote, Trade,
};
use primitive_types::U256;

use crate::{
    config::StableExtra,
    kind::{NextGen, Plain, StableKind},
};

pub type PlainPool = StableSwapPool<Plain>;
pub type NgPool = StableSwapPool<NextGen>;

/// State of a stable pool. `K` picks the invariant flavour and the fee policy.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct StableSwapPool<K> {
    address: String,
    /// Lowercased token addresses.
    tokens: Vec<String>,
    reserves: Vec<U256>,
    /// Rates bringing each balance to 18 decimals, with 36 decimals of precision
    /// after multiplying by the balance.
    rates: Vec<U256>,
    lp_supply: U256,
    amp: AmplificationCoefficient,
    a_precision: U256,
    fees: Fees,
    kind: PhantomData<K>,
}

impl<K: StableKind> StableSwapPool<K> {
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        Self::from_snapshot(&PoolSnapshot::from_json(json)?)
    }

    /// Builds the pool from a snapshot whose reserves hold one balance per token
    /// followed by the LP supply.
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<Self, PoolError> {
        snapshot.check_shape(2, MAX_TOKENS, 1)?;
        let extra: StableExtra = snapshot.parse_extra()?;
        let (a_precision, offpeg_fee_multiplier) = K::static_config(snapshot)?;
        ensure!(
            !a_precision.is_zero(),
            PoolError::InvalidConfig("APrecision must be positive".to_string())
        );

        let n = snapshot.tokens.len();
        let rates = match extra.rate_multipliers.clone() {
            Some(rates) => rates,
            None => snapshot
                .tokens
                .iter()
                .map(|token| default_rate(token.decimals))
                .collect::<Result<_, _>>()?,
        };
        ensure!(
            rates.len() == n,
            PoolError::InvalidConfig(format!("expected {n} rate multipliers, got {}", rates.len()))
        );
        if let Some(i) = rates.iter().position(U256::is_zero) {
            return Err(PoolError::ZeroRate(i));
        }

        let pool = Self {
            address: snapshot.address.to_lowercase(),
            tokens: snapshot.token_addresses(),
            reserves: snapshot.reserves[..n].to_vec(),
            rates,
            lp_supply: snapshot.reserves[n],
            amp: extra.amp()?,
            a_precision,
            fees: Fees::new(extra.swap_fee, extra.admin_fee)
                .with_offpeg_fee_multiplier(offpeg_fee_multiplier),
            kind: PhantomData,
        };
        log::debug!(
            "loaded {} pool {} with {} tokens",
            K::NAME,
            pool.address,
            n
        );
        Ok(pool)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Lowercased token addresses in pool order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn reserves(&self) -> &[U256] {
        &self.reserves
    }

    pub fn lp_supply(&self) -> U256 {
        self.lp_supply
    }

    pub fn rates(&self) -> &[U256] {
        &self.rates
    }

    pub fn fees(&self) -> &Fees {
        &self.fees
    }

    /// Sets the rate of coin `i`. Meta pools use it to track the base pool's virtual price.
    pub fn set_rate(&mut self, i: usize, rate: U256) -> Result<(), PoolError> {
        self.check_index(i)?;
        ensure!(!rate.is_zero(), PoolError::ZeroRate(i));
        self.rates[i] = rate;
        Ok(())
    }

    /// Curve parameters with A resolved at `now`.
    pub fn curve(&self, now: Timestamp) -> Result<StableCurve, PoolError> {
        Ok(StableCurve {
            amp: self.amp.compute(now)?.into(),
            a_precision: self.a_precision,
            variant: K::VARIANT,
        })
    }

    /// The invariant of the current balances.
    pub fn invariant(&self, now: Timestamp) -> Result<U256, PoolError> {
        let xp = math::normalize(&self.rates, &self.reserves)?;
        Ok(math::compute_d(&xp[..self.reserves.len()], &self.curve(now)?)?)
    }

    fn check_index(&self, i: usize) -> Result<(), PoolError> {
        ensure!(i < self.tokens.len(), PoolError::IndexOutOfRange(i));
        Ok(())
    }

    fn check_pair(&self, i: usize, j: usize, amount: U256) -> Result<(), PoolError> {
        self.check_index(i)?;
        self.check_index(j)?;
        ensure!(i != j, PoolError::IdenticalTokens);
        ensure!(!amount.is_zero(), PoolError::ZeroAmount);
        Ok(())
    }

    /// Amount of coin `j` received for `dx` of coin `i`.
    ///
    /// `d` may carry an invariant the caller already solved for the current balances.
    pub fn get_dy(
        &self,
        i: usize,
        j: usize,
        dx: U256,
        d: Option<U256>,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError> {
        self.check_pair(i, j, dx)?;
        Ok(math::swap_to(
            i,
            dx,
            j,
            &self.rates,
            &self.reserves,
            &self.fees,
            &self.curve(now)?,
            d,
        )?)
    }

    /// Amount of coin `i` required to receive `dy` of coin `j`. The fee is in coin `j`.
    pub fn get_dx(
        &self,
        i: usize,
        j: usize,
        dy: U256,
        d: Option<U256>,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError> {
        self.check_pair(i, j, dy)?;
        Ok(math::swap_from(
            j,
            dy,
            i,
            &self.rates,
            &self.reserves,
            &self.fees,
            &self.curve(now)?,
            d,
        )?)
    }

    /// Swaps `dx` of coin `i` for coin `j`. The admin share of the fee leaves the pool
    /// together with the payout.
    pub fn exchange(
        &mut self,
        i: usize,
        j: usize,
        dx: U256,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError> {
        let result = self.get_dy(i, j, dx, None, now)?;
        let reserve_in = self.reserves[i]
            .checked_add(dx)
            .ok_or(MathError::AddOverflow(234))?;
        let reserve_out = self.reserves[j]
            .checked_sub(result.amount)
            .and_then(|reserve| reserve.checked_sub(result.admin_fee))
            .ok_or(MathError::SubUnderflow(234))?;
        self.reserves[i] = reserve_in;
        self.reserves[j] = reserve_out;
        log::trace!(
            "{}: exchanged {dx} of coin {i} for {} of coin {j}",
            self.address,
            result.amount
        );
        Ok(result)
    }

    fn quote_from(result: SwapResult) -> Quote {
        Quote {
            amount: result.amount,
            fee: result.fee,
            admin_fee: result.admin_fee,
            base_fee: U256::zero(),
            gas: EXCHANGE_GAS,
        }
    }
}

impl<K: StableKind> Pool for StableSwapPool<K> {
    fn address(&self) -> &str {
        &self.address
    }

    fn tokens(&self) -> &[String] {
        &self.tokens
    }

    fn quote_out(
        &self,
        token_in: &str,
        amount_in: U256,
        token_out: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        let (i, j) = pair_indices(self, token_in, token_out)?;
        self.get_dy(i, j, amount_in, None, now)
            .map(Self::quote_from)
    }

    fn quote_in(
        &self,
        token_out: &str,
        amount_out: U256,
        token_in: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        let (j, i) = pair_indices(self, token_out, token_in)?;
        self.get_dx(i, j, amount_out, None, now)
            .map(Self::quote_from)
    }

    fn apply(&mut self, trade: &Trade, now: Timestamp) -> Result<Quote, PoolError> {
        let (i, j) = pair_indices(self, &trade.token_in, &trade.token_out)?;
        self.exchange(i, j, trade.amount_in, now)
            .map(Self::quote_from)
            .map_err(|err| {
                log::warn!("{}: rejected trade {trade:?}: {err}", self.address);
                err
            })
    }
}

impl<K: StableKind> BasePool for StableSwapPool<K> {
    fn address(&self) -> &str {
        &self.address
    }

    fn tokens(&self) -> &[String] {
        &self.tokens
    }

    fn balances(&self) -> &[U256] {
        &self.reserves
    }

    fn lp_supply(&self) -> U256 {
        self.lp_supply
    }

    fn virtual_price(&self, now: Timestamp) -> Result<(U256, U256), PoolError> {
        ensure!(!self.lp_supply.is_zero(), PoolError::EmptySupply);
        Ok(liquidity::compute_virtual_price(
            &self.rates,
            &self.reserves,
            self.lp_supply,
            &self.curve(now)?,
        )?)
    }

    fn calc_token_amount(
        &self,
        amounts: &[U256],
        is_deposit: bool,
        now: Timestamp,
    ) -> Result<LiquidityQuote, PoolError> {
        ensure!(
            amounts.len() == self.tokens.len(),
            PoolError::ReserveCountMismatch {
                expected: self.tokens.len(),
                actual: amounts.len()
            }
        );
        ensure!(
            is_deposit || !self.lp_supply.is_zero(),
            PoolError::EmptySupply
        );
        Ok(liquidity::compute_lp_amount(
            amounts,
            is_deposit,
            &self.rates,
            &self.reserves,
            self.lp_supply,
            &self.fees,
            &self.curve(now)?,
        )?)
    }

    fn calc_withdraw_one_coin(
        &self,
        lp_amount: U256,
        i: usize,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError> {
        self.check_index(i)?;
        ensure!(!lp_amount.is_zero(), PoolError::ZeroAmount);
        ensure!(!self.lp_supply.is_zero(), PoolError::EmptySupply);
        ensure!(
            lp_amount < self.lp_supply,
            PoolError::Invariant(InvariantError::ReserveTooSmall)
        );
        Ok(liquidity::compute_withdraw_one_coin(
            lp_amount,
            i,
            &self.rates,
            &self.reserves,
            self.lp_supply,
            &self.fees,
            &self.curve(now)?,
        )?)
    }

    fn add_liquidity(
        &mut self,
        amounts: &[U256],
        now: Timestamp,
    ) -> Result<LiquidityQuote, PoolError> {
        let quote = self.calc_token_amount(amounts, true, now)?;
        let mut reserves = self.reserves.clone();
        for (i, reserve) in reserves.iter_mut().enumerate() {
            *reserve = reserve
                .checked_add(amounts[i])
                .ok_or(MathError::AddOverflow(235))?
                .checked_sub(quote.admin_fees[i])
                .ok_or(MathError::SubUnderflow(235))?;
        }
        self.lp_supply = self
            .lp_supply
            .checked_add(quote.lp_amount)
            .ok_or(MathError::AddOverflow(236))?;
        self.reserves = reserves;
        log::trace!(
            "{}: added liquidity {amounts:?} for {} LP",
            self.address,
            quote.lp_amount
        );
        Ok(quote)
    }

    fn remove_liquidity_one_coin(
        &mut self,
        lp_amount: U256,
        i: usize,
        now: Timestamp,
    ) -> Result<SwapResult, PoolError> {
        let result = self.calc_withdraw_one_coin(lp_amount, i, now)?;
        self.reserves[i] = self.reserves[i]
            .checked_sub(result.amount)
            .and_then(|reserve| reserve.checked_sub(result.admin_fee))
            .ok_or(MathError::SubUnderflow(236))?;
        // lp_amount < lp_supply was checked by the quote
        self.lp_supply -= lp_amount;
        log::trace!(
            "{}: removed {lp_amount} LP for {} of coin {i}",
            self.address,
            result.amount
        );
        Ok(result)
    }
}
