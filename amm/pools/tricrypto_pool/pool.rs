use curve_helpers::{
    constants::{
        crypto_pool::{EXCHANGE_GAS, GET_DX_ROUNDS, N_COINS},
        FEE_DENOMINATOR,
    },
    crypto_math::{self, fees::CryptoFees, Xp},
    ensure,
    math::{mul_div, precision},
    ramp::{AGammaRamp, Timestamp},
    InvariantError, MathError,
};
use curve_traits::{pair_indices, Pool, PoolError, PoolSnapshot, Quote, Trade};
use primitive_types::U256;

use crate::config::{TricryptoExtra, TricryptoStaticExtra};

/// Outcome of a forward quote.
///
/// `xp` holds the post-trade balances in price-scaled units and `k0` the K0 left by the
/// solver. Both seed [`TricryptoPool::tweak_price`] when the trade is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub dy: U256,
    pub fee: U256,
    pub xp: Xp,
    pub k0: U256,
}

/// State of a three-coin crypto pool.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct TricryptoPool {
    pub(crate) address: String,
    pub(crate) tokens: Vec<String>,
    pub(crate) reserves: Xp,
    /// `10^(18 - decimals)` per coin.
    pub(crate) precisions: Xp,
    pub(crate) ramp: AGammaRamp,
    pub(crate) fees: CryptoFees,

    pub(crate) d: U256,
    /// Prices of coins 1 and 2 in coin 0, 18 decimals.
    pub(crate) price_scale: [U256; 2],
    pub(crate) price_oracle: [U256; 2],
    pub(crate) last_prices: [U256; 2],
    pub(crate) last_prices_timestamp: Timestamp,

    pub(crate) lp_supply: U256,
    pub(crate) xcp_profit: U256,
    pub(crate) virtual_price: U256,
    pub(crate) allowed_extra_profit: U256,
    pub(crate) adjustment_step: U256,
    pub(crate) ma_time: U256,
}

impl TricryptoPool {
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        Self::from_snapshot(&PoolSnapshot::from_json(json)?)
    }

    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<Self, PoolError> {
        snapshot.check_shape(N_COINS, N_COINS, 0)?;
        let extra: TricryptoExtra = snapshot.parse_extra()?;
        if !snapshot.static_extra.is_empty() {
            let static_extra: TricryptoStaticExtra = snapshot.parse_static_extra()?;
            ensure!(
                static_extra.is_native_coins.is_empty()
                    || static_extra.is_native_coins.len() == N_COINS,
                PoolError::InvalidConfig(format!(
                    "expected {N_COINS} native coin flags, got {}",
                    static_extra.is_native_coins.len()
                ))
            );
        }
        ensure!(
            !extra.ma_time.is_zero(),
            PoolError::InvalidConfig("MaTime must be positive".to_string())
        );

        let mut precisions = [U256::zero(); N_COINS];
        for (precision, token) in precisions.iter_mut().zip(&snapshot.tokens) {
            ensure!(
                token.decimals <= 18,
                PoolError::InvalidConfig(format!(
                    "{} has {} decimals",
                    token.address, token.decimals
                ))
            );
            *precision = U256::exp10(18 - token.decimals as usize);
        }
        let mut reserves = [U256::zero(); N_COINS];
        reserves.copy_from_slice(&snapshot.reserves);
        let (price_scale, price_oracle, last_prices) = extra.prices()?;
        if let Some(k) = price_scale.iter().position(U256::is_zero) {
            return Err(PoolError::ZeroRate(k + 1));
        }

        let pool = Self {
            address: snapshot.address.to_lowercase(),
            tokens: snapshot.token_addresses(),
            reserves,
            precisions,
            ramp: extra.ramp()?,
            fees: extra.fees(),
            d: extra.d,
            price_scale,
            price_oracle,
            last_prices,
            last_prices_timestamp: extra.last_prices_timestamp,
            lp_supply: extra.lp_supply,
            xcp_profit: extra.xcp_profit,
            virtual_price: extra.virtual_price,
            allowed_extra_profit: extra.allowed_extra_profit,
            adjustment_step: extra.adjustment_step,
            ma_time: extra.ma_time,
        };
        log::debug!(
            "loaded curve-tricrypto-ng pool {} with {N_COINS} tokens",
            pool.address
        );
        Ok(pool)
    }

    pub fn reserves(&self) -> &Xp {
        &self.reserves
    }

    pub fn d(&self) -> U256 {
        self.d
    }

    pub fn price_scale(&self) -> &[U256; 2] {
        &self.price_scale
    }

    pub fn price_oracle(&self) -> &[U256; 2] {
        &self.price_oracle
    }

    pub fn last_prices(&self) -> &[U256; 2] {
        &self.last_prices
    }

    pub fn virtual_price(&self) -> U256 {
        self.virtual_price
    }

    pub fn xcp_profit(&self) -> U256 {
        self.xcp_profit
    }

    pub fn lp_supply(&self) -> U256 {
        self.lp_supply
    }

    /// `(A, gamma)` at `now`.
    pub fn a_gamma(&self, now: Timestamp) -> Result<(U256, U256), PoolError> {
        let (a, gamma) = self.ramp.compute(now)?;
        Ok((a.into(), gamma.into()))
    }

    /// Brings raw balances to 18 decimals and prices them in coin 0.
    pub(crate) fn scale(&self, balances: &Xp) -> Result<Xp, MathError> {
        let mut xp = [U256::zero(); N_COINS];
        for (k, x) in xp.iter_mut().enumerate() {
            let amount = balances[k]
                .checked_mul(self.precisions[k])
                .ok_or(MathError::MulOverflow(237))?;
            *x = match k {
                0 => amount,
                _ => mul_div(amount, self.price_scale[k - 1], precision(), 237)?,
            };
        }
        Ok(xp)
    }

    fn unscale(&self, amount: U256, k: usize) -> Result<U256, MathError> {
        let amount = match k {
            0 => amount,
            _ => mul_div(amount, precision(), self.price_scale[k - 1], 238)?,
        };
        amount
            .checked_div(self.precisions[k])
            .ok_or(MathError::DivByZero(238))
    }

    /// The stored D, or a fresh one from the current balances while A and gamma ramp.
    pub fn invariant(&self, ann: U256, gamma: U256, now: Timestamp) -> Result<U256, PoolError> {
        if !self.ramp.is_ramping(now) {
            return Ok(self.d);
        }
        Ok(crypto_math::newton_d(
            ann,
            gamma,
            &self.scale(&self.reserves)?,
            U256::zero(),
        )?)
    }

    fn check_pair(&self, i: usize, j: usize, amount: U256) -> Result<(), PoolError> {
        ensure!(i < N_COINS, PoolError::IndexOutOfRange(i));
        ensure!(j < N_COINS, PoolError::IndexOutOfRange(j));
        ensure!(i != j, PoolError::IdenticalTokens);
        ensure!(!amount.is_zero(), PoolError::ZeroAmount);
        Ok(())
    }

    fn fee_of(&self, xp: &Xp, amount: U256) -> Result<U256, MathError> {
        mul_div(
            self.fees.fee_calc(xp)?,
            amount,
            FEE_DENOMINATOR.into(),
            239,
        )
    }

    /// Amount of coin `j` received for `dx` of coin `i`, net of the fee.
    pub fn get_dy(
        &self,
        i: usize,
        j: usize,
        dx: U256,
        now: Timestamp,
    ) -> Result<Exchange, PoolError> {
        self.check_pair(i, j, dx)?;
        let (ann, gamma) = self.a_gamma(now)?;
        let d = self.invariant(ann, gamma, now)?;

        let mut balances = self.reserves;
        balances[i] = balances[i]
            .checked_add(dx)
            .ok_or(MathError::AddOverflow(237))?;
        let mut xp = self.scale(&balances)?;
        let (y, k0) = crypto_math::get_y(ann, gamma, &xp, d, j)?;
        let dy = xp[j]
            .checked_sub(y)
            .and_then(|dy| dy.checked_sub(U256::one()))
            .ok_or(InvariantError::ReserveTooSmall)?;
        xp[j] = y;

        let dy = self.unscale(dy, j)?;
        let fee = self.fee_of(&xp, dy)?;
        let dy = dy.checked_sub(fee).ok_or(MathError::SubUnderflow(239))?;

        balances[j] = balances[j]
            .checked_sub(dy)
            .ok_or(InvariantError::ReserveTooSmall)?;
        Ok(Exchange {
            dy,
            fee,
            xp: self.scale(&balances)?,
            k0,
        })
    }

    /// Amount of coin `i` needed to take `dy_gross` of coin `j` out before fees, with the
    /// balances the solver ends at.
    fn dx_before_fee(
        &self,
        (ann, gamma, d): (U256, U256, U256),
        i: usize,
        j: usize,
        dy_gross: U256,
    ) -> Result<(U256, Xp), PoolError> {
        let mut balances = self.reserves;
        balances[j] = balances[j]
            .checked_sub(dy_gross)
            .ok_or(InvariantError::ReserveTooSmall)?;
        let mut xp = self.scale(&balances)?;
        let (x, _) = crypto_math::get_y(ann, gamma, &xp, d, i)?;
        let dx = x.checked_sub(xp[i]).ok_or(MathError::SubUnderflow(240))?;
        xp[i] = x;
        Ok((self.unscale(dx, i)?, xp))
    }

    /// Amount of coin `i` required to receive `dy` of coin `j`.
    ///
    /// The fee depends on the post-trade balances, so the gross output is refined over a
    /// fixed number of rounds. The returned fee is in coin `j`.
    pub fn get_dx(
        &self,
        i: usize,
        j: usize,
        dy: U256,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        self.check_pair(i, j, dy)?;
        ensure!(
            dy < self.reserves[j],
            PoolError::Invariant(InvariantError::ReserveTooSmall)
        );
        let (ann, gamma) = self.a_gamma(now)?;
        let curve = (ann, gamma, self.invariant(ann, gamma, now)?);

        let mut dy_gross = dy;
        let mut quote = Quote {
            gas: EXCHANGE_GAS,
            ..Default::default()
        };
        for _ in 0..GET_DX_ROUNDS {
            let (dx, xp) = self.dx_before_fee(curve, i, j, dy_gross)?;
            quote.amount = dx;
            quote.fee = self.fee_of(&xp, dy_gross)?;
            dy_gross = dy
                .checked_add(quote.fee)
                .and_then(|amount| amount.checked_add(U256::one()))
                .ok_or(MathError::AddOverflow(240))?;
        }
        Ok(quote)
    }

    /// Swaps `dx` of coin `i` for coin `j` and re-prices the pool.
    ///
    /// Nothing changes when the trade or the price update fails.
    pub fn exchange(
        &mut self,
        i: usize,
        j: usize,
        dx: U256,
        now: Timestamp,
    ) -> Result<Exchange, PoolError> {
        let (ann, gamma) = self.a_gamma(now)?;
        let swap = self.get_dy(i, j, dx, now)?;

        let mut next = self.clone();
        next.reserves[i] = next.reserves[i]
            .checked_add(dx)
            .ok_or(MathError::AddOverflow(241))?;
        next.reserves[j] = next.reserves[j]
            .checked_sub(swap.dy)
            .ok_or(MathError::SubUnderflow(241))?;
        next.tweak_price(ann, gamma, &swap.xp, swap.k0, now)?;
        *self = next;

        log::trace!(
            "{}: exchanged {dx} of coin {i} for {} of coin {j}",
            self.address,
            swap.dy
        );
        Ok(swap)
    }

    fn quote_from(swap: Exchange) -> Quote {
        Quote {
            amount: swap.dy,
            fee: swap.fee,
            admin_fee: U256::zero(),
            base_fee: U256::zero(),
            gas: EXCHANGE_GAS,
        }
    }
}

impl Pool for TricryptoPool {
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
        self.get_dy(i, j, amount_in, now).map(Self::quote_from)
    }

    fn quote_in(
        &self,
        token_out: &str,
        amount_out: U256,
        token_in: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        let (j, i) = pair_indices(self, token_out, token_in)?;
        self.get_dx(i, j, amount_out, now)
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
