use curve_helpers::{
    constants::crypto_pool::{MAX_FRAC, MIN_FRAC, N_COINS},
    crypto_math::{self, price::get_p, Xp},
    ensure,
    math::{abs_diff, geometric_mean, mul_div, precision, to_signed, wad_exp},
    ramp::Timestamp,
    InvariantError, MathError,
};
use curve_traits::PoolError;
use primitive_types::U256;

use crate::pool::TricryptoPool;

/// Balances of a pool sitting exactly at `price_scale` with invariant `d`.
fn balanced_xp(d: U256, price_scale: &[U256; 2]) -> Result<Xp, MathError> {
    let n = U256::from(N_COINS);
    let mut xp = [d / n; N_COINS];
    for (x, price) in xp[1..].iter_mut().zip(price_scale) {
        *x = mul_div(
            d,
            precision(),
            n.checked_mul(*price).ok_or(MathError::MulOverflow(242))?,
            242,
        )?;
    }
    Ok(xp)
}

impl TricryptoPool {
    /// `1e18 * geometric_mean(xp) / supply`.
    fn virtual_price_at(&self, xp: &Xp) -> Result<U256, MathError> {
        mul_div(precision(), geometric_mean(xp)?, self.lp_supply, 243)
    }

    /// Moves the oracle towards the last observed prices, weighted by the time since the
    /// previous update.
    fn update_oracle(&mut self, now: Timestamp) -> Result<(), PoolError> {
        if self.last_prices_timestamp >= now {
            return Ok(());
        }
        let elapsed = U256::from(now - self.last_prices_timestamp)
            .checked_mul(precision())
            .ok_or(MathError::MulOverflow(244))?
            .checked_div(self.ma_time)
            .ok_or(MathError::DivByZero(244))?;
        let alpha = wad_exp(-to_signed(elapsed)?)?;
        let one = precision();

        for k in 0..N_COINS - 1 {
            let last = self.last_prices[k].min(self.price_scale[k].saturating_mul(2.into()));
            self.price_oracle[k] = last
                .checked_mul(one - alpha)
                .ok_or(MathError::MulOverflow(244))?
                .checked_add(
                    self.price_oracle[k]
                        .checked_mul(alpha)
                        .ok_or(MathError::MulOverflow(245))?,
                )
                .ok_or(MathError::AddOverflow(244))?
                / one;
        }
        self.last_prices_timestamp = now;
        Ok(())
    }

    /// Re-derives D, prices and the profit counters after a balance change, and moves the
    /// price scale towards the oracle when the pool has earned enough to pay for it.
    ///
    /// `xp` are the post-trade balances and `k0_prev` the K0 of the solve that produced
    /// them. Fails with [`InvariantError::Loss`] if the virtual price does not grow after the
    /// A/gamma ramp's end time.
    pub(crate) fn tweak_price(
        &mut self,
        ann: U256,
        gamma: U256,
        xp: &Xp,
        k0_prev: U256,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        self.update_oracle(now)?;

        let one = precision();
        let d_unadjusted = crypto_math::newton_d(ann, gamma, xp, k0_prev)?;
        let prices = get_p(xp, d_unadjusted, ann, gamma)?;
        for (k, price) in prices.iter().enumerate() {
            self.last_prices[k] = mul_div(*price, self.price_scale[k], one, 245)?;
        }

        let old_virtual_price = self.virtual_price;
        let (mut xcp_profit, mut virtual_price) = (one, one);
        if !old_virtual_price.is_zero() {
            virtual_price = self.virtual_price_at(&balanced_xp(d_unadjusted, &self.price_scale)?)?;
            xcp_profit = mul_div(self.xcp_profit, virtual_price, old_virtual_price, 245)?;
            ensure!(
                self.ramp.future_time >= now || virtual_price > old_virtual_price,
                InvariantError::Loss
            );
        }
        self.xcp_profit = xcp_profit;

        let extra_profit = self
            .allowed_extra_profit
            .checked_mul(2.into())
            .and_then(|extra| extra.checked_add(xcp_profit))
            .ok_or(MathError::AddOverflow(245))?;
        if virtual_price.saturating_mul(2.into()).saturating_sub(one) > extra_profit {
            let mut norm = U256::zero();
            for (oracle, scale) in self.price_oracle.iter().zip(&self.price_scale) {
                let ratio = abs_diff(mul_div(*oracle, one, *scale, 245)?, one);
                norm = ratio
                    .checked_mul(ratio)
                    .and_then(|square| square.checked_add(norm))
                    .ok_or(MathError::MulOverflow(245))?;
            }
            let norm = norm.integer_sqrt();
            let step = self.adjustment_step.max(norm / 5);

            if norm > step {
                let mut price_scale = self.price_scale;
                for (price, oracle) in price_scale.iter_mut().zip(&self.price_oracle) {
                    *price = price
                        .checked_mul(norm - step)
                        .and_then(|moved| moved.checked_add(step.checked_mul(*oracle)?))
                        .ok_or(MathError::MulOverflow(246))?
                        / norm;
                }

                let mut xp_rescaled = *xp;
                for k in 1..N_COINS {
                    xp_rescaled[k] =
                        mul_div(xp[k], price_scale[k - 1], self.price_scale[k - 1], 246)?;
                }
                let d = crypto_math::newton_d(ann, gamma, &xp_rescaled, U256::zero())?;
                for x in &xp_rescaled {
                    let frac = mul_div(*x, one, d, 246)?;
                    ensure!(
                        frac >= MIN_FRAC.into() && frac <= MAX_FRAC.into(),
                        InvariantError::UnsafeX
                    );
                }

                let new_virtual_price = self.virtual_price_at(&balanced_xp(d, &price_scale)?)?;
                if new_virtual_price > one
                    && new_virtual_price.saturating_mul(2.into()).saturating_sub(one) > xcp_profit
                {
                    log::debug!(
                        "{}: price scale {:?} -> {price_scale:?}",
                        self.address,
                        self.price_scale
                    );
                    self.price_scale = price_scale;
                    self.d = d;
                    self.virtual_price = new_virtual_price;
                    return Ok(());
                }
            }
        }

        self.d = d_unadjusted;
        self.virtual_price = virtual_price;
        Ok(())
    }
}
