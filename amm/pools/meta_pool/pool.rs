use curve_helpers::{
    constants::{
        stable_pool::{EXCHANGE_GAS, EXCHANGE_UNDERLYING_GAS},
        MAX_TOKENS,
    },
    ensure,
    ramp::Timestamp,
    stable_swap_math::{Scratch, SwapResult},
};
use curve_traits::{BasePool, Pool, PoolError, PoolSnapshot, Quote, Trade};
use primitive_types::U256;
use stable_pool::{NextGen, Plain, StableKind, StableSwapPool};

use crate::config::MetaStaticExtra;

pub type NgMetaPool = MetaPool<NextGen>;
pub type PlainMetaPool = MetaPool<Plain>;

/// A stable pool whose last coin is the LP token of a base pool.
///
/// The base pool is not owned. Every call that needs it takes it as an argument and checks
/// that it is the pool this one was built against.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct MetaPool<K> {
    pool: StableSwapPool<K>,
    base_address: String,
}

/// Where a token lives: a meta pool coin (the LP slot included) or a base pool coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Meta(usize),
    Base(usize),
}

fn quote(amount: U256, swap: SwapResult, gas: u64) -> Quote {
    Quote {
        amount,
        fee: swap.fee,
        admin_fee: swap.admin_fee,
        base_fee: U256::zero(),
        gas,
    }
}

fn single<B: BasePool>(base: &B, k: usize, amount: U256) -> Result<(Scratch, usize), PoolError> {
    let n = base.tokens().len();
    ensure!(n <= MAX_TOKENS, PoolError::TooManyTokens(n));
    ensure!(k < n, PoolError::IndexOutOfRange(k));
    let mut amounts = [U256::zero(); MAX_TOKENS];
    amounts[k] = amount;
    Ok((amounts, n))
}

impl<K: StableKind> MetaPool<K> {
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        Self::from_snapshot(&PoolSnapshot::from_json(json)?)
    }

    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<Self, PoolError> {
        let pool = StableSwapPool::<K>::from_snapshot(snapshot)?;
        let extra: MetaStaticExtra = snapshot.parse_static_extra()?;
        let meta = Self {
            pool,
            base_address: extra.base_pool.to_lowercase(),
        };
        log::debug!(
            "meta pool {} sits on base pool {}",
            meta.pool.address(),
            meta.base_address
        );
        Ok(meta)
    }

    /// The in-pool state, including the base LP slot.
    pub fn inner(&self) -> &StableSwapPool<K> {
        &self.pool
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Index of the base LP slot.
    pub fn lp_index(&self) -> usize {
        self.pool.tokens().len() - 1
    }

    fn check_base<B: BasePool>(&self, base: &B) -> Result<(), PoolError> {
        ensure!(
            base.address().eq_ignore_ascii_case(&self.base_address),
            PoolError::BasePoolMismatch
        );
        Ok(())
    }

    fn leg<B: BasePool>(&self, base: &B, token: &str) -> Result<Leg, PoolError> {
        let token = token.to_lowercase();
        if let Some(i) = self.pool.tokens().iter().position(|t| *t == token) {
            return Ok(Leg::Meta(i));
        }
        base.token_index(&token)
            .map(Leg::Base)
            .ok_or(PoolError::UnknownToken(token))
    }

    fn route<B: BasePool>(
        &self,
        base: &B,
        token_in: &str,
        token_out: &str,
    ) -> Result<(Leg, Leg), PoolError> {
        self.check_base(base)?;
        let from = self.leg(base, token_in)?;
        let to = self.leg(base, token_out)?;
        ensure!(from != to, PoolError::IdenticalTokens);
        Ok((from, to))
    }

    /// Maps an underlying index to a leg. Indices below the LP slot are meta coins, the
    /// rest are base coins by offset.
    fn underlying_leg<B: BasePool>(&self, base: &B, index: usize) -> Result<Leg, PoolError> {
        let lp = self.lp_index();
        if index < lp {
            return Ok(Leg::Meta(index));
        }
        ensure!(
            index - lp < base.tokens().len(),
            PoolError::IndexOutOfRange(index)
        );
        Ok(Leg::Base(index - lp))
    }

    fn underlying_legs<B: BasePool>(
        &self,
        base: &B,
        i: usize,
        j: usize,
    ) -> Result<(Leg, Leg), PoolError> {
        self.check_base(base)?;
        ensure!(i != j, PoolError::IdenticalTokens);
        Ok((self.underlying_leg(base, i)?, self.underlying_leg(base, j)?))
    }

    /// Quotes `dx` of `from` into `to` where exactly one side is a base coin.
    fn quote_underlying_out<B: BasePool>(
        &self,
        base: &B,
        (from, to): (Leg, Leg),
        dx: U256,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        ensure!(!dx.is_zero(), PoolError::ZeroAmount);
        let lp = self.lp_index();
        match (from, to) {
            (Leg::Meta(i), Leg::Base(k)) if i != lp => {
                let swap = self.pool.get_dy(i, lp, dx, None, now)?;
                let out = base.calc_withdraw_one_coin(swap.amount, k, now)?;
                Ok(Quote {
                    base_fee: out.fee,
                    ..quote(out.amount, swap, EXCHANGE_UNDERLYING_GAS)
                })
            }
            (Leg::Base(k), Leg::Meta(j)) if j != lp => {
                let (amounts, n) = single(base, k, dx)?;
                let minted = base.calc_token_amount(&amounts[..n], true, now)?;
                let swap = self.pool.get_dy(lp, j, minted.lp_amount, None, now)?;
                Ok(Quote {
                    base_fee: minted.fees[k],
                    ..quote(swap.amount, swap, EXCHANGE_UNDERLYING_GAS)
                })
            }
            (Leg::Meta(_), Leg::Meta(_)) => Err(PoolError::NoBaseLeg),
            _ => Err(PoolError::BaseToBaseRoute),
        }
    }

    /// Quotes the `from` amount needed to receive `dy` of `to` where exactly one side is a
    /// base coin.
    fn quote_underlying_in<B: BasePool>(
        &self,
        base: &B,
        (from, to): (Leg, Leg),
        dy: U256,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        ensure!(!dy.is_zero(), PoolError::ZeroAmount);
        let lp = self.lp_index();
        match (from, to) {
            (Leg::Meta(i), Leg::Base(k)) if i != lp => {
                let (amounts, n) = single(base, k, dy)?;
                let burned = base.calc_token_amount(&amounts[..n], false, now)?;
                let swap = self.pool.get_dx(i, lp, burned.lp_amount, None, now)?;
                Ok(Quote {
                    base_fee: burned.fees[k],
                    ..quote(swap.amount, swap, EXCHANGE_UNDERLYING_GAS)
                })
            }
            (Leg::Base(k), Leg::Meta(j)) if j != lp => {
                let swap = self.pool.get_dx(lp, j, dy, None, now)?;
                let out = base.calc_withdraw_one_coin(swap.amount, k, now)?;
                Ok(Quote {
                    base_fee: out.fee,
                    ..quote(out.amount, swap, EXCHANGE_UNDERLYING_GAS)
                })
            }
            (Leg::Meta(_), Leg::Meta(_)) => Err(PoolError::NoBaseLeg),
            _ => Err(PoolError::BaseToBaseRoute),
        }
    }

    /// Amount of underlying coin `j` received for `dx` of underlying coin `i`.
    pub fn get_dy_underlying<B: BasePool>(
        &self,
        base: &B,
        i: usize,
        j: usize,
        dx: U256,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        let legs = self.underlying_legs(base, i, j)?;
        self.quote_underlying_out(base, legs, dx, now)
    }

    /// Amount of underlying coin `i` needed to receive `dy` of underlying coin `j`.
    pub fn get_dx_underlying<B: BasePool>(
        &self,
        base: &B,
        i: usize,
        j: usize,
        dy: U256,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        let legs = self.underlying_legs(base, i, j)?;
        self.quote_underlying_in(base, legs, dy, now)
    }

    /// Quotes a swap between any two of the meta coins, the base LP token and the base
    /// coins. For underlying routes `fee` and `admin_fee` are those of the meta pool leg and
    /// `base_fee` is the base pool's fee on the base coin.
    pub fn quote_out<B: BasePool>(
        &self,
        base: &B,
        token_in: &str,
        amount_in: U256,
        token_out: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        match self.route(base, token_in, token_out)? {
            (Leg::Meta(i), Leg::Meta(j)) => self
                .pool
                .get_dy(i, j, amount_in, None, now)
                .map(|swap| quote(swap.amount, swap, EXCHANGE_GAS)),
            legs => self.quote_underlying_out(base, legs, amount_in, now),
        }
    }

    pub fn quote_in<B: BasePool>(
        &self,
        base: &B,
        token_out: &str,
        amount_out: U256,
        token_in: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        match self.route(base, token_in, token_out)? {
            (Leg::Meta(i), Leg::Meta(j)) => self
                .pool
                .get_dx(i, j, amount_out, None, now)
                .map(|swap| quote(swap.amount, swap, EXCHANGE_GAS)),
            legs => self.quote_underlying_in(base, legs, amount_out, now),
        }
    }

    /// Sets the base LP slot's rate to the base pool's virtual price.
    pub fn sync_base_rate<B: BasePool>(&mut self, base: &B, now: Timestamp) -> Result<(), PoolError> {
        self.check_base(base)?;
        let (virtual_price, _) = base.virtual_price(now)?;
        self.pool.set_rate(self.lp_index(), virtual_price)
    }

    /// Executes `trade`, mutating the base pool for underlying routes.
    ///
    /// Deposits into the base pool come before the meta swap and withdrawals after it. The
    /// base LP rate is refreshed last. Neither pool changes if any step fails.
    pub fn apply<B: BasePool + Clone>(
        &mut self,
        base: &mut B,
        trade: &Trade,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        self.apply_trade(base, trade, now).map_err(|err| {
            log::warn!("{}: rejected trade {trade:?}: {err}", self.pool.address());
            err
        })
    }

    fn apply_trade<B: BasePool + Clone>(
        &mut self,
        base: &mut B,
        trade: &Trade,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        let legs = self.route(&*base, &trade.token_in, &trade.token_out)?;
        let dx = trade.amount_in;
        let lp = self.lp_index();
        let mut pool = self.pool.clone();

        let (result, next_base) = match legs {
            (Leg::Meta(i), Leg::Meta(j)) => {
                let swap = pool.exchange(i, j, dx, now)?;
                (quote(swap.amount, swap, EXCHANGE_GAS), None)
            }
            (Leg::Meta(i), Leg::Base(k)) if i != lp => {
                let mut next_base = base.clone();
                let swap = pool.exchange(i, lp, dx, now)?;
                let out = next_base.remove_liquidity_one_coin(swap.amount, k, now)?;
                let result = Quote {
                    base_fee: out.fee,
                    ..quote(out.amount, swap, EXCHANGE_UNDERLYING_GAS)
                };
                (result, Some(next_base))
            }
            (Leg::Base(k), Leg::Meta(j)) if j != lp => {
                ensure!(!dx.is_zero(), PoolError::ZeroAmount);
                let mut next_base = base.clone();
                let (amounts, n) = single(&*base, k, dx)?;
                let minted = next_base.add_liquidity(&amounts[..n], now)?;
                let swap = pool.exchange(lp, j, minted.lp_amount, now)?;
                let result = Quote {
                    base_fee: minted.fees[k],
                    ..quote(swap.amount, swap, EXCHANGE_UNDERLYING_GAS)
                };
                (result, Some(next_base))
            }
            _ => return Err(PoolError::BaseToBaseRoute),
        };

        let (virtual_price, _) = match &next_base {
            Some(next_base) => next_base.virtual_price(now)?,
            None => base.virtual_price(now)?,
        };
        pool.set_rate(lp, virtual_price)?;
        self.pool = pool;
        if let Some(next_base) = next_base {
            *base = next_base;
        }

        log::trace!(
            "{}: swapped {dx} of {} for {} of {}",
            self.pool.address(),
            trade.token_in,
            result.amount,
            trade.token_out
        );
        Ok(result)
    }

    /// Tokens `token` can be swapped into. Base coins only trade against meta coins here.
    pub fn can_swap_to<B: BasePool>(&self, base: &B, token: &str) -> Vec<String> {
        let lp = self.lp_index();
        let tokens = self.pool.tokens();
        let coins = || tokens[..lp].to_vec();
        match self.leg(base, token) {
            Ok(Leg::Meta(i)) if i == lp => coins(),
            Ok(Leg::Meta(i)) => tokens
                .iter()
                .enumerate()
                .filter(|(k, _)| *k != i)
                .map(|(_, t)| t.clone())
                .chain(base.tokens().iter().cloned())
                .collect(),
            Ok(Leg::Base(_)) => coins(),
            Err(_) => Vec::new(),
        }
    }

    /// Pairs the meta pool with its base pool behind the [`Pool`] interface.
    pub fn with_base<'a, B: BasePool>(
        &'a mut self,
        base: &'a mut B,
    ) -> Result<BoundMetaPool<'a, K, B>, PoolError> {
        self.check_base(&*base)?;
        let tokens = self
            .pool
            .tokens()
            .iter()
            .chain(base.tokens())
            .cloned()
            .collect();
        Ok(BoundMetaPool {
            meta: self,
            base,
            tokens,
        })
    }
}

/// A meta pool borrowed together with its base pool. Its tokens are the meta coins, the
/// base LP token and the base coins.
pub struct BoundMetaPool<'a, K, B> {
    meta: &'a mut MetaPool<K>,
    base: &'a mut B,
    tokens: Vec<String>,
}

impl<K: StableKind, B: BasePool + Clone> Pool for BoundMetaPool<'_, K, B> {
    fn address(&self) -> &str {
        self.meta.pool.address()
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
        self.meta
            .quote_out(&*self.base, token_in, amount_in, token_out, now)
    }

    fn quote_in(
        &self,
        token_out: &str,
        amount_out: U256,
        token_in: &str,
        now: Timestamp,
    ) -> Result<Quote, PoolError> {
        self.meta
            .quote_in(&*self.base, token_out, amount_out, token_in, now)
    }

    fn apply(&mut self, trade: &Trade, now: Timestamp) -> Result<Quote, PoolError> {
        self.meta.apply(&mut *self.base, trade, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BasePoolKind;
    use assert2::check;
    use proptest::prelude::*;
    use scale::{Decode, Encode};
    use stable_pool::PlainPool;

    const BASE_PYUSD_USDC: &str = r#"{"address":"0x383e6b4437b59fff47b619cba855ca29342a8559","exchange":"curve-stable-ng","type":"curve-stable-ng","timestamp":1710325214,"reserves":["20645714947000","16619279610257","37260809758180318203561662"],"tokens":[{"address":"0x6c3ea9036406852006290770bedfcaba0e23a0e8","symbol":"PYUSD","decimals":6,"swappable":true},{"address":"0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48","symbol":"USDC","decimals":6,"swappable":true}],"extra":"{\"InitialA\":\"15000\",\"FutureA\":\"15000\",\"InitialATime\":0,\"FutureATime\":0,\"SwapFee\":\"1000000\",\"AdminFee\":\"5000000000\",\"RateMultipliers\":[\"1000000000000000000000000000000\",\"1000000000000000000000000000000\"]}","staticExtra":"{\"APrecision\":\"100\",\"OffpegFeeMultiplier\":\"50000000000\",\"IsNativeCoins\":[false,false]}","blockNumber":19425514}"#;
    const META_MKUSD: &str = r#"{"address":"0x9e10f9fb6f0d32b350cee2618662243d4f24c64a","exchange":"curve-stable-meta-ng","type":"curve-stable-meta-ng","timestamp":1710325225,"reserves":["1400402037639032709376918","389831262966377525851519","1786431867672163347040320"],"tokens":[{"address":"0x4591dbff62656e7859afe5e45f6f47d3669fbb28","symbol":"mkUSD","decimals":18,"swappable":true},{"address":"0x383e6b4437b59fff47b619cba855ca29342a8559","symbol":"PYUSDUSDC","decimals":18,"swappable":true}],"extra":"{\"InitialA\":\"15000\",\"FutureA\":\"15000\",\"InitialATime\":0,\"FutureATime\":0,\"SwapFee\":\"4000000\",\"AdminFee\":\"5000000000\",\"RateMultipliers\":[\"1000000000000000000\",\"1000073197173325044\"]}","staticExtra":"{\"APrecision\":\"100\",\"OffpegFeeMultiplier\":\"20000000000\",\"IsNativeCoins\":[false,false],\"BasePool\":\"0x383e6b4437b59fff47b619cba855ca29342a8559\"}","blockNumber":19425514}"#;
    const BASE_PYUSD_USDC_LATER: &str = r#"{"address":"0x383e6b4437b59fff47b619cba855ca29342a8559","exchange":"curve-stable-ng","type":"curve-stable-ng","timestamp":1710382680,"reserves":["21024903652839","16240730126117","37260809758180318203561662"],"tokens":[{"address":"0x6c3ea9036406852006290770bedfcaba0e23a0e8","symbol":"PYUSD","decimals":6,"swappable":true},{"address":"0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48","symbol":"USDC","decimals":6,"swappable":true}],"extra":"{\"InitialA\":\"15000\",\"FutureA\":\"15000\",\"InitialATime\":0,\"FutureATime\":0,\"SwapFee\":\"1000000\",\"AdminFee\":\"5000000000\",\"RateMultipliers\":[\"1000000000000000000000000000000\",\"1000000000000000000000000000000\"]}","staticExtra":"{\"APrecision\":\"100\",\"OffpegFeeMultiplier\":\"50000000000\",\"IsNativeCoins\":[false,false]}","blockNumber":19430235}"#;
    const META_MKUSD_LATER: &str = r#"{"address":"0x9e10f9fb6f0d32b350cee2618662243d4f24c64a","exchange":"curve-stable-meta-ng","type":"curve-stable-meta-ng","timestamp":1710382680,"reserves":["1400402037639032709376918","389831262966377525851519","1786431867672163347040320"],"tokens":[{"address":"0x4591dbff62656e7859afe5e45f6f47d3669fbb28","symbol":"mkUSD","decimals":18,"swappable":true},{"address":"0x383e6b4437b59fff47b619cba855ca29342a8559","symbol":"PYUSDUSDC","decimals":18,"swappable":true}],"extra":"{\"InitialA\":\"15000\",\"FutureA\":\"15000\",\"InitialATime\":0,\"FutureATime\":0,\"SwapFee\":\"4000000\",\"AdminFee\":\"5000000000\",\"RateMultipliers\":[\"1000000000000000000\",\"1000073979307112987\"]}","staticExtra":"{\"APrecision\":\"100\",\"OffpegFeeMultiplier\":\"20000000000\",\"IsNativeCoins\":[false,false],\"BasePool\":\"0x383e6b4437b59fff47b619cba855ca29342a8559\"}","blockNumber":19430235}"#;
    const BASE_3POOL: &str = r#"{"address":"0xbebc44782c7db0a1a60cb6fe97d0b483032ff1c7","exchange":"curve-stable-plain","type":"curve-stable-plain","timestamp":1710325237,"reserves":["65891575243355502241306990","75341231104429","41726299837088","177545696975626286432095682"],"tokens":[{"address":"0x6b175474e89094c44da98b954eedeac495271d0f","symbol":"DAI","decimals":18,"swappable":true},{"address":"0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48","symbol":"USDC","decimals":6,"swappable":true},{"address":"0xdac17f958d2ee523a2206206994597c13d831ec7","symbol":"USDT","decimals":6,"swappable":true}],"extra":"{\"InitialA\":\"5000\",\"FutureA\":\"2000\",\"InitialATime\":1653559305,\"FutureATime\":1654158027,\"SwapFee\":\"1000000\",\"AdminFee\":\"5000000000\"}","staticExtra":"{\"APrecision\":\"1\",\"LpToken\":\"0x6c3F90f043a72FA612cbac8115EE7e52BDe6E490\",\"IsNativeCoin\":[false,false,false]}","blockNumber":19425516}"#;
    const META_USDV: &str = r#"{"address":"0x76ae7a7dc125e4163a2137e650b7726231fdb917","exchange":"curve-stable-meta-ng","type":"curve-stable-meta-ng","timestamp":1710325237,"reserves":["5000000","4863240447390973923","9999146636606522686"],"tokens":[{"address":"0x0e573ce2736dd9637a0b21058352e1667925c7a8","symbol":"USDV","decimals":6,"swappable":true},{"address":"0x6c3f90f043a72fa612cbac8115ee7e52bde6e490","symbol":"3Crv","decimals":18,"swappable":true}],"extra":"{\"InitialA\":\"50000\",\"FutureA\":\"50000\",\"InitialATime\":0,\"FutureATime\":0,\"SwapFee\":\"1000000\",\"AdminFee\":\"5000000000\",\"RateMultipliers\":[\"1000000000000000000000000000000\",\"1030473918425408342\"]}","staticExtra":"{\"APrecision\":\"100\",\"OffpegFeeMultiplier\":\"50000000000\",\"IsNativeCoins\":[false,false],\"BasePool\":\"0xbebc44782c7db0a1a60cb6fe97d0b483032ff1c7\"}","blockNumber":19425516}"#;

    const MKUSD: &str = "0x4591dbff62656e7859afe5e45f6f47d3669fbb28";
    const PYUSD_USDC_LP: &str = "0x383e6b4437b59fff47b619cba855ca29342a8559";
    const PYUSD: &str = "0x6c3ea9036406852006290770bedfcaba0e23a0e8";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const USDV: &str = "0x0e573ce2736dd9637a0b21058352e1667925c7a8";
    const DAI: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";
    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
    const NOW: Timestamp = 1_710_325_225;

    fn u(value: u128) -> U256 {
        U256::from(value)
    }

    fn pools(base: &str, meta: &str) -> (NgMetaPool, BasePoolKind) {
        (
            NgMetaPool::from_json(meta).unwrap_or_else(|err| panic!("Should load meta pool: {err:?}")),
            BasePoolKind::from_json(base)
                .unwrap_or_else(|err| panic!("Should load base pool: {err:?}")),
        )
    }

    // (token in, amount in, token out, amount out)
    const MKUSD_QUOTES: [(&str, u128, &str, u128); 28] = [
        (MKUSD, 50_000_000_000_000_000, PYUSD_USDC_LP, 49_183_840_532_051_551),
        (MKUSD, 500_000_000_000_000_000, PYUSD_USDC_LP, 491_838_395_529_404_280),
        (MKUSD, 5_000_000_000_000_000_000, PYUSD_USDC_LP, 4_918_382_977_155_694_248),
        (MKUSD, 50_000_000_000_000_000_000, PYUSD_USDC_LP, 49_183_731_951_271_033_406),
        (PYUSD_USDC_LP, 50_000_000_000_000_000_000, MKUSD, 50_781_231_606_587_338_678),
        (PYUSD_USDC_LP, 5_000_000_000_000_000_000, MKUSD, 5_078_133_338_462_932_470),
        (PYUSD_USDC_LP, 500_000_000_000_000_000, MKUSD, 507_813_435_641_987_387),
        (PYUSD_USDC_LP, 50_000_000_000_000_000, MKUSD, 50_781_344_581_152_143),
        (MKUSD, 50_000_000_000_000_000, PYUSD, 49_219),
        (MKUSD, 500_000_000_000_000_000, PYUSD, 492_193),
        (MKUSD, 5_000_000_000_000_000_000, PYUSD, 4_921_930),
        (MKUSD, 50_000_000_000_000_000_000, PYUSD, 49_219_208),
        (MKUSD, 500_000_000_000_000_000_001, PYUSD, 492_182_271),
        (MKUSD, 50_000_000_000_000_000, USDC, 49_146),
        (MKUSD, 500_000_000_000_000_000, USDC, 491_467),
        (MKUSD, 5_000_000_000_000_000_000, USDC, 4_914_673),
        (MKUSD, 50_000_000_000_000_000_000, USDC, 49_146_640),
        (MKUSD, 500_000_000_000_000_000_001, USDC, 491_456_594),
        (PYUSD, 5_000_000, MKUSD, 5_074_020_539_796_174_052),
        (PYUSD, 50_000_001, MKUSD, 50_740_089_393_727_228_165),
        (PYUSD, 500_000_012, MKUSD, 507_390_727_614_246_026_441),
        (PYUSD, 5_000_000_123, MKUSD, 5_072_902_983_968_984_217_079),
        (PYUSD, 50_000_001_234, MKUSD, 50_639_540_695_688_204_241_877),
        (USDC, 5_000_000, MKUSD, 5_081_403_477_635_882_869),
        (USDC, 50_000_001, MKUSD, 50_813_917_368_257_894_387),
        (USDC, 500_000_012, MKUSD, 508_128_962_320_265_975_010),
        (USDC, 5_000_000_123, MKUSD, 5_080_281_497_249_917_498_225),
        (USDC, 50_000_001_234, MKUSD, 50_712_988_541_587_113_680_160),
    ];

    // Same routes applied one after another on a later snapshot.
    const MKUSD_TRADES: [(&str, u128, &str, u128); 28] = [
        (MKUSD, 50_000_000_000_000_000, PYUSD_USDC_LP, 49_183_803_117_034_717),
        (MKUSD, 500_000_000_000_000_000, PYUSD_USDC_LP, 491_838_019_214_800_179),
        (MKUSD, 5_000_000_000_000_000_000, PYUSD_USDC_LP, 4_918_378_996_577_723_203),
        (MKUSD, 50_000_000_000_000_000_000, PYUSD_USDC_LP, 49_183_670_407_928_875_253),
        (PYUSD_USDC_LP, 50_000_000_000_000_000_000, MKUSD, 50_781_517_537_183_117_580),
        (PYUSD_USDC_LP, 5_000_000_000_000_000_000, MKUSD, 5_078_139_311_329_564_610),
        (PYUSD_USDC_LP, 500_000_000_000_000_000, MKUSD, 507_813_806_736_460_752),
        (PYUSD_USDC_LP, 50_000_000_000_000_000, MKUSD, 50_781_379_429_698_345),
        (MKUSD, 50_000_000_000_000_000, PYUSD, 49_225),
        (MKUSD, 500_000_000_000_000_000, PYUSD, 492_257),
        (MKUSD, 5_000_000_000_000_000_000, PYUSD, 4_922_570),
        (MKUSD, 50_000_000_000_000_000_000, PYUSD, 49_225_589),
        (MKUSD, 500_000_000_000_000_000_001, PYUSD, 492_243_896),
        (MKUSD, 50_000_000_000_000_000, USDC, 49_136),
        (MKUSD, 500_000_000_000_000_000, USDC, 491_362),
        (MKUSD, 5_000_000_000_000_000_000, USDC, 4_913_624),
        (MKUSD, 50_000_000_000_000_000_000, USDC, 49_136_126),
        (MKUSD, 500_000_000_000_000_000_001, USDC, 491_349_219),
        (PYUSD, 5_000_000, MKUSD, 5_073_865_293_005_121_823),
        (PYUSD, 50_000_001, MKUSD, 50_738_523_479_831_778_367),
        (PYUSD, 500_000_012, MKUSD, 507_372_701_068_203_994_424),
        (PYUSD, 5_000_000_123, MKUSD, 5_072_491_923_750_267_051_609),
        (PYUSD, 50_000_001_234, MKUSD, 50_616_343_745_703_407_410_794),
        (USDC, 5_000_000, MKUSD, 5_061_857_447_205_291_553),
        (USDC, 50_000_001, MKUSD, 50_618_476_537_958_348_229),
        (USDC, 500_000_012, MKUSD, 506_176_186_968_441_504_177),
        (USDC, 5_000_000_123, MKUSD, 5_060_914_974_457_911_866_316),
        (USDC, 50_000_001_234, MKUSD, 50_533_364_232_772_870_927_842),
    ];

    #[test]
    fn loads_meta_pool() {
        let (meta, base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        assert_eq!(meta.base_address(), PYUSD_USDC_LP);
        assert_eq!(meta.lp_index(), 1);
        assert_eq!(meta.inner().rates()[1], u(1_000_073_197_173_325_044));
        assert_eq!(
            base.virtual_price(NOW).map(|(virtual_price, _)| virtual_price),
            Ok(u(1_000_073_197_173_325_044)),
            "snapshot rate is the base virtual price"
        );
        assert!(
            NgMetaPool::from_json(BASE_PYUSD_USDC).is_err(),
            "a pool without a base is not a meta pool"
        );
    }

    #[test]
    fn quotes_all_routes() {
        let (meta, base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        for (token_in, amount_in, token_out, expected) in MKUSD_QUOTES {
            let quote = meta
                .quote_out(&base, token_in, u(amount_in), token_out, NOW)
                .unwrap_or_else(|err| panic!("Should quote {token_in} -> {token_out}: {err:?}"));
            assert_eq!(
                quote.amount,
                u(expected),
                "{amount_in} of {token_in} -> {token_out}"
            );
            let underlying = token_in != PYUSD_USDC_LP && token_out != PYUSD_USDC_LP;
            assert_eq!(
                quote.gas,
                if underlying {
                    EXCHANGE_UNDERLYING_GAS
                } else {
                    EXCHANGE_GAS
                }
            );
        }
    }

    #[test]
    fn underlying_indices_match_tokens() {
        let (meta, base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        let quote = meta
            .get_dy_underlying(&base, 0, 2, u(50_000_000_000_000_000), NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        assert_eq!(quote.amount, u(49_146));
        let quote = meta
            .get_dy_underlying(&base, 1, 0, u(5_000_000), NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        assert_eq!(quote.amount, u(5_074_020_539_796_174_052));
        assert_eq!(
            meta.get_dy_underlying(&base, 1, 2, u(5_000_000), NOW),
            Err(PoolError::BaseToBaseRoute)
        );
        assert_eq!(
            meta.get_dy_underlying(&base, 0, 3, u(5_000_000), NOW),
            Err(PoolError::IndexOutOfRange(3))
        );
    }

    #[test]
    fn underlying_inverse_matches_token_api() {
        let (meta, base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        let dy = u(250_000_000);
        let by_index = meta
            .get_dx_underlying(&base, 0, 1, dy, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        let by_token = meta
            .quote_in(&base, PYUSD, dy, MKUSD, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        assert_eq!(by_index, by_token);
        assert_eq!(
            meta.get_dx_underlying(&base, 0, 1, U256::zero(), NOW),
            Err(PoolError::ZeroAmount)
        );
        assert_eq!(
            meta.get_dx_underlying(&base, 0, 0, dy, NOW),
            Err(PoolError::IdenticalTokens)
        );
    }

    #[test]
    fn base_rate_follows_virtual_price() {
        let (mut meta, _) = pools(BASE_PYUSD_USDC, META_MKUSD);
        let later = BasePoolKind::from_json(BASE_PYUSD_USDC_LATER)
            .unwrap_or_else(|err| panic!("Should load base pool: {err:?}"));
        meta.sync_base_rate(&later, NOW)
            .unwrap_or_else(|err| panic!("Should sync: {err:?}"));
        assert_eq!(meta.inner().rates()[1], u(1_000_073_979_307_112_987));

        let other = BasePoolKind::from_json(BASE_3POOL)
            .unwrap_or_else(|err| panic!("Should load base pool: {err:?}"));
        assert_eq!(
            meta.sync_base_rate(&other, NOW),
            Err(PoolError::BasePoolMismatch)
        );
    }

    #[test]
    fn quote_in_inverts_underlying_routes() {
        let (meta, base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        let routes = [
            (MKUSD, USDC, 1_000_000_000u128),
            (MKUSD, PYUSD, 25_000_000),
            (USDC, MKUSD, 1_000_000_000_000_000_000_000),
            (PYUSD, MKUSD, 7_000_000_000_000_000_000),
            (MKUSD, PYUSD_USDC_LP, 3_000_000_000_000_000_000),
        ];
        for (token_in, token_out, dy) in routes {
            let dy = u(dy);
            let dx = meta
                .quote_in(&base, token_out, dy, token_in, NOW)
                .unwrap_or_else(|err| panic!("Should quote in {token_in} -> {token_out}: {err:?}"))
                .amount;
            let back = meta
                .quote_out(&base, token_in, dx, token_out, NOW)
                .unwrap_or_else(|err| panic!("Should quote out {token_in} -> {token_out}: {err:?}"))
                .amount;
            let diff = if back > dy { back - dy } else { dy - back };
            check!(diff <= dy / 1_000 + 2, "{token_in} -> {token_out}: {dy} vs {back}");
        }
    }

    #[test]
    fn underlying_routes_report_base_fee() {
        let (mut meta, mut base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        let dx = u(5_000_000_000_000_000_000);
        let lp_out = meta
            .quote_out(&base, MKUSD, dx, PYUSD_USDC_LP, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        assert_eq!(lp_out.base_fee, U256::zero(), "LP leg never touches the base pool");

        let withdrawn = meta
            .quote_out(&base, MKUSD, dx, USDC, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        let withdrawal = base
            .calc_withdraw_one_coin(lp_out.amount, 1, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        check!(!withdrawn.base_fee.is_zero());
        assert_eq!(withdrawn.base_fee, withdrawal.fee, "withdrawal fee of the base pool");
        assert_eq!(withdrawn.fee, lp_out.fee, "meta leg fee is unchanged");

        let dx = u(50_000_001);
        let deposited = meta
            .quote_out(&base, USDC, dx, MKUSD, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        let deposit = base
            .calc_token_amount(&[U256::zero(), dx], true, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        check!(!deposited.base_fee.is_zero());
        assert_eq!(deposited.base_fee, deposit.fees[1], "deposit fee of the base pool");

        let applied = meta
            .apply(&mut base, &Trade::new(USDC, dx, MKUSD), NOW)
            .unwrap_or_else(|err| panic!("Should apply: {err:?}"));
        assert_eq!(applied.base_fee, deposited.base_fee);
    }

    #[test]
    fn applies_trades_in_sequence() {
        let (mut meta, mut base) = pools(BASE_PYUSD_USDC_LATER, META_MKUSD_LATER);
        for (step, (token_in, amount_in, token_out, expected)) in MKUSD_TRADES.into_iter().enumerate()
        {
            let quote = meta
                .quote_out(&base, token_in, u(amount_in), token_out, NOW)
                .unwrap_or_else(|err| panic!("Should quote trade {step}: {err:?}"));
            assert_eq!(quote.amount, u(expected), "quote of trade {step}");
            let applied = meta
                .apply(&mut base, &Trade::new(token_in, u(amount_in), token_out), NOW)
                .unwrap_or_else(|err| panic!("Should apply trade {step}: {err:?}"));
            assert_eq!(applied, quote, "trade {step} executes as quoted");
            assert_eq!(
                meta.inner().rates()[1],
                base.virtual_price(NOW)
                    .unwrap_or_else(|err| panic!("Should compute: {err:?}"))
                    .0,
                "LP rate follows the base pool after trade {step}"
            );
        }
    }

    #[test]
    fn composes_with_plain_base_pool() {
        let base = PlainPool::from_json(BASE_3POOL)
            .unwrap_or_else(|err| panic!("Should load base pool: {err:?}"));
        let meta = NgMetaPool::from_json(META_USDV)
            .unwrap_or_else(|err| panic!("Should load meta pool: {err:?}"));
        let dx = u(1_000_000);

        let quote = meta
            .quote_out(&base, USDV, dx, DAI, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        let lp = meta
            .inner()
            .get_dy(0, 1, dx, None, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        let manual = base
            .calc_withdraw_one_coin(lp.amount, 0, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        assert_eq!(quote.amount, manual.amount);

        let amount_in = u(1_000_000);
        let quote = meta
            .quote_out(&base, USDT, amount_in, USDV, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        let minted = base
            .calc_token_amount(&[U256::zero(), U256::zero(), amount_in], true, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        let manual = meta
            .inner()
            .get_dy(1, 0, minted.lp_amount, None, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        assert_eq!(quote.amount, manual.amount);

        assert_eq!(
            meta.quote_out(&base, USDC, amount_in, USDT, NOW),
            Err(PoolError::BaseToBaseRoute)
        );
    }

    #[test]
    fn lists_reachable_tokens() {
        let (meta, base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        assert_eq!(
            meta.can_swap_to(&base, MKUSD),
            vec![PYUSD_USDC_LP, PYUSD, USDC]
        );
        assert_eq!(meta.can_swap_to(&base, PYUSD_USDC_LP), vec![MKUSD]);
        assert_eq!(meta.can_swap_to(&base, PYUSD), vec![MKUSD]);
        assert_eq!(meta.can_swap_to(&base, &USDC.to_uppercase()), vec![MKUSD]);
        check!(meta.can_swap_to(&base, USDV).is_empty());
    }

    #[test]
    fn rejects_invalid_routes() {
        let (mut meta, mut base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        let before = (meta.clone(), base.clone());
        let dx = u(5_000_000);

        assert_eq!(
            meta.quote_out(&base, PYUSD, dx, USDC, NOW),
            Err(PoolError::BaseToBaseRoute)
        );
        assert_eq!(
            meta.quote_out(&base, PYUSD_USDC_LP, dx, USDC, NOW),
            Err(PoolError::BaseToBaseRoute),
            "LP redemptions go through the base pool"
        );
        assert_eq!(
            meta.quote_out(&base, MKUSD, dx, MKUSD, NOW),
            Err(PoolError::IdenticalTokens)
        );
        assert_eq!(
            meta.quote_out(&base, PYUSD, U256::zero(), MKUSD, NOW),
            Err(PoolError::ZeroAmount)
        );
        assert!(matches!(
            meta.quote_out(&base, USDV, dx, MKUSD, NOW),
            Err(PoolError::UnknownToken(_))
        ));
        assert_eq!(
            meta.apply(&mut base, &Trade::new(PYUSD, dx, USDC), NOW),
            Err(PoolError::BaseToBaseRoute)
        );
        assert_eq!((meta.clone(), base.clone()), before, "failed trades change nothing");

        let mut other_base = BasePoolKind::from_json(BASE_3POOL)
            .unwrap_or_else(|err| panic!("Should load base pool: {err:?}"));
        assert_eq!(
            meta.quote_out(&other_base, MKUSD, dx, DAI, NOW),
            Err(PoolError::BasePoolMismatch)
        );
        check!(meta.with_base(&mut other_base).is_err());
    }

    #[test]
    fn bound_pool_routes_through_both_pools() {
        let (mut meta, mut base) = pools(BASE_PYUSD_USDC_LATER, META_MKUSD_LATER);
        let expected = meta
            .quote_out(&base, USDC, u(5_000_000), MKUSD, NOW)
            .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
        let (usdc_before, supply_before) = (base.balances()[1], BasePool::lp_supply(&base));
        {
            let mut bound = meta
                .with_base(&mut base)
                .unwrap_or_else(|err| panic!("Should bind: {err:?}"));
            assert_eq!(Pool::address(&bound), "0x9e10f9fb6f0d32b350cee2618662243d4f24c64a");
            assert_eq!(bound.tokens(), [MKUSD, PYUSD_USDC_LP, PYUSD, USDC]);
            let quote = bound
                .quote_out(USDC, u(5_000_000), MKUSD, NOW)
                .unwrap_or_else(|err| panic!("Should quote: {err:?}"));
            assert_eq!(quote, expected);
            let applied = bound
                .apply(&Trade::new(USDC, u(5_000_000), MKUSD), NOW)
                .unwrap_or_else(|err| panic!("Should apply: {err:?}"));
            assert_eq!(applied, expected);
        }
        check!(BasePool::lp_supply(&base) > supply_before, "deposit minted base LP");
        check!(base.balances()[1] > usdc_before);
        check!(base.balances()[1] <= usdc_before + u(5_000_000));
        check!(meta.inner().reserves()[0] < u(1_400_402_037_639_032_709_376_918));
    }

    #[test]
    fn state_survives_binary_encoding() {
        let (mut meta, mut base) = pools(BASE_PYUSD_USDC, META_MKUSD);
        meta.apply(&mut base, &Trade::new(MKUSD, u(5_000_000_000_000_000_000), USDC), NOW)
            .unwrap_or_else(|err| panic!("Should apply: {err:?}"));
        let decoded = NgMetaPool::decode(&mut meta.encode().as_slice())
            .unwrap_or_else(|err| panic!("Should decode: {err:?}"));
        assert_eq!(decoded, meta);
        let decoded = BasePoolKind::decode(&mut base.encode().as_slice())
            .unwrap_or_else(|err| panic!("Should decode: {err:?}"));
        assert_eq!(decoded, base);
    }

    proptest! {
        #[test]
        fn withdrawing_route_never_beats_the_lp_leg(dx in 1_000_000_000_000_000u128..100_000_000_000_000_000_000_000) {
            let (meta, base) = pools(BASE_PYUSD_USDC, META_MKUSD);
            let dx = U256::from(dx);
            let lp = meta
                .quote_out(&base, MKUSD, dx, PYUSD_USDC_LP, NOW)
                .unwrap_or_else(|err| panic!("Should quote: {err:?}"))
                .amount;
            let out = meta
                .quote_out(&base, MKUSD, dx, USDC, NOW)
                .unwrap_or_else(|err| panic!("Should quote: {err:?}"))
                .amount;
            // USDC has 6 decimals, the LP 18; the base virtual price is close to 1
            prop_assert!(out * U256::exp10(12) <= lp * U256::from(1_000_100_000u64) / U256::from(1_000_000_000u64));
        }
    }
}
