use primitive_types::U256;

use super::Xp;
use crate::{
    constants::crypto_pool::N_COINS,
    math::{mul_div, precision, MathError},
};

/// Fee parameters of a crypto pool. `mid_fee` and `out_fee` have 1e10 precision.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct CryptoFees {
    pub mid_fee: U256,
    pub out_fee: U256,
    pub fee_gamma: U256,
}

/// `fee_gamma / (fee_gamma + 1 - K)` where `K = prod(x) / (sum(x) / N)^N`.
///
/// Equals 1e18 for a balanced pool and approaches zero as it skews.
pub fn reduction_coefficient(x: &Xp, fee_gamma: U256) -> Result<U256, MathError> {
    let one = precision();
    let n = U256::from(N_COINS);
    let s = x
        .iter()
        .try_fold(U256::zero(), |acc, x_i| acc.checked_add(*x_i))
        .ok_or(MathError::AddOverflow(210))?;
    if s.is_zero() {
        return Err(MathError::DivByZero(210));
    }

    let mut k = one;
    for x_i in x {
        k = mul_div(
            k.checked_mul(n).ok_or(MathError::MulOverflow(210))?,
            *x_i,
            s,
            211,
        )?;
    }
    if !fee_gamma.is_zero() {
        k = mul_div(
            fee_gamma,
            one,
            fee_gamma
                .checked_add(one)
                .ok_or(MathError::AddOverflow(211))?
                .checked_sub(k)
                .ok_or(MathError::SubUnderflow(210))?,
            212,
        )?;
    }
    Ok(k)
}

impl CryptoFees {
    /// Fee rate for the balances `xp`, blending `mid_fee` and `out_fee`.
    pub fn fee_calc(&self, xp: &Xp) -> Result<U256, MathError> {
        let f = reduction_coefficient(xp, self.fee_gamma)?;
        let one = precision();
        self.mid_fee
            .checked_mul(f)
            .ok_or(MathError::MulOverflow(213))?
            .checked_add(
                self.out_fee
                    .checked_mul(one.checked_sub(f).ok_or(MathError::SubUnderflow(211))?)
                    .ok_or(MathError::MulOverflow(214))?,
            )
            .ok_or(MathError::AddOverflow(212))
            .map(|fee| fee / one)
    }
}
