use primitive_types::U256;

use super::Xp;
use crate::{
    constants::{crypto_pool::A_MULTIPLIER, PRECISION},
    math::{mul_div, MathError},
};

/// Instantaneous prices of coins 1 and 2 in terms of coin 0, from the
/// derivative of the invariant at `xp`. Results are in price-scaled units.
pub fn get_p(xp: &Xp, d: U256, ann: U256, gamma: U256) -> Result<[U256; 2], MathError> {
    let e18 = U256::from(PRECISION);
    let e36 = U256::from(PRECISION * PRECISION);

    // K0 = 27 * prod(xp) / D^3, with 36 decimals
    let k0 = mul_div(
        mul_div(U256::from(27) * xp[0], xp[1], d, 220)?,
        xp[2],
        d,
        221,
    )?;
    let k0 = mul_div(k0, e36, d, 222)?;

    // 2 * K0^3 + (gamma + 1)^2 - K0^2 * (2 * gamma + 3)
    let k0_squared = mul_div(k0, k0, e36, 223)?;
    let g1 = gamma.checked_add(e18).ok_or(MathError::AddOverflow(220))?;
    let gk0 = mul_div(mul_div(U256::from(2) * k0, k0, e36, 224)?, k0, e36, 233)?
        .checked_add(g1.checked_mul(g1).ok_or(MathError::MulOverflow(220))?)
        .ok_or(MathError::AddOverflow(221))?
        .checked_sub(mul_div(
            k0_squared,
            U256::from(2) * gamma + U256::from(3) * e18,
            e18,
            225,
        )?)
        .ok_or(MathError::SubUnderflow(220))?;

    let nnag2 = mul_div(
        ann.checked_mul(gamma).ok_or(MathError::MulOverflow(221))?,
        gamma,
        A_MULTIPLIER.into(),
        226,
    )?;
    let skew = |x: U256, code: u8| -> Result<U256, MathError> {
        mul_div(mul_div(nnag2, x, d, code)?, k0, e36, code + 1)
    };
    let denominator = gk0
        .checked_add(skew(xp[0], 227)?)
        .ok_or(MathError::AddOverflow(222))?;

    let mut prices = [U256::zero(); 2];
    for (k, price) in prices.iter_mut().enumerate() {
        let numerator = gk0
            .checked_add(skew(xp[k + 1], 229)?)
            .ok_or(MathError::AddOverflow(223))?;
        *price = mul_div(
            mul_div(xp[0], numerator, xp[k + 1], 231)?,
            e18,
            denominator,
            232,
        )?;
    }
    Ok(prices)
}
