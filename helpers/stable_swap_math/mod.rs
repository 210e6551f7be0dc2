pub mod fees;
pub mod liquidity;

use crate::{
    constants::{stable_pool::MAX_ITERATIONS, FEE_DENOMINATOR, MAX_TOKENS},
    ensure,
    math::{abs_diff, mul_div, precision, MathError},
    InvariantError,
};
use primitive_types::U256;

use fees::{fee_amount, Fees};

/// Fixed-capacity scratch array, indexed by coin.
pub type Scratch = [U256; MAX_TOKENS];

/// How the product term of the invariant recurrence is accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum DVariant {
    /// `D_P = D_P * D / (x_i * n)` for every coin.
    Legacy,
    /// `D_P = D_P * D / x_i` for every coin, then `D_P / n^n` once.
    NextGen,
}

/// Ramp-resolved curve parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableCurve {
    /// A * A_PRECISION
    pub amp: U256,
    pub a_precision: U256,
    pub variant: DVariant,
}

/// Result of an exchange quote. Amounts are in token units, fees are charged on the output coin.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SwapResult {
    pub amount: U256,
    pub fee: U256,
    pub admin_fee: U256,
}

/// Rate-normalized balances: `balance * rate / 1e18`.
pub fn normalize(rates: &[U256], balances: &[U256]) -> Result<Scratch, MathError> {
    let mut xp = Scratch::default();
    for (i, (&rate, &balance)) in rates.iter().zip(balances).enumerate() {
        xp[i] = mul_div(rate, balance, precision(), 80)?;
    }
    Ok(xp)
}

/// Computes stable swap invariant (D)
pub fn compute_d(xp: &[U256], curve: &StableCurve) -> Result<U256, InvariantError> {
    ensure!(xp.iter().all(|x| !x.is_zero()), InvariantError::ZeroBalance);
    // SUM{x_i}
    let sum = xp.iter().try_fold(U256::zero(), |acc, &x| {
        acc.checked_add(x).ok_or(MathError::AddOverflow(80))
    })?;

    let n = U256::from(xp.len());
    // A * n
    let ann = curve
        .amp
        .checked_mul(n)
        .ok_or(MathError::MulOverflow(80))?;
    // A * n * SUM{x_i} / A_PRECISION
    let ann_sum = mul_div(ann, sum, curve.a_precision, 81)?;
    // A * n - A_PRECISION
    let ann_sub_one = ann
        .checked_sub(curve.a_precision)
        .ok_or(MathError::SubUnderflow(80))?;
    let mut d = sum;
    // Computes next D until satisfying precision is reached
    for _ in 0..MAX_ITERATIONS {
        let d_next = compute_d_next(d, xp, ann_sum, ann_sub_one, curve)?;
        if abs_diff(d_next, d) <= U256::one() {
            return Ok(d_next);
        }
        d = d_next;
    }
    Err(InvariantError::DNotConverged)
}

fn compute_d_next(
    d_prev: U256,
    xp: &[U256],
    ann_sum: U256,
    ann_sub_one: U256,
    curve: &StableCurve,
) -> Result<U256, MathError> {
    let n = U256::from(xp.len());
    let mut d_prod = d_prev;
    match curve.variant {
        DVariant::Legacy => {
            // d_prod = ... * [d_prev / (x_(i) * n)] * ...
            for &x in xp {
                d_prod = mul_div(
                    d_prod,
                    d_prev,
                    x.checked_mul(n).ok_or(MathError::MulOverflow(82))?,
                    83,
                )?;
            }
        }
        DVariant::NextGen => {
            // d_prod = ... * [d_prev / x_(i)] * ... / n^n
            for &x in xp {
                d_prod = mul_div(d_prod, d_prev, x, 84)?;
            }
            d_prod = d_prod
                .checked_div(n.checked_pow(n).ok_or(MathError::MulOverflow(85))?)
                .ok_or(MathError::DivByZero(80))?;
        }
    }
    // (Ann * S / A_PRECISION + D_P * n) * D
    let numerator = d_prod
        .checked_mul(n)
        .ok_or(MathError::MulOverflow(86))?
        .checked_add(ann_sum)
        .ok_or(MathError::AddOverflow(81))?
        .checked_mul(d_prev)
        .ok_or(MathError::MulOverflow(87))?;
    // (Ann - A_PRECISION) * D / A_PRECISION + (n + 1) * D_P
    let denominator = mul_div(ann_sub_one, d_prev, curve.a_precision, 88)?
        .checked_add(
            n.checked_add(1.into())
                .ok_or(MathError::AddOverflow(82))?
                .checked_mul(d_prod)
                .ok_or(MathError::MulOverflow(89))?,
        )
        .ok_or(MathError::AddOverflow(83))?;
    numerator
        .checked_div(denominator)
        .ok_or(MathError::DivByZero(81))
}

/// Returns the normalized balance of coin `j` after coin `i` is set to `x`, holding `d` fixed.
///
/// NOTICE: it does not check if `i` != `j`.
pub fn compute_y(
    i: usize,
    j: usize,
    x: U256,
    xp: &[U256],
    curve: &StableCurve,
    d: U256,
) -> Result<U256, InvariantError> {
    let others = xp
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != j)
        .map(|(k, &balance)| if k == i { x } else { balance });
    solve_y(others, xp.len(), curve, d)
}

/// Returns the normalized balance of coin `i` that satisfies the invariant `d`
/// with every other balance unchanged.
pub fn compute_y_d(
    i: usize,
    xp: &[U256],
    curve: &StableCurve,
    d: U256,
) -> Result<U256, InvariantError> {
    let others = xp
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != i)
        .map(|(_, &balance)| balance);
    solve_y(others, xp.len(), curve, d)
}

fn solve_y(
    others: impl Iterator<Item = U256>,
    num_coins: usize,
    curve: &StableCurve,
    d: U256,
) -> Result<U256, InvariantError> {
    let n = U256::from(num_coins);
    let ann = curve
        .amp
        .checked_mul(n)
        .ok_or(MathError::MulOverflow(90))?;

    let mut c = d;
    let mut sum = U256::zero();
    // sum = ... + x_(i') + ...
    // c = ... * d / (x_(i') * n) * ...
    // where i' in (0,n) AND i' != y index
    for x in others {
        ensure!(!x.is_zero(), InvariantError::ZeroBalance);
        sum = sum.checked_add(x).ok_or(MathError::AddOverflow(90))?;
        c = mul_div(
            c,
            d,
            x.checked_mul(n).ok_or(MathError::MulOverflow(91))?,
            92,
        )?;
    }
    // c = c * d * A_PRECISION / (Ann * n)
    c = mul_div(
        c.checked_mul(d).ok_or(MathError::MulOverflow(93))?,
        curve.a_precision,
        ann.checked_mul(n).ok_or(MathError::MulOverflow(94))?,
        95,
    )?;
    // sum + d * A_PRECISION / Ann
    let b = mul_div(d, curve.a_precision, ann, 96)?
        .checked_add(sum)
        .ok_or(MathError::AddOverflow(91))?; // d will be subtracted later

    let mut y = d;
    for _ in 0..MAX_ITERATIONS {
        let y_next = compute_y_next(y, b, c, d)?;
        if abs_diff(y_next, y) <= U256::one() {
            return Ok(y_next);
        }
        y = y_next;
    }
    Err(InvariantError::YNotConverged)
}

fn compute_y_next(y_prev: U256, b: U256, c: U256, d: U256) -> Result<U256, MathError> {
    let numerator = y_prev
        .checked_pow(2.into())
        .ok_or(MathError::MulOverflow(97))?
        .checked_add(c)
        .ok_or(MathError::AddOverflow(92))?;
    let denominator = y_prev
        .checked_mul(2.into())
        .ok_or(MathError::MulOverflow(98))?
        .checked_add(b)
        .ok_or(MathError::AddOverflow(93))?
        .checked_sub(d)
        .ok_or(MathError::SubUnderflow(82))?;
    numerator
        .checked_div(denominator)
        .ok_or(MathError::DivByZero(82))
}

/// Quotes an exchange of `dx` of coin `i` for coin `j`.
///
/// `d` may carry an invariant the caller already solved for the same balances.
/// NOTICE: it does not check if `i` != `j` or if the indices are out of bounds.
#[allow(clippy::too_many_arguments)]
pub fn swap_to(
    i: usize,
    dx: U256,
    j: usize,
    rates: &[U256],
    balances: &[U256],
    fees: &Fees,
    curve: &StableCurve,
    d: Option<U256>,
) -> Result<SwapResult, InvariantError> {
    let n = balances.len();
    let xp = normalize(rates, balances)?;
    let xp = &xp[..n];
    let d = match d {
        Some(d) => d,
        None => compute_d(xp, curve)?,
    };
    let x = mul_div(dx, rates[i], precision(), 100)?
        .checked_add(xp[i])
        .ok_or(MathError::AddOverflow(100))?;
    let y = compute_y(i, j, x, xp, curve, d)?;
    // sub 1 in case there are any rounding errors
    // https://github.com/curvefi/curve-contract/blob/b0bbf77f8f93c9c5f4e415bce9cd71f0cdee960e/contracts/pool-templates/base/SwapTemplateBase.vy#L466
    ensure!(xp[j] > y, InvariantError::ReserveTooSmall);
    let dy = xp[j] - y - 1;
    // fees are applied to "token_out" amount
    let fee_rate = fees.swap_fee_at(
        (xp[i] + x) / 2,
        xp[j].checked_add(y).ok_or(MathError::AddOverflow(102))? / 2,
    )?;
    let dy_fee = fee_amount(dy, fee_rate)?;
    let amount = mul_div(dy - dy_fee, precision(), rates[j], 101)?;
    Ok(SwapResult {
        amount,
        fee: mul_div(dy_fee, precision(), rates[j], 102)?,
        admin_fee: mul_div(fees.admin_trade_fee(dy_fee)?, precision(), rates[j], 103)?,
    })
}

/// Quotes the amount of coin `i` needed to receive `dy` of coin `j`.
///
/// The fee is charged on the output coin, at the rate implied by the current balances.
/// Legacy pools gross the output up in token units, next-gen pools in normalized units.
/// NOTICE: it does not check if `i` != `j` or if the indices are out of bounds.
#[allow(clippy::too_many_arguments)]
pub fn swap_from(
    j: usize,
    dy: U256,
    i: usize,
    rates: &[U256],
    balances: &[U256],
    fees: &Fees,
    curve: &StableCurve,
    d: Option<U256>,
) -> Result<SwapResult, InvariantError> {
    let n = balances.len();
    let xp = normalize(rates, balances)?;
    let xp = &xp[..n];
    let d = match d {
        Some(d) => d,
        None => compute_d(xp, curve)?,
    };
    let fee_rate = fees.swap_fee_at(xp[i], xp[j])?;
    let fee_denominator = U256::from(FEE_DENOMINATOR);
    let net_denominator = fee_denominator
        .checked_sub(fee_rate)
        .ok_or(MathError::SubUnderflow(100))?;
    // (y, fee charged in normalized units)
    let (dy_gross, dy_fee) = match curve.variant {
        DVariant::Legacy => {
            // gross up in token units, then normalize
            let gross = mul_div(dy, fee_denominator, net_denominator, 104)?;
            let dy_fee = mul_div(gross - dy, rates[j], precision(), 105)?;
            (mul_div(gross, rates[j], precision(), 106)?, dy_fee)
        }
        DVariant::NextGen => {
            // add 1 in case there are any rounding errors
            let dy_net = mul_div(dy, rates[j], precision(), 104)?
                .checked_add(1.into())
                .ok_or(MathError::AddOverflow(103))?;
            let gross = mul_div(dy_net, fee_denominator, net_denominator, 105)?;
            (gross, gross - dy_net)
        }
    };
    ensure!(xp[j] > dy_gross, InvariantError::ReserveTooSmall);
    let y = xp[j] - dy_gross;
    let x = compute_y(j, i, y, xp, curve, d)?;
    let dx = mul_div(
        x.checked_sub(xp[i]).ok_or(MathError::SubUnderflow(101))?,
        precision(),
        rates[i],
        106,
    )?;
    Ok(SwapResult {
        amount: dx,
        fee: mul_div(dy_fee, precision(), rates[j], 107)?,
        admin_fee: mul_div(fees.admin_trade_fee(dy_fee)?, precision(), rates[j], 108)?,
    })
}
