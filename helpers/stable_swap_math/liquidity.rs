use super::{compute_d, compute_y_d, fees::Fees, normalize, Scratch, StableCurve, SwapResult};
use crate::{
    constants::FEE_DENOMINATOR,
    ensure,
    math::{abs_diff, mul_div, precision, MathError},
    InvariantError,
};
use primitive_types::U256;

/// LP amount minted (or burned) by an imbalanced liquidity change.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityQuote {
    pub lp_amount: U256,
    /// Ideal-balance fee charged on each coin, in token units.
    pub fees: Scratch,
    /// Admin share of `fees`, retained by the pool.
    pub admin_fees: Scratch,
}

/// Computes the LP amount for depositing (or withdrawing) `amounts`.
///
/// Each coin is charged a fee on its distance from the ideal balance `D1 * old_i / D0`.
/// An empty pool mints `D1` without fees.
#[allow(clippy::too_many_arguments)]
pub fn compute_lp_amount(
    amounts: &[U256],
    is_deposit: bool,
    rates: &[U256],
    balances: &[U256],
    pool_token_supply: U256,
    fees: &Fees,
    curve: &StableCurve,
) -> Result<LiquidityQuote, InvariantError> {
    let n = balances.len();
    // Initial invariant, nothing to solve for before the first deposit
    let d_0 = if pool_token_supply.is_zero() {
        U256::zero()
    } else {
        compute_d(&normalize(rates, balances)?[..n], curve)?
    };

    let mut new_balances = Scratch::default();
    for i in 0..n {
        new_balances[i] = if is_deposit {
            balances[i]
                .checked_add(amounts[i])
                .ok_or(MathError::AddOverflow(110))?
        } else {
            ensure!(balances[i] >= amounts[i], InvariantError::ReserveTooSmall);
            balances[i] - amounts[i]
        };
    }
    // Invariant after change
    let d_1 = compute_d(&normalize(rates, &new_balances[..n])?[..n], curve)?;

    let mut quote = LiquidityQuote::default();
    if pool_token_supply.is_zero() {
        // Take the dust if there was any
        quote.lp_amount = d_1;
        return Ok(quote);
    }

    // Recalculate the invariant accounting for fees
    let base_fee = fees.normalized_trade_fee(n)?;
    let ys = d_0
        .checked_add(d_1)
        .ok_or(MathError::AddOverflow(111))?
        / n;
    for i in 0..n {
        let ideal_balance = mul_div(d_1, balances[i], d_0, 110)?;
        let difference = abs_diff(ideal_balance, new_balances[i]);
        let xs = mul_div(
            rates[i],
            balances[i]
                .checked_add(new_balances[i])
                .ok_or(MathError::AddOverflow(112))?,
            precision(),
            111,
        )?;
        let fee_rate = fees.dynamic_fee(xs, ys, base_fee)?;
        quote.fees[i] = mul_div(fee_rate, difference, FEE_DENOMINATOR.into(), 112)?;
        quote.admin_fees[i] = fees.admin_trade_fee(quote.fees[i])?;
        new_balances[i] = new_balances[i]
            .checked_sub(quote.fees[i])
            .ok_or(MathError::SubUnderflow(110))?;
    }
    let d_2 = compute_d(&normalize(rates, &new_balances[..n])?[..n], curve)?;

    // d1 > d2 > d0 on deposit, d0 > d2 > d1 on withdrawal
    let diff = if is_deposit {
        d_2.checked_sub(d_0).ok_or(MathError::SubUnderflow(111))?
    } else {
        d_0.checked_sub(d_2).ok_or(MathError::SubUnderflow(112))?
    };
    quote.lp_amount = mul_div(diff, pool_token_supply, d_0, 113)?;
    Ok(quote)
}

/// Computes the payout for burning `lp_amount` LP tokens into coin `i` alone.
///
/// Returns the net amount, the fee kept in the pool and its admin share.
pub fn compute_withdraw_one_coin(
    lp_amount: U256,
    i: usize,
    rates: &[U256],
    balances: &[U256],
    pool_token_supply: U256,
    fees: &Fees,
    curve: &StableCurve,
) -> Result<SwapResult, InvariantError> {
    let n = balances.len();
    let xp = normalize(rates, balances)?;
    let xp = &xp[..n];
    let d_0 = compute_d(xp, curve)?;
    let d_1 = d_0
        .checked_sub(mul_div(lp_amount, d_0, pool_token_supply, 120)?)
        .ok_or(MathError::SubUnderflow(120))?;
    let new_y = compute_y_d(i, xp, curve, d_1)?;

    let base_fee = fees.normalized_trade_fee(n)?;
    let ys = d_0
        .checked_add(d_1)
        .ok_or(MathError::AddOverflow(120))?
        / (2 * n);
    let mut xp_reduced = Scratch::default();
    for j in 0..n {
        let expected_at_d1 = mul_div(xp[j], d_1, d_0, 121)?;
        let (dx_expected, xavg) = if j == i {
            (
                expected_at_d1
                    .checked_sub(new_y)
                    .ok_or(MathError::SubUnderflow(121))?,
                xp[j].checked_add(new_y).ok_or(MathError::AddOverflow(121))? / 2,
            )
        } else {
            (
                xp[j]
                    .checked_sub(expected_at_d1)
                    .ok_or(MathError::SubUnderflow(122))?,
                xp[j],
            )
        };
        let fee_rate = fees.dynamic_fee(xavg, ys, base_fee)?;
        xp_reduced[j] = xp[j]
            .checked_sub(mul_div(fee_rate, dx_expected, FEE_DENOMINATOR.into(), 122)?)
            .ok_or(MathError::SubUnderflow(123))?;
    }

    let dy = xp_reduced[i]
        .checked_sub(compute_y_d(i, &xp_reduced[..n], curve, d_1)?)
        .ok_or(MathError::SubUnderflow(124))?;
    ensure!(!dy.is_zero(), InvariantError::ReserveTooSmall);
    // w/o fees
    let dy_0 = mul_div(
        xp[i].checked_sub(new_y).ok_or(MathError::SubUnderflow(125))?,
        precision(),
        rates[i],
        123,
    )?;
    // Withdraw less to account for rounding errors
    let amount = mul_div(dy - 1, precision(), rates[i], 124)?;
    let fee = dy_0
        .checked_sub(amount)
        .ok_or(MathError::SubUnderflow(126))?;
    Ok(SwapResult {
        amount,
        fee,
        admin_fee: fees.admin_trade_fee(fee)?,
    })
}

/// `D * 1e18 / supply`
pub fn compute_virtual_price(
    rates: &[U256],
    balances: &[U256],
    pool_token_supply: U256,
    curve: &StableCurve,
) -> Result<(U256, U256), InvariantError> {
    ensure!(
        !pool_token_supply.is_zero(),
        InvariantError::MathError(MathError::DivByZero(130))
    );
    let d = compute_d(&normalize(rates, balances)?[..balances.len()], curve)?;
    Ok((mul_div(d, precision(), pool_token_supply, 130)?, d))
}
