pub mod fees;
pub mod price;

use alloy_primitives::I256;
use primitive_types::U256;

use crate::{
    constants::{
        crypto_pool::{
            A_MULTIPLIER, MAX_A, MAX_D, MAX_FRAC, MAX_GAMMA, MAX_ITERATIONS, MIN_A, MIN_D,
            MIN_FRAC, MIN_GAMMA, N_COINS,
        },
        PRECISION,
    },
    ensure,
    math::{
        abs_diff, cbrt, geometric_mean, precision, signed, to_signed, to_unsigned, unsigned_abs,
        MathError,
    },
    InvariantError,
};

/// Balances of a three-coin pool in the internal price-scaled units.
pub type Xp = [U256; N_COINS];

fn sadd(a: I256, b: I256, code: u8) -> Result<I256, MathError> {
    a.checked_add(b).ok_or(MathError::AddOverflow(code))
}

fn ssub(a: I256, b: I256, code: u8) -> Result<I256, MathError> {
    a.checked_sub(b).ok_or(MathError::SubUnderflow(code))
}

fn smul(a: I256, b: I256, code: u8) -> Result<I256, MathError> {
    a.checked_mul(b).ok_or(MathError::MulOverflow(code))
}

fn sdiv(a: I256, b: I256, code: u8) -> Result<I256, MathError> {
    a.checked_div(b).ok_or(MathError::DivByZero(code))
}

fn signed_cbrt(value: I256) -> Result<I256, MathError> {
    let root = to_signed(cbrt(unsigned_abs(value))?)?;
    Ok(if value.is_negative() { -root } else { root })
}

fn check_a_gamma(ann: U256, gamma: U256) -> Result<(), InvariantError> {
    ensure!(
        ann >= MIN_A.into() && ann <= MAX_A.into(),
        InvariantError::UnsafeA
    );
    ensure!(
        gamma >= MIN_GAMMA.into() && gamma <= MAX_GAMMA.into(),
        InvariantError::UnsafeGamma
    );
    Ok(())
}

fn check_y_inputs(
    ann: U256,
    gamma: U256,
    x: &Xp,
    d: U256,
    i: usize,
) -> Result<(), InvariantError> {
    check_a_gamma(ann, gamma)?;
    ensure!(
        d >= MIN_D.into() && d <= MAX_D.into(),
        InvariantError::UnsafeD
    );
    ensure!(i < N_COINS, InvariantError::UnsafeX);
    for (k, x_k) in x.iter().enumerate() {
        if k != i {
            let frac = x_k
                .checked_mul(precision())
                .ok_or(MathError::MulOverflow(140))?
                / d;
            ensure!(
                frac >= MIN_FRAC.into() && frac <= MAX_FRAC.into(),
                InvariantError::UnsafeX
            );
        }
    }
    Ok(())
}

/// Solves the three-coin invariant for D with Newton's method.
///
/// `k0_prev` is the K0 left by a previous [`get_y`] call and seeds the first guess.
/// Pass zero to start from `3 * geometric_mean(x)`.
pub fn newton_d(
    ann: U256,
    gamma: U256,
    x_unsorted: &Xp,
    k0_prev: U256,
) -> Result<U256, InvariantError> {
    check_a_gamma(ann, gamma)?;

    let mut x = *x_unsorted;
    x.sort_unstable_by(|a, b| b.cmp(a));
    ensure!(!x[0].is_zero(), InvariantError::UnsafeX);

    let s = x
        .iter()
        .try_fold(U256::zero(), |acc, x_i| acc.checked_add(*x_i))
        .ok_or(MathError::AddOverflow(140))?;

    let mut d = if k0_prev.is_zero() {
        geometric_mean(&x)?
            .checked_mul(3.into())
            .ok_or(MathError::MulOverflow(141))?
    } else {
        let (scale, factor) = if s > U256::exp10(36) {
            (U256::exp10(36), U256::from(27) * U256::exp10(12))
        } else if s > U256::exp10(24) {
            (U256::exp10(24), U256::from(27) * U256::exp10(6))
        } else {
            (U256::exp10(18), U256::from(27))
        };
        let prod = x[0]
            .checked_mul(x[1])
            .ok_or(MathError::MulOverflow(142))?
            / scale;
        cbrt(
            prod.checked_mul(x[2])
                .ok_or(MathError::MulOverflow(143))?
                .checked_div(k0_prev)
                .ok_or(MathError::DivByZero(140))?
                .checked_mul(factor)
                .ok_or(MathError::MulOverflow(144))?,
        )?
    };

    let one = precision();
    let n = U256::from(N_COINS);
    for _ in 0..MAX_ITERATIONS {
        let d_prev = d;

        // K0 = 27 * x0 * x1 * x2 / D^3, with 18 decimals
        let mut k0 = U256::from(27) * one;
        for x_i in x {
            k0 = k0
                .checked_mul(x_i)
                .ok_or(MathError::MulOverflow(145))?
                .checked_div(d)
                .ok_or(MathError::DivByZero(141))?;
        }

        let mut g1k0 = gamma + one;
        g1k0 = abs_diff(g1k0, k0) + 1;

        // D / gamma^2 * g1k0^2 / A
        let mul1 = (one
            .checked_mul(d)
            .ok_or(MathError::MulOverflow(146))?
            / gamma)
            .checked_mul(g1k0)
            .ok_or(MathError::MulOverflow(147))?
            / gamma;
        let mul1 = mul1
            .checked_mul(g1k0)
            .ok_or(MathError::MulOverflow(148))?
            .checked_mul(A_MULTIPLIER.into())
            .ok_or(MathError::MulOverflow(149))?
            / ann;
        // 2 * N * K0 / g1k0
        let mul2 = (U256::from(2) * one * n)
            .checked_mul(k0)
            .ok_or(MathError::MulOverflow(150))?
            / g1k0;

        // S + S * mul2 + mul1 * N / K0 - mul2 * D
        let neg_fprime = s
            .checked_add(s.checked_mul(mul2).ok_or(MathError::MulOverflow(151))? / one)
            .ok_or(MathError::AddOverflow(141))?
            .checked_add(
                mul1.checked_mul(n)
                    .ok_or(MathError::MulOverflow(152))?
                    .checked_div(k0)
                    .ok_or(MathError::DivByZero(142))?,
            )
            .ok_or(MathError::AddOverflow(142))?
            .checked_sub(mul2.checked_mul(d).ok_or(MathError::MulOverflow(153))? / one)
            .ok_or(MathError::SubUnderflow(140))?;

        let d_plus = d
            .checked_mul(neg_fprime.checked_add(s).ok_or(MathError::AddOverflow(143))?)
            .ok_or(MathError::MulOverflow(154))?
            .checked_div(neg_fprime)
            .ok_or(MathError::DivByZero(143))?;
        let mut d_minus = d.checked_mul(d).ok_or(MathError::MulOverflow(155))? / neg_fprime;
        let correction = |delta: U256| -> Result<U256, MathError> {
            Ok((d
                .checked_mul(mul1 / neg_fprime)
                .ok_or(MathError::MulOverflow(156))?
                / one)
                .checked_mul(delta)
                .ok_or(MathError::MulOverflow(157))?
                / k0)
        };
        if one > k0 {
            d_minus = d_minus
                .checked_add(correction(one - k0)?)
                .ok_or(MathError::AddOverflow(144))?;
        } else {
            d_minus = d_minus
                .checked_sub(correction(k0 - one)?)
                .ok_or(MathError::SubUnderflow(141))?;
        }

        d = if d_plus > d_minus {
            d_plus - d_minus
        } else {
            (d_minus - d_plus) / 2
        };

        let diff = abs_diff(d, d_prev);
        // Tolerance is 1e-14 relative, but never tighter than 1e16 / 1e14
        if diff.checked_mul(U256::exp10(14)).ok_or(MathError::MulOverflow(158))?
            < d.max(U256::exp10(16))
        {
            for x_i in x {
                let frac = x_i
                    .checked_mul(one)
                    .ok_or(MathError::MulOverflow(159))?
                    / d;
                ensure!(
                    frac >= U256::from(MIN_FRAC - 1) && frac <= U256::from(MAX_FRAC + 1),
                    InvariantError::UnsafeX
                );
            }
            return Ok(d);
        }
    }
    Err(InvariantError::DNotConverged)
}

/// Calculates `x[i]` given the other balances and D, by solving the invariant as a cubic.
///
/// Returns `(y, K0)`. When the discriminant is not positive the cubic form is unusable and
/// the value comes from [`newton_y`] instead, with a zero K0.
pub fn get_y(
    ann: U256,
    gamma: U256,
    x: &Xp,
    d: U256,
    i: usize,
) -> Result<(U256, U256), InvariantError> {
    check_y_inputs(ann, gamma, x, d, i)?;

    let (j, k) = match i {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let x_j = to_signed(x[j])?;
    let x_k = to_signed(x[k])?;
    let ann_s = to_signed(ann)?;
    let gamma_s = to_signed(gamma)?;
    let d_s = to_signed(d)?;
    let e18 = signed(PRECISION);
    let e36 = signed(PRECISION * PRECISION);
    let gamma2 = smul(gamma_s, gamma_s, 160)?;
    let a_mul = signed(A_MULTIPLIER);

    // Coefficients of a*y^3 + b*y^2 + c*y + d = 0, all scaled by y
    let a = signed(PRECISION * PRECISION / 27);

    let b = sdiv(e36, signed(9), 161)?;
    let b = sadd(b, sdiv(smul(signed(2) * e18, gamma_s, 161)?, signed(27), 162)?, 160)?;
    let b_tail = smul(smul(sdiv(smul(d_s, d_s, 162)?, x_j, 163)?, gamma2, 163)?, ann_s, 164)?;
    let b_tail = sdiv(sdiv(sdiv(b_tail, signed(729), 164)?, a_mul, 165)?, x_k, 166)?;
    let b = ssub(b, b_tail, 160)?;

    let c = sdiv(e36, signed(9), 167)?;
    let c = sadd(
        c,
        sdiv(smul(gamma_s, sadd(gamma_s, signed(4) * e18, 161)?, 165)?, signed(27), 168)?,
        162,
    )?;
    let c_tail = smul(gamma2, ssub(sadd(x_j, x_k, 163)?, d_s, 161)?, 166)?;
    let c_tail = smul(sdiv(c_tail, d_s, 169)?, ann_s, 167)?;
    let c = sadd(c, sdiv(sdiv(c_tail, signed(27), 170)?, a_mul, 171)?, 164)?;

    let g1 = sadd(e18, gamma_s, 165)?;
    let d_coef = sdiv(smul(g1, g1, 168)?, signed(27), 172)?;

    // Rescale the coefficients to keep the discriminant within 256 bits
    let d0 = unsigned_abs(ssub(
        sdiv(smul(smul(signed(3), a, 169)?, c, 170)?, b, 173)?,
        b,
        162,
    )?);
    let mut divider = signed(1);
    for exponent in (20..=48).rev().step_by(4) {
        if d0 > U256::exp10(exponent) {
            divider = to_signed(U256::exp10(exponent - 18))?;
            break;
        }
    }

    let (a, b, c, d_coef) = if a.abs() > b.abs() {
        let additional_prec = sdiv(a, b, 174)?.abs();
        let scale = |v: I256| -> Result<I256, MathError> {
            sdiv(smul(v, additional_prec, 171)?, divider, 175)
        };
        (scale(a)?, scale(b)?, scale(c)?, scale(d_coef)?)
    } else {
        let additional_prec = sdiv(b, a, 176)?.abs();
        let scale = |v: I256| -> Result<I256, MathError> {
            sdiv(sdiv(v, additional_prec, 177)?, divider, 178)
        };
        (scale(a)?, scale(b)?, scale(c)?, scale(d_coef)?)
    };

    let three_ac = smul(smul(signed(3), a, 172)?, c, 173)?;
    let delta0 = ssub(sdiv(three_ac, b, 179)?, b, 163)?;
    let delta1 = ssub(
        ssub(
            sdiv(smul(signed(3), three_ac, 174)?, b, 180)?,
            smul(signed(2), b, 175)?,
            164,
        )?,
        sdiv(
            smul(sdiv(smul(smul(signed(27), a, 176)?, a, 177)?, b, 181)?, d_coef, 178)?,
            b,
            182,
        )?,
        165,
    )?;
    let sqrt_arg = sadd(
        smul(delta1, delta1, 179)?,
        smul(
            sdiv(smul(smul(signed(4), delta0, 180)?, delta0, 181)?, b, 183)?,
            delta0,
            182,
        )?,
        166,
    )?;

    if sqrt_arg <= I256::ZERO {
        log::debug!("cubic discriminant is not positive, solving y for coin {i} with Newton");
        return Ok((newton_y(ann, gamma, x, d, i)?, U256::zero()));
    }

    let sqrt_val = to_signed(to_unsigned(sqrt_arg)?.integer_sqrt())?;
    let b_cbrt = signed_cbrt(b)?;
    let second_cbrt = if delta1 > I256::ZERO {
        signed_cbrt(sdiv(sadd(delta1, sqrt_val, 167)?, signed(2), 184)?)?
    } else {
        -signed_cbrt(sdiv(ssub(sqrt_val, delta1, 166)?, signed(2), 185)?)?
    };

    let c1 = sdiv(
        smul(sdiv(smul(b_cbrt, b_cbrt, 183)?, e18, 186)?, second_cbrt, 184)?,
        e18,
        187,
    )?;
    let root_k0 = sdiv(
        ssub(sadd(b, sdiv(smul(b, delta0, 185)?, c1, 188)?, 168)?, c1, 167)?,
        signed(3),
        189,
    )?;

    // D^3 / 27 / x_j / x_k * root_K0 / a
    let root = sdiv(smul(d_s, d_s, 186)?, signed(27), 190)?;
    let root = sdiv(smul(sdiv(root, x_k, 191)?, d_s, 187)?, x_j, 192)?;
    let root = sdiv(smul(root, root_k0, 188)?, a, 193)?;
    let k0 = sdiv(smul(e18, root_k0, 189)?, a, 194)?;

    ensure!(!root.is_negative(), InvariantError::UnsafeY);
    let y = to_unsigned(root)?;
    let frac = y.checked_mul(precision()).ok_or(MathError::MulOverflow(190))? / d;
    ensure!(
        frac >= U256::from(MIN_FRAC - 1) && frac <= U256::from(MAX_FRAC + 1),
        InvariantError::UnsafeY
    );
    Ok((y, to_unsigned(k0.abs())?))
}

/// Calculates `x[i]` given the other balances and D with Newton's method.
pub fn newton_y(
    ann: U256,
    gamma: U256,
    x: &Xp,
    d: U256,
    i: usize,
) -> Result<U256, InvariantError> {
    check_y_inputs(ann, gamma, x, d, i)?;

    let one = precision();
    let n = U256::from(N_COINS);
    let mut x_sorted = *x;
    x_sorted[i] = U256::zero();
    x_sorted.sort_unstable_by(|a, b| b.cmp(a));

    let convergence_limit = (x_sorted[0] / U256::exp10(14))
        .max(d / U256::exp10(14))
        .max(100.into());

    let mut y = d / n;
    let mut s_i = U256::zero();
    for x_j in [x_sorted[1], x_sorted[0]] {
        y = y
            .checked_mul(d)
            .ok_or(MathError::MulOverflow(191))?
            .checked_div(x_j.checked_mul(n).ok_or(MathError::MulOverflow(192))?)
            .ok_or(MathError::DivByZero(195))?;
        s_i = s_i.checked_add(x_j).ok_or(MathError::AddOverflow(170))?;
    }
    let mut k0_i = one;
    for x_j in &x_sorted[..N_COINS - 1] {
        k0_i = k0_i
            .checked_mul(*x_j)
            .ok_or(MathError::MulOverflow(193))?
            .checked_mul(n)
            .ok_or(MathError::MulOverflow(194))?
            / d;
    }

    for _ in 0..MAX_ITERATIONS {
        let y_prev = y;

        let k0 = k0_i
            .checked_mul(y)
            .ok_or(MathError::MulOverflow(195))?
            .checked_mul(n)
            .ok_or(MathError::MulOverflow(196))?
            / d;
        let s = s_i.checked_add(y).ok_or(MathError::AddOverflow(171))?;

        let g1k0 = abs_diff(gamma + one, k0) + 1;

        let mul1 = (one
            .checked_mul(d)
            .ok_or(MathError::MulOverflow(197))?
            / gamma)
            .checked_mul(g1k0)
            .ok_or(MathError::MulOverflow(198))?
            / gamma;
        let mul1 = mul1
            .checked_mul(g1k0)
            .ok_or(MathError::MulOverflow(199))?
            .checked_mul(A_MULTIPLIER.into())
            .ok_or(MathError::MulOverflow(200))?
            / ann;
        let mul2 = one
            .checked_add(
                (U256::from(2) * one)
                    .checked_mul(k0)
                    .ok_or(MathError::MulOverflow(201))?
                    / g1k0,
            )
            .ok_or(MathError::AddOverflow(172))?;

        let mut yfprime = one
            .checked_mul(y)
            .ok_or(MathError::MulOverflow(202))?
            .checked_add(s.checked_mul(mul2).ok_or(MathError::MulOverflow(203))?)
            .ok_or(MathError::AddOverflow(173))?
            .checked_add(mul1)
            .ok_or(MathError::AddOverflow(174))?;
        let dyfprime = d.checked_mul(mul2).ok_or(MathError::MulOverflow(204))?;
        if yfprime < dyfprime {
            y = y_prev / 2;
            continue;
        }
        yfprime -= dyfprime;
        let fprime = yfprime.checked_div(y).ok_or(MathError::DivByZero(196))?;

        let mut y_minus = mul1.checked_div(fprime).ok_or(MathError::DivByZero(197))?;
        let y_plus = yfprime
            .checked_add(one.checked_mul(d).ok_or(MathError::MulOverflow(205))?)
            .ok_or(MathError::AddOverflow(175))?
            / fprime
            + y_minus
                .checked_mul(one)
                .ok_or(MathError::MulOverflow(206))?
                .checked_div(k0)
                .ok_or(MathError::DivByZero(198))?;
        y_minus = y_minus
            .checked_add(one.checked_mul(s).ok_or(MathError::MulOverflow(207))? / fprime)
            .ok_or(MathError::AddOverflow(176))?;

        y = if y_plus < y_minus {
            y_prev / 2
        } else {
            y_plus - y_minus
        };

        if abs_diff(y, y_prev) < convergence_limit.max(y / U256::exp10(14)) {
            let frac = y.checked_mul(one).ok_or(MathError::MulOverflow(208))? / d;
            ensure!(
                frac >= MIN_FRAC.into() && frac <= MAX_FRAC.into(),
                InvariantError::UnsafeY
            );
            return Ok(y);
        }
    }
    Err(InvariantError::YNotConverged)
}
