use crate::{
    constants::FEE_DENOMINATOR,
    math::{mul_div, MathError},
};
use primitive_types::U256;

/// Fee configuration of a stable pool. All fractions have `FEE_DENOMINATOR` precision.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct Fees {
    pub swap_fee: U256,
    pub admin_fee: U256,
    /// Values at or below `FEE_DENOMINATOR` disable the dynamic fee.
    pub offpeg_fee_multiplier: U256,
}

impl Fees {
    pub fn new(swap_fee: U256, admin_fee: U256) -> Self {
        Self {
            swap_fee,
            admin_fee,
            offpeg_fee_multiplier: U256::zero(),
        }
    }

    pub fn with_offpeg_fee_multiplier(self, offpeg_fee_multiplier: U256) -> Self {
        Self {
            offpeg_fee_multiplier,
            ..self
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Scales `fee` up as the normalized balances `xpi` and `xpj` move away from parity.
    ///
    /// Returns `fee` unchanged when the offpeg multiplier is disabled.
    pub fn dynamic_fee(&self, xpi: U256, xpj: U256, fee: U256) -> Result<U256, MathError> {
        let denominator = U256::from(FEE_DENOMINATOR);
        if self.offpeg_fee_multiplier <= denominator {
            return Ok(fee);
        }
        // (xpi + xpj)^2
        let xps2 = xpi
            .checked_add(xpj)
            .ok_or(MathError::AddOverflow(70))?
            .checked_pow(2.into())
            .ok_or(MathError::MulOverflow(70))?;
        // (m - 1e10) * 4 * xpi * xpj / xps2 + 1e10
        let skew = (self.offpeg_fee_multiplier - denominator)
            .checked_mul(4.into())
            .ok_or(MathError::MulOverflow(71))?
            .checked_mul(xpi)
            .ok_or(MathError::MulOverflow(72))?
            .checked_mul(xpj)
            .ok_or(MathError::MulOverflow(73))?
            .checked_div(xps2)
            .ok_or(MathError::DivByZero(70))?
            .checked_add(denominator)
            .ok_or(MathError::AddOverflow(71))?;
        mul_div(self.offpeg_fee_multiplier, fee, skew, 74)
    }

    /// Fee rate charged on an exchange between coins with normalized balances `xpi` and `xpj`.
    pub fn swap_fee_at(&self, xpi: U256, xpj: U256) -> Result<U256, MathError> {
        self.dynamic_fee(xpi, xpj, self.swap_fee)
    }

    /// Fee rate applied to the imbalanced part of a liquidity operation.
    /// https://github.com/curvefi/curve-contract/blob/e5fb8c0e0bcd2fe2e03634135806c0f36b245511/tests/simulation.py#L124
    pub fn normalized_trade_fee(&self, num_coins: usize) -> Result<U256, MathError> {
        let n = U256::from(num_coins);
        mul_div(
            self.swap_fee,
            n,
            n.checked_sub(1.into())
                .ok_or(MathError::SubUnderflow(70))?
                .checked_mul(4.into())
                .ok_or(MathError::MulOverflow(75))?,
            76,
        )
    }

    /// Admin share of a fee amount.
    pub fn admin_trade_fee(&self, fee_amount: U256) -> Result<U256, MathError> {
        mul_div(fee_amount, self.admin_fee, FEE_DENOMINATOR.into(), 77)
    }
}

/// `amount * fee / FEE_DENOMINATOR`
pub fn fee_amount(amount: U256, fee: U256) -> Result<U256, MathError> {
    mul_div(amount, fee, FEE_DENOMINATOR.into(), 78)
}
