use alloy_primitives::I256;
use primitive_types::U256;

use crate::{constants::PRECISION, InvariantError};

#[derive(Debug, PartialEq, Eq, Clone, Copy, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum MathError {
    AddOverflow(u8),
    CastOverflow(u8),
    DivByZero(u8),
    MulOverflow(u8),
    SubUnderflow(u8),
}

// 115792089237316195423570985008687907853269, the cube of which is just below 2^256 / 1e18.
const CBRT_LOWER: U256 = U256([0xca17a3aba173d3d5, 0x484932d2e725a5bb, 0x154, 0x0]);
// CBRT_LOWER * 1e18
const CBRT_UPPER: U256 = U256([
    0x4d542c5db2340000,
    0x5fe645cc4873f9e6,
    0x725dd1d243aba0e7,
    0x12,
]);
// 3822833074963236453042738258902158003155416615667
const EXP_SCALE: U256 = U256([0xee70ef65f9978af3, 0x63c32e5c2f6dc192, 0x29d9dc385, 0x0]);

pub fn precision() -> U256 {
    U256::from(PRECISION)
}

/// Returns `a * b / denom` with every step checked.
pub fn mul_div(a: U256, b: U256, denom: U256, code: u8) -> Result<U256, MathError> {
    a.checked_mul(b)
        .ok_or(MathError::MulOverflow(code))?
        .checked_div(denom)
        .ok_or(MathError::DivByZero(code))
}

pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Integer binary logarithm, optionally rounded up.
pub fn log2(x: U256, roundup: bool) -> u32 {
    let mut value = x;
    let mut result = 0u32;
    for shift in [128u32, 64, 32, 16, 8, 4, 2, 1] {
        if !(value >> shift as usize).is_zero() {
            value = value >> shift as usize;
            result += shift;
        }
    }
    if roundup && (U256::one() << result as usize) < x {
        result += 1;
    }
    result
}

/// Cube root of `x` with 18 decimal places, i.e. `cbrt(x * 1e36)` for small inputs.
///
/// Large inputs are pre-scaled by a smaller factor so the working value stays within 256 bits,
/// and the result is scaled back up accordingly.
pub fn cbrt(x: U256) -> Result<U256, MathError> {
    let xx = if x >= CBRT_UPPER {
        x
    } else if x >= CBRT_LOWER {
        x.checked_mul(U256::exp10(18))
            .ok_or(MathError::MulOverflow(30))?
    } else {
        x.checked_mul(U256::exp10(36))
            .ok_or(MathError::MulOverflow(31))?
    };

    let log2x = log2(xx, false);
    // 1.26 approximates the cube root of 2.
    let remainder = log2x % 3;
    let mut a = (U256::one() << (log2x / 3) as usize)
        .checked_mul(U256::from(1260u32).pow(remainder.into()))
        .ok_or(MathError::MulOverflow(32))?
        .checked_div(U256::from(1000u32).pow(remainder.into()))
        .ok_or(MathError::DivByZero(30))?;

    // Seven Newton rounds are enough for 256-bit inputs.
    for _ in 0..7 {
        let a_squared = a.checked_mul(a).ok_or(MathError::MulOverflow(33))?;
        a = a
            .checked_mul(2.into())
            .ok_or(MathError::MulOverflow(34))?
            .checked_add(xx.checked_div(a_squared).ok_or(MathError::DivByZero(31))?)
            .ok_or(MathError::AddOverflow(30))?
            / 3;
    }

    if x >= CBRT_UPPER {
        a.checked_mul(U256::exp10(12))
            .ok_or(MathError::MulOverflow(35))
    } else if x >= CBRT_LOWER {
        a.checked_mul(U256::exp10(6))
            .ok_or(MathError::MulOverflow(36))
    } else {
        Ok(a)
    }
}

/// Geometric mean of three values with 18 decimal places.
pub fn geometric_mean(x: &[U256; 3]) -> Result<U256, MathError> {
    let prod = mul_div(x[0], x[1], precision(), 37)?;
    cbrt(mul_div(prod, x[2], precision(), 38)?)
}

/// Converts to a signed word, failing for values of 2^255 and above.
pub fn to_signed(value: U256) -> Result<I256, MathError> {
    I256::try_from(alloy_primitives::U256::from_limbs(value.0))
        .map_err(|_| MathError::CastOverflow(30))
}

/// Converts back to an unsigned word, failing for negative values.
pub fn to_unsigned(value: I256) -> Result<U256, MathError> {
    if value.is_negative() {
        return Err(MathError::CastOverflow(31));
    }
    Ok(U256(value.into_raw().into_limbs()))
}

pub fn unsigned_abs(value: I256) -> U256 {
    U256(value.unsigned_abs().into_limbs())
}

pub fn signed(value: u128) -> I256 {
    I256::from_raw(alloy_primitives::U256::from(value))
}

fn signed_pow2(exponent: usize) -> I256 {
    I256::from_raw(alloy_primitives::U256::from(1u8) << exponent)
}

/// `e^(x / 1e18) * 1e18` for a signed fixed-point `x`.
///
/// Inputs below `-42.139678854452767551` round to zero. Inputs of `135.305999368893231589`
/// and above overflow.
pub fn wad_exp(x: I256) -> Result<U256, InvariantError> {
    if x <= -signed(42_139_678_854_452_767_551) {
        return Ok(U256::zero());
    }
    crate::ensure!(
        x < signed(135_305_999_368_893_231_589),
        InvariantError::ExpOverflow
    );

    // x / 1e18 in 96-bit fixed point
    let mut value = x
        .checked_mul(signed_pow2(78))
        .ok_or(MathError::MulOverflow(40))?
        .checked_div(signed(3_814_697_265_625))
        .ok_or(MathError::DivByZero(40))?;

    // k = round(x / ln 2), value = x - k * ln 2
    let ln2 = signed(54_916_777_467_707_473_351_141_471_128);
    let k = value
        .checked_mul(signed_pow2(96))
        .ok_or(MathError::MulOverflow(41))?
        .checked_div(ln2)
        .ok_or(MathError::DivByZero(41))?
        .checked_add(signed_pow2(95))
        .ok_or(MathError::AddOverflow(40))?
        .asr(96);
    value = value
        .checked_sub(k.checked_mul(ln2).ok_or(MathError::MulOverflow(42))?)
        .ok_or(MathError::SubUnderflow(40))?;

    // (6, 7)-term rational approximation of e^value
    let mut y = value
        .checked_add(signed(1_346_386_616_545_796_478_920_950_773_328))
        .ok_or(MathError::AddOverflow(41))?
        .checked_mul(value)
        .ok_or(MathError::MulOverflow(43))?
        .asr(96)
        .checked_add(signed(57_155_421_227_552_351_082_224_309_758_442))
        .ok_or(MathError::AddOverflow(42))?;
    let mut p = y
        .checked_add(value)
        .ok_or(MathError::AddOverflow(43))?
        .checked_sub(signed(94_201_549_194_550_492_254_356_042_504_812))
        .ok_or(MathError::SubUnderflow(41))?
        .checked_mul(y)
        .ok_or(MathError::MulOverflow(44))?
        .asr(96)
        .checked_add(signed(28_719_021_644_029_726_153_956_944_680_412_240))
        .ok_or(MathError::AddOverflow(44))?
        .checked_mul(value)
        .ok_or(MathError::MulOverflow(45))?;
    p = p
        .checked_add(
            signed(4_385_272_521_454_847_904_659_076_985_693_276)
                .checked_mul(signed_pow2(96))
                .ok_or(MathError::MulOverflow(46))?,
        )
        .ok_or(MathError::AddOverflow(45))?;

    let mut q = value
        .checked_sub(signed(2_855_989_394_907_223_263_936_484_059_900))
        .ok_or(MathError::SubUnderflow(42))?
        .checked_mul(value)
        .ok_or(MathError::MulOverflow(47))?
        .asr(96)
        .checked_add(signed(50_020_603_652_535_783_019_961_831_881_945))
        .ok_or(MathError::AddOverflow(46))?;
    for (index, coefficient) in [
        -signed(533_845_033_583_426_703_283_633_433_725_380),
        signed(3_604_857_256_930_695_427_073_651_918_091_429),
        -signed(14_423_608_567_350_463_180_887_372_962_807_573),
        signed(26_449_188_498_355_588_339_934_803_723_976_023),
    ]
    .into_iter()
    .enumerate()
    {
        q = q
            .checked_mul(value)
            .ok_or(MathError::MulOverflow(48 + index as u8))?
            .asr(96)
            .checked_add(coefficient)
            .ok_or(MathError::AddOverflow(47 + index as u8))?;
    }
    y = p.checked_div(q).ok_or(MathError::DivByZero(42))?;

    let k = i64::try_from(k).map_err(|_| MathError::CastOverflow(40))?;
    let shift = usize::try_from(195 - k).map_err(|_| MathError::CastOverflow(41))?;
    Ok(to_unsigned(y)?
        .checked_mul(EXP_SCALE)
        .ok_or(MathError::MulOverflow(52))?
        >> shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(value: u128) -> U256 {
        U256::from(value)
    }

    #[test]
    fn cbrt_matches_reference_values() {
        let cases: [(u128, u128); 7] = [
            (9_000_000_000_000_000_000, 2_080_083_823_051_904_114),
            (8_000_000_000_000_000_000, 2_000_000_000_000_000_000),
            (1_000_000_000_000_000_000, 1_000_000_000_000_000_000),
            (1, 1_000_000_000_000),
            (39_638_197_472_940_459_652, 3_409_609_420_638_816_171),
            (69_592_898_413_781_159_022, 4_113_280_324_356_244_440),
            (64_407_049_126_309_813_316, 4_008_462_274_982_311_635),
        ];
        for (x, expected) in cases {
            assert_eq!(
                cbrt(u(x)).unwrap_or_else(|err| panic!("Should compute: {err:?}")),
                u(expected),
                "Incorrect cube root of {x}"
            );
        }
    }

    #[test]
    fn log2_rounds_as_requested() {
        assert_eq!(log2(u(1), false), 0);
        assert_eq!(log2(u(1024), false), 10);
        assert_eq!(log2(u(1025), false), 10);
        assert_eq!(log2(u(1025), true), 11);
        assert_eq!(log2(U256::MAX, false), 255);
    }

    #[test]
    fn wad_exp_matches_reference_values() {
        let cases: [(i128, u128); 9] = [
            (-10, 999_999_999_999_999_990),
            (-8_293_361, 999_999_999_991_706_639),
            (-8_293_361_234, 999_999_991_706_638_800),
            (10, 1_000_000_000_000_000_010),
            (8_293_361, 1_000_000_000_008_293_361),
            (8_293_361_234, 1_000_000_008_293_361_268),
            (0, 1_000_000_000_000_000_000),
            (1_000_000_000_000_000_000, 2_718_281_828_459_045_235),
            (-42_139_678_854_452_767_551, 0),
        ];
        for (x, expected) in cases {
            let x = if x < 0 {
                -signed(x.unsigned_abs())
            } else {
                signed(x as u128)
            };
            assert_eq!(
                wad_exp(x).unwrap_or_else(|err| panic!("Should compute: {err:?}")),
                u(expected),
                "Incorrect exp of {x}"
            );
        }
    }

    #[test]
    fn wad_exp_overflows_above_bound() {
        assert_eq!(
            wad_exp(signed(135_305_999_368_893_231_589)),
            Err(InvariantError::ExpOverflow)
        );
    }

    #[test]
    fn signed_conversion_rejects_out_of_range() {
        assert!(to_signed(U256::MAX).is_err());
        assert!(to_unsigned(-signed(1)).is_err());
        assert_eq!(to_unsigned(to_signed(u(42)).unwrap()), Ok(u(42)));
    }
}
