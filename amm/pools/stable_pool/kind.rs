use curve_helpers::stable_swap_math::DVariant;
use curve_traits::{PoolError, PoolSnapshot};
use primitive_types::U256;

use crate::config::{NgStaticExtra, PlainStaticExtra};

/// Selects the invariant flavour and static config layout of a stable pool.
pub trait StableKind: Clone {
    const VARIANT: DVariant;
    const NAME: &'static str;

    /// Returns `(a_precision, offpeg_fee_multiplier)` from the static config.
    fn static_config(snapshot: &PoolSnapshot) -> Result<(U256, U256), PoolError>;
}

/// First-generation stable pools: static fee and the legacy D product term.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct Plain;

/// Stable-ng pools: offpeg dynamic fee and the next-gen D product term.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct NextGen;

impl StableKind for Plain {
    const VARIANT: DVariant = DVariant::Legacy;
    const NAME: &'static str = "curve-stable-plain";

    fn static_config(snapshot: &PoolSnapshot) -> Result<(U256, U256), PoolError> {
        let extra: PlainStaticExtra = snapshot.parse_static_extra()?;
        Ok((extra.a_precision, U256::zero()))
    }
}

impl StableKind for NextGen {
    const VARIANT: DVariant = DVariant::NextGen;
    const NAME: &'static str = "curve-stable-ng";

    fn static_config(snapshot: &PoolSnapshot) -> Result<(U256, U256), PoolError> {
        let extra: NgStaticExtra = snapshot.parse_static_extra()?;
        Ok((extra.a_precision, extra.offpeg_fee_multiplier))
    }
}
