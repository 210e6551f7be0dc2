pub mod constants;
pub mod crypto_math;
pub mod math;
pub mod ramp;
pub mod stable_swap_math;

pub use math::MathError;

/// Errors raised by the invariant solvers.
///
/// Arithmetic failures keep the call-site code of the underlying [`MathError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum InvariantError {
    #[error("arithmetic error: {0:?}")]
    MathError(MathError),
    #[error("zero balance in invariant computation")]
    ZeroBalance,
    #[error("D did not converge")]
    DNotConverged,
    #[error("y did not converge")]
    YNotConverged,
    #[error("unsafe value for A")]
    UnsafeA,
    #[error("unsafe value for gamma")]
    UnsafeGamma,
    #[error("unsafe value for D")]
    UnsafeD,
    #[error("unsafe values x[i]")]
    UnsafeX,
    #[error("unsafe value for y")]
    UnsafeY,
    #[error("virtual price decreased")]
    Loss,
    #[error("exp overflow")]
    ExpOverflow,
    #[error("reserve too small for the requested amount")]
    ReserveTooSmall,
}

impl From<MathError> for InvariantError {
    fn from(error: MathError) -> Self {
        InvariantError::MathError(error)
    }
}

/// Evaluate `$x:expr` and if not true return `Err($y:expr)`.
///
/// Used as `ensure!(expression_to_ensure, expression_to_return_on_false)`.
#[macro_export]
macro_rules! ensure {
    ( $x:expr, $y:expr $(,)? ) => {{
        if !$x {
            return Err($y.into());
        }
    }};
}
