use curve_helpers::{InvariantError, MathError};

/// Errors returned by pool construction, quoting and balance updates.
///
/// Any error means the pool (or the requested route) is not usable for the given input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("too many tokens: {0}")]
    TooManyTokens(usize),
    #[error("expected {expected} reserves, got {actual}")]
    ReserveCountMismatch { expected: usize, actual: usize },
    #[error("rate of token {0} is zero")]
    ZeroRate(usize),
    #[error("invalid pool config: {0}")]
    InvalidConfig(String),

    #[error("unknown token {0}")]
    UnknownToken(String),
    #[error("token index {0} out of range")]
    IndexOutOfRange(usize),
    #[error("identical tokens")]
    IdenticalTokens,
    #[error("zero amount")]
    ZeroAmount,
    #[error("pool has no LP supply")]
    EmptySupply,

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error("both tokens belong to the base pool")]
    BaseToBaseRoute,
    #[error("route does not touch the base pool")]
    NoBaseLeg,
    #[error("base pool does not match the meta pool")]
    BasePoolMismatch,
}

impl From<MathError> for PoolError {
    fn from(error: MathError) -> Self {
        PoolError::Invariant(InvariantError::MathError(error))
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(error: serde_json::Error) -> Self {
        PoolError::InvalidConfig(error.to_string())
    }
}
