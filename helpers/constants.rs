/// Max number of coins a pool may hold. Scratch arrays on the quote path are sized to it.
pub const MAX_TOKENS: usize = 8;

/// Internal working precision (1e18).
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Fee fractions are given as integers with 1e10 precision.
pub const FEE_DENOMINATOR: u128 = 10_000_000_000;

pub mod stable_pool {
    // Rates are scaled so that `balance * rate / PRECISION` has 18 decimal places.
    pub const RATE_DECIMALS: u32 = 36;

    /// Max number of Newton rounds for D and y.
    pub const MAX_ITERATIONS: u16 = 256;

    /// Gas spent by an in-pool exchange.
    pub const EXCHANGE_GAS: u64 = 130_000;
    /// Gas spent by a meta pool exchange routed through its base pool.
    pub const EXCHANGE_UNDERLYING_GAS: u64 = 300_000;
}

pub mod crypto_pool {
    /// The three-asset pool always holds exactly this many coins.
    pub const N_COINS: usize = 3;

    pub const A_MULTIPLIER: u128 = 10_000;
    /// Min A, given with A_MULTIPLIER precision (N^N * 100).
    pub const MIN_A: u128 = 2_700;
    /// Max A, given with A_MULTIPLIER precision (N^N * A_MULTIPLIER * 1000).
    pub const MAX_A: u128 = 270_000_000;
    pub const MIN_GAMMA: u128 = 10_000_000_000;
    pub const MAX_GAMMA: u128 = 50_000_000_000_000_000;
    /// Bounds of D accepted by the y solvers.
    pub const MIN_D: u128 = 100_000_000_000_000_000;
    pub const MAX_D: u128 = 1_000_000_000_000_000_000_000_000_000_000_000;
    /// Bounds of `x[i] * 1e18 / D` for every balance.
    pub const MIN_FRAC: u128 = 10_000_000_000_000_000;
    pub const MAX_FRAC: u128 = 100_000_000_000_000_000_000;

    /// Max number of Newton rounds for D and y.
    pub const MAX_ITERATIONS: u16 = 255;
    /// Rounds used to invert a quote when solving for the input amount.
    pub const GET_DX_ROUNDS: u8 = 5;

    /// Gas spent by an exchange.
    pub const EXCHANGE_GAS: u64 = 200_000;
}
