use crate::math::MathError;

pub type Timestamp = u64;

/// Returns `(elapsed, duration)` of a ramp from `initial_time` to `future_time`, or `None`
/// once `current_time` reaches `future_time`.
fn progress(
    initial_time: Timestamp,
    future_time: Timestamp,
    current_time: Timestamp,
) -> Result<Option<(u128, u128)>, MathError> {
    if current_time >= future_time {
        return Ok(None);
    }
    let duration = future_time
        .checked_sub(initial_time)
        .ok_or(MathError::SubUnderflow(60))?;
    let elapsed = current_time
        .checked_sub(initial_time)
        .ok_or(MathError::SubUnderflow(61))?;
    Ok(Some((elapsed as u128, duration as u128)))
}

/// Linear ramp of a stable pool's A.
///
/// Mid-ramp values move away from `initial_a` by `|future_a - initial_a| * elapsed / duration`,
/// so rounding always favours `initial_a`.
#[derive(Default, Debug, scale::Encode, scale::Decode, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct AmplificationCoefficient {
    pub initial_a: u128,
    pub future_a: u128,
    pub initial_time: Timestamp,
    /// Zero when no ramp was ever scheduled.
    pub future_time: Timestamp,
}

impl AmplificationCoefficient {
    pub fn new(a: u128) -> Self {
        Self {
            initial_a: a,
            future_a: a,
            initial_time: 0,
            future_time: 0,
        }
    }

    pub fn is_ramping(&self, current_time: Timestamp) -> bool {
        current_time < self.future_time
    }

    pub fn compute(&self, current_time: Timestamp) -> Result<u128, MathError> {
        let (elapsed, duration) =
            match progress(self.initial_time, self.future_time, current_time)? {
                Some(window) => window,
                None => return Ok(self.future_a),
            };
        let step = |range: u128| -> Result<u128, MathError> {
            range
                .checked_mul(elapsed)
                .ok_or(MathError::MulOverflow(60))?
                .checked_div(duration)
                .ok_or(MathError::DivByZero(60))
        };
        if self.future_a > self.initial_a {
            self.initial_a
                .checked_add(step(self.future_a - self.initial_a)?)
                .ok_or(MathError::AddOverflow(60))
        } else {
            self.initial_a
                .checked_sub(step(self.initial_a - self.future_a)?)
                .ok_or(MathError::SubUnderflow(62))
        }
    }
}

/// Joint ramp of A and gamma used by crypto pools.
///
/// Both parameters move with the same time weights, so mid-ramp values are
/// `(v0 * (t1 - t) + v1 * (t - t0)) / (t1 - t0)`.
#[derive(Default, Debug, scale::Encode, scale::Decode, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct AGammaRamp {
    pub initial_a: u128,
    pub initial_gamma: u128,
    pub initial_time: Timestamp,
    pub future_a: u128,
    pub future_gamma: u128,
    pub future_time: Timestamp,
}

impl AGammaRamp {
    pub fn is_ramping(&self, current_time: Timestamp) -> bool {
        current_time < self.future_time
    }

    /// Returns `(A, gamma)` at `current_time`.
    pub fn compute(&self, current_time: Timestamp) -> Result<(u128, u128), MathError> {
        let (elapsed, duration) =
            match progress(self.initial_time, self.future_time, current_time)? {
                Some(window) => window,
                None => return Ok((self.future_a, self.future_gamma)),
            };
        // duration > elapsed while ramping
        let remaining = duration - elapsed;

        let weighted = |initial: u128, future: u128, code: u8| -> Result<u128, MathError> {
            initial
                .checked_mul(remaining)
                .ok_or(MathError::MulOverflow(code))?
                .checked_add(
                    future
                        .checked_mul(elapsed)
                        .ok_or(MathError::MulOverflow(code + 1))?,
                )
                .ok_or(MathError::AddOverflow(code))?
                .checked_div(duration)
                .ok_or(MathError::DivByZero(code))
        };
        Ok((
            weighted(self.initial_a, self.future_a, 62)?,
            weighted(self.initial_gamma, self.future_gamma, 64)?,
        ))
    }
}
