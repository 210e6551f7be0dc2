use curve_helpers::ramp::{AmplificationCoefficient, Timestamp};
use curve_traits::{snapshot::decimal, PoolError};
use primitive_types::U256;
use serde::Deserialize;

/// Dynamic part of a stable pool snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StableExtra {
    #[serde(with = "decimal")]
    pub initial_a: U256,
    #[serde(with = "decimal")]
    pub future_a: U256,
    #[serde(rename = "InitialATime")]
    pub initial_a_time: Timestamp,
    #[serde(rename = "FutureATime")]
    pub future_a_time: Timestamp,
    #[serde(with = "decimal")]
    pub swap_fee: U256,
    #[serde(with = "decimal")]
    pub admin_fee: U256,
    #[serde(default, with = "decimal::option_vec")]
    pub rate_multipliers: Option<Vec<U256>>,
}

/// Static part of a plain pool snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlainStaticExtra {
    #[serde(rename = "APrecision", with = "decimal")]
    pub a_precision: U256,
    #[serde(default)]
    pub lp_token: String,
}

/// Static part of a stable-ng pool snapshot. Meta pools add their base pool address.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NgStaticExtra {
    #[serde(rename = "APrecision", with = "decimal")]
    pub a_precision: U256,
    #[serde(with = "decimal")]
    pub offpeg_fee_multiplier: U256,
    #[serde(default)]
    pub is_native_coins: Vec<bool>,
    #[serde(default)]
    pub base_pool: Option<String>,
}

fn to_u128(value: U256, name: &str) -> Result<u128, PoolError> {
    if value > U256::from(u128::MAX) {
        return Err(PoolError::InvalidConfig(format!("{name} does not fit in 128 bits")));
    }
    Ok(value.as_u128())
}

impl StableExtra {
    pub fn amp(&self) -> Result<AmplificationCoefficient, PoolError> {
        Ok(AmplificationCoefficient {
            initial_a: to_u128(self.initial_a, "InitialA")?,
            future_a: to_u128(self.future_a, "FutureA")?,
            initial_time: self.initial_a_time,
            future_time: self.future_a_time,
        })
    }
}
