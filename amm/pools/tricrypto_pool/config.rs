use curve_helpers::{crypto_math::fees::CryptoFees, ramp::AGammaRamp, ramp::Timestamp};
use curve_traits::{snapshot::decimal, PoolError};
use primitive_types::U256;
use serde::Deserialize;

/// Dynamic part of a tricrypto snapshot: the A/gamma ramp and the persisted pricing state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TricryptoExtra {
    #[serde(rename = "InitialA", with = "decimal")]
    pub initial_a: U256,
    #[serde(with = "decimal")]
    pub initial_gamma: U256,
    #[serde(rename = "InitialAGammaTime")]
    pub initial_a_gamma_time: Timestamp,
    #[serde(rename = "FutureA", with = "decimal")]
    pub future_a: U256,
    #[serde(with = "decimal")]
    pub future_gamma: U256,
    #[serde(rename = "FutureAGammaTime")]
    pub future_a_gamma_time: Timestamp,

    #[serde(rename = "D", with = "decimal")]
    pub d: U256,
    #[serde(with = "decimal::vec")]
    pub price_scale: Vec<U256>,
    #[serde(with = "decimal::vec")]
    pub price_oracle: Vec<U256>,
    #[serde(with = "decimal::vec")]
    pub last_prices: Vec<U256>,
    pub last_prices_timestamp: Timestamp,

    #[serde(with = "decimal")]
    pub fee_gamma: U256,
    #[serde(with = "decimal")]
    pub mid_fee: U256,
    #[serde(with = "decimal")]
    pub out_fee: U256,

    #[serde(with = "decimal")]
    pub lp_supply: U256,
    #[serde(with = "decimal")]
    pub xcp_profit: U256,
    #[serde(with = "decimal")]
    pub virtual_price: U256,
    #[serde(with = "decimal")]
    pub allowed_extra_profit: U256,
    #[serde(with = "decimal")]
    pub adjustment_step: U256,
    #[serde(with = "decimal")]
    pub ma_time: U256,
}

/// Static part of a tricrypto snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TricryptoStaticExtra {
    #[serde(default)]
    pub is_native_coins: Vec<bool>,
}

fn to_u128(value: U256, name: &str) -> Result<u128, PoolError> {
    if value > U256::from(u128::MAX) {
        return Err(PoolError::InvalidConfig(format!("{name} does not fit in 128 bits")));
    }
    Ok(value.as_u128())
}

fn pair(values: &[U256], name: &str) -> Result<[U256; 2], PoolError> {
    match values {
        [first, second] => Ok([*first, *second]),
        _ => Err(PoolError::InvalidConfig(format!(
            "{name} needs 2 entries, got {}",
            values.len()
        ))),
    }
}

impl TricryptoExtra {
    pub fn ramp(&self) -> Result<AGammaRamp, PoolError> {
        Ok(AGammaRamp {
            initial_a: to_u128(self.initial_a, "InitialA")?,
            initial_gamma: to_u128(self.initial_gamma, "InitialGamma")?,
            initial_time: self.initial_a_gamma_time,
            future_a: to_u128(self.future_a, "FutureA")?,
            future_gamma: to_u128(self.future_gamma, "FutureGamma")?,
            future_time: self.future_a_gamma_time,
        })
    }

    pub fn fees(&self) -> CryptoFees {
        CryptoFees {
            mid_fee: self.mid_fee,
            out_fee: self.out_fee,
            fee_gamma: self.fee_gamma,
        }
    }

    /// `(price_scale, price_oracle, last_prices)`.
    pub fn prices(&self) -> Result<([U256; 2], [U256; 2], [U256; 2]), PoolError> {
        Ok((
            pair(&self.price_scale, "PriceScale")?,
            pair(&self.price_oracle, "PriceOracle")?,
            pair(&self.last_prices, "LastPrices")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRA: &str = r#"{"InitialA":"1707629","InitialGamma":"11809167828997","InitialAGammaTime":1705051559,"FutureA":"540000","FutureGamma":"80500000000000","FutureAGammaTime":1705537322,"D":"11990883592127090140834712","PriceScale":["66313464177401058702341","3988288337309167729564"],"PriceOracle":["63612706012126486095056","3782761569503404058823"],"LastPrices":["63608488224235038716789","3782322291001686876800"],"LastPricesTimestamp":1710838775,"FeeGamma":"400000000000000","MidFee":"1000000","OutFee":"140000000","LpSupply":"6209561906175920711602","XcpProfit":"1005532234158713186","VirtualPrice":"1002781276086899355","AllowedExtraProfit":"100000000","AdjustmentStep":"100000000000","MaTime":"601"}"#;

    #[test]
    fn parses_extra() {
        let extra: TricryptoExtra =
            serde_json::from_str(EXTRA).unwrap_or_else(|err| panic!("Should parse: {err:?}"));
        let ramp = extra
            .ramp()
            .unwrap_or_else(|err| panic!("Should convert: {err:?}"));
        assert_eq!(ramp.future_a, 540_000);
        assert_eq!(ramp.initial_time, 1_705_051_559);
        assert_eq!(extra.ma_time, U256::from(601));
        let (scale, oracle, _) = extra
            .prices()
            .unwrap_or_else(|err| panic!("Should convert: {err:?}"));
        assert_eq!(scale[1], U256::from(3_988_288_337_309_167_729_564u128));
        assert_eq!(oracle[0], U256::from(63_612_706_012_126_486_095_056u128));
    }

    #[test]
    fn price_vectors_need_two_entries() {
        let extra: TricryptoExtra = serde_json::from_str(&EXTRA.replace(
            r#""PriceScale":["66313464177401058702341","3988288337309167729564"]"#,
            r#""PriceScale":["66313464177401058702341"]"#,
        ))
        .unwrap_or_else(|err| panic!("Should parse: {err:?}"));
        assert!(matches!(extra.prices(), Err(PoolError::InvalidConfig(_))));
    }
}
