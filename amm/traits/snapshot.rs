use primitive_types::U256;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::PoolError;

/// Pool state as delivered by the chain synchronizer.
///
/// `extra` and `static_extra` are JSON documents themselves. Each pool kind parses them into
/// its own config types with [`PoolSnapshot::parse_extra`] and [`PoolSnapshot::parse_static_extra`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub address: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(with = "decimal::vec")]
    pub reserves: Vec<U256>,
    pub tokens: Vec<TokenInfo>,
    #[serde(default)]
    pub extra: String,
    #[serde(default)]
    pub static_extra: String,
    #[serde(default)]
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    #[serde(default)]
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub swappable: bool,
}

impl PoolSnapshot {
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        serde_json::from_str(json).map_err(|err| PoolError::InvalidSnapshot(err.to_string()))
    }

    pub fn parse_extra<T: DeserializeOwned>(&self) -> Result<T, PoolError> {
        Ok(serde_json::from_str(&self.extra)?)
    }

    pub fn parse_static_extra<T: DeserializeOwned>(&self) -> Result<T, PoolError> {
        Ok(serde_json::from_str(&self.static_extra)?)
    }

    /// Lowercased token addresses, in pool order.
    pub fn token_addresses(&self) -> Vec<String> {
        self.tokens
            .iter()
            .map(|token| token.address.to_lowercase())
            .collect()
    }

    /// Checks the token count against `min..=max` and the reserve count against
    /// `tokens + extra_reserves`.
    pub fn check_shape(
        &self,
        min_tokens: usize,
        max_tokens: usize,
        extra_reserves: usize,
    ) -> Result<(), PoolError> {
        let n = self.tokens.len();
        if n > max_tokens {
            return Err(PoolError::TooManyTokens(n));
        }
        if n < min_tokens {
            return Err(PoolError::InvalidSnapshot(format!(
                "pool needs at least {min_tokens} tokens, got {n}"
            )));
        }
        let expected = n + extra_reserves;
        if self.reserves.len() != expected {
            return Err(PoolError::ReserveCountMismatch {
                expected,
                actual: self.reserves.len(),
            });
        }
        Ok(())
    }
}

/// Serde helpers for integers carried as decimal strings.
pub mod decimal {
    use primitive_types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn parse(value: &str) -> Result<U256, String> {
        U256::from_dec_str(value).map_err(|err| format!("invalid decimal {value:?}: {err:?}"))
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse(&value).map_err(D::Error::custom)
    }

    pub mod vec {
        use primitive_types::U256;
        use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for value in values {
                seq.serialize_element(&value.to_string())?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<U256>, D::Error> {
            Vec::<String>::deserialize(deserializer)?
                .iter()
                .map(|value| super::parse(value).map_err(D::Error::custom))
                .collect()
        }
    }

    pub mod option_vec {
        use primitive_types::U256;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            values: &Option<Vec<U256>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match values {
                Some(values) => super::vec::serialize(values, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<U256>>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super::vec")] Vec<U256>);

            Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(values)| values))
        }
    }
}

/// `10^(36 - decimals)`, the rate that brings a balance to 18 decimals.
pub fn default_rate(decimals: u8) -> Result<U256, PoolError> {
    let exponent = 36usize
        .checked_sub(decimals as usize)
        .ok_or_else(|| PoolError::InvalidConfig(format!("unsupported decimals {decimals}")))?;
    Ok(U256::exp10(exponent))
}
