use serde::Deserialize;

/// The part of a meta pool's static config that links it to its base pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetaStaticExtra {
    pub base_pool: String,
}
