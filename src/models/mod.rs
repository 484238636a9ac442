pub mod component;
pub mod damage_record;
pub mod dashboard;
pub mod model_metrics;
pub mod pagination;
pub mod prediction;

use serde::{Deserialize, Deserializer};

/// Deserialize a nullable field of a partial update: absent stays `None`,
/// `null` becomes `Some(None)` (clear), a value becomes `Some(Some(v))`.
/// Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
