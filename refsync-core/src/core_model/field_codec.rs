//! JSON conversion helpers backing `Synchronizable::field`/`set_field`.

use crate::core_consistency::ConsistencyError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub(crate) fn json_field<V: Serialize>(field: &str, value: &V) -> Result<Value, ConsistencyError> {
    serde_json::to_value(value).map_err(|e| ConsistencyError::FieldCodec {
        field: field.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn typed_field<V: DeserializeOwned>(
    field: &str,
    value: Value,
) -> Result<V, ConsistencyError> {
    serde_json::from_value(value).map_err(|e| ConsistencyError::FieldCodec {
        field: field.to_string(),
        message: e.to_string(),
    })
}
