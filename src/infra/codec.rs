//! Codecs for composite fields stored as encoded text.
//!
//! Rosters, allocation arrays, goals and risks live in the graph store as JSON
//! text. Decoding is total: it accepts either the encoded text or an already
//! decoded array, and substitutes an empty collection for anything else.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::util::FieldId;

/// Encode/decode a structured field at the persistence boundary.
pub trait FieldCodec {
    /// Decoded in-memory representation.
    type Value;

    /// Encode for storage.
    fn encode(&self, value: &Self::Value) -> Value;

    /// Decode from storage. Never fails; returns a default on bad input.
    fn decode(&self, raw: Option<&Value>) -> Self::Value;
}

/// Codec for a JSON array of `T` stored as JSON text.
pub struct JsonListCodec<T> {
    field: FieldId,
    _item: PhantomData<fn() -> T>,
}

impl<T> JsonListCodec<T> {
    /// Codec for the named field (the name is only used in diagnostics).
    pub const fn new(field: FieldId) -> Self {
        Self {
            field,
            _item: PhantomData,
        }
    }

    /// Field this codec is bound to.
    pub const fn field(&self) -> FieldId {
        self.field
    }
}

impl<T> FieldCodec for JsonListCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = Vec<T>;

    fn encode(&self, value: &Vec<T>) -> Value {
        match serde_json::to_string(value) {
            Ok(text) => Value::String(text),
            Err(e) => {
                tracing::warn!(field = self.field, error = %e, "failed to encode composite field");
                Value::String("[]".into())
            }
        }
    }

    fn decode(&self, raw: Option<&Value>) -> Vec<T> {
        let parsed = match raw {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::String(text)) if text.trim().is_empty() => return Vec::new(),
            Some(Value::String(text)) => serde_json::from_str::<Vec<T>>(text),
            Some(array @ Value::Array(_)) => serde_json::from_value::<Vec<T>>(array.clone()),
            Some(other) => {
                tracing::warn!(
                    field = self.field,
                    value = %other,
                    "composite field is neither text nor array; using empty list"
                );
                return Vec::new();
            }
        };
        parsed.unwrap_or_else(|e| {
            tracing::warn!(field = self.field, error = %e, "failed to decode composite field; using empty list");
            Vec::new()
        })
    }
}
