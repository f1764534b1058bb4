//! JSON-mediated conversion between arbitrary serializable types.
//!
//! The record mapper moves data between raw property maps and typed
//! entities by serializing the source to a JSON value and deserializing it
//! into the target. Fields absent from the source fall back to their serde
//! defaults; fields the target does not know are dropped.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// Convert any serializable value into any deserializable one through an
/// intermediate JSON value.
pub fn any_to_any<S, T>(source: &S) -> Result<T>
where
    S: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let value = serde_json::to_value(source).map_err(|e| Error::Marshal(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| Error::Unmarshal(e.to_string()))
}
