//! Series record contract and response conversion
//!
//! The adapter does not own the series model. Callers describe their record
//! type through [`SeriesRecord`] and decide how raw node data becomes a record
//! through [`SeriesConverter`].

use crate::error::{ConvertError, ConvertResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Identifier of a series; also the node key under `/series`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesId(String);

impl SeriesId {
    /// Create an id from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for SeriesId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for SeriesId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SeriesId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A record that can be stored under `/series/{id}`
pub trait SeriesRecord: Serialize + Send + Sync {
    /// Key the record is stored under
    fn series_id(&self) -> SeriesId;
}

/// Converts raw node data into series records
pub trait SeriesConverter<S>: Send + Sync {
    /// Convert the value stored under `key` into a record
    fn convert_response_to_series(&self, key: &str, raw: Value) -> ConvertResult<S>;
}

/// Converter that deserializes records with serde
pub struct SerdeConverter<S> {
    _record: PhantomData<fn() -> S>,
}

impl<S> SerdeConverter<S> {
    /// Create a serde-backed converter
    pub fn new() -> Self {
        Self { _record: PhantomData }
    }
}

impl<S> Default for SerdeConverter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for SerdeConverter<S> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for SerdeConverter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeConverter").finish()
    }
}

impl<S: DeserializeOwned> SeriesConverter<S> for SerdeConverter<S> {
    fn convert_response_to_series(&self, key: &str, raw: Value) -> ConvertResult<S> {
        serde_json::from_value(raw).map_err(|e| ConvertError::InvalidShape {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Serialize a record for writing
pub fn series_to_value<S: SeriesRecord>(series: &S) -> ConvertResult<Value> {
    Ok(serde_json::to_value(series)?)
}
