//! Serialization and deserialization provided by [`serde_json`] using marker traits
//!
//! Implementors of the raw transport traits opt into the higher-level typed
//! traits by implementing a marker. The marker carries the default
//! implementation translating between serialized wire data and strongly
//! typed values with [`serde_json`], which keeps the serialization algorithm
//! exchangeable in one place.

use super::{Delivery, RawDelivery};
use crate::BoxedError;
use serde::Deserialize;

/// Marker trait providing a default [`Delivery`] implementation based on [`serde_json`]
pub trait JsonDelivery: RawDelivery {}

impl<D> Delivery for D
where
    D: JsonDelivery,
{
    /// Parses the payload using [`serde_json::from_slice`]
    fn parse_payload<'a, T>(&'a self) -> Result<T, BoxedError>
    where
        T: Deserialize<'a>,
    {
        serde_json::from_slice(self.payload()).map_err(Into::into)
    }
}
