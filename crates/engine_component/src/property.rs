//! Named, dynamically typed attribute bags.
//!
//! Components and messages both carry their data as a [`PropertyBag`]: an
//! ordered map from property name to a JSON value. Typed access goes through
//! serde, so any `Serialize`/`Deserialize` type can be stored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors raised by typed property access.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    /// The requested property is not present in the bag.
    #[error("property not found: {0}")]
    Missing(String),

    /// The stored value could not be converted to or from the requested type.
    #[error("property '{name}' has an incompatible type: {source}")]
    Conversion {
        /// The property name.
        name: String,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// An ordered bag of named property values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    values: Map<String, Value>,
}

impl PropertyBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self { values: Map::new() }
    }

    /// Builder-style insert of a raw value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a raw value. Returns the previous value, if any.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    /// Returns the raw value of a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Remove a property, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Returns `true` if the property is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Read a property as a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::Missing`] if the property is absent, or
    /// [`PropertyError::Conversion`] if it cannot be deserialised as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, PropertyError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| PropertyError::Missing(name.to_string()))?;
        T::deserialize(value).map_err(|source| PropertyError::Conversion {
            name: name.to_string(),
            source,
        })
    }

    /// Store a property from a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::Conversion`] if `value` cannot be serialised.
    pub fn set_from<T: Serialize>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<(), PropertyError> {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|source| PropertyError::Conversion {
            name: name.clone(),
            source,
        })?;
        self.values.insert(name, value);
        Ok(())
    }

    /// Copy every property of `other` into this bag, overwriting duplicates.
    pub fn merge(&mut self, other: &PropertyBag) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the bag holds no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<PropertyBag> for Value {
    fn from(bag: PropertyBag) -> Self {
        Value::Object(bag.values)
    }
}
