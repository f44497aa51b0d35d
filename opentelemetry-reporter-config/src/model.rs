//! # Reporter configuration models
//!
//! This module defines the declarative structures describing which
//! reporters to construct and with which properties.

pub mod reporter;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::model::reporter::ReporterDeclaration;

/// Configuration for the reporters of an application
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Reporters {
    /// Reporter declarations, in declaration order
    #[serde(default)]
    pub reporters: Vec<ReporterDeclaration>,
}

/// Named configuration values handed to a reporter builder.
///
/// Keys are unique strings kept in insertion order. Values are already
/// decoded YAML values; each is converted into the parameter type of the
/// builder operation it matches.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(try_from = "Mapping")]
pub struct ConfigurationValues(Mapping);

impl ConfigurationValues {
    /// Creates an empty set of configuration values.
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    /// Inserts a value, replacing any previous value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(Value::String(key.into()), value.into());
    }

    /// Builder-style variant of [`ConfigurationValues::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().filter_map(Value::as_str)
    }

    /// Returns the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter_map(|(key, value)| key.as_str().map(|key| (key, value)))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no value is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Mapping> for ConfigurationValues {
    type Error = String;

    fn try_from(mapping: Mapping) -> Result<Self, Self::Error> {
        if let Some(key) = mapping.keys().find(|key| !key.is_string()) {
            return Err(format!("Property names must be strings, found {:?}", key));
        }
        Ok(Self(mapping))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ConfigurationValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (key, value) in iter {
            values.insert(key, value);
        }
        values
    }
}
