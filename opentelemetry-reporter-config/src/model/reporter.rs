//! Reporter declaration model
//!
//! A declaration names the reporter type to construct, the metric registry
//! it reports from, and the properties to apply to its builder.

use serde::Deserialize;

use crate::model::ConfigurationValues;

/// Declaration of one reporter instance
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReporterDeclaration {
    /// Identifier of the declared reporter, generated when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Name of the reporter type, or of its companion factory
    pub class: String,

    /// Reference to a named metric registry, the default registry when absent
    #[serde(default, rename = "metrics-registry")]
    pub metrics_registry: Option<String>,

    /// Properties matched by name against the builder operations
    #[serde(default)]
    pub properties: ConfigurationValues,
}

impl ReporterDeclaration {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            id: None,
            class: class.into(),
            metrics_registry: None,
            properties: ConfigurationValues::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metrics_registry(mut self, registry: impl Into<String>) -> Self {
        self.metrics_registry = Some(registry.into());
        self
    }

    pub fn with_properties(mut self, properties: ConfigurationValues) -> Self {
        self.properties = properties;
        self
    }

    /// Registry reference, ignoring a blank value.
    pub fn registry_ref(&self) -> Option<&str> {
        self.metrics_registry
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}
