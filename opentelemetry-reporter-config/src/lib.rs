//! # Library for declarative construction of OpenTelemetry metric reporters.
//!
//! Reporter types register an entry point that hands out a builder bound to
//! a metric registry, together with a table of the builder's named
//! single-argument operations. Declarations then name a reporter type, a
//! registry and a set of properties; every property whose name matches a
//! builder operation is applied, the builder is finalized, and the product
//! is cached for the lifetime of the declaration.

use std::{collections::HashMap, error::Error, sync::Arc};

use opentelemetry::otel_debug;

pub mod builder;
pub mod factory;
pub mod model;
pub mod providers;

pub use builder::{BuilderOperations, ReporterBuilder, FINALIZE_OPERATION};
pub use factory::{InstanceState, ReporterFactory};
pub use model::ConfigurationValues;
pub use providers::{MetricRegistries, ReporterProviders};

/// Suffix of the companion factory name looked up when a reporter type is
/// not registered under its own name.
pub const FACTORY_SUFFIX: &str = "Factory";

/// A reporter type: anything able to hand out a builder bound to a registry.
pub trait ReporterType<R, P: ?Sized>: Send + Sync {
    /// Creates a builder for the given registry.
    fn for_registry(&self, registry: Arc<R>) -> Box<dyn ReporterBuilder<P>>;
}

/// Registry of the reporter types known to the application, keyed by name.
pub struct ReporterTypeRegistry<R, P: ?Sized> {
    types: HashMap<String, Box<dyn ReporterType<R, P>>>,
}

impl<R: 'static, P: ?Sized + 'static> ReporterTypeRegistry<R, P> {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registers a reporter type under the given name, replacing any previous one.
    pub fn register_type<T>(&mut self, name: impl Into<String>, reporter_type: T)
    where
        T: ReporterType<R, P> + 'static,
    {
        self.types.insert(name.into(), Box::new(reporter_type));
    }

    /// Registers a reporter type backed by a fluent builder.
    ///
    /// `for_registry` is the entry point creating the builder, `operations`
    /// describes its configuration operations and its `build` step.
    pub fn register_builder<B, F>(
        &mut self,
        name: impl Into<String>,
        for_registry: F,
        operations: BuilderOperations<B, P>,
    ) where
        B: Send + 'static,
        F: Fn(Arc<R>) -> B + Send + Sync + 'static,
    {
        self.register_type(
            name,
            builder::BuilderType::new(for_registry, operations),
        );
    }

    /// Looks up a reporter type by name, falling back to its companion
    /// `<name>Factory` registration.
    pub fn reporter_type(&self, name: &str) -> Option<&dyn ReporterType<R, P>> {
        self.types
            .get(name)
            .or_else(|| self.types.get(&format!("{name}{FACTORY_SUFFIX}")))
            .map(|t| t.as_ref())
    }

    /// Returns true if a builder can be resolved for the given name.
    pub fn supports(&self, name: &str) -> bool {
        self.reporter_type(name).is_some()
    }

    /// Resolves the entry point for `product_type` and invokes it once with
    /// `registry`.
    pub fn resolve_builder(
        &self,
        product_type: &str,
        registry: Arc<R>,
    ) -> Result<Box<dyn ReporterBuilder<P>>, ReporterError> {
        match self.reporter_type(product_type) {
            Some(reporter_type) => {
                otel_debug!(name: "ReporterTypeRegistry.ResolveBuilder", product_type = product_type);
                Ok(reporter_type.for_registry(registry))
            }
            None => Err(ReporterError::UnsupportedProductType(
                product_type.to_string(),
            )),
        }
    }
}

impl<R: 'static, P: ?Sized + 'static> Default for ReporterTypeRegistry<R, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised while declaring or constructing reporters.
///
/// Cloneable so that one construction failure can be handed to every caller
/// waiting on the same declaration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReporterError {
    #[error("Unsupported product type: {0}. No entry point is registered for it or its companion factory.")]
    UnsupportedProductType(String),
    #[error("Configuration type mismatch for property '{key}': {message}")]
    ConfigurationTypeMismatch { key: String, message: String },
    #[error("Failed to build reporter '{product_type}': {source}")]
    BuilderFinalization {
        product_type: String,
        #[source]
        source: Arc<dyn Error + Send + Sync>,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unknown metric registry: {0}")]
    UnknownRegistry(String),
    #[error("Not registered reporter: {0}")]
    NotRegisteredReporter(String),
}
