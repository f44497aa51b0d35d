//! # Reporter providers
//!
//! This module turns reporter declarations into lazily constructed reporter
//! instances, one [`ReporterFactory`] per declaration.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::Arc,
};

use opentelemetry::otel_debug;

use crate::{
    factory::ReporterFactory,
    model::{reporter::ReporterDeclaration, Reporters},
    ReporterError, ReporterTypeRegistry,
};

/// Metric registries reporters can be bound to, by reference name.
pub struct MetricRegistries<R> {
    default: Arc<R>,
    named: HashMap<String, Arc<R>>,
}

impl<R> MetricRegistries<R> {
    /// Creates the set with the registry used by declarations naming none.
    pub fn new(default: Arc<R>) -> Self {
        Self {
            default,
            named: HashMap::new(),
        }
    }

    /// Adds a registry under `name`, replacing any registry of that name.
    pub fn with_registry(mut self, name: impl Into<String>, registry: Arc<R>) -> Self {
        self.register(name, registry);
        self
    }

    /// Registers a registry under `name`.
    pub fn register(&mut self, name: impl Into<String>, registry: Arc<R>) {
        self.named.insert(name.into(), registry);
    }

    /// Returns the registry used by declarations naming none.
    pub fn default_registry(&self) -> &Arc<R> {
        &self.default
    }

    /// Resolves a registry reference; `None` selects the default registry.
    pub fn resolve(&self, reference: Option<&str>) -> Result<Arc<R>, ReporterError> {
        match reference {
            None => Ok(Arc::clone(&self.default)),
            Some(name) => self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| ReporterError::UnknownRegistry(name.to_string())),
        }
    }
}

/// Holds the declared reporters of an application
pub struct ReporterProviders<R, P: ?Sized> {
    reporters: Vec<(String, Arc<ReporterFactory<R, P>>)>,
}

impl<R: 'static, P: ?Sized + 'static> ReporterProviders<R, P> {
    /// Creates one empty reporter instance per declaration.
    ///
    /// Nothing is constructed here; each reporter is built on first access.
    /// Generated ids never take an id declared explicitly, wherever it appears.
    pub fn configure(
        types: &Arc<ReporterTypeRegistry<R, P>>,
        registries: &MetricRegistries<R>,
        config: &Reporters,
    ) -> Result<Self, ReporterError> {
        let mut explicit = HashSet::new();
        for id in config.reporters.iter().filter_map(|d| d.id.as_deref()) {
            if !explicit.insert(id) {
                return Err(ReporterError::InvalidConfiguration(format!(
                    "Duplicate reporter id '{}'",
                    id
                )));
            }
        }

        let mut providers = Self {
            reporters: Vec::with_capacity(config.reporters.len()),
        };
        for declaration in &config.reporters {
            let id = match &declaration.id {
                Some(id) => id.clone(),
                None => providers.generate_id(&declaration.class, &explicit),
            };
            providers.declare(types, registries, id, declaration)?;
        }
        Ok(providers)
    }

    /// Configures the reporters from a YAML string
    pub fn configure_from_yaml(
        types: &Arc<ReporterTypeRegistry<R, P>>,
        registries: &MetricRegistries<R>,
        yaml_str: &str,
    ) -> Result<Self, ReporterError> {
        let config: Reporters = serde_yaml::from_str(yaml_str).map_err(|e| {
            ReporterError::InvalidConfiguration(format!(
                "Failed to parse YAML configuration: {}",
                e
            ))
        })?;
        Self::configure(types, registries, &config)
    }

    /// Configures the reporters from a YAML file
    pub fn configure_from_yaml_file(
        types: &Arc<ReporterTypeRegistry<R, P>>,
        registries: &MetricRegistries<R>,
        file_path: impl AsRef<Path>,
    ) -> Result<Self, ReporterError> {
        let yaml_str = std::fs::read_to_string(file_path).map_err(|e| {
            ReporterError::InvalidConfiguration(format!(
                "Failed to read YAML configuration file: {}",
                e
            ))
        })?;
        Self::configure_from_yaml(types, registries, &yaml_str)
    }

    fn declare(
        &mut self,
        types: &Arc<ReporterTypeRegistry<R, P>>,
        registries: &MetricRegistries<R>,
        id: String,
        declaration: &ReporterDeclaration,
    ) -> Result<(), ReporterError> {
        let registry = registries.resolve(declaration.registry_ref())?;
        otel_debug!(
            name: "ReporterProviders.Declared",
            id = id.as_str(),
            class = declaration.class.as_str()
        );
        let factory = ReporterFactory::new(
            Arc::clone(types),
            declaration.class.clone(),
            registry,
            declaration.properties.clone(),
        );
        self.reporters.push((id, Arc::new(factory)));
        Ok(())
    }

    /// Generates `<class>#<n>` with the lowest `n` neither declared nor reserved.
    fn generate_id(&self, class: &str, reserved: &HashSet<&str>) -> String {
        let mut counter = 0;
        loop {
            let id = format!("{}#{}", class, counter);
            if !reserved.contains(id.as_str()) && self.get(&id).is_none() {
                return id;
            }
            counter += 1;
        }
    }

    /// Returns the reporter instance declared under `id`.
    pub fn get(&self, id: &str) -> Option<&Arc<ReporterFactory<R, P>>> {
        self.reporters
            .iter()
            .find(|(declared, _)| declared == id)
            .map(|(_, factory)| factory)
    }

    /// Returns the reporter declared under `id`, constructing it on first use.
    pub fn reporter(&self, id: &str) -> Result<Arc<P>, ReporterError> {
        self.get(id)
            .ok_or_else(|| ReporterError::NotRegisteredReporter(id.to_string()))?
            .get_object()
    }

    /// Declared ids, in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.reporters.iter().map(|(id, _)| id.as_str())
    }

    /// Returns the number of declared reporters.
    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    /// Returns `true` when no reporter is declared.
    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }

    /// Constructs every declared reporter, stopping at the first failure.
    pub fn build_all(&self) -> Result<(), ReporterError> {
        for (id, factory) in &self.reporters {
            if let Err(e) = factory.get_object() {
                otel_debug!(name: "ReporterProviders.BuildAllFailed", id = id.as_str());
                return Err(e);
            }
        }
        Ok(())
    }
}
