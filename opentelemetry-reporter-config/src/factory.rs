//! # Lazily constructed reporter instances.
//!
//! A [`ReporterFactory`] is created for every declared reporter. It keeps the
//! reporter type name, the registry handle and the configuration values of
//! the declaration, and constructs the reporter at most once, on first use.

use std::{
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use opentelemetry::{otel_debug, otel_warn};

use crate::{
    builder::configure_and_build, model::ConfigurationValues, ReporterError,
    ReporterTypeRegistry,
};

/// Observable construction state of a [`ReporterFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Nothing constructed yet.
    Empty,
    /// A caller is constructing the reporter.
    Building,
    /// The reporter is constructed and cached.
    Ready,
    /// Construction failed; the failure is cached.
    Failed,
}

enum State<P: ?Sized> {
    Empty,
    Building,
    Ready(Arc<P>),
    Failed(ReporterError),
}

impl<P: ?Sized> State<P> {
    fn observe(&self) -> InstanceState {
        match self {
            State::Empty => InstanceState::Empty,
            State::Building => InstanceState::Building,
            State::Ready(_) => InstanceState::Ready,
            State::Failed(_) => InstanceState::Failed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("reporter construction panicked")]
struct ConstructionPanicked;

/// Singleton holder for one declared reporter.
///
/// The first call to [`ReporterFactory::get_object`] resolves the builder,
/// applies the configuration values and builds the reporter. Concurrent
/// callers wait for that construction and receive the same outcome; later
/// callers get the cached reporter, or the cached error, immediately.
pub struct ReporterFactory<R, P: ?Sized> {
    types: Arc<ReporterTypeRegistry<R, P>>,
    product_type: String,
    registry: Arc<R>,
    values: ConfigurationValues,
    state: Mutex<State<P>>,
    settled: Condvar,
}

impl<R: 'static, P: ?Sized + 'static> ReporterFactory<R, P> {
    /// Creates an empty instance; nothing is constructed until [`Self::get_object`].
    pub fn new(
        types: Arc<ReporterTypeRegistry<R, P>>,
        product_type: impl Into<String>,
        registry: Arc<R>,
        values: ConfigurationValues,
    ) -> Self {
        Self {
            types,
            product_type: product_type.into(),
            registry,
            values,
            state: Mutex::new(State::Empty),
            settled: Condvar::new(),
        }
    }

    /// Returns the reporter, constructing it on first use.
    pub fn get_object(&self) -> Result<Arc<P>, ReporterError> {
        let mut state = self.lock_state();
        loop {
            match &*state {
                State::Ready(product) => return Ok(Arc::clone(product)),
                State::Failed(error) => return Err(error.clone()),
                State::Empty => break,
                State::Building => {}
            }
            state = self
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if !self.types.supports(&self.product_type) {
            let error = ReporterError::UnsupportedProductType(self.product_type.clone());
            otel_warn!(
                name: "ReporterFactory.UnsupportedProductType",
                product_type = self.product_type.as_str()
            );
            *state = State::Failed(error.clone());
            self.settled.notify_all();
            return Err(error);
        }

        *state = State::Building;
        drop(state);

        let guard = BuildGuard {
            factory: self,
            settled: false,
        };
        let outcome = self
            .types
            .resolve_builder(&self.product_type, Arc::clone(&self.registry))
            .and_then(|builder| configure_and_build(&self.product_type, builder, &self.values));
        guard.settle(outcome)
    }

    /// Returns the current construction state.
    pub fn state(&self) -> InstanceState {
        self.lock_state().observe()
    }

    /// Returns the declared reporter type name.
    pub fn product_type(&self) -> &str {
        &self.product_type
    }

    /// Returns the metric registry the reporter is bound to.
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Returns the configuration values applied on construction.
    pub fn values(&self) -> &ConfigurationValues {
        &self.values
    }

    fn lock_state(&self) -> MutexGuard<'_, State<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: State<P>) {
        *self.lock_state() = state;
        self.settled.notify_all();
    }
}

impl<R, P: ?Sized> fmt::Debug for ReporterFactory<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterFactory")
            .field("product_type", &self.product_type)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

/// Publishes the outcome of a construction. If dropped without settling,
/// the construction panicked and the holder is marked as failed so that
/// waiting callers are released.
struct BuildGuard<'a, R: 'static, P: ?Sized + 'static> {
    factory: &'a ReporterFactory<R, P>,
    settled: bool,
}

impl<R: 'static, P: ?Sized + 'static> BuildGuard<'_, R, P> {
    fn settle(mut self, outcome: Result<Arc<P>, ReporterError>) -> Result<Arc<P>, ReporterError> {
        self.settled = true;
        match &outcome {
            Ok(product) => {
                otel_debug!(
                    name: "ReporterFactory.Built",
                    product_type = self.factory.product_type.as_str()
                );
                self.factory.publish(State::Ready(Arc::clone(product)));
            }
            Err(error) => {
                otel_warn!(
                    name: "ReporterFactory.BuildFailed",
                    product_type = self.factory.product_type.as_str(),
                    error = error.to_string()
                );
                self.factory.publish(State::Failed(error.clone()));
            }
        }
        outcome
    }
}

impl<R: 'static, P: ?Sized + 'static> Drop for BuildGuard<'_, R, P> {
    fn drop(&mut self) {
        if !self.settled {
            otel_warn!(
                name: "ReporterFactory.BuildPanicked",
                product_type = self.factory.product_type.as_str()
            );
            self.factory.publish(State::Failed(ReporterError::BuilderFinalization {
                product_type: self.factory.product_type.clone(),
                source: Arc::new(ConstructionPanicked),
            }));
        }
    }
}
