//! # Reporter builder driver.
//!
//! A reporter builder exposes named single-argument configuration operations
//! and one terminal `build` operation. This module describes those operations
//! with an explicit table per builder type and drives a builder from a set of
//! named configuration values.

use std::{collections::BTreeMap, error::Error, sync::Arc};

use opentelemetry::{otel_debug, otel_warn};
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::{model::ConfigurationValues, ReporterError, ReporterType};

/// Reserved name of the terminal operation of every builder.
pub const FINALIZE_OPERATION: &str = "build";

/// Boxed error returned by builder operations.
pub type BoxError = Box<dyn Error + Send + Sync>;

type Setter<B> = Box<dyn Fn(B, &Value) -> Result<B, BoxError> + Send + Sync>;
type Finalizer<B, P> = Box<dyn Fn(B) -> Result<Arc<P>, BoxError> + Send + Sync>;

/// A builder bound to a registry, configured by operation name.
pub trait ReporterBuilder<P: ?Sized>: Send {
    /// Names of the single-argument configuration operations. Never contains
    /// [`FINALIZE_OPERATION`].
    fn operations(&self) -> Vec<String>;

    /// Invokes the named operation with `value` decoded into its parameter type.
    fn apply(&mut self, operation: &str, value: &Value) -> Result<(), BoxError>;

    /// Consumes the builder and produces the reporter.
    fn build(self: Box<Self>) -> Result<Arc<P>, BoxError>;
}

/// Operation table for the builder type `B` producing `P`.
///
/// ```
/// use std::{convert::Infallible, sync::Arc, time::Duration};
/// use opentelemetry_reporter_config::BuilderOperations;
///
/// #[derive(Default)]
/// struct Builder {
///     period: Option<Duration>,
/// }
///
/// let operations = BuilderOperations::<Builder, Option<Duration>>::new()
///     .with_operation("period", |mut builder: Builder, period: Duration| {
///         builder.period = Some(period);
///         builder
///     })
///     .with_build(|builder: Builder| Ok::<_, Infallible>(Arc::new(builder.period)));
///
/// assert!(operations.has_operation("period"));
/// assert!(!operations.has_operation("build"));
/// ```
pub struct BuilderOperations<B, P: ?Sized> {
    setters: BTreeMap<String, Setter<B>>,
    finalize: Option<Finalizer<B, P>>,
}

impl<B: 'static, P: ?Sized + 'static> BuilderOperations<B, P> {
    /// Creates an empty operation table without a `build` operation.
    pub fn new() -> Self {
        Self {
            setters: BTreeMap::new(),
            finalize: None,
        }
    }

    /// Adds a configuration operation taking one argument of type `T`.
    ///
    /// The configuration value is decoded into `T` when the operation is
    /// invoked. The name [`FINALIZE_OPERATION`] is reserved and ignored here.
    pub fn with_operation<T, F>(mut self, name: impl Into<String>, operation: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(B, T) -> B + Send + Sync + 'static,
    {
        let name = name.into();
        if name == FINALIZE_OPERATION {
            otel_warn!(
                name: "BuilderOperations.ReservedOperation",
                operation = name.as_str(),
                message = "The finalize operation cannot be used as a configuration operation"
            );
            return self;
        }
        self.setters.insert(
            name,
            Box::new(move |builder: B, value: &Value| -> Result<B, BoxError> {
                let value = T::deserialize(value)?;
                Ok(operation(builder, value))
            }),
        );
        self
    }

    /// Sets the terminal `build` operation.
    pub fn with_build<F, E>(mut self, build: F) -> Self
    where
        F: Fn(B) -> Result<Arc<P>, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.finalize = Some(Box::new(move |builder: B| build(builder).map_err(Into::into)));
        self
    }

    /// Returns `true` if a configuration operation is registered under `name`.
    pub fn has_operation(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    /// Returns the configuration operation names in sorted order.
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.setters.keys().map(String::as_str)
    }
}

impl<B: 'static, P: ?Sized + 'static> Default for BuilderOperations<B, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
enum BuilderStateError {
    #[error("builder has no `build` operation")]
    MissingFinalize,
    #[error("builder was consumed by a failed operation")]
    Consumed,
    #[error("builder has no operation named `{0}`")]
    UnknownOperation(String),
}

/// A builder value paired with its operation table.
struct BoundBuilder<B, P: ?Sized> {
    builder: Option<B>,
    operations: Arc<BuilderOperations<B, P>>,
}

impl<B: Send + 'static, P: ?Sized + 'static> ReporterBuilder<P> for BoundBuilder<B, P> {
    fn operations(&self) -> Vec<String> {
        self.operations
            .operation_names()
            .map(str::to_string)
            .collect()
    }

    fn apply(&mut self, operation: &str, value: &Value) -> Result<(), BoxError> {
        let setter = self
            .operations
            .setters
            .get(operation)
            .ok_or_else(|| BuilderStateError::UnknownOperation(operation.to_string()))?;
        let builder = self.builder.take().ok_or(BuilderStateError::Consumed)?;
        self.builder = Some(setter(builder, value)?);
        Ok(())
    }

    fn build(self: Box<Self>) -> Result<Arc<P>, BoxError> {
        let BoundBuilder {
            builder,
            operations,
        } = *self;
        let finalize = operations
            .finalize
            .as_ref()
            .ok_or(BuilderStateError::MissingFinalize)?;
        finalize(builder.ok_or(BuilderStateError::Consumed)?)
    }
}

/// Reporter type whose entry point creates a fluent builder described by a
/// [`BuilderOperations`] table.
pub(crate) struct BuilderType<R, B, P: ?Sized> {
    for_registry: Box<dyn Fn(Arc<R>) -> B + Send + Sync>,
    operations: Arc<BuilderOperations<B, P>>,
}

impl<R, B, P: ?Sized> BuilderType<R, B, P> {
    pub(crate) fn new<F>(for_registry: F, operations: BuilderOperations<B, P>) -> Self
    where
        F: Fn(Arc<R>) -> B + Send + Sync + 'static,
    {
        Self {
            for_registry: Box::new(for_registry),
            operations: Arc::new(operations),
        }
    }
}

impl<R, B, P> ReporterType<R, P> for BuilderType<R, B, P>
where
    B: Send + 'static,
    P: ?Sized + 'static,
{
    fn for_registry(&self, registry: Arc<R>) -> Box<dyn ReporterBuilder<P>> {
        Box::new(BoundBuilder {
            builder: Some((self.for_registry)(registry)),
            operations: Arc::clone(&self.operations),
        })
    }
}

/// Applies every configuration value whose key names one of the builder's
/// operations, then finalizes the builder.
///
/// Keys without a matching operation are ignored.
pub fn configure_and_build<P: ?Sized>(
    product_type: &str,
    mut builder: Box<dyn ReporterBuilder<P>>,
    values: &ConfigurationValues,
) -> Result<Arc<P>, ReporterError> {
    let operations = builder.operations();
    for operation in operations
        .iter()
        .filter(|operation| operation.as_str() != FINALIZE_OPERATION)
    {
        if let Some(value) = values.get(operation) {
            builder.apply(operation, value).map_err(|e| {
                ReporterError::ConfigurationTypeMismatch {
                    key: operation.clone(),
                    message: e.to_string(),
                }
            })?;
            otel_debug!(
                name: "BuilderDriver.OperationApplied",
                product_type = product_type,
                operation = operation.as_str()
            );
        }
    }

    for key in values.keys() {
        if key == FINALIZE_OPERATION || !operations.iter().any(|operation| operation == key) {
            otel_debug!(
                name: "BuilderDriver.PropertyIgnored",
                product_type = product_type,
                property = key
            );
        }
    }

    builder
        .build()
        .map_err(|source| ReporterError::BuilderFinalization {
            product_type: product_type.to_string(),
            source: Arc::from(source),
        })
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Level {
        Info,
        Warn,
    }

    #[derive(Debug, PartialEq)]
    struct ConsoleReporter {
        period: Duration,
        threshold: Level,
    }

    struct ConsoleBuilder {
        period: Duration,
        threshold: Level,
    }

    impl ConsoleBuilder {
        fn for_registry(_registry: Arc<()>) -> Self {
            Self {
                period: Duration::from_secs(60),
                threshold: Level::Info,
            }
        }

        fn period(mut self, period: Duration) -> Self {
            self.period = period;
            self
        }

        fn threshold(mut self, threshold: Level) -> Self {
            self.threshold = threshold;
            self
        }

        fn build(self) -> ConsoleReporter {
            ConsoleReporter {
                period: self.period,
                threshold: self.threshold,
            }
        }
    }

    fn console_type() -> BuilderType<(), ConsoleBuilder, ConsoleReporter> {
        BuilderType::new(
            ConsoleBuilder::for_registry,
            BuilderOperations::new()
                .with_operation("period", ConsoleBuilder::period)
                .with_operation("threshold", ConsoleBuilder::threshold)
                .with_build(|builder: ConsoleBuilder| {
                    Ok::<_, Infallible>(Arc::new(builder.build()))
                }),
        )
    }

    fn values(entries: &[(&str, Value)]) -> ConfigurationValues {
        let mut values = ConfigurationValues::new();
        for (key, value) in entries {
            values.insert(*key, value.clone());
        }
        values
    }

    #[test]
    fn test_configure_and_build_applies_matches_and_ignores_unknown_keys() {
        // Arrange
        let builder = console_type().for_registry(Arc::new(()));
        let values = values(&[
            (
                "period",
                serde_yaml::to_value(Duration::from_secs(10)).unwrap(),
            ),
            ("unused", Value::from("x")),
        ]);

        // Act
        let reporter = configure_and_build("Console", builder, &values).unwrap();

        // Assert
        assert_eq!(
            *reporter,
            ConsoleReporter {
                period: Duration::from_secs(10),
                threshold: Level::Info,
            }
        );
    }

    #[test]
    fn test_configure_and_build_with_all_operations() {
        let builder = console_type().for_registry(Arc::new(()));
        let values: ConfigurationValues = serde_yaml::from_str(
            r#"
            threshold: warn
            period:
              secs: 5
              nanos: 0
            "#,
        )
        .unwrap();

        let reporter = configure_and_build("Console", builder, &values).unwrap();

        assert_eq!(reporter.period, Duration::from_secs(5));
        assert_eq!(reporter.threshold, Level::Warn);
    }

    #[test]
    fn test_configure_and_build_without_values_uses_builder_defaults() {
        let builder = console_type().for_registry(Arc::new(()));

        let reporter =
            configure_and_build("Console", builder, &ConfigurationValues::default()).unwrap();

        assert_eq!(reporter.period, Duration::from_secs(60));
        assert_eq!(reporter.threshold, Level::Info);
    }

    #[test]
    fn test_configure_and_build_type_mismatch_names_key() {
        let builder = console_type().for_registry(Arc::new(()));
        let values = values(&[("threshold", Value::from("catastrophic"))]);

        let result = configure_and_build("Console", builder, &values);

        match result {
            Err(ReporterError::ConfigurationTypeMismatch { key, .. }) => {
                assert_eq!(key, "threshold")
            }
            other => panic!("Expected ConfigurationTypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_configure_and_build_invokes_each_matched_operation_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let reporter_type: BuilderType<(), (), ()> = BuilderType::new(
            |_registry| (),
            BuilderOperations::new()
                .with_operation("host", move |builder, host: String| {
                    recorder.lock().unwrap().push(host);
                    builder
                })
                .with_build(|builder| Ok::<_, Infallible>(Arc::new(builder))),
        );
        let values = values(&[("host", Value::from("localhost"))]);

        configure_and_build("Graphite", reporter_type.for_registry(Arc::new(())), &values)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["localhost".to_string()]);
    }

    #[test]
    fn test_builder_without_operations_builds_immediately() {
        let reporter_type: BuilderType<(), u8, u8> = BuilderType::new(
            |_registry| 7,
            BuilderOperations::new().with_build(|value| Ok::<_, Infallible>(Arc::new(value))),
        );
        let values = values(&[("period", Value::from(10))]);

        let product =
            configure_and_build("Jmx", reporter_type.for_registry(Arc::new(())), &values).unwrap();

        assert_eq!(*product, 7);
    }

    #[test]
    fn test_build_is_reserved() {
        let operations = BuilderOperations::<u8, u8>::new()
            .with_operation("build", |value, _: u8| value)
            .with_operation("rate", |value, _: u8| value);

        assert!(!operations.has_operation(FINALIZE_OPERATION));
        assert_eq!(operations.operation_names().collect::<Vec<_>>(), vec!["rate"]);
    }

    #[test]
    fn test_missing_build_operation_fails_finalization() {
        let reporter_type: BuilderType<(), u8, u8> =
            BuilderType::new(|_registry| 7, BuilderOperations::new());

        let result = configure_and_build(
            "Broken",
            reporter_type.for_registry(Arc::new(())),
            &ConfigurationValues::default(),
        );

        match result {
            Err(ReporterError::BuilderFinalization { product_type, .. }) => {
                assert_eq!(product_type, "Broken")
            }
            other => panic!("Expected BuilderFinalization, got {:?}", other),
        }
    }

    #[test]
    fn test_failing_build_operation_wraps_cause() {
        let reporter_type: BuilderType<(), u8, u8> = BuilderType::new(
            |_registry| 7,
            BuilderOperations::new().with_build(|_value| {
                Err::<Arc<u8>, _>(std::io::Error::other("port already bound"))
            }),
        );

        let result = configure_and_build(
            "Graphite",
            reporter_type.for_registry(Arc::new(())),
            &ConfigurationValues::default(),
        );

        match result {
            Err(ReporterError::BuilderFinalization { source, .. }) => {
                assert_eq!(source.to_string(), "port already bound")
            }
            other => panic!("Expected BuilderFinalization, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_unknown_operation() {
        let mut builder = console_type().for_registry(Arc::new(()));

        let result = builder.apply("missing", &Value::Null);

        assert!(result.unwrap_err().to_string().contains("missing"));
    }
}
