//! # Console (stdout) reporter type for OpenTelemetry reporter configuration
//!
//! This crate registers the `Console` reporter type. Its builder wires an
//! [`opentelemetry_stdout::MetricExporter`] into a periodic reader and builds
//! an [`SdkMeterProvider`] carrying the registry's [`Resource`].
//!
//! Supported properties:
//!
//! | Property      | Value                          |
//! |---------------|--------------------------------|
//! | `interval`    | export interval, milliseconds  |
//! | `temporality` | `delta` or `cumulative`        |

use std::{convert::Infallible, sync::Arc, time::Duration};

use opentelemetry::otel_debug;
use opentelemetry_reporter_config::{BuilderOperations, ReporterTypeRegistry};
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider, Temporality},
    Resource,
};
use serde::Deserialize;

/// Name under which the console reporter type is registered.
pub const CONSOLE_REPORTER: &str = "Console";

/// Temporality accepted by the `temporality` property.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemporalityPreference {
    Delta,
    Cumulative,
}

impl From<TemporalityPreference> for Temporality {
    fn from(preference: TemporalityPreference) -> Self {
        match preference {
            TemporalityPreference::Delta => Temporality::Delta,
            TemporalityPreference::Cumulative => Temporality::Cumulative,
        }
    }
}

/// Builder of a meter provider exporting to stdout.
#[derive(Debug)]
pub struct ConsoleReporterBuilder {
    resource: Arc<Resource>,
    temporality: Option<Temporality>,
    interval: Option<Duration>,
}

impl ConsoleReporterBuilder {
    pub fn for_registry(resource: Arc<Resource>) -> Self {
        Self {
            resource,
            temporality: None,
            interval: None,
        }
    }

    pub fn with_temporality(mut self, temporality: Temporality) -> Self {
        self.temporality = Some(temporality);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn build(self) -> SdkMeterProvider {
        let mut exporter_builder = opentelemetry_stdout::MetricExporter::builder();
        if let Some(temporality) = self.temporality {
            exporter_builder = exporter_builder.with_temporality(temporality);
        }

        let mut reader_builder = PeriodicReader::builder(exporter_builder.build());
        if let Some(interval) = self.interval {
            reader_builder = reader_builder.with_interval(interval);
        }

        otel_debug!(
            name: "ConsoleReporterBuilder.Build",
            temporality = format!("{:?}", self.temporality),
            interval = format!("{:?}", self.interval)
        );

        SdkMeterProvider::builder()
            .with_resource(self.resource.as_ref().clone())
            .with_reader(reader_builder.build())
            .build()
    }
}

/// Operation table of [`ConsoleReporterBuilder`].
pub fn console_operations() -> BuilderOperations<ConsoleReporterBuilder, SdkMeterProvider> {
    BuilderOperations::new()
        .with_operation(
            "temporality",
            |builder: ConsoleReporterBuilder, temporality: TemporalityPreference| {
                builder.with_temporality(temporality.into())
            },
        )
        .with_operation(
            "interval",
            |builder: ConsoleReporterBuilder, millis: u64| {
                builder.with_interval(Duration::from_millis(millis))
            },
        )
        .with_build(|builder: ConsoleReporterBuilder| {
            Ok::<_, Infallible>(Arc::new(builder.build()))
        })
}

/// Registers the `Console` reporter type.
pub fn register_into(types: &mut ReporterTypeRegistry<Resource, SdkMeterProvider>) {
    types.register_builder(
        CONSOLE_REPORTER,
        ConsoleReporterBuilder::for_registry,
        console_operations(),
    );
}

#[cfg(test)]
mod tests {
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_reporter_config::{
        ConfigurationValues, InstanceState, MetricRegistries, ReporterError, ReporterFactory,
        ReporterProviders,
    };

    use super::*;

    fn types() -> Arc<ReporterTypeRegistry<Resource, SdkMeterProvider>> {
        let mut types = ReporterTypeRegistry::new();
        register_into(&mut types);
        Arc::new(types)
    }

    fn resource() -> Arc<Resource> {
        Arc::new(
            Resource::builder()
                .with_service_name("console-reporter-test")
                .build(),
        )
    }

    #[test]
    fn test_console_registration() {
        // Arrange
        let mut types = ReporterTypeRegistry::new();

        // Act
        register_into(&mut types);

        // Assert
        assert!(types.supports(CONSOLE_REPORTER));
        assert!(!types.supports("Http"));
    }

    #[test]
    fn test_console_operations() {
        let operations = console_operations();

        assert_eq!(
            operations.operation_names().collect::<Vec<_>>(),
            vec!["interval", "temporality"]
        );
    }

    #[test]
    fn test_console_reporter_from_properties() {
        // Arrange
        let factory = ReporterFactory::new(
            types(),
            CONSOLE_REPORTER,
            resource(),
            ConfigurationValues::new()
                .with("interval", 500)
                .with("temporality", "delta")
                .with("prefix", "ignored"),
        );

        // Act
        let provider = factory.get_object().unwrap();

        // Assert
        let counter = provider.meter("test").u64_counter("requests").build();
        counter.add(1, &[]);
        assert!(Arc::ptr_eq(&provider, &factory.get_object().unwrap()));
        assert!(provider.shutdown().is_ok());
    }

    #[test]
    fn test_console_reporter_invalid_temporality() {
        let factory = ReporterFactory::new(
            types(),
            CONSOLE_REPORTER,
            resource(),
            ConfigurationValues::new().with("temporality", "sideways"),
        );

        match factory.get_object() {
            Err(ReporterError::ConfigurationTypeMismatch { key, .. }) => {
                assert_eq!(key, "temporality")
            }
            other => panic!("Expected ConfigurationTypeMismatch, got {:?}", other),
        }
        assert_eq!(factory.state(), InstanceState::Failed);
    }

    #[test]
    fn test_console_reporter_from_yaml() {
        let yaml_str = r#"
        reporters:
          - id: console
            class: Console
            metrics-registry: app
            properties:
              interval: 1000
              temporality: cumulative
        "#;
        let registries = MetricRegistries::new(Arc::new(Resource::builder().build()))
            .with_registry("app", resource());

        let providers =
            ReporterProviders::configure_from_yaml(&types(), &registries, yaml_str).unwrap();
        providers.build_all().unwrap();

        let provider = providers.reporter("console").unwrap();
        assert!(provider.shutdown().is_ok());
    }

    #[test]
    fn test_temporality_preference_conversion() {
        assert_eq!(
            Temporality::from(TemporalityPreference::Delta),
            Temporality::Delta
        );
        assert_eq!(
            Temporality::from(TemporalityPreference::Cumulative),
            Temporality::Cumulative
        );
    }

    #[test]
    fn test_internal_logs_enabled_by_default() {
        assert!(cfg!(feature = "internal-logs"));
    }
}
