//! # Example OpenTelemetry Reporter Config Console
//!
//! This example demonstrates how to declare a console reporter in YAML
//! and obtain a meter provider from it.

use std::{env, sync::Arc};

use opentelemetry::metrics::MeterProvider as _;
use opentelemetry_reporter_config::{MetricRegistries, ReporterProviders, ReporterTypeRegistry};
use opentelemetry_sdk::Resource;

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() == 1 || (args.len() > 1 && args[1] == "--help") {
        println!("Usage: cargo run -- --file reporters.yaml");
        println!("This example demonstrates how to construct OpenTelemetry metric reporters from declarations using a Console reporter.");
        return Ok(());
    }
    if args.len() < 3 || args[1] != "--file" {
        println!("Error: Configuration file path not provided.");
        println!("Usage: cargo run -- --file reporters.yaml");
        return Ok(());
    }
    let config_file = &args[2];

    // Register the reporter types the application knows about.
    let mut types = ReporterTypeRegistry::default();
    opentelemetry_reporter_config_stdout::register_into(&mut types);
    let types = Arc::new(types);

    let registries = MetricRegistries::new(Arc::new(Resource::builder().build())).with_registry(
        "app",
        Arc::new(
            Resource::builder()
                .with_service_name("reporter-config-example")
                .build(),
        ),
    );

    let providers = ReporterProviders::configure_from_yaml_file(&types, &registries, config_file)?;
    providers.build_all()?;

    for id in providers.ids() {
        let meter_provider = providers.reporter(id)?;
        println!("Reporter '{}' is configured. Recording a measurement...", id);
        let counter = meter_provider
            .meter("reporter-config-example")
            .u64_counter("example.requests")
            .build();
        counter.add(1, &[]);

        println!("Shutting down reporter '{}'...", id);
        meter_provider.shutdown()?;
    }

    Ok(())
}
