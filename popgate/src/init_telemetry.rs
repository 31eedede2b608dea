use anyhow::Result;
use opentelemetry::{global, trace::TracerProvider, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider, Resource};
use tracing::{info, warn, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan, Layer};
use tracing_subscriber::{registry, EnvFilter};

use crate::settings::config::Settings;

/// OTLP span export, sent to `OTEL_EXPORTER_OTLP_ENDPOINT`.
pub fn build_otel_layer<S>() -> Result<impl Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://otel-collector:4317".to_string());

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let resource = Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    global::set_text_map_propagator(TraceContextPropagator::new());
    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
    global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer()
        .with_error_records_to_exceptions(true)
        .with_tracer(tracer))
}

pub fn build_reduced_logger_text<S>() -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if cfg!(debug_assertions) {
        Box::new(
            tracing_subscriber::fmt::layer()
                .with_line_number(false)
                .with_thread_names(false)
                .with_timer(tracing_subscriber::fmt::time::SystemTime)
                .with_target(true)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
                .event_format(tracing_subscriber::fmt::format().compact()),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::SystemTime)
                .with_target(true),
        )
    }
}

/// `RUST_LOG` (or `OTEL_LOG_LEVEL`) plus fixed levels for noisy transport crates.
pub fn build_loglevel_filter_layer() -> EnvFilter {
    let base = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("OTEL_LOG_LEVEL"))
        .unwrap_or_else(|_| "info".to_string());

    EnvFilter::try_new(format!(
        "{base},otel::tracing=trace,otel=debug,h2=warn,hyper=warn,tonic=warn"
    ))
    .unwrap_or_else(|e| {
        eprintln!("Ignoring invalid log filter {base:?}: {e}");
        EnvFilter::new("info")
    })
}

/// `settings.telemetry` is a comma separated list of signals, e.g. `traces,metrics`.
pub fn init_telemetry_and_tracing(settings: &Settings) -> Result<()> {
    // Temporary subscriber so setup problems are visible.
    let subscriber = registry()
        .with(build_loglevel_filter_layer())
        .with(build_reduced_logger_text());
    let _guard = tracing::subscriber::set_default(subscriber);
    info!("init logging & tracing");

    let tracing_enabled = settings.telemetry_includes("traces");
    let metrics_enabled = settings.telemetry_includes("metrics");

    if tracing_enabled {
        let subscriber = registry()
            .with(build_otel_layer()?)
            .with(build_loglevel_filter_layer())
            .with(build_reduced_logger_text());
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = registry()
            .with(build_loglevel_filter_layer())
            .with(build_reduced_logger_text());
        tracing::subscriber::set_global_default(subscriber)?;
    }

    if metrics_enabled {
        match crate::metrics::init_metrics() {
            Ok(_) => info!("OpenTelemetry metrics initialized successfully"),
            Err(e) => warn!("Failed to initialize metrics: {}", e),
        }
    }

    Ok(())
}
