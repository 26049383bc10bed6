//! Span export to Langfuse.

use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_langfuse::ExporterBuilder;
use opentelemetry_sdk::trace::span_processor_with_async_runtime::BatchSpanProcessor;
use opentelemetry_sdk::{resource::Resource, runtime, trace::SdkTracerProvider};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing::{Metadata, Subscriber};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::Filter;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, Registry};

use super::ObservabilityError;

const SERVICE: &str = "langflow-rs";
const CRATE_TARGET: &str = "langflow_rs";

/// Credentials and host of the Langfuse project. Unset values are read
/// from the `LANGFUSE_*` environment variables by the exporter.
#[derive(Debug, Clone, Default)]
pub struct LangfuseOptions<'a> {
    pub public_key: Option<&'a str>,
    pub secret_key: Option<&'a str>,
    pub host: Option<&'a str>,
}

/// Exports this crate's spans, minus the per-request Astra DB HTTP spans.
#[derive(Debug, Clone)]
struct CrateSpanFilter;

impl<S> Filter<S> for CrateSpanFilter
where
    S: Subscriber,
{
    fn enabled(&self, meta: &Metadata<'_>, _cx: &tracing_subscriber::layer::Context<'_, S>) -> bool {
        if !meta.target().starts_with(CRATE_TARGET) {
            return false;
        }
        meta.name() != "Astra DB HTTP request"
    }
}

/// Installs console logging plus span export to Langfuse, returning the
/// provider so the caller can flush it on shutdown.
pub fn init(config: LangfuseOptions) -> Result<SdkTracerProvider, ObservabilityError> {
    let mut builder = ExporterBuilder::default();
    if let (Some(pk), Some(sk)) = (config.public_key, config.secret_key) {
        builder = builder.with_basic_auth(pk, sk);
    }
    if let Some(host) = config.host {
        builder = builder.with_host(host);
    }
    let exporter = builder.build().map_err(|e| ObservabilityError::Exporter(e.to_string()))?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, SERVICE),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio).build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_span_processor(processor)
        .build();

    let tracer = provider.tracer(SERVICE);
    global::set_tracer_provider(provider.clone());

    let console_filter =
        EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("langflow_rs=info,warn"));

    let fmt_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_thread_ids(true)
        .with_filter(console_filter);

    let otel_layer = tracing_opentelemetry::layer()
        .with_tracer(tracer)
        .with_filter(CrateSpanFilter);

    Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| ObservabilityError::AlreadyInitialized(e.to_string()))?;

    Ok(provider)
}
