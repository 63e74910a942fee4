//! Console-only tracing setup for development and tests, so runs don't need
//! an OTEL collector listening.

use opentelemetry::global;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

pub const TRACER_NAME: &str = "lollyboard-tracer";

pub async fn build_subscriber() -> Result<SdkTracerProvider> {
    let provider = init_stdout_provider()?;
    let tracer = global::tracer(TRACER_NAME);

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::new(
            "lollyboard_server=trace,tower_http=debug,axum=debug,sqlx=info,info",
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    // tests may build this more than once per process
    let _ = registry.try_init();

    Ok(provider)
}

fn init_stdout_provider() -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_stdout::SpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .with_id_generator(RandomIdGenerator::default())
        .with_sampler(Sampler::AlwaysOn)
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(provider)
}

pub fn destroy_tracer(provider: SdkTracerProvider) {
    if let Err(err) = provider.shutdown() {
        eprintln!("error during tracer provider shutdown: {err:#?}");
    }
}
