//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use codesense_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
//!
//! init_tracing(&TracingOptions::from_env()).unwrap();
//! // ... run the client ...
//! shutdown_tracing();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn,codesense_core=info,codesense_infra=info";

/// Name of the OpenTelemetry tracer.
pub const TRACER_NAME: &str = "codesense";

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracingOptions {
    /// Bridge spans to OpenTelemetry with a stdout exporter.
    pub enable_otel: bool,
    pub format: LogFormat,
}

impl TracingOptions {
    /// Read `CODESENSE_OTEL` and `CODESENSE_LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("CODESENSE_OTEL").ok().as_deref(),
            std::env::var("CODESENSE_LOG_FORMAT").ok().as_deref(),
        )
    }

    fn from_values(otel: Option<&str>, format: Option<&str>) -> Self {
        let enable_otel = otel.is_some_and(|v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        });
        let format = match format.map(|f| f.trim().to_ascii_lowercase()) {
            Some(f) if f == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self { enable_otel, format }
    }
}

/// `RUST_LOG` if set and valid, otherwise [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the global tracing subscriber.
///
/// - Always installs an `fmt` layer (text or JSON) with target visibility and
///   span close timing.
/// - When `enable_otel` is set, additionally bridges tracing spans to
///   OpenTelemetry using a stdout exporter.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init_tracing(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let text_layer = (options.format == LogFormat::Text).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let json_layer = (options.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });

    let otel_layer = if options.enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer(TRACER_NAME);
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// No-op when OTel was not enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
