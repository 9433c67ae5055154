//! Subscriber installation for the translator and the GraphQL server.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{Config, SimpleSpanProcessor, TracerProvider};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACER_PROVIDER: OnceLock<TracerProvider> = OnceLock::new();

/// Filter used when neither `RUST_LOG` nor a configured filter is set.
///
/// REST call spans live in this crate, so it is listed next to the crates
/// that log translation and request handling.
pub const DEFAULT_FILTER: &str =
    "oasgraph_openapi=info,oasgraph_server=info,oasgraph_telemetry=info,warn";

/// Logging and tracing setup, applied once per process by [`Telemetry::init`].
///
/// # Example
///
/// ```rust,no_run
/// use oasgraph_telemetry::Telemetry;
///
/// Telemetry::new("oasgraph_openapi=debug,info")
///     .service_name("petstore-graphql")
///     .init();
/// ```
pub struct Telemetry {
    filter: String,
    service_name: String,
    json: bool,
    processors: Vec<SimpleSpanProcessor>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER)
    }
}

impl Telemetry {
    /// `filter` applies when `RUST_LOG` is not set.
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            service_name: crate::attributes::SYSTEM_NAME.to_string(),
            json: false,
            processors: Vec::new(),
        }
    }

    /// Name reported as `service.name` on exported spans.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Emit log lines as JSON objects instead of human-readable text.
    pub fn json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    /// Export spans (REST calls included) through `processor`.
    pub fn with_span_processor(mut self, processor: SimpleSpanProcessor) -> Self {
        self.processors.push(processor);
        self
    }

    /// Install the global subscriber.
    ///
    /// Returns false when a subscriber was already installed; the earlier
    /// setup then stays in effect.
    pub fn init(self) -> bool {
        if TRACER_PROVIDER.get().is_some() {
            return false;
        }

        let resource = Resource::new(vec![KeyValue::new("service.name", self.service_name.clone())]);
        let mut builder =
            TracerProvider::builder().with_config(Config::default().with_resource(resource));
        for processor in self.processors {
            builder = builder.with_span_processor(processor);
        }
        let provider = builder.build();
        let tracer = provider.tracer(self.service_name);
        if TRACER_PROVIDER.set(provider).is_err() {
            return false;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter));
        let text = (!self.json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
        });
        let json = self
            .json
            .then(|| tracing_subscriber::fmt::layer().json().with_current_span(true));

        let result = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .with(text)
            .with(json)
            .with(filter)
            .try_init();

        if let Err(e) = result {
            tracing::debug!("Tracing subscriber already installed: {}", e);
            return false;
        }
        true
    }
}

/// The tracer provider installed by [`Telemetry::init`], if any.
pub fn tracer_provider() -> Option<TracerProvider> {
    TRACER_PROVIDER.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_once() {
        assert!(Telemetry::new("warn").service_name("oasgraph-test").init());
        assert!(!Telemetry::default().init());
        assert!(tracer_provider().is_some());
    }
}
