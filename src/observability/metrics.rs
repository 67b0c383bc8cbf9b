//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own a per-process Prometheus recorder (no global recorder is installed)
//! - Register the request latency histogram
//! - Register cache gauges that are evaluated at scrape time
//! - Render the exposition text for `/metrics`
//!
//! # Metrics
//! - `jwt_decode_http_server_requests` (histogram): decode endpoint latency
//! - `jwt_decode_cache_hit_ratio` (gauge): cache hits / lookups
//! - `jwt_decode_cache_requests{outcome="hit"|"miss"}` (gauge): cache lookup counts
//!
//! # Design Decisions
//! - Names are `{namespace}_{subsystem}_{name}`
//! - Constant labels are passed as a flat key/value list and must pair up

use std::sync::Arc;

use metrics::{Gauge, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use thiserror::Error;

use crate::decoder::cache::CacheStats;

/// Namespace prefixed to every metric name.
pub const NAMESPACE: &str = "jwt_decode";

/// Histogram buckets in seconds.
pub const LATENCY_BUCKETS: [f64; 6] = [0.001, 0.005, 0.01, 0.02, 0.05, 0.1];

/// Errors raised while registering metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("labels need to be defined in pairs, got {count} values")]
    InvalidLabelPairing { count: usize },

    #[error("failed to build metrics recorder: {0}")]
    Build(#[from] BuildError),
}

/// Naming and constant labels for a single metric.
#[derive(Debug, Clone, Copy)]
pub struct MetricOpts<'a> {
    pub subsystem: &'a str,
    pub name: &'a str,
    pub help: &'static str,
    /// Flat `[key, value, key, value, ...]` list.
    pub labels: &'a [&'a str],
}

/// Convert a flat key/value list into labels.
pub fn const_labels(labels: &[&str]) -> Result<Vec<Label>, MetricsError> {
    if labels.len() % 2 != 0 {
        return Err(MetricsError::InvalidLabelPairing { count: labels.len() });
    }
    Ok(labels
        .chunks_exact(2)
        .map(|pair| Label::new(pair[0].to_string(), pair[1].to_string()))
        .collect())
}

type GaugeFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// Registry backing the `/metrics` endpoint.
pub struct MetricsRegistry {
    namespace: String,
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    gauge_fns: Vec<(Gauge, GaugeFn)>,
}

impl MetricsRegistry {
    /// Create an empty registry whose histograms use [`LATENCY_BUCKETS`].
    pub fn new(namespace: &str) -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets(&LATENCY_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();

        Ok(Self {
            namespace: namespace.to_string(),
            recorder,
            handle,
            gauge_fns: Vec::new(),
        })
    }

    /// Fully qualified metric name.
    pub fn metric_name(&self, opts: &MetricOpts<'_>) -> String {
        format!("{}_{}_{}", self.namespace, opts.subsystem, opts.name)
    }

    fn key(&self, opts: &MetricOpts<'_>) -> Result<Key, MetricsError> {
        let labels = const_labels(opts.labels)?;
        Ok(Key::from_parts(self.metric_name(opts), labels))
    }

    /// Register a histogram.
    pub fn register_histogram(&self, opts: &MetricOpts<'_>, unit: Unit) -> Result<Histogram, MetricsError> {
        let key = self.key(opts)?;
        self.recorder.describe_histogram(
            KeyName::from(self.metric_name(opts)),
            Some(unit),
            SharedString::from(opts.help),
        );
        Ok(self.recorder.register_histogram(&key, &metadata()))
    }

    /// Register a gauge whose value is pulled from `f` on every render.
    pub fn register_gauge_fn<F>(&mut self, opts: &MetricOpts<'_>, f: F) -> Result<(), MetricsError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let key = self.key(opts)?;
        self.recorder.describe_gauge(
            KeyName::from(self.metric_name(opts)),
            None,
            SharedString::from(opts.help),
        );
        let gauge = self.recorder.register_gauge(&key, &metadata());
        self.gauge_fns.push((gauge, Box::new(f)));
        Ok(())
    }

    /// Evaluate gauge functions and render the exposition text.
    pub fn render(&self) -> String {
        for (gauge, f) in &self.gauge_fns {
            gauge.set(f());
        }
        self.handle.render()
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

/// Register the decode endpoint latency histogram.
pub fn register_request_histogram(registry: &MetricsRegistry) -> Result<Histogram, MetricsError> {
    registry.register_histogram(
        &MetricOpts {
            subsystem: "http_server",
            name: "requests",
            help: "Latency of requests through the decode endpoint.",
            labels: &[],
        },
        Unit::Seconds,
    )
}

/// Register hit ratio, hit count and miss count gauges backed by live cache stats.
pub fn register_cache_metrics(registry: &mut MetricsRegistry, stats: Arc<CacheStats>) -> Result<(), MetricsError> {
    let ratio = Arc::clone(&stats);
    registry.register_gauge_fn(
        &MetricOpts {
            subsystem: "cache",
            name: "hit_ratio",
            help: "Ratio of token cache lookups that were hits.",
            labels: &[],
        },
        move || ratio.ratio(),
    )?;

    let hits = Arc::clone(&stats);
    registry.register_gauge_fn(
        &MetricOpts {
            subsystem: "cache",
            name: "requests",
            help: "Token cache lookups by outcome.",
            labels: &["outcome", "hit"],
        },
        move || hits.hits() as f64,
    )?;

    registry.register_gauge_fn(
        &MetricOpts {
            subsystem: "cache",
            name: "requests",
            help: "Token cache lookups by outcome.",
            labels: &["outcome", "miss"],
        },
        move || stats.misses() as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_labels_must_pair() {
        let labels = const_labels(&["outcome", "hit", "tier", "a"]).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].key(), "outcome");
        assert_eq!(labels[0].value(), "hit");

        assert!(matches!(
            const_labels(&["outcome"]),
            Err(MetricsError::InvalidLabelPairing { count: 1 })
        ));
    }

    #[test]
    fn test_odd_labels_fail_registration() {
        let mut registry = MetricsRegistry::new(NAMESPACE).unwrap();
        let result = registry.register_gauge_fn(
            &MetricOpts { subsystem: "cache", name: "broken", help: "", labels: &["a", "b", "c"] },
            || 0.0,
        );
        assert!(matches!(result, Err(MetricsError::InvalidLabelPairing { count: 3 })));
    }

    #[test]
    fn test_histogram_uses_fixed_buckets() {
        let registry = MetricsRegistry::new(NAMESPACE).unwrap();
        let histogram = register_request_histogram(&registry).unwrap();
        histogram.record(0.003);

        let output = registry.render();
        assert!(output.contains("jwt_decode_http_server_requests_bucket{le=\"0.001\"} 0"));
        assert!(output.contains("jwt_decode_http_server_requests_bucket{le=\"0.005\"} 1"));
        assert!(output.contains("jwt_decode_http_server_requests_bucket{le=\"0.1\"} 1"));
        assert!(output.contains("jwt_decode_http_server_requests_count 1"));
    }

    #[test]
    fn test_cache_gauges_are_read_at_scrape_time() {
        let mut registry = MetricsRegistry::new(NAMESPACE).unwrap();
        let stats = Arc::new(CacheStats::default());
        register_cache_metrics(&mut registry, Arc::clone(&stats)).unwrap();

        let output = registry.render();
        assert!(output.contains("jwt_decode_cache_requests{outcome=\"hit\"} 0"));
        assert!(output.contains("jwt_decode_cache_hit_ratio 0"));

        stats.record_miss();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();

        let output = registry.render();
        assert!(output.contains("jwt_decode_cache_requests{outcome=\"hit\"} 3"));
        assert!(output.contains("jwt_decode_cache_requests{outcome=\"miss\"} 1"));
        assert!(output.contains("jwt_decode_cache_hit_ratio 0.75"));
    }
}
