//! # Prometheus Metrics
//!
//! Counters and latencies for the JSON API, scraped at `/metrics` on the
//! metrics port. Metrics live in their own [`prometheus::Registry`] under
//! the `zeref` prefix.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metric handles for the API server.
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    /// Requests served, by route and status class.
    pub requests_total: IntCounterVec,
    /// Vault read-only queries that failed, by route.
    pub vault_query_failures_total: IntCounterVec,
    /// Price lookups answered with the fallback constant.
    pub price_fallbacks_total: IntCounter,
    /// Balance lookups that ended as "unknown".
    pub balance_unknown_total: IntCounter,
    /// Handler latency in seconds, by route.
    pub request_latency_seconds: HistogramVec,
}

impl ApiMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("zeref".into()), None)
            .expect("failed to create prometheus registry");

        let requests_total = IntCounterVec::new(
            Opts::new("api_requests_total", "API requests served"),
            &["route", "status"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(requests_total.clone()))
            .expect("metric registration");

        let vault_query_failures_total = IntCounterVec::new(
            Opts::new(
                "vault_query_failures_total",
                "Vault read-only queries that failed",
            ),
            &["route"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(vault_query_failures_total.clone()))
            .expect("metric registration");

        let price_fallbacks_total = IntCounter::new(
            "price_fallbacks_total",
            "Price lookups answered with the fallback price",
        )
        .expect("metric creation");
        registry
            .register(Box::new(price_fallbacks_total.clone()))
            .expect("metric registration");

        let balance_unknown_total = IntCounter::new(
            "balance_unknown_total",
            "Balance lookups whose result was unknown",
        )
        .expect("metric creation");
        registry
            .register(Box::new(balance_unknown_total.clone()))
            .expect("metric registration");

        let request_latency_seconds = HistogramVec::new(
            HistogramOpts::new("api_request_latency_seconds", "API handler latency in seconds")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["route"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(request_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            requests_total,
            vault_query_failures_total,
            price_fallbacks_total,
            balance_unknown_total,
            request_latency_seconds,
        }
    }

    /// Records one finished request.
    pub fn observe(&self, route: &str, status: StatusCode, elapsed_secs: f64) {
        let class = match status.as_u16() {
            200..=299 => "2xx",
            400..=499 => "4xx",
            _ => "5xx",
        };
        self.requests_total.with_label_values(&[route, class]).inc();
        self.request_latency_seconds
            .with_label_values(&[route])
            .observe(elapsed_secs);
    }

    /// Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<ApiMetrics>;

/// Renders `/metrics`.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_requests_show_up_in_output() {
        let metrics = ApiMetrics::new();
        metrics.observe("/price", StatusCode::OK, 0.02);
        metrics.observe("/vault/stats", StatusCode::BAD_GATEWAY, 0.3);
        metrics.price_fallbacks_total.inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("zeref_api_requests_total{route=\"/price\",status=\"2xx\"} 1"));
        assert!(text.contains("zeref_api_requests_total{route=\"/vault/stats\",status=\"5xx\"} 1"));
        assert!(text.contains("zeref_price_fallbacks_total 1"));
        assert!(text.contains("zeref_api_request_latency_seconds_bucket"));
    }
}
