//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_cache_lookups_total` (counter): cache reads by result (hit, miss, error)
//! - `gateway_stale_fallbacks_total` (counter): stale values served under an open breaker
//! - `gateway_dedup_joins_total` (counter): callers coalesced onto an in-flight request
//! - `gateway_dispatch_total` (counter): index dispatches by outcome
//! - `gateway_dispatch_duration_seconds` (histogram): dispatch latency
//! - `gateway_queue_depth` (gauge): entries waiting for a slot
//! - `gateway_active_requests` (gauge): dispatches in flight
//! - `gateway_circuit_open` (gauge): 1=open, 0=closed
//! - `gateway_upstream_responses_total` (counter): index HTTP responses by status
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter

use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;

use crate::index::IndexResult;

/// Install the Prometheus exporter with its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    match builder.with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

pub fn record_cache_lookup(result: &'static str) {
    ::metrics::counter!("gateway_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_stale_fallback() {
    ::metrics::counter!("gateway_stale_fallbacks_total").increment(1);
}

pub fn record_dedup_join() {
    ::metrics::counter!("gateway_dedup_joins_total").increment(1);
}

pub fn record_dispatch(outcome: &IndexResult<Value>, elapsed: Duration) {
    let label = match outcome {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    ::metrics::counter!("gateway_dispatch_total", "outcome" => label).increment(1);
    ::metrics::histogram!("gateway_dispatch_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_queue_depth(queued: usize, active: usize) {
    ::metrics::gauge!("gateway_queue_depth").set(queued as f64);
    ::metrics::gauge!("gateway_active_requests").set(active as f64);
}

pub fn record_circuit_state(open: bool) {
    ::metrics::gauge!("gateway_circuit_open").set(if open { 1.0 } else { 0.0 });
}

pub fn record_upstream_status(status: u16) {
    ::metrics::counter!("gateway_upstream_responses_total", "status" => status.to_string())
        .increment(1);
}

/// Recorder that keeps the last value of every gauge.
#[cfg(test)]
pub(crate) mod testing {
    use ::metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Cell(AtomicU64);

    impl GaugeFn for Cell {
        fn increment(&self, value: f64) {
            self.set(f64::from_bits(self.0.load(Ordering::SeqCst)) + value);
        }

        fn decrement(&self, value: f64) {
            self.set(f64::from_bits(self.0.load(Ordering::SeqCst)) - value);
        }

        fn set(&self, value: f64) {
            self.0.store(value.to_bits(), Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    pub struct GaugeRecorder {
        gauges: Mutex<HashMap<String, Arc<Cell>>>,
    }

    impl GaugeRecorder {
        pub fn value(&self, name: &str) -> Option<f64> {
            let gauges = self.gauges.lock().unwrap();
            gauges
                .get(name)
                .map(|cell| f64::from_bits(cell.0.load(Ordering::SeqCst)))
        }
    }

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let cell = self
                .gauges
                .lock()
                .unwrap()
                .entry(key.name().to_string())
                .or_default()
                .clone();
            Gauge::from_arc(cell)
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }
}
