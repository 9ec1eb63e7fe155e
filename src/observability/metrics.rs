//! Metrics collection.
//!
//! # Metrics
//! - `mock_requests_total` (counter): routed requests by method, route, status
//! - `mock_unmatched_requests_total` (counter): requests with no route, by method
//! - `mock_handler_panics_total` (counter): handlers that panicked, by route
//! - `mock_handler_duration_seconds` (histogram): dispatch latency by route
//!
//! # Design Decisions
//! - Only the `metrics` facade is used; the host installs a recorder if it
//!   wants the numbers, otherwise every call is a no-op
//! - Labels use the route template, never the concrete path

use std::time::Instant;

use axum::http::{Method, StatusCode};
use metrics::{counter, histogram};

use crate::routing::RouteKey;

pub fn record_request(route: &RouteKey, status: StatusCode, start_time: Instant) {
    counter!(
        "mock_requests_total",
        "method" => route.method().to_string(),
        "route" => route.template().to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    histogram!(
        "mock_handler_duration_seconds",
        "route" => route.template().to_string()
    )
    .record(start_time.elapsed().as_secs_f64());
}

pub fn record_unmatched(method: &Method) {
    counter!("mock_unmatched_requests_total", "method" => method.to_string()).increment(1);
}

pub fn record_handler_panic(route: &RouteKey) {
    counter!(
        "mock_handler_panics_total",
        "route" => route.template().to_string()
    )
    .increment(1);
}
