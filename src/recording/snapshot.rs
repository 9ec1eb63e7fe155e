//! Request snapshots.
//!
//! # Responsibilities
//! - Copy body, headers, query and path parameters of a routed request
//! - Produce an immutable `CallRecord` detached from transport state
//!
//! # Design Decisions
//! - The body is buffered once into `Bytes`; the handler reads the same buffer
//! - Headers and query values are owned copies

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, Method};
use serde::de::DeserializeOwned;

use crate::http::request::X_REQUEST_ID;
use crate::routing::PathParams;

/// Query parameter name to every value it was given, in request order.
pub type QueryValues = BTreeMap<String, Vec<String>>;

/// Snapshot of one routed request.
#[derive(Debug, Clone, Default)]
pub struct CallRecord {
    /// Request method.
    pub method: Method,
    /// Concrete request path (without query).
    pub path: String,
    /// Full request body.
    pub body: Bytes,
    /// Request headers.
    pub headers: HeaderMap,
    /// Decoded query parameters.
    pub query: QueryValues,
    /// Parameters bound by the route template.
    pub params: PathParams,
    /// Request ID assigned by the server.
    pub request_id: Option<String>,
}

impl CallRecord {
    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Deserialize the recorded body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Capture a routed request.
pub fn capture(parts: &Parts, body: &Bytes, params: &PathParams) -> CallRecord {
    CallRecord {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        body: body.clone(),
        headers: parts.headers.clone(),
        query: parse_query(parts.uri.query()),
        params: params.clone(),
        request_id: parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// Decode a raw query string into a multimap.
pub fn parse_query(query: Option<&str>) -> QueryValues {
    let mut values = QueryValues::new();
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            values
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }
    values
}
