//! Inbound request view handed to handlers.
//!
//! # Responsibilities
//! - Expose method, path, headers, query and the buffered body
//! - Expose parameters bound by the route template
//!
//! # Design Decisions
//! - The body is the same buffer the call record holds
//! - Unbound parameters and missing query keys read as ""

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap, Method, Uri, Version};
use serde::de::DeserializeOwned;

use crate::recording::snapshot::{parse_query, QueryValues};
use crate::routing::PathParams;

/// Header carrying the per-request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Path parameters bound for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(PathParams);

impl Params {
    /// Value bound to `name`, or the empty string when unbound.
    pub fn by_name(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &PathParams {
        &self.0
    }
}

impl From<PathParams> for Params {
    fn from(params: PathParams) -> Self {
        Self(params)
    }
}

/// A routed request as seen by a handler.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    query: QueryValues,
    body: Bytes,
    params: Params,
}

impl Request {
    pub fn from_parts(parts: Parts, body: Bytes, params: PathParams) -> Self {
        Self {
            query: parse_query(parts.uri.query()),
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            params: params.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self) -> &QueryValues {
        &self.query
    }

    /// First query value for `key`, or the empty string.
    pub fn form_value(&self, key: &str) -> &str {
        self.query
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
