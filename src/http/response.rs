//! Response sink handed to handlers.
//!
//! # Responsibilities
//! - Collect status, headers and body written by a handler
//! - Encode JSON bodies and set the matching content type
//! - Convert the collected parts into an axum `Response`
//!
//! # Design Decisions
//! - The first status set wins; writing the body fixes it at 200 if unset
//! - Writing the body freezes the headers sent to the client
//! - A failed JSON encode leaves the writer untouched

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde::Serialize;
use thiserror::Error;

/// Errors returned to handlers by the response sink.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("json encode: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid header name: {0}")]
    HeaderName(#[from] axum::http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    HeaderValue(#[from] axum::http::header::InvalidHeaderValue),
}

/// Buffered response built by a handler.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    /// Snapshot taken when the body was first written.
    sent_headers: Option<HeaderMap>,
    body: Vec<u8>,
    delay: Option<Duration>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status code. Only the first call (or the implicit 200 of a
    /// body write) takes effect.
    pub fn set_status_code(&mut self, status: StatusCode) {
        if let Some(current) = self.status {
            tracing::warn!(
                status = %status,
                current = %current,
                "Superfluous status code; ignoring"
            );
            return;
        }
        self.status = Some(status);
    }

    /// Status set so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Replace the body with raw bytes. Returns the number of bytes written.
    pub fn set_body_bytes(&mut self, body: impl AsRef<[u8]>) -> usize {
        self.commit();
        self.body = body.as_ref().to_vec();
        self.body.len()
    }

    /// Encode `value` as JSON and use it as the body.
    ///
    /// Sets `content-type: application/json`. On encode failure nothing is
    /// written and the error is returned.
    pub fn set_body_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<usize, ResponseError> {
        let encoded = serde_json::to_vec(value)?;
        if self.sent_headers.is_none() {
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        Ok(self.set_body_bytes(encoded))
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn header(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable headers. Changes after the body is written are not sent.
    pub fn header_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Insert a header from string parts.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ResponseError> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Hold the response for `delay` after the handler returns.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = Some(delay);
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    fn commit(&mut self) {
        if self.sent_headers.is_none() {
            self.status.get_or_insert(StatusCode::OK);
            self.sent_headers = Some(self.headers.clone());
        }
    }

    pub fn into_response(self) -> Response {
        let headers = self.sent_headers.unwrap_or(self.headers);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = headers;
        response
    }
}
