//! Outbound HTTP helper.
//!
//! A thin reqwest wrapper that resolves paths against a base URL and returns
//! the status, headers and fully-read body in one call.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// True when the request failed because a client timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Request(e) if e.is_timeout())
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ClientResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a request to `path` (resolved against the base URL).
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: impl Into<reqwest::Body>,
        query: &[(&str, &str)],
    ) -> Result<ClientResponse, ClientError> {
        let url = self.base_url.join(path)?;
        let mut request = self.client.request(method, url).body(body);
        if !query.is_empty() {
            request = request.query(query);
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(ClientResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get(&self, path: &str) -> Result<ClientResponse, ClientError> {
        self.send(Method::GET, path, &[], Bytes::new(), &[]).await
    }
}
