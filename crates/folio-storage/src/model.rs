//! Request and response model shared by the cache and the network layer

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical cache key: request method plus the full URL, query included
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &Method, url: impl Into<String>) -> Self {
        Self {
            method: method.as_str().to_string(),
            url: url.into(),
        }
    }

    /// Stable SHA-256 hex digest of the key, used for on-disk file names
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An intercepted request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Identifier of the host client (page) that issued the request
    pub client_id: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            client_id: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, self.url.clone())
    }
}

/// A complete response: status, headers and a fully buffered body.
///
/// The body is an immutable `Bytes` buffer, so a stored copy and the copy
/// handed back to the requester can both be read in full independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True for any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A stored response together with its insertion bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: RequestKey,
    pub response: Response,
    pub inserted_at: DateTime<Utc>,
    /// Monotonic per-store counter, breaks ties between equal timestamps
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_includes_method_and_query() {
        let get = Request::get("https://example.com/book.epub?v=2").key();
        let head = Request::new(Method::HEAD, "https://example.com/book.epub?v=2").key();
        let other_query = Request::get("https://example.com/book.epub?v=3").key();

        assert_ne!(get, head);
        assert_ne!(get, other_query);
        assert_eq!(get.to_string(), "GET https://example.com/book.epub?v=2");
        assert_eq!(get.digest(), Request::get("https://example.com/book.epub?v=2").key().digest());
        assert_ne!(get.digest(), other_query.digest());
    }

    #[test]
    fn test_response_helpers() {
        let response = Response::new(204, "").with_header("Content-Type", "text/plain");
        assert!(response.is_success());
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert!(!Response::new(304, "").is_success());
        assert!(!Response::new(500, "").is_success());
    }
}
