//! Host boundary types: the inbound request view, the per-request report
//! context, and the response surface the gate mutates when it blocks.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Request, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Base used to resolve relative request targets.
const LOCAL_BASE: &str = "http://localhost";

const DEFAULT_METHOD: &str = "GET";

// ============================================================================
// Inbound request
// ============================================================================

/// The parts of an inbound request the gate reads.
///
/// Every field is optional on purpose; missing values fall back to `/`,
/// `GET` and empty headers.
#[derive(Debug, Clone, Default)]
pub struct GateRequest {
    url: Option<String>,
    method: Option<String>,
    headers: HeaderMap,
}

impl GateRequest {
    /// Request for `url` with no method and no headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Append a header value. Names that are not valid header names are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Copy the request line and headers out of an `http` request.
    pub fn from_http<B>(request: &Request<B>) -> Self {
        Self {
            url: Some(request.uri().to_string()),
            method: Some(request.method().as_str().to_string()),
            headers: request.headers().clone(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or(DEFAULT_METHOD)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl From<&http::request::Parts> for GateRequest {
    fn from(parts: &http::request::Parts) -> Self {
        Self {
            url: Some(parts.uri.to_string()),
            method: Some(parts.method.as_str().to_string()),
            headers: parts.headers.clone(),
        }
    }
}

/// Path and query of a request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    /// The raw URL as received (`/` when missing)
    pub url: String,
    /// Percent-encoded path, always starting with `/`
    pub path: String,
    /// `?`-prefixed query string, or empty
    pub query: String,
}

impl RequestTarget {
    /// Resolve `url` against `http://localhost`. Unparseable targets map to `/`.
    pub fn parse(url: Option<&str>) -> Self {
        let raw = url.filter(|u| !u.is_empty()).unwrap_or("/");
        let resolved = Url::parse(LOCAL_BASE).and_then(|base| base.join(raw));

        let (path, query) = match resolved {
            Ok(parsed) => (
                parsed.path().to_string(),
                parsed
                    .query()
                    .filter(|q| !q.is_empty())
                    .map(|q| format!("?{q}"))
                    .unwrap_or_default(),
            ),
            Err(_) => ("/".to_string(), String::new()),
        };

        Self {
            url: raw.to_string(),
            path,
            query,
        }
    }
}

/// Flatten a header map: lower-case names, repeated values joined with `", "`.
pub fn normalize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), joined)
        })
        .collect()
}

// ============================================================================
// Report context
// ============================================================================

/// Everything the collector receives about one visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub url: String,
    pub method: String,
    pub path: String,
    pub query: String,
    pub user_agent: String,
    pub referrer: String,
    /// Raw `x-forwarded-for` value
    pub ip: String,
    pub headers: BTreeMap<String, String>,
    /// Status the visitor receives: 200 or 403
    pub response_status: u16,
}

// ============================================================================
// Response surface
// ============================================================================

/// The mutable parts of an outgoing response.
pub trait ResponseSink {
    fn set_status(&mut self, status: StatusCode);
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);
}

impl<B> ResponseSink for http::Response<B> {
    fn set_status(&mut self, status: StatusCode) {
        *self.status_mut() = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(name, value);
    }
}

impl ResponseSink for http::response::Parts {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }
}
