//! Request and response model shared by the interceptor, its store and the network seam.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation (address bar, link click, reload).
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

/// What the response will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    #[default]
    Empty,
    Other,
}

/// An outgoing request as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: HeaderMap,
}

impl Request {
    /// A plain `GET` subresource request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: HeaderMap::new(),
        }
    }

    /// A top-level document navigation.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, destination: Destination::Document, ..Self::get(url) }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// URL with the fragment removed, the form used for store identity.
    pub fn key_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }
}

/// A response snapshot: status, headers and a body that can be shared freely.
///
/// The body is a reference-counted immutable buffer, so cloning a response to
/// store it and hand it back never consumes either copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    /// `200 OK` with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether the response carries `Vary: *`, which no store may hold.
    pub fn varies_on_everything(&self) -> bool {
        self.headers
            .get_all(header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|v| v.trim() == "*")
    }
}

/// Why a response cannot be written to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unstorable {
    Method(Method),
    PartialContent,
    VaryStar,
}

impl std::fmt::Display for Unstorable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unstorable::Method(m) => write!(f, "{m} requests are not storable"),
            Unstorable::PartialContent => write!(f, "206 partial responses are not storable"),
            Unstorable::VaryStar => write!(f, "responses with 'Vary: *' are not storable"),
        }
    }
}

/// Check whether a request/response pair may be written to a store.
pub fn check_storable(request: &Request, response: &Response) -> Result<(), Unstorable> {
    if request.method != Method::GET {
        return Err(Unstorable::Method(request.method.clone()));
    }
    if response.status == StatusCode::PARTIAL_CONTENT {
        return Err(Unstorable::PartialContent);
    }
    if response.varies_on_everything() {
        return Err(Unstorable::VaryStar);
    }
    Ok(())
}
