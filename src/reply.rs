//! The response façade handed to handlers, and per-route response defaults.

use crate::error::HttpError;
use crate::handler::Output;

use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

pub(crate) const JSON: &str = "application/json";
pub(crate) const HTML: &str = "text/html; charset=utf-8";
pub(crate) const TEXT: &str = "text/plain; charset=utf-8";

/// Status, content type, headers and cache settings applied to a route's
/// response before its handler runs. The handler may still override them.
///
/// ```rust
/// use httpdispatch::ResponseDefaults;
/// use hyper::header::{HeaderName, HeaderValue};
/// use hyper::StatusCode;
///
/// let defaults = ResponseDefaults::new()
///     .status(StatusCode::CREATED)
///     .content_type(HeaderValue::from_static("application/json"))
///     .header(HeaderName::from_static("x-api"), HeaderValue::from_static("v1"))
///     .cache(false);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseDefaults {
    status: Option<StatusCode>,
    content_type: Option<HeaderValue>,
    headers: Vec<(HeaderName, HeaderValue)>,
    cache: Option<bool>,
}

impl ResponseDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Whether clients may cache the response. Disabling it adds no-cache headers.
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub(crate) fn apply(&self, reply: &mut Reply) {
        if let Some(status) = self.status {
            reply.status = status;
        }
        if let Some(content_type) = &self.content_type {
            reply.headers.insert(header::CONTENT_TYPE, content_type.clone());
        }
        for (name, value) in &self.headers {
            reply.headers.insert(name.clone(), value.clone());
        }
        if let Some(cache) = self.cache {
            reply.cache = cache;
        }
    }
}

/// The shape of response a calling convention expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// The handler produces its response as a side effect, or returns text.
    Sync,
    /// The handler returns data that is sent as JSON.
    Restful,
    /// Untyped, used for resources and error output.
    Any,
}

/// A response under construction.
///
/// Handlers receive a `Reply` already populated with the route's
/// [`ResponseDefaults`]. Writing a body consumes the reply and produces an
/// [`Output`] that tells the dispatcher the response is complete.
#[derive(Debug)]
pub struct Reply {
    kind: ReplyKind,
    status: StatusCode,
    headers: HeaderMap,
    cache: bool,
    body: Option<Bytes>,
}

impl Reply {
    pub(crate) fn new(kind: ReplyKind) -> Self {
        Reply {
            kind,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cache: true,
            body: None,
        }
    }

    pub(crate) fn with_defaults(kind: ReplyKind, defaults: Option<&ResponseDefaults>) -> Self {
        let mut reply = Reply::new(kind);
        if let Some(defaults) = defaults {
            defaults.apply(&mut reply);
        }
        reply
    }

    pub fn kind(&self) -> ReplyKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(header::CONTENT_TYPE)
    }

    pub fn set_content_type(&mut self, value: HeaderValue) -> &mut Self {
        self.set_header(header::CONTENT_TYPE, value)
    }

    pub fn cache(&self) -> bool {
        self.cache
    }

    pub fn set_cache(&mut self, cache: bool) -> &mut Self {
        self.cache = cache;
        self
    }

    /// Writes a raw body. The content type is left as configured.
    pub fn send(self, body: impl Into<Bytes>) -> Output {
        Output::NoSend(self.with_body(body))
    }

    pub(crate) fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Writes a text body, defaulting the content type to `text/plain`.
    pub fn text(mut self, body: impl Into<String>) -> Output {
        self.default_content_type(TEXT);
        self.send(body.into())
    }

    /// Writes a text body, defaulting the content type to `text/html`.
    pub fn html(mut self, body: impl Into<String>) -> Output {
        self.default_content_type(HTML);
        self.send(body.into())
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Output, HttpError> {
        let body = serde_json::to_vec(value)?;
        self.default_content_type(JSON);
        Ok(self.send(body))
    }

    /// Completes the reply without a body.
    pub fn empty(self) -> Output {
        self.send(Bytes::new())
    }

    pub(crate) fn default_content_type(&mut self, content_type: &'static str) {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    pub(crate) fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        if !self.cache {
            let headers = response.headers_mut();
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            );
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        }
        response
    }
}
