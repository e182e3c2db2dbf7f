//! The dispatch adapter: from a request to exactly one response.
//!
//! For each request the adapter looks up the route, checks the verb, gathers
//! parameters, runs validation, invokes the handler according to its calling
//! convention and turns the return value into a response. Every failure on
//! the way is routed through the error routes exactly once.

use crate::error::HttpError;
use crate::error_route::ErrorRoutes;
use crate::handler::{
    Convention, ErrorHandler, ErrorInfo, Handler, HandlerResult, Output, Restful, SyncHandler,
};
use crate::method::MethodMask;
use crate::params::Params;
use crate::reply::{self, Reply, ReplyKind};
use crate::table::RouteTable;
use crate::template::CATCH_ALL;

use futures_util::future::{self, BoxFuture, FutureExt};
use hyper::header::{self, HeaderValue};
use hyper::body::HttpBody;
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use url::form_urlencoded;

const FORM: &str = "application/x-www-form-urlencoded";

/// Default cap on a buffered form or JSON request body.
const MAX_BODY: usize = 0x10_0000;

/// Behavior toggles set on the router.
#[derive(Clone)]
pub(crate) struct Settings {
    pub(crate) handle_options: bool,
    pub(crate) global_options: Option<Arc<dyn SyncHandler>>,
    pub(crate) json_errors: bool,
    pub(crate) max_body: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            handle_options: true,
            global_options: None,
            json_errors: false,
            max_body: MAX_BODY,
        }
    }
}

/// A failed request together with whether its route answers with JSON.
struct Failure {
    error: HttpError,
    json: bool,
}

impl Failure {
    fn new(error: HttpError, json: bool) -> Self {
        Self { error, json }
    }
}

/// Everything the serve phase needs, shared behind an `Arc`.
pub(crate) struct Core {
    pub(crate) table: RouteTable,
    pub(crate) errors: ErrorRoutes,
    pub(crate) settings: Settings,
}

impl Core {
    pub(crate) async fn dispatch(self: Arc<Self>, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        tracing::debug!(method = %method, path = %path, "dispatching request");

        match self.route(req).await {
            Ok(response) => response,
            Err(failure) => self.fail(failure, &method, &path).await,
        }
    }

    async fn route(&self, req: Request<Body>) -> Result<Response<Body>, Failure> {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let lookup = self.table.lookup(&method, &path);

        if method == Method::OPTIONS && self.settings.handle_options {
            let explicit = lookup
                .as_ref()
                .map_or(false, |l| !l.fallback && l.accepts(&method));
            if !explicit {
                let allowed = self.table.allowed(&path);
                if !allowed.is_empty() {
                    return self.options(&req, allowed | MethodMask::OPTIONS);
                }
            }
        }

        let lookup = lookup.ok_or_else(|| Failure::new(HttpError::not_found(), false))?;
        let entry = lookup.entry;
        let convention = entry.handler().convention();
        let json = convention.is_restful();

        if !lookup.accepts(&method) {
            let allowed = if lookup.fallback {
                entry.allowed()
            } else {
                self.table.allowed(&path)
            };
            return Err(Failure::new(
                HttpError::method_not_allowed(&method, allowed),
                json,
            ));
        }

        let mut params = lookup.params;
        let mut req = req;
        if !matches!(entry.handler(), Handler::Resource(_)) {
            req = gather(req, &mut params, self.settings.max_body)
                .await
                .map_err(|err| Failure::new(err, json))?;
        }

        if let Some(validation) = entry.validation() {
            params = validation
                .execute(&params, req.headers())
                .map_err(|err| Failure::new(err.into(), json))?;
        }

        req.extensions_mut().insert(params.clone());

        let kind = convention.reply_kind();
        let defaults = entry.defaults();
        let reply = Reply::with_defaults(kind, defaults);

        let result = match entry.handler() {
            Handler::Sync(handler) => {
                panic::catch_unwind(AssertUnwindSafe(|| handler.call(&req, reply)))
                    .unwrap_or_else(|payload| Err(panicked(payload)))
            }
            Handler::Restful(handler) => {
                let fut = restful(handler.as_ref(), &method, req, params, reply);
                guard(fut).await
            }
            Handler::RestfulGet(handler)
            | Handler::RestfulPost(handler)
            | Handler::RestfulPut(handler)
            | Handler::RestfulPatch(handler)
            | Handler::RestfulDelete(handler)
            | Handler::AnyMethod(handler) => guard(handler.call(req, params, reply)).await,
            Handler::Resource(resource) => {
                let tail = params.get_str(CATCH_ALL).unwrap_or_default();
                let if_none_match = req.headers().get(header::IF_NONE_MATCH);
                guard(resource.serve(&method, tail, if_none_match, reply).boxed()).await
            }
        };

        result
            .and_then(|output| finish(output, || Reply::with_defaults(kind, defaults), text_type(kind)))
            .map_err(|err| Failure::new(err, json))
    }

    /// The automatic reply to an `OPTIONS` request.
    fn options(&self, req: &Request<Body>, allowed: MethodMask) -> Result<Response<Body>, Failure> {
        let preset = || {
            let mut reply = Reply::new(ReplyKind::Sync);
            set_allow(&mut reply, allowed);
            reply
        };

        match &self.settings.global_options {
            Some(handler) => panic::catch_unwind(AssertUnwindSafe(|| handler.call(req, preset())))
                .unwrap_or_else(|payload| Err(panicked(payload)))
                .and_then(|output| finish(output, preset, reply::HTML))
                .map_err(|err| Failure::new(err, false)),
            None => Ok(preset().into_response()),
        }
    }

    /// Answers a failed request through the selected error route.
    async fn fail(&self, failure: Failure, method: &Method, path: &str) -> Response<Body> {
        let Failure { error, json } = failure;
        let status = error.status();

        if status.is_server_error() {
            tracing::error!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                error = %error,
                "request failed"
            );
        } else {
            tracing::warn!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                error = %error,
                "request failed"
            );
        }

        let entry = match self.errors.select(status, path) {
            Some(entry) => entry,
            None => return builtin(&error, json && self.settings.json_errors),
        };

        let info = ErrorInfo {
            status,
            message: error.message_str().map(str::to_owned),
            kind: error.kind().clone(),
            method: method.clone(),
            path: path.to_owned(),
            json,
        };

        match invoke_error(entry.handler(), info, error.allowed()).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    error = %err,
                    "error handler failed"
                );
                builtin(&error, json && self.settings.json_errors)
            }
        }
    }
}

/// Merges query string and body parameters into `params`. Existing entries,
/// such as path parameters, are never overwritten.
async fn gather(
    req: Request<Body>,
    params: &mut Params,
    limit: usize,
) -> Result<Request<Body>, HttpError> {
    if let Some(query) = req.uri().query() {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            params.insert_if_absent(key.into_owned(), value.into_owned());
        }
    }

    if req.method() == Method::GET || req.method() == Method::HEAD {
        return Ok(req);
    }

    let essence = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let is_form = essence == FORM;
    let is_json = essence == reply::JSON;
    if !is_form && !is_json {
        return Ok(req);
    }

    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.map_or(false, |len| len > limit as u64) {
        return Err(too_large(limit));
    }

    let (parts, mut body) = req.into_parts();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if bytes.len() + chunk.len() > limit {
            return Err(too_large(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if is_form {
        for (key, value) in form_urlencoded::parse(&bytes) {
            params.insert_if_absent(key.into_owned(), value.into_owned());
        }
    } else if !bytes.is_empty() {
        let value: Value = serde_json::from_slice(&bytes).map_err(|err| {
            HttpError::with_message(StatusCode::BAD_REQUEST, err.to_string())
        })?;
        if let Value::Object(map) = value {
            for (key, value) in map {
                params.insert_if_absent(key, value);
            }
        }
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn too_large(limit: usize) -> HttpError {
    tracing::warn!(limit, "request body exceeds the size limit");
    HttpError::with_message(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("The request body exceeds {} bytes.", limit),
    )
}

/// Calls the `Restful` method matching the request verb.
fn restful<'a>(
    handler: &'a dyn Restful,
    method: &Method,
    req: Request<Body>,
    params: Params,
    reply: Reply,
) -> BoxFuture<'a, HandlerResult> {
    match *method {
        Method::GET => handler.get(req, params, reply),
        Method::POST => handler.post(req, params, reply),
        Method::PUT => handler.put(req, params, reply),
        Method::PATCH => handler.patch(req, params, reply),
        Method::DELETE => handler.delete(req, params, reply),
        _ => {
            let err = HttpError::method_not_allowed(method, Convention::Restful.allowed());
            future::ready(Err(err)).boxed()
        }
    }
}

/// Awaits a handler future, turning a panic into a 500.
async fn guard(fut: BoxFuture<'_, HandlerResult>) -> HandlerResult {
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(panicked(payload)))
}

fn panicked(payload: Box<dyn Any + Send>) -> HttpError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    tracing::error!(panic = %detail, "handler panicked");
    HttpError::internal("handler panicked")
}

fn text_type(kind: ReplyKind) -> &'static str {
    match kind {
        ReplyKind::Sync => reply::HTML,
        _ => reply::TEXT,
    }
}

/// Turns a handler's output into the response. Values other than a written
/// reply are sent on a fresh reply from `fresh`.
fn finish(
    output: Output,
    fresh: impl FnOnce() -> Reply,
    text_type: &'static str,
) -> Result<Response<Body>, HttpError> {
    let reply = match output {
        Output::NoSend(reply) => reply,
        Output::Json(value) => {
            let body = serde_json::to_vec(&value)?;
            let mut reply = fresh();
            reply.default_content_type(reply::JSON);
            reply.with_body(body)
        }
        Output::Text(text) => {
            let mut reply = fresh();
            reply.default_content_type(text_type);
            reply.with_body(text)
        }
        Output::Empty => fresh(),
    };
    Ok(reply.into_response())
}

async fn invoke_error(
    handler: &ErrorHandler,
    info: ErrorInfo,
    allowed: Option<MethodMask>,
) -> Result<Response<Body>, HttpError> {
    let status = info.status;
    let content_type = if info.json { reply::JSON } else { reply::HTML };
    let kind = handler.convention().reply_kind();
    let preset = move || {
        let mut reply = Reply::new(kind);
        reply.set_status(status);
        reply.set_content_type(HeaderValue::from_static(content_type));
        if let Some(allowed) = allowed {
            set_allow(&mut reply, allowed);
        }
        reply
    };

    let output = match handler {
        ErrorHandler::Error(handler) => guard(handler.call(info, preset())).await?,
        ErrorHandler::ErrorSync(handler) => {
            panic::catch_unwind(AssertUnwindSafe(|| handler.call(&info, preset())))
                .unwrap_or_else(|payload| Err(panicked(payload)))?
        }
    };
    finish(output, preset, content_type)
}

/// The minimal response used when no error route applies or the error
/// handler itself failed.
fn builtin(error: &HttpError, json: bool) -> Response<Body> {
    let status = error.status();
    let mut reply = Reply::new(ReplyKind::Any);
    reply.set_status(status);
    if let Some(allowed) = error.allowed() {
        set_allow(&mut reply, allowed);
    }

    if json {
        let message = error
            .message_str()
            .or_else(|| status.canonical_reason())
            .unwrap_or_default();
        let body = json!({ "status": status.as_u16(), "message": message });
        reply.set_content_type(HeaderValue::from_static(reply::JSON));
        reply = reply.with_body(body.to_string());
    }

    reply.into_response()
}

fn set_allow(reply: &mut Reply, allowed: MethodMask) {
    if let Ok(value) = HeaderValue::from_str(&allowed.allow_header()) {
        reply.set_header(header::ALLOW, value);
    }
}
