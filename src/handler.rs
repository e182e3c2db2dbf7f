//! Handlers and their calling conventions.
//!
//! Every route handler is a [`Handler`]: a tag naming the calling convention
//! together with the callable. The dispatcher switches on the tag to decide
//! which verbs are allowed, what the handler receives and how its return value
//! is turned into a response.
//!
//! ```ignore
//!  Convention      Receives                        Verbs
//!  Sync            &Request, Reply                 any
//!  Restful         Request, Params, Reply (trait)  GET POST PUT PATCH DELETE
//!  RestfulGet..    Request, Params, Reply          the named verb
//!  AnyMethod       Request, Params, Reply          any
//!  Resource        (static files)                  GET HEAD
//!  Error           ErrorInfo, Reply                -
//!  ErrorSync       &ErrorInfo, Reply               -
//! ```

use crate::error::{ErrorKind, HttpError};
use crate::method::MethodMask;
use crate::params::Params;
use crate::reply::{Reply, ReplyKind};
use crate::resource::Resource;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use hyper::{Body, Method, Request, StatusCode};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// What a handler produced.
#[derive(Debug)]
pub enum Output {
    /// The handler wrote the response itself; nothing further is sent.
    NoSend(Reply),
    /// Serialized with the route's content type, JSON unless configured otherwise.
    Json(Value),
    /// Sent verbatim.
    Text(String),
    /// An empty body with the route's default status.
    Empty,
}

impl From<Reply> for Output {
    fn from(reply: Reply) -> Self {
        Output::NoSend(reply)
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Json(value)
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Output::Text(text)
    }
}

impl From<&'static str> for Output {
    fn from(text: &'static str) -> Self {
        Output::Text(text.to_owned())
    }
}

impl From<()> for Output {
    fn from(_: ()) -> Self {
        Output::Empty
    }
}

/// The result every handler resolves to.
pub type HandlerResult = Result<Output, HttpError>;

/// The calling convention of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convention {
    Sync,
    Restful,
    RestfulGet,
    RestfulPost,
    RestfulPut,
    RestfulPatch,
    RestfulDelete,
    AnyMethod,
    Resource,
    Error,
    ErrorSync,
}

impl Convention {
    /// Verbs a handler of this convention can serve.
    pub fn allowed(self) -> MethodMask {
        match self {
            Convention::Sync | Convention::AnyMethod | Convention::Error | Convention::ErrorSync => {
                MethodMask::ALL
            }
            Convention::Restful => {
                MethodMask::GET
                    | MethodMask::POST
                    | MethodMask::PUT
                    | MethodMask::PATCH
                    | MethodMask::DELETE
            }
            Convention::RestfulGet => MethodMask::GET,
            Convention::RestfulPost => MethodMask::POST,
            Convention::RestfulPut => MethodMask::PUT,
            Convention::RestfulPatch => MethodMask::PATCH,
            Convention::RestfulDelete => MethodMask::DELETE,
            Convention::Resource => MethodMask::GET | MethodMask::HEAD,
        }
    }

    /// Whether responses of this convention are JSON documents.
    pub fn is_restful(self) -> bool {
        matches!(
            self,
            Convention::Restful
                | Convention::RestfulGet
                | Convention::RestfulPost
                | Convention::RestfulPut
                | Convention::RestfulPatch
                | Convention::RestfulDelete
                | Convention::AnyMethod
        )
    }

    pub(crate) fn reply_kind(self) -> ReplyKind {
        match self {
            Convention::Sync | Convention::ErrorSync => ReplyKind::Sync,
            Convention::Resource | Convention::Error => ReplyKind::Any,
            _ => ReplyKind::Restful,
        }
    }
}

/// A handler that completes synchronously and writes its own response.
///
/// Parameters are available through `req.extensions().get::<Params>()`.
pub trait SyncHandler: Send + Sync {
    fn call(&self, req: &Request<Body>, reply: Reply) -> HandlerResult;
}

impl<F, O> SyncHandler for F
where
    F: Fn(&Request<Body>, Reply) -> Result<O, HttpError> + Send + Sync,
    O: Into<Output>,
{
    fn call(&self, req: &Request<Body>, reply: Reply) -> HandlerResult {
        self(req, reply).map(Into::into)
    }
}

/// An asynchronous handler receiving the merged parameter map.
pub trait ParamsHandler: Send + Sync {
    fn call(&self, req: Request<Body>, params: Params, reply: Reply) -> BoxFuture<'static, HandlerResult>;
}

impl<F, R, O> ParamsHandler for F
where
    F: Fn(Request<Body>, Params, Reply) -> R + Send + Sync,
    R: Future<Output = Result<O, HttpError>> + Send + 'static,
    O: Into<Output>,
{
    fn call(&self, req: Request<Body>, params: Params, reply: Reply) -> BoxFuture<'static, HandlerResult> {
        self(req, params, reply).map(|res| res.map(Into::into)).boxed()
    }
}

/// A resource with one method per verb. Verbs left unimplemented answer
/// `405 Method Not Allowed`.
///
/// ```rust
/// use httpdispatch::{HandlerResult, HttpError, Params, Reply, Restful};
/// use async_trait::async_trait;
/// use hyper::{Body, Request};
/// use serde_json::json;
///
/// struct Users;
///
/// #[async_trait]
/// impl Restful for Users {
///     async fn get(&self, _: Request<Body>, params: Params, _: Reply) -> HandlerResult {
///         Ok(json!({ "id": params.get_str("id") }).into())
///     }
/// }
/// ```
#[async_trait]
pub trait Restful: Send + Sync {
    async fn get(&self, req: Request<Body>, _params: Params, _reply: Reply) -> HandlerResult {
        Err(not_implemented(&req))
    }

    async fn post(&self, req: Request<Body>, _params: Params, _reply: Reply) -> HandlerResult {
        Err(not_implemented(&req))
    }

    async fn put(&self, req: Request<Body>, _params: Params, _reply: Reply) -> HandlerResult {
        Err(not_implemented(&req))
    }

    async fn patch(&self, req: Request<Body>, _params: Params, _reply: Reply) -> HandlerResult {
        Err(not_implemented(&req))
    }

    async fn delete(&self, req: Request<Body>, _params: Params, _reply: Reply) -> HandlerResult {
        Err(not_implemented(&req))
    }
}

fn not_implemented(req: &Request<Body>) -> HttpError {
    HttpError::method_not_allowed(req.method(), Convention::Restful.allowed())
}

/// A route handler tagged with its calling convention.
#[derive(Clone)]
pub enum Handler {
    Sync(Arc<dyn SyncHandler>),
    Restful(Arc<dyn Restful>),
    RestfulGet(Arc<dyn ParamsHandler>),
    RestfulPost(Arc<dyn ParamsHandler>),
    RestfulPut(Arc<dyn ParamsHandler>),
    RestfulPatch(Arc<dyn ParamsHandler>),
    RestfulDelete(Arc<dyn ParamsHandler>),
    AnyMethod(Arc<dyn ParamsHandler>),
    Resource(Arc<Resource>),
}

impl Handler {
    pub fn sync(handler: impl SyncHandler + 'static) -> Self {
        Handler::Sync(Arc::new(handler))
    }

    pub fn restful(handler: impl Restful + 'static) -> Self {
        Handler::Restful(Arc::new(handler))
    }

    pub fn get(handler: impl ParamsHandler + 'static) -> Self {
        Handler::RestfulGet(Arc::new(handler))
    }

    pub fn post(handler: impl ParamsHandler + 'static) -> Self {
        Handler::RestfulPost(Arc::new(handler))
    }

    pub fn put(handler: impl ParamsHandler + 'static) -> Self {
        Handler::RestfulPut(Arc::new(handler))
    }

    pub fn patch(handler: impl ParamsHandler + 'static) -> Self {
        Handler::RestfulPatch(Arc::new(handler))
    }

    pub fn delete(handler: impl ParamsHandler + 'static) -> Self {
        Handler::RestfulDelete(Arc::new(handler))
    }

    pub fn any_method(handler: impl ParamsHandler + 'static) -> Self {
        Handler::AnyMethod(Arc::new(handler))
    }

    /// Serves files below `root`.
    pub fn resource(root: impl Into<PathBuf>) -> Self {
        Handler::Resource(Arc::new(Resource::new(root)))
    }

    pub fn convention(&self) -> Convention {
        match self {
            Handler::Sync(_) => Convention::Sync,
            Handler::Restful(_) => Convention::Restful,
            Handler::RestfulGet(_) => Convention::RestfulGet,
            Handler::RestfulPost(_) => Convention::RestfulPost,
            Handler::RestfulPut(_) => Convention::RestfulPut,
            Handler::RestfulPatch(_) => Convention::RestfulPatch,
            Handler::RestfulDelete(_) => Convention::RestfulDelete,
            Handler::AnyMethod(_) => Convention::AnyMethod,
            Handler::Resource(_) => Convention::Resource,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.convention())
    }
}

/// Details of a failed request passed to error handlers.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub status: StatusCode,
    pub message: Option<String>,
    pub kind: ErrorKind,
    pub method: Method,
    pub path: String,
    /// Whether the failing route answers with JSON.
    pub json: bool,
}

/// An asynchronous error handler. The reply's content type is preset to JSON
/// or HTML depending on the failing route.
pub trait AsyncErrorHandler: Send + Sync {
    fn call(&self, info: ErrorInfo, reply: Reply) -> BoxFuture<'static, HandlerResult>;
}

impl<F, R, O> AsyncErrorHandler for F
where
    F: Fn(ErrorInfo, Reply) -> R + Send + Sync,
    R: Future<Output = Result<O, HttpError>> + Send + 'static,
    O: Into<Output>,
{
    fn call(&self, info: ErrorInfo, reply: Reply) -> BoxFuture<'static, HandlerResult> {
        self(info, reply).map(|res| res.map(Into::into)).boxed()
    }
}

/// A synchronous error handler whose return value is sent as JSON for
/// RESTful routes and as text otherwise.
pub trait SyncErrorHandler: Send + Sync {
    fn call(&self, info: &ErrorInfo, reply: Reply) -> HandlerResult;
}

impl<F, O> SyncErrorHandler for F
where
    F: Fn(&ErrorInfo, Reply) -> Result<O, HttpError> + Send + Sync,
    O: Into<Output>,
{
    fn call(&self, info: &ErrorInfo, reply: Reply) -> HandlerResult {
        self(info, reply).map(Into::into)
    }
}

/// An error handler tagged with its calling convention.
#[derive(Clone)]
pub enum ErrorHandler {
    Error(Arc<dyn AsyncErrorHandler>),
    ErrorSync(Arc<dyn SyncErrorHandler>),
}

impl ErrorHandler {
    pub fn new(handler: impl AsyncErrorHandler + 'static) -> Self {
        ErrorHandler::Error(Arc::new(handler))
    }

    pub fn sync(handler: impl SyncErrorHandler + 'static) -> Self {
        ErrorHandler::ErrorSync(Arc::new(handler))
    }

    pub fn convention(&self) -> Convention {
        match self {
            ErrorHandler::Error(_) => Convention::Error,
            ErrorHandler::ErrorSync(_) => Convention::ErrorSync,
        }
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorHandler::{:?}", self.convention())
    }
}
